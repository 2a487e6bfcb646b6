// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Smart City Ingest - sensor event ingestion for smart city boards
//!
//! Turns the noisy line output of the installation's sensor boards into
//! deduplicated, classified event records:
//! - Latin-1 line reader over a serial link or a recorded replay
//! - Ordered, first-match-wins rule table per deployment (city / station)
//! - Per-category debounce with critical suppression windows and escalation
//! - SQLite event store shared by every agent, with a read-only query surface
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      Connection Manager                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────┐   ┌────────────┐   ┌───────────┐   ┌─────────┐  │
//! │  │  Line   │ → │    Line    │ → │ Debounce  │ → │  Event  │  │
//! │  │ Reader  │   │ Classifier │   │  Engine   │   │  Sink   │  │
//! │  └─────────┘   └────────────┘   └───────────┘   └─────────┘  │
//! │       ↑                                              ↓       │
//! │  serial / replay                                   SQLite    │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod core;
pub mod db;
pub mod detection;
pub mod error;
pub mod sensors;

// Re-exports for convenience
pub use config::{Config, Deployment};
pub use crate::core::{Category, DebounceEngine, EventRecord, Monitor};
pub use db::{Database, EventSink, StoredEvent};
pub use detection::{Classifier, Signal};
pub use sensors::{LineReader, Transport};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Display name
pub const NAME: &str = "Smart City Ingest";

/// Build info
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION.to_string(),
        target: std::env::consts::ARCH.to_string(),
        os: std::env::consts::OS.to_string(),
        features: enabled_features(),
    }
}

/// Build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Version string
    pub version: String,
    /// Target architecture
    pub target: String,
    /// Operating system
    pub os: String,
    /// Enabled features
    pub features: Vec<String>,
}

fn enabled_features() -> Vec<String> {
    let mut features = vec![];

    #[cfg(feature = "serial")]
    features.push("serial".to_string());

    features
}
