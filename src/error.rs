// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Error types for the ingestion pipeline

use thiserror::Error;

/// Failures of the sensor board link
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open transport {target}: {reason}")]
    Open { target: String, reason: String },

    #[error("transport {0} is not available in this build")]
    Unsupported(String),

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the event store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store connection lock poisoned")]
    Poisoned,

    #[error("store is not connected")]
    Disconnected,

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("invalid filter: {0}")]
    InvalidFilter(String),
}

/// A line that looked like a known signal but could not be decoded
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid {field} value {raw:?}")]
    InvalidNumber { field: &'static str, raw: String },

    #[error("missing {field} value")]
    MissingValue { field: &'static str },

    #[error("malformed telemetry frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),
}

impl ParseError {
    pub(crate) fn number(field: &'static str, raw: &str) -> Self {
        Self::InvalidNumber {
            field,
            raw: raw.to_string(),
        }
    }
}

/// Startup failures that abort the agent
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("event store unavailable: {0}")]
    Store(#[from] StoreError),

    #[error("sensor link unavailable: {0}")]
    Transport(#[from] TransportError),
}
