// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Core module - event model, debounce engine and the ingestion loop

mod engine;
mod retry;
mod connections;
mod monitor;

pub use engine::DebounceEngine;
pub use retry::RetryPolicy;
pub use connections::{ConnectionManager, Handles};
pub use monitor::{LineOutcome, Monitor};

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SourceLabel;

/// Fixed set of event categories persisted by the agents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    System,
    Temperature,
    SeismicAlert,
    FireAlert,
    PedestrianTraffic,
    DoorOpened,
    DoorClosed,
    ElevatorActivity,
    TrainArrival,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::System,
        Category::Temperature,
        Category::SeismicAlert,
        Category::FireAlert,
        Category::PedestrianTraffic,
        Category::DoorOpened,
        Category::DoorClosed,
        Category::ElevatorActivity,
        Category::TrainArrival,
    ];

    /// Label stored in the `category` column; the dashboards match on these.
    pub fn label(&self) -> &'static str {
        match self {
            Category::System => "Sistema",
            Category::Temperature => "Temperatura",
            Category::SeismicAlert => "Alerta Sismica",
            Category::FireAlert => "Incendio",
            Category::PedestrianTraffic => "Trafico Peatonal",
            Category::DoorOpened => "Puerta Abierta",
            Category::DoorClosed => "Puerta Cerrada",
            Category::ElevatorActivity => "Actividad Ascensores",
            Category::TrainArrival => "Tren Llegada",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }

    /// Critical categories open a window during which temperature is withheld
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Category::SeismicAlert | Category::FireAlert | Category::PedestrianTraffic
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts the stored label or the variant name, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|c| {
                c.label().eq_ignore_ascii_case(wanted)
                    || format!("{:?}", c).eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// An accepted event waiting to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Acceptance time; the store assigns insertion time when absent
    pub timestamp: Option<DateTime<Utc>>,
    pub location: String,
    pub category: Category,
    pub description: String,
    pub sensor: String,
}

impl EventRecord {
    pub fn new(category: Category, source: &SourceLabel, description: impl Into<String>) -> Self {
        Self {
            timestamp: None,
            location: source.location.clone(),
            category,
            description: description.into(),
            sensor: source.sensor.clone(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Point-in-time view of the engine's in-memory state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub critical_active: bool,
    pub last_temperature: Option<f64>,
    pub door_open: bool,
    pub train_at_platform: bool,
    pub active_elevators: usize,
}

/// Loop counters reported on shutdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub lines_read: u64,
    pub signals: u64,
    pub dropped_lines: u64,
    pub accepted: u64,
    pub persisted: u64,
    pub persist_failures: u64,
    pub transport_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_labels_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_label(category.label()), Some(category));
        }
        assert_eq!(Category::from_label("Unknown"), None);
    }

    #[test]
    fn test_category_parse_accepts_variant_names() {
        assert_eq!("firealert".parse::<Category>(), Ok(Category::FireAlert));
        assert_eq!("Alerta Sismica".parse::<Category>(), Ok(Category::SeismicAlert));
        assert!("lightning".parse::<Category>().is_err());
    }

    #[test]
    fn test_critical_categories() {
        let critical: Vec<_> = Category::ALL.into_iter().filter(|c| c.is_critical()).collect();
        assert_eq!(
            critical,
            vec![Category::SeismicAlert, Category::FireAlert, Category::PedestrianTraffic]
        );
    }
}
