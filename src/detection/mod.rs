//! Detection module - line classification into signals

mod frame;
mod rules;

pub use frame::{DoorPosition, TelemetryFrame};
pub use rules::{Classifier, Rule, RuleAction};

use serde::{Deserialize, Serialize};

/// What a single board line means, before debouncing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Signal {
    Temperature(f64),
    Vibration(i64),
    SeismicAlert,
    /// Optional temperature embedded in the alert line
    FireAlert(Option<f64>),
    PedestrianMotion,
    /// Door PIR motion, read as a train pulling in
    PirMotion,
    DoorOpened,
    DoorClosed,
    ElevatorActivity,
    /// Free text mentioning a train or the station
    TrainKeyword,
    Frame(TelemetryFrame),
}

impl Signal {
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Temperature(_) => "temperature",
            Signal::Vibration(_) => "vibration",
            Signal::SeismicAlert => "seismic-alert",
            Signal::FireAlert(_) => "fire-alert",
            Signal::PedestrianMotion => "pedestrian-motion",
            Signal::PirMotion => "pir-motion",
            Signal::DoorOpened => "door-opened",
            Signal::DoorClosed => "door-closed",
            Signal::ElevatorActivity => "elevator-activity",
            Signal::TrainKeyword => "train-keyword",
            Signal::Frame(_) => "telemetry-frame",
        }
    }
}
