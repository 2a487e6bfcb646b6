// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! JSON telemetry frames from the station board

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Door position reported by the station board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorPosition {
    Open,
    Closed,
}

impl DoorPosition {
    fn from_wire(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "abierta" => Some(DoorPosition::Open),
            "cerrada" => Some(DoorPosition::Closed),
            _ => None,
        }
    }
}

/// One `{ "puerta": {...}, "ascensores": [...] }` frame.
///
/// Every field is optional; accessors report absence instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    #[serde(default, rename = "puerta")]
    door: Option<DoorFrame>,

    #[serde(default, rename = "ascensores")]
    elevators: Option<Vec<ElevatorFrame>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct DoorFrame {
    #[serde(default, rename = "estado")]
    state: Option<String>,

    #[serde(default, rename = "sensor_pir")]
    motion: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ElevatorFrame {
    #[serde(default, rename = "activo")]
    active: Option<bool>,
}

impl TelemetryFrame {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(text)?)
    }

    /// `None` when the door block or its state is missing or unrecognized
    pub fn door_position(&self) -> Option<DoorPosition> {
        self.door
            .as_ref()
            .and_then(|d| d.state.as_deref())
            .and_then(DoorPosition::from_wire)
    }

    pub fn door_motion(&self) -> bool {
        self.door.as_ref().and_then(|d| d.motion).unwrap_or(false)
    }

    /// `None` when the frame carries no elevator list
    pub fn active_elevators(&self) -> Option<usize> {
        self.elevators
            .as_ref()
            .map(|list| list.iter().filter(|e| e.active.unwrap_or(false)).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_frame() {
        let frame = TelemetryFrame::parse(
            r#"{"puerta":{"estado":"abierta","sensor_pir":true},"ascensores":[{"activo":true},{"activo":false},{"activo":true}]}"#,
        )
        .unwrap();

        assert_eq!(frame.door_position(), Some(DoorPosition::Open));
        assert!(frame.door_motion());
        assert_eq!(frame.active_elevators(), Some(2));
    }

    #[test]
    fn test_missing_fields_are_absent() {
        let frame = TelemetryFrame::parse(r#"{"puerta":{},"extra":1}"#).unwrap();
        assert_eq!(frame.door_position(), None);
        assert!(!frame.door_motion());
        assert_eq!(frame.active_elevators(), None);

        let frame = TelemetryFrame::parse(r#"{"puerta":{"estado":"entreabierta"},"ascensores":[{}]}"#).unwrap();
        assert_eq!(frame.door_position(), None);
        assert_eq!(frame.active_elevators(), Some(0));
    }

    #[test]
    fn test_malformed_frame() {
        assert!(matches!(
            TelemetryFrame::parse(r#"{"puerta": "#),
            Err(ParseError::MalformedFrame(_))
        ));
        assert!(TelemetryFrame::parse(r#"{"puerta": 3}"#).is_err());
    }
}
