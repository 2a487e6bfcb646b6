// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Ordered rule table mapping board lines to signals

use tracing::{debug, trace};

use super::{Signal, TelemetryFrame};
use crate::config::{Config, Deployment, StationConfig};
use crate::error::ParseError;

const FRAME_START: &str = "JSON_START";
const FRAME_END: &str = "JSON_END";
const TEMPERATURE_MARKERS: [&str; 2] = ["Temperatura actual:", "DEBUG Temperatura:"];
const VIBRATION_MARKERS: [&str; 2] = ["Sensor de vibracion:", "Sensor de vibración:"];
const VIBRATION_ACTIVE: &str = "ACTIVADO";
const VIBRATION_VALUE: &str = "Valor:";
const SEISMIC_ALERT: &str = "ALERTA: Terremoto detectado!";
const FIRE_ALERT: &str = "ALERTA: Incendio detectado!";
const FIRE_TEMPERATURE: &str = "Temperatura:";
const PEDESTRIAN_MOTION: &str = "Sensor de movimiento: ACTIVADO";
const PIR_MOTION: &str = "MOVIMIENTO DETECTADO";
const DOOR_OPENED: &str = "puerta abierta";
const DOOR_CLOSED: &str = "puerta cerrada";
const ELEVATORS_ACTIVE: &str = "Ascensores activados";
const TRAIN_KEYWORDS: [&str; 4] = ["tren", "shinkansen", "llegada", "estacion"];

const CITY: &[Deployment] = &[Deployment::City];
const STATION: &[Deployment] = &[Deployment::Station];

type Extractor = fn(&str) -> Result<Option<Signal>, ParseError>;

/// What happens when a rule matches
#[derive(Clone, Copy)]
pub enum RuleAction {
    /// Begin capturing a sentinel-framed block
    FrameStart,
    /// End the sentinel-framed block
    FrameEnd,
    /// Decode the line as a single-line telemetry frame
    Frame,
    /// Swallow lines while a sentinel block is open
    CaptureBody,
    /// Produce a signal from the line text
    Extract(Extractor),
}

/// One entry of the classification table
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub deployments: &'static [Deployment],
    matches: fn(&str) -> bool,
    /// Station switch that turns the rule off; a disabled rule lets the
    /// line fall through to the next one
    enabled: fn(&StationConfig) -> bool,
    pub action: RuleAction,
}

impl Rule {
    pub fn applies_to(&self, deployment: Deployment) -> bool {
        self.deployments.contains(&deployment)
    }

    pub fn enabled(&self, station: &StationConfig) -> bool {
        (self.enabled)(station)
    }
}

fn always(_: &StationConfig) -> bool {
    true
}

/// Every rule in evaluation order. Categories overlap textually, so the
/// order is part of the contract: the first matching rule decides the line.
pub fn rule_table() -> Vec<Rule> {
    vec![
        Rule { name: "frame-start", deployments: STATION, matches: |l| l.contains(FRAME_START), enabled: always, action: RuleAction::FrameStart },
        Rule { name: "frame-end", deployments: STATION, matches: |l| l.contains(FRAME_END), enabled: always, action: RuleAction::FrameEnd },
        Rule { name: "frame-object", deployments: STATION, matches: is_json_object, enabled: always, action: RuleAction::Frame },
        Rule { name: "frame-body", deployments: STATION, matches: |_| true, enabled: always, action: RuleAction::CaptureBody },
        Rule { name: "temperature", deployments: CITY, matches: |l| TEMPERATURE_MARKERS.iter().any(|m| l.contains(m)), enabled: always, action: RuleAction::Extract(extract_temperature) },
        Rule { name: "vibration", deployments: CITY, matches: |l| VIBRATION_MARKERS.iter().any(|m| l.contains(m)), enabled: always, action: RuleAction::Extract(extract_vibration) },
        Rule { name: "seismic-alert", deployments: CITY, matches: |l| l.contains(SEISMIC_ALERT), enabled: always, action: RuleAction::Extract(|_| Ok(Some(Signal::SeismicAlert))) },
        Rule { name: "fire-alert", deployments: CITY, matches: |l| l.contains(FIRE_ALERT), enabled: always, action: RuleAction::Extract(extract_fire) },
        Rule { name: "pedestrian", deployments: CITY, matches: |l| l.contains(PEDESTRIAN_MOTION), enabled: always, action: RuleAction::Extract(|_| Ok(Some(Signal::PedestrianMotion))) },
        Rule { name: "pir-motion", deployments: STATION, matches: |l| l.contains(PIR_MOTION), enabled: |s| s.detect_by_pir, action: RuleAction::Extract(|_| Ok(Some(Signal::PirMotion))) },
        Rule { name: "door-opened", deployments: STATION, matches: |l| l.to_lowercase().contains(DOOR_OPENED), enabled: always, action: RuleAction::Extract(|_| Ok(Some(Signal::DoorOpened))) },
        Rule { name: "door-closed", deployments: STATION, matches: |l| l.to_lowercase().contains(DOOR_CLOSED), enabled: always, action: RuleAction::Extract(|_| Ok(Some(Signal::DoorClosed))) },
        Rule { name: "elevator", deployments: STATION, matches: |l| l.contains(ELEVATORS_ACTIVE), enabled: always, action: RuleAction::Extract(|_| Ok(Some(Signal::ElevatorActivity))) },
        Rule { name: "train-keywords", deployments: STATION, matches: has_train_keyword, enabled: always, action: RuleAction::Extract(|_| Ok(Some(Signal::TrainKeyword))) },
    ]
}

fn is_json_object(line: &str) -> bool {
    let line = line.trim();
    line.starts_with('{') && line.ends_with('}')
}

fn has_train_keyword(line: &str) -> bool {
    let lower = line.to_lowercase();
    TRAIN_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn parse_reading(field: &'static str, raw: &str) -> Result<f64, ParseError> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ParseError::number(field, raw))
}

fn extract_temperature(line: &str) -> Result<Option<Signal>, ParseError> {
    let rest = TEMPERATURE_MARKERS
        .iter()
        .find_map(|m| line.split_once(m).map(|(_, rest)| rest))
        .unwrap_or_default();
    let raw = rest
        .split_whitespace()
        .next()
        .ok_or(ParseError::MissingValue { field: "temperature" })?;
    Ok(Some(Signal::Temperature(parse_reading("temperature", raw)?)))
}

fn extract_vibration(line: &str) -> Result<Option<Signal>, ParseError> {
    if !line.contains(VIBRATION_ACTIVE) {
        return Ok(None);
    }
    let (_, rest) = line
        .split_once(VIBRATION_VALUE)
        .ok_or(ParseError::MissingValue { field: "vibration" })?;
    let raw = rest.split(')').next().unwrap_or_default().trim();
    let magnitude = raw
        .parse::<i64>()
        .map_err(|_| ParseError::number("vibration", raw))?;
    Ok(Some(Signal::Vibration(magnitude)))
}

/// The embedded temperature only enriches the description; a bad value
/// still yields the alert.
fn extract_fire(line: &str) -> Result<Option<Signal>, ParseError> {
    let temperature = line
        .split_once(FIRE_TEMPERATURE)
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .and_then(|raw| parse_reading("temperature", raw).ok());
    Ok(Some(Signal::FireAlert(temperature)))
}

/// Line classifier for one deployment.
///
/// Holds the only classification state: whether a `JSON_START` block is open.
pub struct Classifier {
    rules: Vec<Rule>,
    capturing: bool,
    captured: String,
}

impl Classifier {
    /// Rules of a deployment with the default station switches
    pub fn new(deployment: Deployment) -> Self {
        Self::with_station(deployment, &StationConfig::default())
    }

    pub fn for_config(config: &Config) -> Self {
        Self::with_station(config.deployment, &config.station)
    }

    pub fn with_station(deployment: Deployment, station: &StationConfig) -> Self {
        let rules = rule_table()
            .into_iter()
            .filter(|r| r.applies_to(deployment) && r.enabled(station))
            .collect();
        Self {
            rules,
            capturing: false,
            captured: String::new(),
        }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    /// Map a line to at most one signal. First matching rule wins.
    pub fn classify(&mut self, line: &str) -> Result<Option<Signal>, ParseError> {
        for rule in &self.rules {
            if !(rule.matches)(line) {
                continue;
            }

            match rule.action {
                RuleAction::FrameStart => {
                    self.capturing = true;
                    self.captured.clear();
                    trace!("Sentinel frame opened");
                    return Ok(None);
                }
                RuleAction::FrameEnd => {
                    self.capturing = false;
                    if !self.captured.is_empty() {
                        // Framed blocks carry no events; only single-line frames are decoded.
                        debug!("Discarding {} bytes of sentinel-framed text", self.captured.len());
                    }
                    self.captured.clear();
                    return Ok(None);
                }
                RuleAction::Frame => {
                    let frame = TelemetryFrame::parse(line.trim())?;
                    trace!("Rule {} matched", rule.name);
                    return Ok(Some(Signal::Frame(frame)));
                }
                RuleAction::CaptureBody => {
                    if !self.capturing {
                        continue;
                    }
                    self.captured.push_str(line);
                    return Ok(None);
                }
                RuleAction::Extract(extract) => {
                    trace!("Rule {} matched", rule.name);
                    return extract(line);
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city() -> Classifier {
        Classifier::new(Deployment::City)
    }

    fn station() -> Classifier {
        Classifier::new(Deployment::Station)
    }

    #[test]
    fn test_table_order_per_deployment() {
        assert_eq!(
            city().rule_names(),
            vec!["temperature", "vibration", "seismic-alert", "fire-alert", "pedestrian"]
        );
        assert_eq!(
            station().rule_names(),
            vec![
                "frame-start", "frame-end", "frame-object", "frame-body", "pir-motion",
                "door-opened", "door-closed", "elevator", "train-keywords",
            ]
        );
    }

    #[test]
    fn test_temperature_forms() {
        let mut c = city();
        assert_eq!(c.classify("Temperatura actual: 25.5 C").unwrap(), Some(Signal::Temperature(25.5)));
        assert_eq!(c.classify("DEBUG Temperatura: 31.25").unwrap(), Some(Signal::Temperature(31.25)));
    }

    #[test]
    fn test_malformed_temperature_is_parse_error() {
        let mut c = city();
        assert!(matches!(
            c.classify("Temperatura actual: abc"),
            Err(ParseError::InvalidNumber { field: "temperature", .. })
        ));
        assert!(c.classify("Temperatura actual: NaN C").is_err());
        assert!(matches!(
            c.classify("Temperatura actual:"),
            Err(ParseError::MissingValue { .. })
        ));
    }

    #[test]
    fn test_vibration_requires_activation() {
        let mut c = city();
        assert_eq!(
            c.classify("Sensor de vibración: ACTIVADO (Valor: 950)").unwrap(),
            Some(Signal::Vibration(950))
        );
        assert_eq!(
            c.classify("Sensor de vibracion: ACTIVADO (Valor: 12)").unwrap(),
            Some(Signal::Vibration(12))
        );
        assert_eq!(c.classify("Sensor de vibracion: INACTIVO (Valor: 950)").unwrap(), None);
        assert!(c.classify("Sensor de vibracion: ACTIVADO (Valor: x)").is_err());
    }

    #[test]
    fn test_alerts() {
        let mut c = city();
        assert_eq!(c.classify("ALERTA: Terremoto detectado!").unwrap(), Some(Signal::SeismicAlert));
        assert_eq!(
            c.classify("ALERTA: Incendio detectado! Temperatura: 82.5 C").unwrap(),
            Some(Signal::FireAlert(Some(82.5)))
        );
        assert_eq!(
            c.classify("ALERTA: Incendio detectado! Temperatura: ??").unwrap(),
            Some(Signal::FireAlert(None))
        );
        assert_eq!(c.classify("Sensor de movimiento: ACTIVADO").unwrap(), Some(Signal::PedestrianMotion));
        assert_eq!(c.classify("Sensor de movimiento: DESACTIVADO").unwrap(), None);
    }

    #[test]
    fn test_first_match_wins() {
        let mut c = city();
        // Carries both a temperature marker and a fire marker
        assert_eq!(
            c.classify("DEBUG Temperatura: 71.0 ALERTA: Incendio detectado!").unwrap(),
            Some(Signal::Temperature(71.0))
        );

        let mut s = station();
        assert_eq!(s.classify("Puerta ABIERTA, tren en estacion").unwrap(), Some(Signal::DoorOpened));
        assert_eq!(s.classify("MOVIMIENTO DETECTADO junto a la puerta cerrada").unwrap(), Some(Signal::PirMotion));
    }

    #[test]
    fn test_disabled_pir_falls_through() {
        let mut config = Config::for_deployment(Deployment::Station);
        config.station.detect_by_pir = false;
        let mut s = Classifier::for_config(&config);

        assert!(!s.rule_names().contains(&"pir-motion"));
        assert_eq!(s.classify("MOVIMIENTO DETECTADO - puerta abierta").unwrap(), Some(Signal::DoorOpened));
        assert_eq!(s.classify("MOVIMIENTO DETECTADO junto a la puerta cerrada").unwrap(), Some(Signal::DoorClosed));
        assert_eq!(s.classify("MOVIMIENTO DETECTADO").unwrap(), None);
    }

    #[test]
    fn test_station_text_markers() {
        let mut s = station();
        assert_eq!(s.classify("PUERTA CERRADA").unwrap(), Some(Signal::DoorClosed));
        assert_eq!(s.classify("puerta abierta").unwrap(), Some(Signal::DoorOpened));
        assert_eq!(s.classify("Ascensores activados").unwrap(), Some(Signal::ElevatorActivity));
        assert_eq!(s.classify("Shinkansen aproximandose").unwrap(), Some(Signal::TrainKeyword));
        assert_eq!(s.classify("Motor 2 en reposo").unwrap(), None);
    }

    #[test]
    fn test_deployments_ignore_foreign_markers() {
        assert_eq!(station().classify("Temperatura actual: 25.5 C").unwrap(), None);
        assert_eq!(city().classify("PUERTA ABIERTA").unwrap(), None);
        assert_eq!(city().classify("Llegada del tren").unwrap(), None);
    }

    #[test]
    fn test_single_line_frame() {
        let mut s = station();
        let signal = s
            .classify(r#" {"puerta":{"estado":"abierta","sensor_pir":true}} "#)
            .unwrap();
        match signal {
            Some(Signal::Frame(frame)) => assert!(frame.door_motion()),
            other => panic!("expected frame, got {:?}", other),
        }
        assert!(matches!(s.classify("{not json}"), Err(ParseError::MalformedFrame(_))));
    }

    #[test]
    fn test_sentinel_block_is_swallowed() {
        let mut s = station();
        assert_eq!(s.classify("JSON_START").unwrap(), None);
        assert!(s.is_capturing());
        // Text that would otherwise be a train keyword
        assert_eq!(s.classify("\"estacion\": 1,").unwrap(), None);
        // Single-line frames are still decoded inside a block
        assert!(matches!(s.classify(r#"{"ascensores":[]}"#).unwrap(), Some(Signal::Frame(_))));
        assert_eq!(s.classify("JSON_END").unwrap(), None);
        assert!(!s.is_capturing());
        assert_eq!(s.classify("Llegada del tren").unwrap(), Some(Signal::TrainKeyword));
    }
}
