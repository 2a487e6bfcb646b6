// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Debounce and suppression engine
//!
//! Turns classified signals into accepted events. All state lives here and is
//! only touched by `evaluate`; nothing is persisted or shared between agents.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{Category, EngineSnapshot, EventRecord};
use crate::config::{Config, DebounceConfig, LabelsConfig, StationConfig, SuppressionConfig, ThresholdConfig};
use crate::detection::{DoorPosition, Signal, TelemetryFrame};

const SEISMIC_NOTICE: &str = "Mantenga la calma y siga los protocolos de seguridad.";

/// Per-category timing, held only in memory
#[derive(Debug, Clone, Copy, Default)]
struct CategoryTiming {
    last_accepted_at: Option<DateTime<Utc>>,
    critical_active_until: Option<DateTime<Utc>>,
}

/// Door, platform and elevator state for the station board
#[derive(Debug, Clone, Copy, Default)]
struct StationState {
    door_open: bool,
    train_at_platform: bool,
    active_elevators: usize,
}

/// Engine context: configuration plus category timing state
pub struct DebounceEngine {
    debounce: DebounceConfig,
    thresholds: ThresholdConfig,
    suppression: SuppressionConfig,
    station_rules: StationConfig,
    labels: LabelsConfig,
    timing: HashMap<Category, CategoryTiming>,
    last_temperature: Option<f64>,
    station: StationState,
}

impl DebounceEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            debounce: config.debounce.clone(),
            thresholds: config.thresholds.clone(),
            suppression: config.suppression.clone(),
            station_rules: config.station.clone(),
            labels: config.labels.clone(),
            timing: HashMap::new(),
            last_temperature: None,
            station: StationState::default(),
        }
    }

    /// True while any critical category's suppression window is open
    pub fn critical_active(&self, now: DateTime<Utc>) -> bool {
        self.timing
            .iter()
            .filter(|(category, _)| category.is_critical())
            .any(|(_, t)| t.critical_active_until.map_or(false, |until| now < until))
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> EngineSnapshot {
        EngineSnapshot {
            critical_active: self.critical_active(now),
            last_temperature: self.last_temperature,
            door_open: self.station.door_open,
            train_at_platform: self.station.train_at_platform,
            active_elevators: self.station.active_elevators,
        }
    }

    /// Build an event for a category that bypasses debouncing (system events)
    pub fn system_event(&self, description: &str, now: DateTime<Utc>) -> EventRecord {
        EventRecord::new(Category::System, self.labels.for_category(Category::System), description).at(now)
    }

    /// Decide which events a signal produces, in acceptance order
    pub fn evaluate(&mut self, signal: Signal, now: DateTime<Utc>) -> Vec<EventRecord> {
        let mut accepted = Vec::new();

        match signal {
            Signal::Temperature(value) => self.on_temperature(value, now, &mut accepted),
            Signal::Vibration(magnitude) => {
                if magnitude > self.thresholds.vibration {
                    let description = format!(
                        "Se ha detectado actividad sismica. Intensidad: {}. {}",
                        magnitude, SEISMIC_NOTICE
                    );
                    self.admit(Category::SeismicAlert, description, now, &mut accepted);
                } else {
                    debug!("Vibration {} below threshold {}", magnitude, self.thresholds.vibration);
                }
            }
            Signal::SeismicAlert => {
                let description = format!("Se ha detectado actividad sismica. {}", SEISMIC_NOTICE);
                self.admit(Category::SeismicAlert, description, now, &mut accepted);
            }
            Signal::FireAlert(temperature) => {
                let description = match temperature {
                    Some(t) => fire_description(t),
                    None => "Se ha detectado un posible incendio. Siga los protocolos de evacuacion.".to_string(),
                };
                self.admit(Category::FireAlert, description, now, &mut accepted);
            }
            Signal::PedestrianMotion => {
                self.admit(
                    Category::PedestrianTraffic,
                    "Se ha detectado movimiento de peatones en el cruce.",
                    now,
                    &mut accepted,
                );
            }
            Signal::PirMotion => {
                if self.station_rules.detect_by_pir {
                    self.on_train_arrival(now, &mut accepted);
                }
            }
            Signal::TrainKeyword => self.on_train_arrival(now, &mut accepted),
            Signal::DoorOpened => self.on_door(DoorPosition::Open, now, &mut accepted),
            Signal::DoorClosed => self.on_door(DoorPosition::Closed, now, &mut accepted),
            Signal::ElevatorActivity => {
                if self.station_rules.detect_by_elevators {
                    self.admit(
                        Category::ElevatorActivity,
                        "Ascensores en funcionamiento. Pasajeros subiendo/bajando.",
                        now,
                        &mut accepted,
                    );
                }
            }
            Signal::Frame(frame) => self.on_frame(&frame, now, &mut accepted),
        }

        accepted
    }

    fn on_temperature(&mut self, value: f64, now: DateTime<Utc>, accepted: &mut Vec<EventRecord>) {
        if self.critical_active(now) {
            debug!("Temperature {} suppressed while a critical event is active", value);
            return;
        }

        let changed = self
            .last_temperature
            .map_or(true, |last| (value - last).abs() >= self.debounce.temperature_delta);
        let due = self.interval_elapsed(Category::Temperature, now);
        if !(changed || due) {
            debug!("Temperature {} debounced", value);
            return;
        }

        let description = format!("Temperatura registrada: {} C", format_reading(value));
        self.accept(Category::Temperature, description, now, accepted);
        self.last_temperature = Some(value);

        if value > self.thresholds.temperature_high {
            info!(
                "Temperature {} above {} - escalating to fire alert",
                value, self.thresholds.temperature_high
            );
            self.admit(Category::FireAlert, fire_description(value), now, accepted);
        }
    }

    fn on_train_arrival(&mut self, now: DateTime<Utc>, accepted: &mut Vec<EventRecord>) {
        if self.station.train_at_platform {
            debug!("Train already at platform");
            return;
        }
        let admitted = self.admit(
            Category::TrainArrival,
            "Tren Shinkansen llegando a la estacion. Abriendo puertas automaticamente.",
            now,
            accepted,
        );
        if admitted {
            self.station.train_at_platform = true;
        }
    }

    fn on_door(&mut self, position: DoorPosition, now: DateTime<Utc>, accepted: &mut Vec<EventRecord>) {
        match position {
            DoorPosition::Open if !self.station.door_open => {
                let admitted = self.admit(
                    Category::DoorOpened,
                    "Puerta de la estacion abierta. Pasajeros pueden abordar/descender.",
                    now,
                    accepted,
                );
                if admitted {
                    self.station.door_open = true;
                }
            }
            DoorPosition::Closed if self.station.door_open => {
                let admitted = self.admit(
                    Category::DoorClosed,
                    "Puerta de la estacion cerrada. Preparando partida del tren.",
                    now,
                    accepted,
                );
                if admitted {
                    self.station.door_open = false;
                    self.station.train_at_platform = false;
                }
            }
            _ => debug!("Door already {:?}", position),
        }
    }

    /// Door first, then elevators, then PIR; a closing door in the same frame
    /// clears the platform before the motion flag is considered.
    fn on_frame(&mut self, frame: &TelemetryFrame, now: DateTime<Utc>, accepted: &mut Vec<EventRecord>) {
        if let Some(position) = frame.door_position() {
            self.on_door(position, now, accepted);
        }

        // A frame without an elevator list counts as none running
        let active = frame.active_elevators().unwrap_or(0);
        if active > self.station.active_elevators && self.station_rules.detect_by_elevators {
            let description = format!(
                "Actividad en ascensores detectada ({} activos). Posible llegada de pasajeros.",
                active
            );
            self.admit(Category::ElevatorActivity, description, now, accepted);
        }
        self.station.active_elevators = active;

        if frame.door_motion() && self.station_rules.detect_by_pir {
            self.on_train_arrival(now, accepted);
        }
    }

    fn interval_elapsed(&self, category: Category, now: DateTime<Utc>) -> bool {
        match self.timing.get(&category).and_then(|t| t.last_accepted_at) {
            Some(last) => now - last >= self.debounce.interval(category),
            None => true,
        }
    }

    /// Accept the event if its debounce interval has elapsed
    fn admit(
        &mut self,
        category: Category,
        description: impl Into<String>,
        now: DateTime<Utc>,
        accepted: &mut Vec<EventRecord>,
    ) -> bool {
        if !self.interval_elapsed(category, now) {
            debug!("{:?} debounced", category);
            return false;
        }
        self.accept(category, description, now, accepted);
        true
    }

    fn accept(
        &mut self,
        category: Category,
        description: impl Into<String>,
        now: DateTime<Utc>,
        accepted: &mut Vec<EventRecord>,
    ) {
        let timing = self.timing.entry(category).or_default();
        timing.last_accepted_at = Some(now);

        if let Some(window) = self.suppression.duration(category) {
            let until = now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC);
            timing.critical_active_until = Some(until);
            info!(
                "{:?} active - suspending temperature logging for {}s",
                category,
                window.num_seconds()
            );
        }

        let source = self.labels.for_category(category);
        accepted.push(EventRecord::new(category, source, description).at(now));
    }
}

fn fire_description(temperature: f64) -> String {
    format!(
        "Se ha detectado un posible incendio. Temperatura: {} C",
        format_reading(temperature)
    )
}

/// Readings keep their decimal point: 75 is written as "75.0"
fn format_reading(value: f64) -> String {
    format!("{:?}", value)
}
