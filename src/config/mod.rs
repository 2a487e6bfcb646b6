// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Configuration module

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::core::{Category, RetryPolicy};
use crate::sensors::Encoding;

/// Upper bound for every debounce and suppression window (one week)
pub const MAX_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

/// Which board the agent listens to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Deployment {
    /// Temperature, vibration, fire and pedestrian board
    #[default]
    City,
    /// Door, elevator and train board at the station
    Station,
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Log level
    pub log_level: String,

    /// Rule set and label defaults
    pub deployment: Deployment,

    /// Sensor board link
    pub serial: SerialConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Connection retries
    pub retry: RetryConfig,

    /// Minimum spacing between accepted events
    pub debounce: DebounceConfig,

    /// Escalation thresholds
    pub thresholds: ThresholdConfig,

    /// Critical suppression windows
    pub suppression: SuppressionConfig,

    /// Station-only detection switches
    pub station: StationConfig,

    /// Location and sensor labels written with each event
    pub labels: LabelsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_deployment(Deployment::City)
    }
}

impl Config {
    /// Defaults for a given board
    pub fn for_deployment(deployment: Deployment) -> Self {
        let serial = match deployment {
            Deployment::City => SerialConfig::default(),
            Deployment::Station => SerialConfig {
                port: default_station_port(),
                ..SerialConfig::default()
            },
        };

        Self {
            app_name: "smartcity-ingest".to_string(),
            log_level: "info".to_string(),
            deployment,
            serial,
            database: DatabaseConfig::default(),
            retry: RetryConfig::default(),
            debounce: DebounceConfig::default(),
            thresholds: ThresholdConfig::default(),
            suppression: SuppressionConfig::default(),
            station: StationConfig::default(),
            labels: LabelsConfig::for_deployment(deployment),
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("smartcity-ingest"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.serial.poll_interval_ms == 0 {
            bail!("serial.poll_interval_ms must be greater than zero");
        }
        if self.retry.startup_attempts == 0 || self.retry.reconnect_attempts == 0 {
            bail!("retry attempts must be at least 1");
        }
        if !self.thresholds.temperature_high.is_finite() {
            bail!("thresholds.temperature_high must be a finite number");
        }
        if !self.debounce.temperature_delta.is_finite() || self.debounce.temperature_delta < 0.0 {
            bail!("debounce.temperature_delta must be a non-negative number");
        }
        for (name, secs) in self.debounce.windows().into_iter().chain(self.suppression.windows()) {
            if secs > MAX_WINDOW_SECS {
                bail!("{} must be at most {} seconds", name, MAX_WINDOW_SECS);
            }
        }
        if self.labels.system_started.trim().is_empty() || self.labels.system_stopped.trim().is_empty() {
            bail!("labels.system_started and labels.system_stopped must not be empty");
        }
        for category in Category::ALL {
            let source = self.labels.for_category(category);
            if source.location.trim().is_empty() || source.sensor.trim().is_empty() {
                bail!("labels for {:?} must have a location and a sensor", category);
            }
        }
        Ok(())
    }
}

fn default_station_port() -> String {
    if cfg!(windows) { "COM4" } else { "/dev/ttyACM1" }.to_string()
}

/// Sensor board link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Serial port name
    pub port: String,

    /// Baud rate
    pub baud_rate: u32,

    /// Read timeout in milliseconds
    pub timeout_ms: u64,

    /// Byte encoding used by the board firmware
    pub encoding: Encoding,

    /// Pause between polls of the link in milliseconds
    pub poll_interval_ms: u64,

    /// Replay a captured log instead of opening the port
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_file: Option<PathBuf>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: if cfg!(windows) { "COM3" } else { "/dev/ttyACM0" }.to_string(),
            baud_rate: 9600,
            timeout_ms: 1000,
            encoding: Encoding::Latin1,
            poll_interval_ms: 100,
            replay_file: None,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database path
    pub path: PathBuf,

    /// How long a writer waits on a lock held by another agent
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/arduino_monitoreo.db"),
            busy_timeout_ms: 5000,
        }
    }
}

/// Retry settings for the store and the board link
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub startup_attempts: u32,
    pub startup_backoff_ms: u64,
    pub reconnect_attempts: u32,
    pub reconnect_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            startup_attempts: 5,
            startup_backoff_ms: 2000,
            reconnect_attempts: 3,
            reconnect_backoff_ms: 2000,
        }
    }
}

impl RetryConfig {
    pub fn startup(&self) -> RetryPolicy {
        RetryPolicy::new(self.startup_attempts, Duration::from_millis(self.startup_backoff_ms))
    }

    pub fn reconnect(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.reconnect_attempts,
            Duration::from_millis(self.reconnect_backoff_ms),
        )
    }
}

/// Minimum interval between two accepted events of a category, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub temperature_secs: u64,
    pub seismic_secs: u64,
    pub fire_secs: u64,
    pub pedestrian_secs: u64,
    pub train_arrival_secs: u64,
    pub door_secs: u64,
    pub elevator_secs: u64,

    /// Temperature change that is accepted regardless of the interval
    pub temperature_delta: f64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            temperature_secs: 30,
            seismic_secs: 60,
            fire_secs: 60,
            pedestrian_secs: 10,
            train_arrival_secs: 15,
            door_secs: 3,
            elevator_secs: 5,
            temperature_delta: 1.0,
        }
    }
}

impl DebounceConfig {
    pub fn interval(&self, category: Category) -> chrono::Duration {
        let secs = match category {
            Category::System => 0,
            Category::Temperature => self.temperature_secs,
            Category::SeismicAlert => self.seismic_secs,
            Category::FireAlert => self.fire_secs,
            Category::PedestrianTraffic => self.pedestrian_secs,
            Category::DoorOpened | Category::DoorClosed => self.door_secs,
            Category::ElevatorActivity => self.elevator_secs,
            Category::TrainArrival => self.train_arrival_secs,
        };
        window(secs)
    }

    fn windows(&self) -> [(&'static str, u64); 7] {
        [
            ("debounce.temperature_secs", self.temperature_secs),
            ("debounce.seismic_secs", self.seismic_secs),
            ("debounce.fire_secs", self.fire_secs),
            ("debounce.pedestrian_secs", self.pedestrian_secs),
            ("debounce.train_arrival_secs", self.train_arrival_secs),
            ("debounce.door_secs", self.door_secs),
            ("debounce.elevator_secs", self.elevator_secs),
        ]
    }
}

/// Seconds as a chrono duration, capped at [`MAX_WINDOW_SECS`]
fn window(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(secs.min(MAX_WINDOW_SECS) as i64)
}

/// Escalation thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Temperature above which a fire alert is synthesized
    pub temperature_high: f64,

    /// Vibration magnitude above which a seismic alert is synthesized
    pub vibration: i64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            temperature_high: 70.0,
            vibration: 900,
        }
    }
}

/// How long each critical category withholds temperature, in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuppressionConfig {
    pub seismic_secs: u64,
    pub fire_secs: u64,
    pub pedestrian_secs: u64,
}

impl Default for SuppressionConfig {
    fn default() -> Self {
        Self {
            seismic_secs: 30,
            fire_secs: 30,
            pedestrian_secs: 15,
        }
    }
}

impl SuppressionConfig {
    /// `None` for categories that never open a window
    pub fn duration(&self, category: Category) -> Option<chrono::Duration> {
        let secs = match category {
            Category::SeismicAlert => self.seismic_secs,
            Category::FireAlert => self.fire_secs,
            Category::PedestrianTraffic => self.pedestrian_secs,
            _ => return None,
        };
        Some(window(secs))
    }

    fn windows(&self) -> [(&'static str, u64); 3] {
        [
            ("suppression.seismic_secs", self.seismic_secs),
            ("suppression.fire_secs", self.fire_secs),
            ("suppression.pedestrian_secs", self.pedestrian_secs),
        ]
    }
}

/// Station detection switches
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    /// Treat door PIR motion as a train arrival
    pub detect_by_pir: bool,

    /// Record elevator activity events
    pub detect_by_elevators: bool,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            detect_by_pir: true,
            detect_by_elevators: false,
        }
    }
}

/// Where an event happened and which sensor reported it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceLabel {
    pub location: String,
    pub sensor: String,
}

impl SourceLabel {
    pub fn new(location: &str, sensor: &str) -> Self {
        Self {
            location: location.to_string(),
            sensor: sensor.to_string(),
        }
    }
}

/// Labels per category, plus the start and stop descriptions of the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelsConfig {
    pub system_started: String,
    pub system_stopped: String,
    pub system: SourceLabel,
    pub temperature: SourceLabel,
    pub seismic: SourceLabel,
    pub fire: SourceLabel,
    pub pedestrian: SourceLabel,
    pub door: SourceLabel,
    pub elevator: SourceLabel,
    pub train: SourceLabel,
}

impl Default for LabelsConfig {
    fn default() -> Self {
        Self::for_deployment(Deployment::City)
    }
}

impl LabelsConfig {
    pub fn for_deployment(deployment: Deployment) -> Self {
        let city = "Tokio";
        let station = "Estacion Shinkansen";

        let (system, monitor) = match deployment {
            Deployment::City => (SourceLabel::new(city, "Arduino"), "Sistema de monitoreo"),
            Deployment::Station => (
                SourceLabel::new("Estacion Tokyo", "Arduino-Motores"),
                "Sistema de monitoreo Shinkansen",
            ),
        };

        Self {
            system_started: format!("{} iniciado", monitor),
            system_stopped: format!("{} detenido", monitor),
            system,
            temperature: SourceLabel::new(city, "LM35"),
            seismic: SourceLabel::new(city, "SW-18010P"),
            fire: SourceLabel::new(city, "LM35"),
            pedestrian: SourceLabel::new("Cruce de Shibuya", "PIR"),
            door: SourceLabel::new(station, "Motor4"),
            elevator: SourceLabel::new(station, "Motores1-3"),
            train: SourceLabel::new(station, "PIR/Sistema"),
        }
    }

    pub fn for_category(&self, category: Category) -> &SourceLabel {
        match category {
            Category::System => &self.system,
            Category::Temperature => &self.temperature,
            Category::SeismicAlert => &self.seismic,
            Category::FireAlert => &self.fire,
            Category::PedestrianTraffic => &self.pedestrian,
            Category::DoorOpened | Category::DoorClosed => &self.door,
            Category::ElevatorActivity => &self.elevator,
            Category::TrainArrival => &self.train,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        Config::default().validate().unwrap();
        Config::for_deployment(Deployment::Station).validate().unwrap();
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::for_deployment(Deployment::Station);
        config.debounce.door_secs = 7;
        config.station.detect_by_elevators = true;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.deployment, Deployment::Station);
        assert_eq!(loaded.debounce.door_secs, 7);
        assert!(loaded.station.detect_by_elevators);
        assert_eq!(loaded.labels.system.location, "Estacion Tokyo");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            deployment = "station"

            [thresholds]
            temperature_high = 55.5
            "#,
        )
        .unwrap();

        assert_eq!(config.deployment, Deployment::Station);
        assert_eq!(config.thresholds.temperature_high, 55.5);
        assert_eq!(config.thresholds.vibration, 900);
        assert_eq!(config.debounce.pedestrian_secs, 10);
        assert_eq!(config.serial.baud_rate, 9600);
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let created = Config::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(created.deployment, Deployment::City);
    }

    #[test]
    fn test_validate_rejects_empty_labels() {
        let mut config = Config::default();
        config.labels.fire.sensor = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.reconnect_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_intervals_and_windows() {
        let config = Config::default();
        assert_eq!(config.debounce.interval(Category::PedestrianTraffic).num_seconds(), 10);
        assert_eq!(config.debounce.interval(Category::DoorClosed).num_seconds(), 3);
        assert_eq!(config.suppression.duration(Category::SeismicAlert).map(|d| d.num_seconds()), Some(30));
        assert!(config.suppression.duration(Category::Temperature).is_none());
    }

    #[test]
    fn test_validate_rejects_oversized_windows() {
        let mut config = Config::default();
        config.suppression.seismic_secs = 100_000_000_000_000_000;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.debounce.door_secs = u64::MAX;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.debounce.elevator_secs = MAX_WINDOW_SECS;
        config.validate().unwrap();
    }

    #[test]
    fn test_oversized_windows_are_capped() {
        let mut config = Config::default();
        config.suppression.seismic_secs = 100_000_000_000_000_000;
        config.debounce.fire_secs = u64::MAX;

        let cap = MAX_WINDOW_SECS as i64;
        assert_eq!(config.suppression.duration(Category::SeismicAlert).map(|d| d.num_seconds()), Some(cap));
        assert_eq!(config.debounce.interval(Category::FireAlert).num_seconds(), cap);
    }

    #[test]
    fn test_system_messages_per_deployment() {
        let city = LabelsConfig::for_deployment(Deployment::City);
        assert_eq!(city.system_started, "Sistema de monitoreo iniciado");
        assert_eq!(city.system_stopped, "Sistema de monitoreo detenido");

        let station = LabelsConfig::for_deployment(Deployment::Station);
        assert_eq!(station.system_started, "Sistema de monitoreo Shinkansen iniciado");
        assert_eq!(station.system_stopped, "Sistema de monitoreo Shinkansen detenido");

        let mut config = Config::default();
        config.labels.system_stopped.clear();
        assert!(config.validate().is_err());
    }
}
