// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Connection manager - owns the sensor link and the event store
//!
//! Both resources are acquired by [`ConnectionManager::ensure`] and given back
//! by [`ConnectionManager::release`], which also runs on drop so every exit
//! path closes the link. The "system stopped" event is written only after a
//! start event was recorded.

use chrono::Utc;
use tracing::{error, info, warn};

use super::{Category, EventRecord};
use crate::config::{Config, DatabaseConfig, RetryConfig, SerialConfig, SourceLabel};
use crate::db::{Database, EventSink};
use crate::error::{ConnectionError, StoreError, TransportError};
use crate::sensors::{self, LineReader};

/// Ready handles returned by [`ConnectionManager::ensure`]
pub struct Handles<'a> {
    pub reader: &'a mut LineReader,
    pub store: &'a Database,
}

pub struct ConnectionManager {
    serial: SerialConfig,
    database: DatabaseConfig,
    retry: RetryConfig,
    system_label: SourceLabel,
    stopped_message: String,
    started: bool,
    reader: Option<LineReader>,
    store: Option<Database>,
}

impl ConnectionManager {
    pub fn new(config: &Config) -> Self {
        Self {
            serial: config.serial.clone(),
            database: config.database.clone(),
            retry: config.retry.clone(),
            system_label: config.labels.system.clone(),
            stopped_message: config.labels.system_stopped.clone(),
            started: false,
            reader: None,
            store: None,
        }
    }

    /// Manager with resources already open; `ensure` keeps them as they are
    pub fn from_parts(config: &Config, reader: LineReader, store: Database) -> Self {
        let mut manager = Self::new(config);
        manager.reader = Some(reader);
        manager.store = Some(store);
        manager
    }

    /// Acquire whatever is not held yet. The store gets the startup retry
    /// budget; the link gets a single attempt.
    pub async fn ensure(&mut self) -> Result<Handles<'_>, ConnectionError> {
        if self.store.is_none() {
            let database = &self.database;
            let store = self
                .retry
                .startup()
                .run("Event store connection", || Database::open(database))
                .await
                .map_err(|e| {
                    error!("Could not connect to the event store at {:?}: {}", database.path, e);
                    e
                })?;
            self.store = Some(store);
        }

        if self.reader.is_none() {
            let reader = sensors::open_reader(&self.serial).map_err(|e| {
                error!("Could not open sensor link {}: {}", self.serial.port, e);
                e
            })?;
            info!("Sensor link {} open", reader.transport_name());
            self.reader = Some(reader);
        }

        match (self.reader.as_mut(), self.store.as_ref()) {
            (Some(reader), Some(store)) => Ok(Handles { reader, store }),
            (None, _) => Err(TransportError::Unsupported(self.serial.port.clone()).into()),
            (_, None) => Err(StoreError::Disconnected.into()),
        }
    }

    /// The start event is in the store; release must pair it with a stop event
    pub fn mark_started(&mut self) {
        self.started = true;
    }

    pub fn store(&self) -> Option<&Database> {
        self.store.as_ref()
    }

    pub fn reader_mut(&mut self) -> Option<&mut LineReader> {
        self.reader.as_mut()
    }

    pub fn has_transport(&self) -> bool {
        self.reader.is_some()
    }

    /// The link is a finished replay; nothing more will arrive
    pub fn transport_exhausted(&self) -> bool {
        self.reader.as_ref().map_or(false, |r| r.is_exhausted())
    }

    /// Give up the current link after a read failure
    pub fn drop_transport(&mut self) {
        if let Some(reader) = self.reader.take() {
            warn!("Closing sensor link {}", reader.transport_name());
        }
    }

    /// Reopen the event store with the reconnect budget
    pub async fn reconnect_store(&mut self) -> Result<(), StoreError> {
        let database = &self.database;
        let store = self
            .retry
            .reconnect()
            .run("Event store reconnect", || Database::open(database))
            .await?;
        info!("Event store reconnected");
        self.store = Some(store);
        Ok(())
    }

    /// Reopen the sensor link with the reconnect budget
    pub async fn reconnect_transport(&mut self) -> Result<(), TransportError> {
        let serial = &self.serial;
        let reader = self
            .retry
            .reconnect()
            .run("Sensor link reconnect", || sensors::open_reader(serial))
            .await?;
        info!("Sensor link {} reopened", reader.transport_name());
        self.reader = Some(reader);
        Ok(())
    }

    /// Close the link, write the stop event if a start event was recorded,
    /// then close the store. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(reader) = self.reader.take() {
            info!("Sensor link {} closed", reader.transport_name());
        }

        if let Some(store) = self.store.take() {
            if std::mem::take(&mut self.started) {
                let stopped =
                    EventRecord::new(Category::System, &self.system_label, self.stopped_message.as_str()).at(Utc::now());
                match store.persist(&stopped) {
                    Ok(id) => info!(id, "Stop event recorded"),
                    Err(e) => warn!("Could not record stop event: {}", e),
                }
            }
            info!("Event store closed");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Deployment;
    use crate::sensors::{Encoding, ReplayTransport};

    fn test_config(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.database.path = dir.join("events.db");
        config.retry.startup_attempts = 2;
        config.retry.startup_backoff_ms = 1;
        config.retry.reconnect_attempts = 2;
        config.retry.reconnect_backoff_ms = 1;
        config
    }

    #[tokio::test]
    async fn test_ensure_opens_store_and_replay() {
        let dir = tempfile::tempdir().unwrap();
        let replay = dir.path().join("board.log");
        std::fs::write(&replay, "Temperatura actual: 25.5 C\n").unwrap();

        let mut config = test_config(dir.path());
        config.serial.replay_file = Some(replay);

        let mut manager = ConnectionManager::new(&config);
        let handles = manager.ensure().await.unwrap();
        assert!(handles.store.ping());
        assert!(handles.reader.transport_name().contains("board.log"));
    }

    #[tokio::test]
    async fn test_missing_transport_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.serial.replay_file = Some(dir.path().join("missing.log"));

        let mut manager = ConnectionManager::new(&config);
        let result = manager.ensure().await;
        assert!(matches!(result, Err(ConnectionError::Transport(_))));
    }

    #[tokio::test]
    async fn test_unreachable_store_is_fatal_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let mut config = test_config(dir.path());
        config.database.path = blocker.join("events.db");

        let mut manager = ConnectionManager::new(&config);
        let result = manager.ensure().await;
        assert!(matches!(result, Err(ConnectionError::Store(_))));
    }

    fn empty_reader() -> LineReader {
        LineReader::new(Box::new(ReplayTransport::from_bytes("test", "")), Encoding::Latin1)
    }

    #[test]
    fn test_release_records_stop_event_once() {
        let config = Config::default();
        let store = Database::open_in_memory().unwrap();

        let mut manager = ConnectionManager::from_parts(&config, empty_reader(), store.clone());
        manager.mark_started();
        manager.release();
        manager.release();
        drop(manager);

        let events = store.recent_events(10).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category(), Some(Category::System));
        assert_eq!(events[0].description, "Sistema de monitoreo detenido");
        assert_eq!(events[0].location, "Tokio");
    }

    #[test]
    fn test_drop_releases() {
        let config = Config::default();
        let store = Database::open_in_memory().unwrap();

        {
            let mut manager = ConnectionManager::from_parts(&config, empty_reader(), store.clone());
            manager.mark_started();
        }

        assert_eq!(store.stats().unwrap().event_count, 1);
    }

    #[test]
    fn test_station_stop_message() {
        let config = Config::for_deployment(Deployment::Station);
        let store = Database::open_in_memory().unwrap();

        let mut manager = ConnectionManager::from_parts(&config, empty_reader(), store.clone());
        manager.mark_started();
        drop(manager);

        let events = store.recent_events(10).unwrap();
        assert_eq!(events[0].description, "Sistema de monitoreo Shinkansen detenido");
        assert_eq!(events[0].location, "Estacion Tokyo");
        assert_eq!(events[0].sensor, "Arduino-Motores");
    }

    #[test]
    fn test_no_stop_event_without_start() {
        let config = Config::default();
        let store = Database::open_in_memory().unwrap();
        drop(ConnectionManager::from_parts(&config, empty_reader(), store.clone()));
        assert_eq!(store.stats().unwrap().event_count, 0);
    }

    #[tokio::test]
    async fn test_failed_startup_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.serial.replay_file = Some(dir.path().join("missing.log"));

        let mut manager = ConnectionManager::new(&config);
        assert!(manager.ensure().await.is_err());
        assert!(manager.store().is_some());
        drop(manager);

        let store = Database::open(&config.database).unwrap();
        assert_eq!(store.stats().unwrap().event_count, 0);
    }
}
