// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Monitor - the single-threaded ingestion loop
//!
//! One line at a time: reader -> classifier -> debounce engine -> store.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{ConnectionManager, DebounceEngine, EngineSnapshot, EventRecord, MonitorStats};
use crate::config::Config;
use crate::db::EventSink;
use crate::detection::Classifier;
use crate::error::{ConnectionError, StoreError};

/// What became of one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// No rule matched, or the line belonged to a sentinel block
    Ignored,
    /// A rule matched but its payload could not be decoded
    Dropped,
    /// Classified, but debouncing or suppression accepted nothing
    Suppressed,
    /// Accepted events; `ids` holds the ones the store confirmed
    Accepted { ids: Vec<i64>, failures: usize },
}

pub struct Monitor {
    connections: ConnectionManager,
    classifier: Classifier,
    engine: DebounceEngine,
    poll_interval: Duration,
    started_message: String,
    stats: MonitorStats,
}

impl Monitor {
    pub fn new(config: &Config) -> Self {
        Self::with_connections(config, ConnectionManager::new(config))
    }

    pub fn with_connections(config: &Config, connections: ConnectionManager) -> Self {
        Self {
            connections,
            classifier: Classifier::for_config(config),
            engine: DebounceEngine::new(config),
            poll_interval: config.serial.poll_interval(),
            started_message: config.labels.system_started.clone(),
            stats: MonitorStats::default(),
        }
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> EngineSnapshot {
        self.engine.snapshot(now)
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Run until shutdown is signalled or a replay runs dry. Lines are only
    /// processed between shutdown checks, never interrupted halfway.
    pub async fn run(&mut self, mut shutdown: broadcast::Receiver<()>) -> Result<MonitorStats, ConnectionError> {
        let handles = self.connections.ensure().await?;
        info!("Monitoring {}", handles.reader.transport_name());

        let started = self.engine.system_event(&self.started_message, Utc::now());
        if self.persist(&started).await.is_some() {
            self.connections.mark_started();
        }

        let mut poll = interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    self.poll_once().await;
                    if self.connections.transport_exhausted() {
                        info!("Sensor link reached end of input");
                        break;
                    }
                }
                _ = shutdown.recv() => {
                    info!("Monitor shutting down...");
                    break;
                }
            }
        }

        let snapshot = self.engine.snapshot(Utc::now());
        info!(
            critical_active = snapshot.critical_active,
            last_temperature = ?snapshot.last_temperature,
            door_open = snapshot.door_open,
            train_at_platform = snapshot.train_at_platform,
            active_elevators = snapshot.active_elevators,
            "Engine state at shutdown"
        );
        info!(
            lines = self.stats.lines_read,
            signals = self.stats.signals,
            dropped = self.stats.dropped_lines,
            accepted = self.stats.accepted,
            persisted = self.stats.persisted,
            persist_failures = self.stats.persist_failures,
            transport_errors = self.stats.transport_errors,
            "Monitor stats"
        );

        self.connections.release();
        Ok(self.stats)
    }

    /// Process every line currently buffered on the link. Returns the number
    /// of lines handled.
    pub async fn poll_once(&mut self) -> usize {
        let drained = match self.connections.reader_mut() {
            Some(reader) => reader.drain_ready(),
            None => {
                if let Err(e) = self.connections.reconnect_transport().await {
                    warn!("Sensor link still unavailable: {}", e);
                }
                return 0;
            }
        };

        let lines = match drained {
            Ok(lines) => lines,
            Err(e) => {
                self.stats.transport_errors += 1;
                warn!("Read from sensor link failed: {}", e);
                self.connections.drop_transport();
                return 0;
            }
        };

        let count = lines.len();
        for line in lines {
            self.stats.lines_read += 1;
            self.process_line(&line, Utc::now()).await;
        }
        count
    }

    /// Classify one line, run it through the engine and persist what it accepts
    pub async fn process_line(&mut self, line: &str, now: DateTime<Utc>) -> LineOutcome {
        let signal = match self.classifier.classify(line) {
            Ok(Some(signal)) => signal,
            Ok(None) => return LineOutcome::Ignored,
            Err(e) => {
                self.stats.dropped_lines += 1;
                warn!(line, "Dropping line: {}", e);
                return LineOutcome::Dropped;
            }
        };
        self.stats.signals += 1;

        let kind = signal.kind();
        let records = self.engine.evaluate(signal, now);
        if records.is_empty() {
            debug!(signal = kind, "No event accepted");
            return LineOutcome::Suppressed;
        }
        self.stats.accepted += records.len() as u64;

        let mut ids = Vec::with_capacity(records.len());
        let mut failures = 0;
        for record in &records {
            match self.persist(record).await {
                Some(id) => ids.push(id),
                None => failures += 1,
            }
        }
        LineOutcome::Accepted { ids, failures }
    }

    /// A failed write is logged and counted, never fatal. A dead store is
    /// reopened with the reconnect budget before the next record.
    async fn persist(&mut self, record: &EventRecord) -> Option<i64> {
        let result = match self.connections.store() {
            Some(store) => store.persist(record),
            None => Err(StoreError::Disconnected),
        };

        match result {
            Ok(id) => {
                self.stats.persisted += 1;
                info!(id, category = %record.category, "{}", record.description);
                Some(id)
            }
            Err(e) => {
                self.stats.persist_failures += 1;
                warn!(category = %record.category, "Failed to persist event: {}", e);

                let alive = self.connections.store().map_or(false, |store| store.ping());
                if !alive {
                    if let Err(e) = self.connections.reconnect_store().await {
                        error!("Event store reconnect failed: {}", e);
                    }
                }
                None
            }
        }
    }
}
