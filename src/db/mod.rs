// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/glowbarn-rs

//! Database module - the event store and its read-only query surface

mod sanitize;

pub use sanitize::sanitize;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::core::{Category, EventRecord};
use crate::error::StoreError;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
const SELECT_EVENTS: &str = "SELECT id, timestamp, location, category, description, sensor FROM events";

/// Where accepted events go
pub trait EventSink {
    /// Persist one record and return its store-assigned id. A failed write
    /// leaves nothing behind.
    fn persist(&self, record: &EventRecord) -> Result<i64, StoreError>;
}

/// SQLite event store
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database
    pub fn open(config: &DatabaseConfig) -> Result<Self, StoreError> {
        // Create parent directories
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;

        // Several agents write to the same file
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        "#,
        )?;

        let db = Self::from_connection(conn)?;
        info!("Database opened at {:?}", config.path);
        Ok(db)
    }

    /// Private in-memory store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.create_tables()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Create database tables
    fn create_tables(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                location TEXT NOT NULL,
                category TEXT NOT NULL,
                description TEXT NOT NULL,
                sensor TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_category ON events(category, id);
        "#,
        )?;

        Ok(())
    }

    /// Cheap liveness check used before reconnecting
    pub fn ping(&self) -> bool {
        match self.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)).is_ok(),
            Err(_) => false,
        }
    }

    /// Most recent events first
    pub fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("{} ORDER BY timestamp DESC, id DESC LIMIT ?1", SELECT_EVENTS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit as i64], StoredEvent::from_row)?;
        collect(rows)
    }

    /// Most recent events of one category
    pub fn events_by_category(&self, category: &str, limit: usize) -> Result<Vec<StoredEvent>, StoreError> {
        let conn = self.lock()?;
        let sql = format!(
            "{} WHERE category = ?1 ORDER BY timestamp DESC, id DESC LIMIT ?2",
            SELECT_EVENTS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![category, limit as i64], StoredEvent::from_row)?;
        collect(rows)
    }

    /// Events on a calendar date; unset parts of the filter match anything
    pub fn events_on(&self, filter: DateFilter, limit: usize) -> Result<Vec<StoredEvent>, StoreError> {
        filter.validate()?;

        let conn = self.lock()?;
        let sql = format!(
            "{} WHERE (?1 IS NULL OR CAST(strftime('%Y', timestamp) AS INTEGER) = ?1)
                 AND (?2 IS NULL OR CAST(strftime('%m', timestamp) AS INTEGER) = ?2)
                 AND (?3 IS NULL OR CAST(strftime('%d', timestamp) AS INTEGER) = ?3)
             ORDER BY timestamp DESC, id DESC LIMIT ?4",
            SELECT_EVENTS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![filter.year, filter.month, filter.day, limit as i64],
            StoredEvent::from_row,
        )?;
        collect(rows)
    }

    /// Events newer than a consumer's high-water mark, oldest first
    pub fn events_after(&self, high_water: i64, limit: usize) -> Result<Vec<StoredEvent>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE id > ?1 ORDER BY id ASC LIMIT ?2", SELECT_EVENTS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![high_water, limit as i64], StoredEvent::from_row)?;
        collect(rows)
    }

    pub fn event_by_id(&self, id: i64) -> Result<Option<StoredEvent>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE id = ?1", SELECT_EVENTS);
        Ok(conn
            .query_row(&sql, params![id], StoredEvent::from_row)
            .optional()?)
    }

    pub fn latest_id(&self) -> Result<Option<i64>, StoreError> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT MAX(id) FROM events", [], |row| row.get(0))?)
    }

    pub fn latest_of_category(&self, category: &str) -> Result<Option<StoredEvent>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE category = ?1 ORDER BY id DESC LIMIT 1", SELECT_EVENTS);
        Ok(conn
            .query_row(&sql, params![category], StoredEvent::from_row)
            .optional()?)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.lock()?;
        let (event_count, latest_id): (i64, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), MAX(id) FROM events",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StoreStats {
            event_count: event_count as usize,
            latest_id,
        })
    }
}

impl EventSink for Database {
    fn persist(&self, record: &EventRecord) -> Result<i64, StoreError> {
        let location = sanitize(&record.location);
        let description = sanitize(&record.description);
        let sensor = sanitize(&record.sensor);
        if description.trim().is_empty() {
            return Err(StoreError::InvalidRecord("description is empty".to_string()));
        }
        let timestamp = record.timestamp.map(|t| t.format(TIMESTAMP_FORMAT).to_string());

        let conn = self.lock()?;
        // Dropping the transaction without commit rolls it back
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO events (timestamp, location, category, description, sensor)
             VALUES (COALESCE(?1, strftime('%Y-%m-%d %H:%M:%f', 'now')), ?2, ?3, ?4, ?5)",
            params![timestamp, location, record.category.label(), description, sensor],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(id, category = %record.category, "Event persisted");
        Ok(id)
    }
}

fn collect<I>(rows: I) -> Result<Vec<StoredEvent>, StoreError>
where
    I: Iterator<Item = rusqlite::Result<StoredEvent>>,
{
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

/// Year / month / day filter; `None` parts are wildcards
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl DateFilter {
    fn validate(&self) -> Result<(), StoreError> {
        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                return Err(StoreError::InvalidFilter("month must be between 1 and 12".to_string()));
            }
        }
        if let Some(day) = self.day {
            if !(1..=31).contains(&day) {
                return Err(StoreError::InvalidFilter("day must be between 1 and 31".to_string()));
            }
        }
        Ok(())
    }
}

/// A persisted event as read back from the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub location: String,
    /// Raw label; other agents may write categories this build does not know
    pub category: String,
    pub description: String,
    pub sensor: String,
}

impl StoredEvent {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let raw: String = row.get(1)?;
        let timestamp = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?
            .and_utc();

        Ok(Self {
            id: row.get(0)?,
            timestamp,
            location: row.get(2)?,
            category: row.get(3)?,
            description: row.get(4)?,
            sensor: row.get(5)?,
        })
    }

    pub fn category(&self) -> Option<Category> {
        Category::from_label(&self.category)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub event_count: usize,
    pub latest_id: Option<i64>,
}
