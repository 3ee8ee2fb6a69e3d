//! SQLite-based status log
//!
//! Every event is a row; the latest row per resource decides whether it is
//! completed.

use super::EventStore;
use crate::error::FetchError;
use chrono::{DateTime, Utc};
use paj_types::{ResourceEvent, ResourceStatus};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool},
    Row, SqlitePool as Pool,
};
use std::path::Path;

/// Status log stored in a SQLite database
#[derive(Clone, Debug)]
pub struct SqliteEventStore {
    pool: Pool,
}

impl SqliteEventStore {
    /// Open (or create) the database at `db_path`
    pub async fn open<P: AsRef<Path>>(db_path: P) -> Result<Self, FetchError> {
        let path = db_path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                resource_id TEXT NOT NULL,
                status TEXT NOT NULL,
                message TEXT,
                timestamp TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_events_resource ON events(resource_id, seq);
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Open an existing database without creating or migrating it
    pub async fn open_existing<P: AsRef<Path>>(db_path: P) -> Result<Self, FetchError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path.as_ref())
            .create_if_missing(false);

        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self { pool })
    }
}

impl EventStore for SqliteEventStore {
    async fn is_completed(&self, resource_id: &str) -> Result<bool, FetchError> {
        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM events WHERE resource_id = ? ORDER BY seq DESC LIMIT 1",
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(status.as_deref() == Some(ResourceStatus::Success.as_str()))
    }

    async fn record(&self, event: ResourceEvent) -> Result<(), FetchError> {
        sqlx::query(
            "INSERT INTO events (resource_id, status, message, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(&event.resource_id)
        .bind(event.status.as_str())
        .bind(event.message.as_ref())
        .bind(event.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn latest_events(&self) -> Result<Vec<ResourceEvent>, FetchError> {
        let rows = sqlx::query(
            r#"
            SELECT e.resource_id, e.status, e.message, e.timestamp
            FROM events e
            JOIN (SELECT resource_id, MAX(seq) AS seq FROM events GROUP BY resource_id) latest
                ON e.seq = latest.seq
            ORDER BY e.resource_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_event).collect()
    }
}

/// Convert a database row to a ResourceEvent
fn row_to_event(row: sqlx::sqlite::SqliteRow) -> Result<ResourceEvent, FetchError> {
    let status_str: String = row.get("status");
    let status = ResourceStatus::parse(&status_str)
        .ok_or_else(|| FetchError::Serialization(format!("unknown status {:?}", status_str)))?;

    let timestamp = DateTime::parse_from_rfc3339(row.get::<String, _>("timestamp").as_str())
        .map_err(|e| FetchError::Serialization(e.to_string()))?
        .with_timezone(&Utc);

    Ok(ResourceEvent {
        resource_id: row.get("resource_id"),
        status,
        message: row.get("message"),
        timestamp,
    })
}
