// # SQLite Record Store
//
// SQLite-backed implementation of RecordStore.
//
// ## Purpose
//
// Persists locations, statuses, sync markers and the snapshot across
// restarts, so a restarted daemon neither refetches unchanged sources nor
// recolours known statuses.
//
// ## Schema
//
// Created idempotently on open (`CREATE TABLE IF NOT EXISTS`, never dropped):
//
// - `locations`    keyed by (source_id, id), status embedded as name + colour
// - `statuses`     keyed by name; colours never change once written
// - `sync_markers` one row per source, upserted
// - `snapshots`    a single row (id = 1), upserted
//
// ## Concurrency
//
// WAL mode lets readers proceed during a refresh. Status creation holds an
// async mutex and inserts with `ON CONFLICT(name) DO NOTHING` followed by a
// re-read, so a second process racing on the same name still converges on
// one colour.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::Error;
use crate::config::{PaletteExhaustion, StoreConfig};
use crate::model::{Location, Snapshot, Status};
use crate::palette;
use crate::traits::record_store::{RecordStore, RecordStoreFactory};

/// How long SQLite waits on a locked database before failing a statement
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_CONNECTIONS: u32 = 5;

/// SQLite record store
///
/// # Example
///
/// ```rust,no_run
/// use mapsync_core::state::SqliteRecordStore;
/// use mapsync_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = SqliteRecordStore::open("db.sqlite3").await?;
///     let marker = store.get_last_sync("my-database-id").await?;
///     println!("last synced: {:?}", marker);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    status_lock: Arc<Mutex<()>>,
}

#[derive(Debug, FromRow)]
struct LocationRow {
    id: String,
    source_id: String,
    name: String,
    latitude: f64,
    longitude: f64,
    location_type: Option<String>,
    area: Option<f64>,
    status_name: String,
    status_color: String,
}

impl From<LocationRow> for Location {
    fn from(row: LocationRow) -> Self {
        Location {
            id: row.id,
            source_id: row.source_id,
            name: row.name,
            latitude: row.latitude,
            longitude: row.longitude,
            location_type: row.location_type,
            area: row.area,
            status: Status::new(row.status_name, row.status_color),
        }
    }
}

#[derive(Debug, FromRow)]
struct SnapshotRow {
    data: String,
    created_at: DateTime<Utc>,
}

impl SqliteRecordStore {
    /// Open (creating if needed) the database at `path` and ensure the schema
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let newly_created = !path.exists();

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        if newly_created {
            tracing::info!("Initialized new database: {}", path.display());
        } else {
            tracing::info!("Opened existing database: {}", path.display());
        }

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating any missing tables
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, Error> {
        create_schema(&pool).await?;
        Ok(Self {
            pool,
            status_lock: Arc::new(Mutex::new(())),
        })
    }

    /// The underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn find_status(&self, name: &str) -> Result<Option<Status>, Error> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT name, color FROM statuses WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(name, color)| Status::new(name, color)))
    }

    async fn visible_locations(
        &self,
        source_id: &str,
        include: &[String],
    ) -> Result<Vec<Location>, Error> {
        if include.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; include.len()].join(", ");
        let sql = format!(
            "SELECT id, source_id, name, latitude, longitude, location_type, area, \
                    status_name, status_color \
             FROM locations \
             WHERE source_id = ? AND status_name IN ({}) \
             ORDER BY name, id",
            placeholders
        );

        let mut query = sqlx::query_as::<_, LocationRow>(&sql).bind(source_id);
        for name in include {
            query = query.bind(name);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Location::from).collect())
    }
}

async fn create_schema(pool: &SqlitePool) -> Result<(), Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS statuses (
            name TEXT PRIMARY KEY,
            color TEXT NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS locations (
            source_id TEXT NOT NULL,
            id TEXT NOT NULL,
            name TEXT NOT NULL,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            location_type TEXT,
            area REAL,
            status_name TEXT NOT NULL,
            status_color TEXT NOT NULL,
            PRIMARY KEY (source_id, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_locations_status ON locations (source_id, status_name)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_markers (
            source_id TEXT PRIMARY KEY,
            synced_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS snapshots (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            data TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get_snapshot(&self) -> Result<Option<Snapshot>, Error> {
        let row: Option<SnapshotRow> =
            sqlx::query_as("SELECT data, created_at FROM snapshots WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(row) => Ok(Some(Snapshot {
                records: serde_json::from_str(&row.data)?,
                created_at: row.created_at,
            })),
            None => Ok(None),
        }
    }

    async fn write_snapshot(
        &self,
        records: &[Location],
        created_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        if records.is_empty() {
            return Ok(());
        }

        let data = serde_json::to_string(records)?;
        sqlx::query(
            "INSERT INTO snapshots (id, data, created_at) VALUES (1, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET data = excluded.data, created_at = excluded.created_at",
        )
        .bind(data)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Snapshot written: {} locations", records.len());
        Ok(())
    }

    async fn get_last_sync(&self, source_id: &str) -> Result<Option<DateTime<Utc>>, Error> {
        let marker: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT synced_at FROM sync_markers WHERE source_id = ?")
                .bind(source_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(marker)
    }

    async fn replace_records(
        &self,
        source_id: &str,
        records: Vec<Location>,
        synced_at: DateTime<Utc>,
        include: &[String],
    ) -> Result<Vec<Location>, Error> {
        if !records.is_empty() {
            let mut tx = self.pool.begin().await?;

            sqlx::query("DELETE FROM locations WHERE source_id = ?")
                .bind(source_id)
                .execute(&mut *tx)
                .await?;

            for location in &records {
                sqlx::query(
                    "INSERT OR REPLACE INTO locations \
                     (source_id, id, name, latitude, longitude, location_type, area, status_name, status_color) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(source_id)
                .bind(&location.id)
                .bind(&location.name)
                .bind(location.latitude)
                .bind(location.longitude)
                .bind(&location.location_type)
                .bind(location.area)
                .bind(&location.status.name)
                .bind(&location.status.color)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query(
                "INSERT INTO sync_markers (source_id, synced_at) VALUES (?, ?) \
                 ON CONFLICT(source_id) DO UPDATE SET synced_at = excluded.synced_at",
            )
            .bind(source_id)
            .bind(synced_at)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
            tracing::debug!("Replaced {} locations for source {}", records.len(), source_id);
        }

        self.visible_locations(source_id, include).await
    }

    async fn get_or_create_status(
        &self,
        name: &str,
        preferred_color: Option<&str>,
        policy: PaletteExhaustion,
    ) -> Result<Status, Error> {
        if let Some(existing) = self.find_status(name).await? {
            return Ok(existing);
        }

        let _guard = self.status_lock.lock().await;

        // Another task may have created it while we waited for the lock
        if let Some(existing) = self.find_status(name).await? {
            return Ok(existing);
        }

        let used: Vec<String> = sqlx::query_scalar::<_, String>("SELECT color FROM statuses")
            .fetch_all(&self.pool)
            .await?;
        let color = palette::assign_color(name, preferred_color, &used, policy)?;

        let inserted = sqlx::query(
            "INSERT INTO statuses (name, color) VALUES (?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(&color)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            tracing::debug!("Status {} created concurrently, re-reading", name);
        } else {
            tracing::info!("New status {} assigned colour {}", name, color);
        }

        self.find_status(name)
            .await?
            .ok_or_else(|| Error::store(format!("Status {} vanished after insert", name)))
    }

    async fn list_statuses(&self) -> Result<Vec<Status>, Error> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT name, color FROM statuses ORDER BY created_at, name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(name, color)| Status::new(name, color))
            .collect())
    }

    async fn flush(&self) -> Result<(), Error> {
        // Every write is committed before returning
        Ok(())
    }
}

/// Factory for the `sqlite` store type
pub struct SqliteRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for SqliteRecordStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn RecordStore>, Error> {
        match config {
            StoreConfig::Sqlite { path } => Ok(Arc::new(SqliteRecordStore::open(path).await?)),
            _ => Err(Error::config("Invalid config for sqlite store")),
        }
    }
}
