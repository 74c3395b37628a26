// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing and for deployments where a cold start resync is fine.
//
// ## Crash Behavior
//
// - All state is lost on restart/crash
// - First request after a restart treats every source as never synced
// - Status colours may be assigned differently after a restart

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::{PaletteExhaustion, StoreConfig};
use crate::model::{Location, Snapshot, Status};
use crate::palette;
use crate::traits::record_store::{RecordStore, RecordStoreFactory, sort_for_display};

#[derive(Debug, Default)]
struct MemoryState {
    locations: HashMap<String, Vec<Location>>,
    markers: HashMap<String, DateTime<Utc>>,
    /// Insertion order is kept so listings are stable
    statuses: Vec<Status>,
    snapshot: Option<Snapshot>,
}

/// In-memory record store implementation
///
/// All state sits behind one RwLock; status creation takes the write lock,
/// which serializes it.
///
/// # Example
///
/// ```rust,no_run
/// use mapsync_core::state::MemoryRecordStore;
/// use mapsync_core::traits::RecordStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///     assert!(store.get_last_sync("db-1").await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<MemoryState>>,
}

impl MemoryRecordStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored locations for a source, visible or not
    pub async fn stored_count(&self, source_id: &str) -> usize {
        self.inner
            .read()
            .await
            .locations
            .get(source_id)
            .map_or(0, Vec::len)
    }

    /// Clear everything
    pub async fn clear(&self) {
        *self.inner.write().await = MemoryState::default();
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_snapshot(&self) -> Result<Option<Snapshot>, Error> {
        Ok(self.inner.read().await.snapshot.clone())
    }

    async fn write_snapshot(
        &self,
        records: &[Location],
        created_at: DateTime<Utc>,
    ) -> Result<(), Error> {
        if records.is_empty() {
            return Ok(());
        }
        self.inner.write().await.snapshot = Some(Snapshot {
            records: records.to_vec(),
            created_at,
        });
        Ok(())
    }

    async fn get_last_sync(&self, source_id: &str) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(self.inner.read().await.markers.get(source_id).copied())
    }

    async fn replace_records(
        &self,
        source_id: &str,
        records: Vec<Location>,
        synced_at: DateTime<Utc>,
        include: &[String],
    ) -> Result<Vec<Location>, Error> {
        let mut guard = self.inner.write().await;

        if !records.is_empty() {
            guard.locations.insert(source_id.to_string(), records);
            guard.markers.insert(source_id.to_string(), synced_at);
        }

        let mut visible: Vec<Location> = guard
            .locations
            .get(source_id)
            .into_iter()
            .flatten()
            .filter(|location| include.contains(&location.status.name))
            .cloned()
            .collect();
        sort_for_display(&mut visible);
        Ok(visible)
    }

    async fn get_or_create_status(
        &self,
        name: &str,
        preferred_color: Option<&str>,
        policy: PaletteExhaustion,
    ) -> Result<Status, Error> {
        let mut guard = self.inner.write().await;

        if let Some(existing) = guard.statuses.iter().find(|status| status.name == name) {
            return Ok(existing.clone());
        }

        let used: Vec<String> = guard.statuses.iter().map(|s| s.color.clone()).collect();
        let color = palette::assign_color(name, preferred_color, &used, policy)?;
        let status = Status::new(name, color);
        guard.statuses.push(status.clone());
        Ok(status)
    }

    async fn list_statuses(&self) -> Result<Vec<Status>, Error> {
        Ok(self.inner.read().await.statuses.clone())
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store (everything is already "persisted")
        Ok(())
    }
}

/// Factory for the `memory` store type
pub struct MemoryRecordStoreFactory;

#[async_trait]
impl RecordStoreFactory for MemoryRecordStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn RecordStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Arc::new(MemoryRecordStore::new())),
            _ => Err(Error::config("Invalid config for memory store")),
        }
    }
}
