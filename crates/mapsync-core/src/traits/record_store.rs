// # Record Store Trait
//
// Defines the interface for persistent location storage.
//
// ## Purpose
//
// The record store keeps:
// - The current location set for each source
// - One sync marker per source (latest wins)
// - Status names and their marker colours
// - One cached snapshot of the last aggregate response
//
// ## Implementations
//
// - SQLite: `state::SqliteRecordStore`
// - Memory: `state::MemoryRecordStore`

use crate::config::PaletteExhaustion;
use crate::model::{Location, Snapshot, Status};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Trait for record store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks. Syncs
/// for different sources touch disjoint rows; status creation is the one
/// shared write and must be race-free.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage
/// - ✅ Implement locking for status creation
///
/// ## Forbidden Capabilities
/// - ❌ Decide when to refresh (owned by `SyncEngine`)
/// - ❌ Contact upstream sources (owned by `SourceClient`)
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get the most recently written snapshot
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Snapshot))`: The latest snapshot, fresh or not
    /// - `Ok(None)`: Nothing cached yet
    /// - `Err(Error)`: Storage error
    async fn get_snapshot(&self) -> Result<Option<Snapshot>, crate::Error>;

    /// Store `records` as the current snapshot, stamped `created_at`
    ///
    /// Does nothing when `records` is empty.
    async fn write_snapshot(
        &self,
        records: &[Location],
        created_at: DateTime<Utc>,
    ) -> Result<(), crate::Error>;

    /// Get the time of the last successful refresh for a source
    async fn get_last_sync(&self, source_id: &str) -> Result<Option<DateTime<Utc>>, crate::Error>;

    /// Replace a source's locations and return its visible set
    ///
    /// When `records` is non-empty, all stored locations for `source_id` are
    /// deleted, `records` inserted and the sync marker set to `synced_at`, as
    /// one atomic step. Whether or not anything was written, the source's
    /// stored locations whose status name is in `include` are returned.
    async fn replace_records(
        &self,
        source_id: &str,
        records: Vec<Location>,
        synced_at: DateTime<Utc>,
        include: &[String],
    ) -> Result<Vec<Location>, crate::Error>;

    /// Get the status called `name`, creating it with a palette colour if new
    ///
    /// An existing status keeps its colour regardless of `preferred_color`.
    async fn get_or_create_status(
        &self,
        name: &str,
        preferred_color: Option<&str>,
        policy: PaletteExhaustion,
    ) -> Result<Status, crate::Error>;

    /// List every known status
    async fn list_statuses(&self) -> Result<Vec<Status>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing record stores from configuration
#[async_trait]
pub trait RecordStoreFactory: Send + Sync {
    /// Create a RecordStore instance from configuration
    async fn create(
        &self,
        config: &crate::config::StoreConfig,
    ) -> Result<std::sync::Arc<dyn RecordStore>, crate::Error>;
}

/// Visible ordering used by every store: name, then id
pub(crate) fn sort_for_display(locations: &mut [Location]) {
    locations.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}
