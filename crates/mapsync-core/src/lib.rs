// # mapsync-core
//
// Core library for syncing map locations from upstream databases into a
// local store, served through a TTL snapshot cache.
//
// ## Architecture Overview
//
// - **SourceClient**: Trait for fetching raw records from an upstream database
// - **RecordStore**: Trait for locations, statuses, sync markers and the snapshot
// - **normalize**: Raw upstream records → location drafts
// - **palette**: Stable, distinct colours per status
// - **SyncEngine**: Per-source change detection and replacement
// - **CacheGate**: Serves the snapshot while fresh, syncs when stale
// - **SourceRegistry**: Plugin-based registry for sources and stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Plugin-Based**: Sources are registered dynamically, no hard-coded if-else
// 3. **Library-First**: All core functionality can be used as a library
// 4. **Skip-if-unchanged**: Sync markers make repeated requests write nothing

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod palette;
pub mod registry;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use cache::{CacheGate, GateError};
pub use config::{MapSyncConfig, PaletteExhaustion, SourceConfig, StoreConfig};
pub use engine::{SyncEngine, SyncEvent, SyncOutcome, SyncReport};
pub use error::{Error, Result};
pub use model::{Location, LocationDraft, Snapshot, Status};
pub use registry::SourceRegistry;
pub use state::{MemoryRecordStore, SqliteRecordStore};
pub use traits::{RecordStore, SourceClient};
