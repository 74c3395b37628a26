//! Configuration types for the mapsync system
//!
//! This module defines all configuration structures used throughout the crate.
//! A [`MapSyncConfig`] is built once at startup and handed to each component.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// Main mapsync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapSyncConfig {
    /// Upstream databases to sync, in display order
    pub sources: Vec<SourceConfig>,

    /// Record store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Snapshot cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Status allow-list and colour policy
    #[serde(default)]
    pub statuses: StatusConfig,

    /// Map page defaults
    #[serde(default)]
    pub map: MapConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl MapSyncConfig {
    /// Create a new configuration with defaults and no sources
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            store: StoreConfig::default(),
            cache: CacheConfig::default(),
            statuses: StatusConfig::default(),
            map: MapConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Add a source
    pub fn with_source(mut self, source: SourceConfig) -> Self {
        self.sources.push(source);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.sources.is_empty() {
            return Err(crate::Error::config("No sources configured"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            if !seen.insert(source.source_id()) {
                return Err(crate::Error::config(format!(
                    "Source '{}' is configured more than once",
                    source.source_id()
                )));
            }
        }

        self.store.validate()?;
        self.cache.validate()?;
        self.map.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

impl Default for MapSyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Upstream source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// A Notion database queried with an integration token
    Notion {
        /// Notion integration token
        api_key: String,
        /// Database identifier, also used as the source identifier
        database_id: String,
    },

    /// Custom source
    Custom {
        /// Factory name to use
        factory: String,
        /// Stable source identifier
        id: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SourceConfig {
    /// Create a Notion source configuration
    pub fn notion(api_key: impl Into<String>, database_id: impl Into<String>) -> Self {
        SourceConfig::Notion {
            api_key: api_key.into(),
            database_id: database_id.into(),
        }
    }

    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SourceConfig::Notion {
                api_key,
                database_id,
            } => {
                if api_key.trim().is_empty() {
                    return Err(crate::Error::config("Notion API key cannot be empty"));
                }
                if database_id.trim().is_empty() {
                    return Err(crate::Error::config("Notion database id cannot be empty"));
                }
                Ok(())
            }
            SourceConfig::Custom { factory, id, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom source factory cannot be empty"));
                }
                if id.is_empty() {
                    return Err(crate::Error::config("Custom source id cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Stable identifier that partitions stored rows
    pub fn source_id(&self) -> &str {
        match self {
            SourceConfig::Notion { database_id, .. } => database_id,
            SourceConfig::Custom { id, .. } => id,
        }
    }

    /// Get the source type name
    pub fn type_name(&self) -> &str {
        match self {
            SourceConfig::Notion { .. } => "notion",
            SourceConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// SQLite file store
    Sqlite {
        /// Path to the database file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Sqlite { path } if path.trim().is_empty() => {
                Err(crate::Error::config("SQLite store path cannot be empty"))
            }
            StoreConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom store factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::Sqlite { .. } => "sqlite",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Snapshot cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a snapshot is served before a resync (in minutes)
    ///
    /// Zero disables the cache: every request resyncs.
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
}

/// Longest accepted snapshot TTL (one year)
pub const MAX_TTL_MINUTES: u64 = 525_600;

impl CacheConfig {
    /// TTL as a chrono duration, for comparison against stored timestamps
    ///
    /// Values above [`MAX_TTL_MINUTES`] are clamped; `validate()` rejects them.
    pub fn ttl(&self) -> chrono::Duration {
        i64::try_from(self.ttl_minutes.min(MAX_TTL_MINUTES))
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .unwrap_or_else(|| chrono::Duration::days(365))
    }

    /// Validate the cache configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.ttl_minutes > MAX_TTL_MINUTES {
            return Err(crate::Error::config(format!(
                "Cache TTL of {} minutes exceeds the maximum of {}",
                self.ttl_minutes, MAX_TTL_MINUTES
            )));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
        }
    }
}

/// What to do when every palette colour is already in use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaletteExhaustion {
    /// Reuse palette colours in order
    #[default]
    Cycle,
    /// Refuse to create the status
    Fail,
}

/// Status filtering and colouring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusConfig {
    /// Status names visible in API output
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Policy once the palette runs out
    #[serde(default)]
    pub on_palette_exhausted: PaletteExhaustion,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            include: default_include(),
            on_palette_exhausted: PaletteExhaustion::default(),
        }
    }
}

/// Map page defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Initial map centre as [latitude, longitude]
    #[serde(default = "default_center")]
    pub center: [f64; 2],

    /// Initial zoom level
    #[serde(default = "default_zoom")]
    pub zoom: u8,

    /// Title shown on the page
    #[serde(default = "default_map_name")]
    pub name: String,
}

impl MapConfig {
    /// Validate the map defaults
    pub fn validate(&self) -> Result<(), crate::Error> {
        let [lat, lng] = self.center;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(crate::Error::config(format!(
                "Map centre out of range: [{}, {}]",
                lat, lng
            )));
        }
        if self.zoom > 22 {
            return Err(crate::Error::config(format!(
                "Map zoom must be between 0 and 22. Got: {}",
                self.zoom
            )));
        }
        Ok(())
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: default_center(),
            zoom: default_zoom(),
            name: default_map_name(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Deadline for each record store call (in seconds)
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,

    /// Deadline for a whole read request, including a resync (in seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.store_timeout_secs == 0 {
            return Err(crate::Error::config("Store timeout must be > 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(crate::Error::config("Request timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout_secs: default_store_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_ttl_minutes() -> u64 {
    10
}

fn default_include() -> Vec<String> {
    vec!["Signed".to_string(), "Follow up".to_string()]
}

fn default_center() -> [f64; 2] {
    [24.7136, 46.6753]
}

fn default_zoom() -> u8 {
    11
}

fn default_map_name() -> String {
    "My Map".to_string()
}

fn default_store_timeout_secs() -> u64 {
    5
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_event_channel_capacity() -> usize {
    1000
}
