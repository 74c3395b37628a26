//! Daemon configuration from environment variables
//!
//! All configuration is read once at startup. Variable names:
//!
//! ### Sources
//! - `NOTION_API_KEY`: Notion integration token (required)
//! - `NOTION_DATABASE_ID`: Database ids, comma-separated or a JSON array (required)
//!
//! ### Output
//! - `STATUS_TO_INCLUDE`: Visible status names (default `Signed,Follow up`)
//! - `CACHE_TIME`: Snapshot TTL in minutes (default 10)
//! - `MAP_CENTER`: `lat,lng` or a JSON array (default `24.7136,46.6753`)
//! - `MAP_ZOOM`: Initial zoom (default 11)
//! - `MAP_NAME`: Page title (default `My Map`)
//!
//! ### Daemon
//! - `MAPSYNC_DATABASE_PATH`: SQLite file (default `db.sqlite3`)
//! - `MAPSYNC_STORE_TYPE`: `sqlite` or `memory` (default `sqlite`)
//! - `MAPSYNC_BIND_ADDR`: Listen address (default `0.0.0.0:8000`)
//! - `MAPSYNC_LOG_LEVEL`: Tracing filter (default `info`)
//! - `MAPSYNC_PALETTE_EXHAUSTED`: `cycle` or `fail` (default `cycle`)
//! - `MAPSYNC_STORE_TIMEOUT_SECS`: Per store call (default 5)
//! - `MAPSYNC_REQUEST_TIMEOUT_SECS`: Per location request (default 60)

use anyhow::{Context, Result};
use mapsync_core::config::{
    CacheConfig, EngineConfig, MapConfig, MapSyncConfig, PaletteExhaustion, SourceConfig,
    StatusConfig, StoreConfig,
};
use std::net::SocketAddr;

/// Daemon configuration
pub struct DaemonConfig {
    pub notion_api_key: String,
    pub database_ids: Vec<String>,
    pub statuses: Vec<String>,
    pub cache_minutes: u64,
    pub map_center: [f64; 2],
    pub map_zoom: u8,
    pub map_name: String,
    pub database_path: String,
    pub store_type: String,
    pub bind_addr: String,
    pub log_level: String,
    pub palette_exhausted: PaletteExhaustion,
    pub store_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

// Custom Debug implementation that hides the API key
impl std::fmt::Debug for DaemonConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonConfig")
            .field("notion_api_key", &"<REDACTED>")
            .field("database_ids", &self.database_ids)
            .field("statuses", &self.statuses)
            .field("cache_minutes", &self.cache_minutes)
            .field("map_center", &self.map_center)
            .field("map_zoom", &self.map_zoom)
            .field("map_name", &self.map_name)
            .field("database_path", &self.database_path)
            .field("store_type", &self.store_type)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("palette_exhausted", &self.palette_exhausted)
            .field("store_timeout_secs", &self.store_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl DaemonConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let notion_api_key = get("NOTION_API_KEY").context(
            "NOTION_API_KEY is required. Set it via: export NOTION_API_KEY=secret_...",
        )?;
        let database_ids = parse_list(&get("NOTION_DATABASE_ID").context(
            "NOTION_DATABASE_ID is required. Set it via: export NOTION_DATABASE_ID=id1,id2",
        )?)
        .context("NOTION_DATABASE_ID")?;

        let statuses = match get("STATUS_TO_INCLUDE") {
            Some(value) => parse_list(&value).context("STATUS_TO_INCLUDE")?,
            None => StatusConfig::default().include,
        };

        let map_center = match get("MAP_CENTER") {
            Some(value) => parse_center(&value)?,
            None => MapConfig::default().center,
        };

        let palette_exhausted = match get("MAPSYNC_PALETTE_EXHAUSTED") {
            Some(value) => match value.trim().to_lowercase().as_str() {
                "cycle" => PaletteExhaustion::Cycle,
                "fail" => PaletteExhaustion::Fail,
                other => anyhow::bail!(
                    "MAPSYNC_PALETTE_EXHAUSTED '{}' is not valid. Valid values: cycle, fail",
                    other
                ),
            },
            None => PaletteExhaustion::default(),
        };

        let engine = EngineConfig::default();

        Ok(Self {
            notion_api_key,
            database_ids,
            statuses,
            cache_minutes: parse_number(&get, "CACHE_TIME", CacheConfig::default().ttl_minutes)?,
            map_center,
            map_zoom: parse_number(&get, "MAP_ZOOM", MapConfig::default().zoom)?,
            map_name: get("MAP_NAME").unwrap_or_else(|| MapConfig::default().name),
            database_path: get("MAPSYNC_DATABASE_PATH")
                .unwrap_or_else(|| "db.sqlite3".to_string()),
            store_type: get("MAPSYNC_STORE_TYPE").unwrap_or_else(|| "sqlite".to_string()),
            bind_addr: get("MAPSYNC_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string()),
            log_level: get("MAPSYNC_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            palette_exhausted,
            store_timeout_secs: parse_number(
                &get,
                "MAPSYNC_STORE_TIMEOUT_SECS",
                engine.store_timeout_secs,
            )?,
            request_timeout_secs: parse_number(
                &get,
                "MAPSYNC_REQUEST_TIMEOUT_SECS",
                engine.request_timeout_secs,
            )?,
        })
    }

    /// Validate the configuration
    ///
    /// Checks daemon-level settings, then everything the core checks.
    pub fn validate(&self) -> Result<()> {
        if self.database_ids.is_empty() {
            anyhow::bail!("NOTION_DATABASE_ID must contain at least one database id");
        }

        if self.statuses.is_empty() {
            anyhow::bail!("STATUS_TO_INCLUDE must contain at least one status");
        }

        match self.store_type.as_str() {
            "sqlite" | "memory" => {}
            other => anyhow::bail!(
                "MAPSYNC_STORE_TYPE '{}' is not supported. Supported types: sqlite, memory",
                other
            ),
        }

        if self.store_type == "sqlite" && self.database_path.trim().is_empty() {
            anyhow::bail!("MAPSYNC_DATABASE_PATH cannot be empty when MAPSYNC_STORE_TYPE=sqlite");
        }

        self.bind_addr.parse::<SocketAddr>().with_context(|| {
            format!(
                "MAPSYNC_BIND_ADDR '{}' is not a valid socket address",
                self.bind_addr
            )
        })?;

        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.log_level) {
            anyhow::bail!("MAPSYNC_LOG_LEVEL '{}' is not valid: {}", self.log_level, e);
        }

        self.to_mapsync_config().validate()?;

        Ok(())
    }

    /// Build the core configuration
    pub fn to_mapsync_config(&self) -> MapSyncConfig {
        let store = match self.store_type.as_str() {
            "memory" => StoreConfig::Memory,
            _ => StoreConfig::Sqlite {
                path: self.database_path.clone(),
            },
        };

        let mut config = self
            .database_ids
            .iter()
            .fold(MapSyncConfig::new(), |config, id| {
                config.with_source(SourceConfig::notion(self.notion_api_key.clone(), id.clone()))
            });

        config.store = store;
        config.cache = CacheConfig {
            ttl_minutes: self.cache_minutes,
        };
        config.statuses = StatusConfig {
            include: self.statuses.clone(),
            on_palette_exhausted: self.palette_exhausted,
        };
        config.map = MapConfig {
            center: self.map_center,
            zoom: self.map_zoom,
            name: self.map_name.clone(),
        };
        config.engine.store_timeout_secs = self.store_timeout_secs;
        config.engine.request_timeout_secs = self.request_timeout_secs;

        config
    }
}

/// Parse `a,b,c` or `["a","b","c"]`
fn parse_list(value: &str) -> Result<Vec<String>> {
    let value = value.trim();
    let items: Vec<String> = if value.starts_with('[') {
        serde_json::from_str(value).context("expected a JSON array of strings")?
    } else {
        value.split(',').map(str::to_string).collect()
    };

    Ok(items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

/// Parse `lat,lng` or `[lat, lng]`
fn parse_center(value: &str) -> Result<[f64; 2]> {
    let value = value.trim();
    let numbers: Vec<f64> = if value.starts_with('[') {
        serde_json::from_str(value).context("MAP_CENTER: expected a JSON array of two numbers")?
    } else {
        value
            .split(',')
            .map(|part| part.trim().parse::<f64>())
            .collect::<std::result::Result<_, _>>()
            .context("MAP_CENTER: expected `latitude,longitude`")?
    };

    match numbers.as_slice() {
        [lat, lng] => Ok([*lat, *lng]),
        _ => anyhow::bail!(
            "MAP_CENTER must have exactly two numbers. Got: {}",
            numbers.len()
        ),
    }
}

fn parse_number<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} '{}' is not valid: {}", key, value, e)),
        None => Ok(default),
    }
}
