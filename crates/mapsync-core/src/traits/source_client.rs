// # Source Client Trait
//
// Defines the interface for fetching raw records from one upstream database.
//
// ## Implementations
//
// - Notion: `mapsync-source-notion` crate
//
// ## Usage
//
// ```rust,ignore
// use mapsync_core::SourceClient;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* SourceClient implementation */;
//
//     let raw = client.fetch_raw().await?;
//     println!("{} records, newest edit {:?}", raw.records.len(), raw.latest_edit_time());
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// One upstream record with its untyped property bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Upstream record id
    #[serde(default)]
    pub id: String,

    /// Last edit timestamp as sent by the upstream
    #[serde(default)]
    pub last_edited_time: String,

    /// Named properties, parsed by [`crate::normalize`]
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// The result of one upstream query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResponse {
    /// Records sorted by edit time, newest first
    #[serde(default, rename = "results")]
    pub records: Vec<RawRecord>,
}

impl RawResponse {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Edit time of the newest record
    ///
    /// The upstream returns records sorted newest first, so this is the first
    /// record's timestamp. `None` when there are no records or the timestamp
    /// does not parse.
    pub fn latest_edit_time(&self) -> Option<DateTime<Utc>> {
        self.records
            .first()
            .and_then(|record| parse_timestamp(&record.last_edited_time))
    }
}

/// Parse an upstream timestamp
///
/// RFC 3339 values keep their offset; naive values are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Trait for source client implementations
///
/// A client is bound to exactly one source identifier and its credential.
///
/// # Thread Safety
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Trust Level: Untrusted
///
/// Source clients only talk to their upstream endpoint:
///
/// ## Allowed Capabilities
/// - ✅ Perform one HTTP/HTTPS request per call to their endpoint
/// - ✅ Parse the upstream's response envelope
/// - ✅ Return success or a typed failure
///
/// ## Forbidden Capabilities
/// - ❌ Access the record store (owned by `SyncEngine`)
/// - ❌ Decide whether a refresh is needed (owned by `SyncEngine`)
/// - ❌ Normalize records (owned by `normalize`)
/// - ❌ Retry or cache responses
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Fetch the current record set
    ///
    /// # Returns
    ///
    /// - `Ok(RawResponse)`: The records, possibly empty
    /// - `Err(Error::Upstream)`: The upstream answered with a non-success status
    /// - `Err(Error::Source)`: The request could not be completed
    async fn fetch_raw(&self) -> Result<RawResponse, crate::Error>;

    /// Identifier of the source this client reads
    fn source_id(&self) -> &str;

    /// Get the client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}

/// Helper trait for constructing source clients from configuration
pub trait SourceClientFactory: Send + Sync {
    /// Create a SourceClient instance from configuration
    fn create(
        &self,
        config: &crate::config::SourceConfig,
    ) -> Result<Box<dyn SourceClient>, crate::Error>;
}
