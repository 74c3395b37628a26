// # Notion Database Source
//
// This crate provides a Notion source client for the mapsync system.
//
// Each client is bound to one Notion database and fetches its pages with a
// single query request, newest edit first. Everything after the fetch
// (change detection, normalization, storage) belongs to the SyncEngine.
//
// ## Architectural Constraints
//
// ### Trust Level: Untrusted (Source Client)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTPS calls to the Notion API only
// - ✅ Parse the query response envelope
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Implement retry logic
// - ❌ Access the record store
// - ❌ Cache responses beyond a single request
//
// ## Security Requirements
//
// - API key NEVER appears in logs or Debug output
// - API key MUST be provided via environment variables only
// - Client MUST fail fast if the key is empty
//
// ## API Reference
//
// - Query a database: POST `/v1/databases/:database_id/query`
// - Versioning header: `Notion-Version: 2022-06-28`

use async_trait::async_trait;
use mapsync_core::config::SourceConfig;
use mapsync_core::registry::SourceRegistry;
use mapsync_core::traits::{RawResponse, SourceClient, SourceClientFactory};
use mapsync_core::{Error, Result};
use serde_json::{Value, json};
use std::time::Duration;

/// Notion API base URL
pub const NOTION_API_BASE: &str = "https://api.notion.com";

/// API version sent with every request
pub const NOTION_VERSION: &str = "2022-06-28";

/// HTTP timeout for query requests (40 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(40);

/// Notion database source client
///
/// # Trust Level: Untrusted
///
/// Stateless and single-shot: one query per `fetch_raw` call.
///
/// # Security
///
/// The Debug implementation does NOT expose the API key.
pub struct NotionClient {
    /// Notion integration token
    /// ⚠️ NEVER log this value
    api_key: String,

    /// Database queried, also the source identifier
    database_id: String,

    /// API base URL, without trailing slash
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

impl std::fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionClient")
            .field("api_key", &"<REDACTED>")
            .field("database_id", &self.database_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl NotionClient {
    /// Create a client for one database against the public Notion API
    ///
    /// # Errors
    ///
    /// - `Error::Config`: The key or database id is empty
    /// - `Error::Source`: The HTTP client could not be built
    pub fn new(api_key: impl Into<String>, database_id: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, database_id, NOTION_API_BASE)
    }

    /// Create a client against a different API host
    pub fn with_base_url(
        api_key: impl Into<String>,
        database_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        let database_id = database_id.into();

        if api_key.trim().is_empty() {
            return Err(Error::config("Notion API key cannot be empty"));
        }
        if database_id.trim().is_empty() {
            return Err(Error::config("Notion database id cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::source(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            database_id,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Query endpoint for this client's database
    pub fn query_url(&self) -> String {
        format!("{}/v1/databases/{}/query", self.base_url, self.database_id)
    }

    /// Body sent with every query: newest edit first
    pub fn query_body() -> Value {
        json!({
            "sorts": [
                { "timestamp": "last_edited_time", "direction": "descending" }
            ]
        })
    }

    /// Map a non-success HTTP status to a typed upstream error
    fn status_error(&self, status: reqwest::StatusCode, body: &str) -> Error {
        let message = match status.as_u16() {
            401 | 403 => format!(
                "Authentication failed: invalid API key or database not shared with the integration. Status: {}",
                status
            ),
            404 => format!("Database not found: {}", self.database_id),
            429 => format!("Rate limit exceeded. Status: {}", status),
            500..=599 => format!("Notion server error (transient): {} - {}", status, body),
            _ => format!("Query failed: {} - {}", status, body),
        };
        Error::upstream(self.database_id.clone(), status.as_u16(), message)
    }
}

/// Parse a database query response body
///
/// Unknown envelope fields are ignored; a body without `results` is an
/// empty response.
pub fn parse_query_response(body: &str) -> Result<RawResponse> {
    serde_json::from_str(body)
        .map_err(|e| Error::source(format!("Failed to parse Notion response: {}", e)))
}

#[async_trait]
impl SourceClient for NotionClient {
    /// Query the database once
    ///
    /// ```http
    /// POST /v1/databases/:database_id/query
    /// Authorization: Bearer <key>
    /// Notion-Version: 2022-06-28
    /// ```
    async fn fetch_raw(&self) -> Result<RawResponse> {
        tracing::debug!("Querying Notion database {}", self.database_id);

        let response = self
            .client
            .post(self.query_url())
            .bearer_auth(&self.api_key)
            .header("Notion-Version", NOTION_VERSION)
            .json(&Self::query_body())
            .send()
            .await
            .map_err(|e| Error::source(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::source(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(self.status_error(status, &body));
        }

        let raw = parse_query_response(&body)?;
        tracing::debug!(
            "Notion database {} returned {} records",
            self.database_id,
            raw.records.len()
        );
        Ok(raw)
    }

    fn source_id(&self) -> &str {
        &self.database_id
    }

    fn client_name(&self) -> &'static str {
        "notion"
    }
}

/// Factory for creating Notion clients
pub struct NotionSourceFactory;

impl SourceClientFactory for NotionSourceFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn SourceClient>> {
        match config {
            SourceConfig::Notion {
                api_key,
                database_id,
            } => Ok(Box::new(NotionClient::new(
                api_key.clone(),
                database_id.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for Notion source")),
        }
    }
}

/// Register the Notion source with a registry
///
/// # Example
///
/// ```rust
/// use mapsync_core::SourceRegistry;
///
/// let registry = SourceRegistry::new();
/// mapsync_source_notion::register(&registry);
/// assert!(registry.has_source("notion"));
/// ```
pub fn register(registry: &SourceRegistry) {
    registry.register_source("notion", Box::new(NotionSourceFactory));
}
