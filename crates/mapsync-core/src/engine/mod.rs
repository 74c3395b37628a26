//! Core sync engine
//!
//! The SyncEngine is responsible for:
//! - Deciding per source whether the upstream changed since the last sync
//! - Fetching and normalizing upstream records via SourceClient
//! - Resolving status colours
//! - Replacing the stored record set via RecordStore
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ SourceClient │─── RawResponse ───┐
//! └──────────────┘                   │
//!                                    ▼
//!                           ┌──────────────┐
//!                           │  SyncEngine  │
//!                           └──────────────┘
//!                                    │
//!         ┌──────────────────────────┼──────────────────────────┐
//!         │                          │                          │
//!         ▼                          ▼                          ▼
//! ┌─────────────┐           ┌───────────────┐           ┌─────────────┐
//! │ RecordStore │           │   normalize   │           │   Events    │
//! │ (marker,    │           │ (raw → draft) │           │  (notify)   │
//! │  replace)   │           └───────────────┘           └─────────────┘
//! └─────────────┘
//! ```
//!
//! ## Flow per source
//!
//! 1. Read the source's sync marker (never synced → far past)
//! 2. Fetch raw records; an unreachable upstream counts as no records
//! 3. No records → serve the stored set unchanged
//! 4. Newest edit later than the marker → normalize and replace
//! 5. Otherwise → serve the stored set unchanged

mod report;

pub use report::{SourceFailure, SourceSync, SyncOutcome, SyncReport};

use crate::config::{MapSyncConfig, PaletteExhaustion};
use crate::error::{Error, Result};
use crate::model::{Location, Status};
use crate::normalize;
use crate::traits::{RecordStore, SourceClient};
use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

/// 2000-01-01T00:00:00Z, the marker assumed for a never-synced source
const NEVER_SYNCED_SECS: i64 = 946_684_800;

/// Marker used when a source has never been synced
pub fn never_synced() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(NEVER_SYNCED_SECS, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Sync marker recorded for a write made at `now`
///
/// Upstream edit times are truncated to the minute, so the marker sits just
/// before the start of the current minute. An edit made later in the same
/// minute still compares as newer; the cost is at most one repeated refresh
/// within that minute.
pub fn sync_marker(now: DateTime<Utc>) -> DateTime<Utc> {
    let minute_start = now.duration_trunc(TimeDelta::minutes(1)).unwrap_or(now);
    minute_start
        .checked_sub_signed(TimeDelta::seconds(1))
        .unwrap_or(minute_start)
}

/// Events emitted by the SyncEngine and CacheGate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A full sync across all sources began
    SyncStarted { sources: usize },

    /// A source's stored set was replaced
    SourceRefreshed {
        source_id: String,
        stored: usize,
        visible: usize,
    },

    /// Upstream unchanged since the last sync
    SourceUnchanged {
        source_id: String,
        last_sync: DateTime<Utc>,
    },

    /// Upstream returned no records
    SourceEmpty { source_id: String },

    /// Upstream unreachable or refused; treated as no records
    SourceUnavailable { source_id: String, reason: String },

    /// The source could not be synced at all
    SourceFailed { source_id: String, error: String },

    /// A full sync finished
    SyncFinished { locations: usize, failures: usize },

    /// A fresh snapshot was served
    CacheHit { age_secs: i64 },

    /// No fresh snapshot; a sync was triggered
    CacheMiss,

    /// The aggregate was cached
    SnapshotWritten { locations: usize },
}

/// Core sync engine
///
/// Holds one client per configured source, in configured order, and a
/// shared record store.
///
/// ## Threading
///
/// Sources are synced concurrently within one `sync_all` call. They share
/// no state other than the store, and each touches only its own rows.
pub struct SyncEngine {
    /// Source clients in configured order
    sources: Vec<Box<dyn SourceClient>>,

    /// Shared record store
    store: Arc<dyn RecordStore>,

    /// Status names visible in output
    include: Vec<String>,

    /// What to do once the palette runs out
    palette_policy: PaletteExhaustion,

    /// Deadline for each store call
    store_timeout: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a new sync engine
    ///
    /// # Parameters
    ///
    /// - `sources`: One client per source, in output order
    /// - `store`: Record store implementation
    /// - `config`: mapsync configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        sources: Vec<Box<dyn SourceClient>>,
        store: Arc<dyn RecordStore>,
        config: &MapSyncConfig,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        config.engine.validate()?;

        if sources.is_empty() {
            return Err(Error::config("No sources configured"));
        }

        let mut seen = HashSet::new();
        for source in &sources {
            if !seen.insert(source.source_id()) {
                return Err(Error::config(format!(
                    "Source '{}' is configured more than once",
                    source.source_id()
                )));
            }
        }

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            sources,
            store,
            include: config.statuses.include.clone(),
            palette_policy: config.statuses.on_palette_exhausted,
            store_timeout: config.engine.store_timeout(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// The record store this engine writes to
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Deadline applied to each store call
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }

    /// Configured source identifiers, in order
    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.source_id()).collect()
    }

    /// Sync a single configured source
    ///
    /// # Returns
    ///
    /// - `Ok(SourceSync)`: The source's visible locations and what happened
    /// - `Err(Error::NotFound)`: `source_id` is not configured
    /// - `Err(Error)`: A store call failed or timed out
    pub async fn sync_one(&self, source_id: &str) -> Result<SourceSync> {
        let client = self
            .sources
            .iter()
            .find(|s| s.source_id() == source_id)
            .ok_or_else(|| Error::not_found(format!("Unknown source: {}", source_id)))?;

        self.sync_client(client.as_ref()).await
    }

    /// Sync every source concurrently
    ///
    /// A failing source is reported in [`SyncReport::failures`] and never
    /// prevents the others from contributing their locations.
    pub async fn sync_all(&self) -> SyncReport {
        self.emit_event(SyncEvent::SyncStarted {
            sources: self.sources.len(),
        });

        let results = join_all(self.sources.iter().map(|s| self.sync_client(s.as_ref()))).await;

        let mut report = SyncReport::default();
        for (client, result) in self.sources.iter().zip(results) {
            match result {
                Ok(sync) => {
                    report.locations.extend(sync.locations);
                    report.outcomes.push((sync.source_id, sync.outcome));
                }
                Err(e) => {
                    error!("Failed to sync source {}: {}", client.source_id(), e);
                    self.emit_event(SyncEvent::SourceFailed {
                        source_id: client.source_id().to_string(),
                        error: e.to_string(),
                    });
                    report.failures.push(SourceFailure {
                        source_id: client.source_id().to_string(),
                        error: e,
                    });
                }
            }
        }

        info!(
            "Sync finished: {} locations from {} sources ({} failed)",
            report.locations.len(),
            report.source_count(),
            report.failures.len()
        );
        self.emit_event(SyncEvent::SyncFinished {
            locations: report.locations.len(),
            failures: report.failures.len(),
        });

        report
    }

    /// Run the per-source decision pipeline
    async fn sync_client(&self, client: &dyn SourceClient) -> Result<SourceSync> {
        let source_id = client.source_id();

        let last_sync = self
            .guarded("get_last_sync", self.store.get_last_sync(source_id))
            .await?
            .unwrap_or_else(never_synced);

        let (raw, unavailable) = match client.fetch_raw().await {
            Ok(raw) => (raw, None),
            Err(e) => {
                warn!(
                    "Source {} ({}) unavailable, serving stored data: {}",
                    source_id,
                    client.client_name(),
                    e
                );
                self.emit_event(SyncEvent::SourceUnavailable {
                    source_id: source_id.to_string(),
                    reason: e.to_string(),
                });
                (Default::default(), Some(e.to_string()))
            }
        };

        if raw.is_empty() {
            if unavailable.is_none() {
                debug!("Source {} returned no records", source_id);
                self.emit_event(SyncEvent::SourceEmpty {
                    source_id: source_id.to_string(),
                });
            }
            let locations = self.stored_view(source_id).await?;
            let outcome = match unavailable {
                Some(reason) => SyncOutcome::Unavailable { reason },
                None => SyncOutcome::Empty,
            };
            return Ok(SourceSync {
                source_id: source_id.to_string(),
                locations,
                outcome,
            });
        }

        let changed = match raw.latest_edit_time() {
            Some(latest) => {
                debug!(
                    "Source {}: newest edit {}, last sync {}",
                    source_id, latest, last_sync
                );
                latest > last_sync
            }
            None => {
                warn!(
                    "Source {}: unreadable edit time {:?}, treating as changed",
                    source_id,
                    raw.records.first().map(|r| r.last_edited_time.as_str())
                );
                true
            }
        };

        if !changed {
            debug!("Source {} unchanged since {}, skipping write", source_id, last_sync);
            self.emit_event(SyncEvent::SourceUnchanged {
                source_id: source_id.to_string(),
                last_sync,
            });
            let locations = self.stored_view(source_id).await?;
            return Ok(SourceSync {
                source_id: source_id.to_string(),
                locations,
                outcome: SyncOutcome::Unchanged,
            });
        }

        let report = normalize::normalize_all(&raw.records);
        for field_error in &report.field_errors {
            debug!("Source {}: {}", source_id, field_error);
        }
        if report.malformed > 0 || report.missing_status > 0 {
            warn!(
                "Source {}: skipped {} malformed and {} status-less records of {}",
                source_id,
                report.malformed,
                report.missing_status,
                raw.records.len()
            );
        }

        let locations = self.resolve_statuses(source_id, report.drafts).await?;
        let stored = locations.len();

        let visible = self
            .guarded(
                "replace_records",
                self.store.replace_records(
                    source_id,
                    locations,
                    sync_marker(Utc::now()),
                    &self.include,
                ),
            )
            .await?;

        info!(
            "Source {} refreshed: {} stored, {} visible",
            source_id,
            stored,
            visible.len()
        );
        self.emit_event(SyncEvent::SourceRefreshed {
            source_id: source_id.to_string(),
            stored,
            visible: visible.len(),
        });

        Ok(SourceSync {
            source_id: source_id.to_string(),
            locations: visible,
            outcome: SyncOutcome::Refreshed {
                stored,
                missing_status: report.missing_status,
                malformed: report.malformed,
            },
        })
    }

    /// Attach a stored status to every draft
    async fn resolve_statuses(
        &self,
        source_id: &str,
        drafts: Vec<crate::model::LocationDraft>,
    ) -> Result<Vec<Location>> {
        let mut resolved: HashMap<String, Status> = HashMap::new();
        let mut locations = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let status = match resolved.get(&draft.status_name) {
                Some(status) => status.clone(),
                None => {
                    let status = self
                        .guarded(
                            "get_or_create_status",
                            self.store.get_or_create_status(
                                &draft.status_name,
                                draft.preferred_color.as_deref(),
                                self.palette_policy,
                            ),
                        )
                        .await?;
                    resolved.insert(draft.status_name.clone(), status.clone());
                    status
                }
            };
            locations.push(draft.into_location(source_id, status));
        }

        Ok(locations)
    }

    /// The source's currently visible locations, without writing anything
    async fn stored_view(&self, source_id: &str) -> Result<Vec<Location>> {
        self.guarded(
            "replace_records",
            self.store
                .replace_records(source_id, Vec::new(), Utc::now(), &self.include),
        )
        .await
    }

    /// Bound a store call by the configured deadline
    pub(crate) async fn guarded<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| Error::timeout(operation, self.store_timeout))?
    }

    /// Emit an engine event
    ///
    /// Dropped with a warning when the channel is full.
    pub(crate) fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
