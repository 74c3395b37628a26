//! TTL snapshot cache in front of the sync engine
//!
//! Every read of the location list goes through [`CacheGate`]. A snapshot
//! younger than the TTL is served as-is; anything else triggers a full sync
//! and, when every source completed cleanly, a new snapshot.

use crate::engine::{SyncEngine, SyncEvent, SyncReport};
use crate::model::Location;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a location request could not be answered
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    /// No locations and every upstream was unreachable
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The record store could not be used for any source
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Every source failed for some other reason
    #[error("Sync failed: {0}")]
    SyncFailed(String),

    /// The request did not finish in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// Serves the aggregated location list, syncing when the snapshot is stale
pub struct CacheGate {
    engine: SyncEngine,
    ttl: chrono::Duration,
    request_timeout: Duration,
}

impl CacheGate {
    /// Create a gate in front of `engine`
    ///
    /// # Parameters
    ///
    /// - `engine`: Sync engine whose store also holds the snapshot
    /// - `ttl`: How long a snapshot stays fresh
    /// - `request_timeout`: Deadline for a whole [`CacheGate::locations`] call
    pub fn new(engine: SyncEngine, ttl: chrono::Duration, request_timeout: Duration) -> Self {
        Self {
            engine,
            ttl,
            request_timeout,
        }
    }

    /// The engine behind this gate
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Snapshot freshness window
    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    /// Current location list, bounded by the request deadline
    pub async fn locations(&self) -> Result<Vec<Location>, GateError> {
        tokio::time::timeout(self.request_timeout, self.locations_at(Utc::now()))
            .await
            .map_err(|_| {
                warn!("Location request exceeded {:?}", self.request_timeout);
                GateError::Timeout(self.request_timeout)
            })?
    }

    /// Location list as seen at `now`
    ///
    /// A snapshot is fresh when `now - created_at < ttl`. On a miss the
    /// snapshot written carries `now` as its creation time.
    pub async fn locations_at(&self, now: DateTime<Utc>) -> Result<Vec<Location>, GateError> {
        let store = self.engine.store();

        match self
            .engine
            .guarded("get_snapshot", store.get_snapshot())
            .await
        {
            Ok(Some(snapshot)) if snapshot.is_fresh(now, self.ttl) => {
                let age = now - snapshot.created_at;
                debug!(
                    "Serving cached snapshot ({} locations, {}s old)",
                    snapshot.records.len(),
                    age.num_seconds()
                );
                self.engine.emit_event(SyncEvent::CacheHit {
                    age_secs: age.num_seconds(),
                });
                return Ok(snapshot.records);
            }
            Ok(_) => {}
            Err(e) => warn!("Snapshot unreadable, resyncing: {}", e),
        }

        self.engine.emit_event(SyncEvent::CacheMiss);
        let report = self.engine.sync_all().await;
        classify(&report)?;

        if report.is_clean() {
            match self
                .engine
                .guarded("write_snapshot", store.write_snapshot(&report.locations, now))
                .await
            {
                Ok(()) if !report.locations.is_empty() => {
                    info!("Cached {} locations", report.locations.len());
                    self.engine.emit_event(SyncEvent::SnapshotWritten {
                        locations: report.locations.len(),
                    });
                }
                Ok(()) => debug!("Nothing to cache"),
                Err(e) => warn!("Failed to cache locations: {}", e),
            }
        } else {
            warn!(
                "Sync degraded ({} failed, {} unavailable), not caching",
                report.failures.len(),
                report.unavailable_count()
            );
        }

        Ok(report.locations)
    }
}

/// Turn a sync report into a request error when nothing usable came back
fn classify(report: &SyncReport) -> Result<(), GateError> {
    let total = report.source_count();

    if total > 0 && report.failures.len() == total {
        let first = &report.failures[0];
        let message = format!("{}: {}", first.source_id, first.error);
        if report.failures.iter().any(|f| f.error.is_store_failure()) {
            return Err(GateError::StoreUnavailable(message));
        }
        return Err(GateError::SyncFailed(message));
    }

    let unavailable = report.unavailable_count();
    if report.locations.is_empty() && unavailable > 0 && unavailable + report.failures.len() == total
    {
        let reason = report
            .outcomes
            .iter()
            .find_map(|(source_id, outcome)| match outcome {
                crate::engine::SyncOutcome::Unavailable { reason } => {
                    Some(format!("{}: {}", source_id, reason))
                }
                _ => None,
            })
            .unwrap_or_default();
        return Err(GateError::UpstreamUnavailable(reason));
    }

    Ok(())
}
