//! Results of sync runs

use crate::error::Error;
use crate::model::Location;

/// What happened to one source during a sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Upstream changed; the stored set was replaced
    Refreshed {
        /// Locations written (visible or not)
        stored: usize,
        /// Upstream records skipped for having no status
        missing_status: usize,
        /// Upstream records skipped for unusable coordinates
        malformed: usize,
    },
    /// Nothing edited upstream since the last sync
    Unchanged,
    /// Upstream returned no records
    Empty,
    /// Upstream could not be reached or refused the request; stored data served
    Unavailable { reason: String },
}

/// Result of syncing a single source
#[derive(Debug, Clone)]
pub struct SourceSync {
    pub source_id: String,
    /// The source's visible locations after the sync
    pub locations: Vec<Location>,
    pub outcome: SyncOutcome,
}

/// A source whose sync could not complete
#[derive(Debug)]
pub struct SourceFailure {
    pub source_id: String,
    pub error: Error,
}

/// Aggregate result of syncing every configured source
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Visible locations, concatenated in configured source order
    pub locations: Vec<Location>,
    /// Per-source outcomes for the sources that completed, in order
    pub outcomes: Vec<(String, SyncOutcome)>,
    /// Sources that failed
    pub failures: Vec<SourceFailure>,
}

impl SyncReport {
    /// Number of sources attempted
    pub fn source_count(&self) -> usize {
        self.outcomes.len() + self.failures.len()
    }

    /// Number of completed sources whose upstream was unavailable
    pub fn unavailable_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, SyncOutcome::Unavailable { .. }))
            .count()
    }

    /// True when every source completed against a reachable upstream
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.unavailable_count() == 0
    }
}
