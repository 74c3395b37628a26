//! Stored entities
//!
//! Every per-source entity carries its `source_id`; rows for one source are
//! replaced wholesale on each refresh.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A status label with its assigned marker colour
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Status {
    pub name: String,
    pub color: String,
}

impl Status {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
        }
    }
}

/// A location as stored and served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Upstream record id, unique within `source_id`
    pub id: String,
    pub source_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location_type: Option<String>,
    pub area: Option<f64>,
    pub status: Status,
}

/// A normalized upstream record whose status colour is not resolved yet
#[derive(Debug, Clone, PartialEq)]
pub struct LocationDraft {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub location_type: Option<String>,
    pub area: Option<f64>,
    pub status_name: String,
    /// Colour the upstream declared for the status option
    pub preferred_color: Option<String>,
}

impl LocationDraft {
    /// Attach the resolved status and the owning source
    pub fn into_location(self, source_id: &str, status: Status) -> Location {
        Location {
            id: self.id,
            source_id: source_id.to_string(),
            name: self.name,
            latitude: self.latitude,
            longitude: self.longitude,
            location_type: self.location_type,
            area: self.area,
            status,
        }
    }
}

/// The cached aggregate of the last full sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<Location>,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Whether the snapshot may still be served at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now.signed_duration_since(self.created_at) < ttl
    }
}
