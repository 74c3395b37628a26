//! Test doubles and common utilities for sync contract tests
//!
//! This module provides minimal test doubles that let tests script upstream
//! responses and count store writes without real network or disk access.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mapsync_core::config::{MapSyncConfig, PaletteExhaustion, SourceConfig};
use mapsync_core::error::{Error, Result};
use mapsync_core::model::{Location, Snapshot, Status};
use mapsync_core::state::MemoryRecordStore;
use mapsync_core::traits::{RawRecord, RawResponse, RecordStore, SourceClient};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What a scripted source answers with
#[derive(Debug, Clone)]
pub enum Reply {
    Records(RawResponse),
    Upstream(u16),
    Unreachable,
}

/// A SourceClient whose answer can be changed between calls
pub struct ScriptedSource {
    source_id: String,
    reply: Arc<Mutex<Reply>>,
    fetch_count: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(source_id: &str, reply: Reply) -> Self {
        Self {
            source_id: source_id.to_string(),
            reply: Arc::new(Mutex::new(reply)),
            fetch_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A source answering with `records`
    pub fn with_records(source_id: &str, records: Vec<RawRecord>) -> Self {
        Self::new(source_id, Reply::Records(RawResponse::new(records)))
    }

    /// Change the next answers
    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    /// Get the number of times fetch_raw() was called
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    /// Create a new ScriptedSource that shares its script and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            source_id: other.source_id.clone(),
            reply: Arc::clone(&other.reply),
            fetch_count: Arc::clone(&other.fetch_count),
        }
    }
}

#[async_trait]
impl SourceClient for ScriptedSource {
    async fn fetch_raw(&self) -> Result<RawResponse> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        match self.reply.lock().unwrap().clone() {
            Reply::Records(response) => Ok(response),
            Reply::Upstream(status) => {
                Err(Error::upstream(&self.source_id, status, "scripted refusal"))
            }
            Reply::Unreachable => Err(Error::source("connection refused")),
        }
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn client_name(&self) -> &'static str {
        "scripted"
    }
}

/// A RecordStore wrapper that counts writes and can be made to fail
#[derive(Clone)]
pub struct CountingStore {
    inner: MemoryRecordStore,
    /// replace_records calls that carried records
    writes: Arc<AtomicUsize>,
    snapshot_writes: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl CountingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            writes: Arc::new(AtomicUsize::new(0)),
            snapshot_writes: Arc::new(AtomicUsize::new(0)),
            failing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn inner(&self) -> &MemoryRecordStore {
        &self.inner
    }

    /// Get the number of record replacements that wrote rows
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Get the number of snapshot writes
    pub fn snapshot_write_count(&self) -> usize {
        self.snapshot_writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent call fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::store("store offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn get_snapshot(&self) -> Result<Option<Snapshot>> {
        self.check()?;
        self.inner.get_snapshot().await
    }

    async fn write_snapshot(&self, records: &[Location], created_at: DateTime<Utc>) -> Result<()> {
        self.check()?;
        if !records.is_empty() {
            self.snapshot_writes.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.write_snapshot(records, created_at).await
    }

    async fn get_last_sync(&self, source_id: &str) -> Result<Option<DateTime<Utc>>> {
        self.check()?;
        self.inner.get_last_sync(source_id).await
    }

    async fn replace_records(
        &self,
        source_id: &str,
        records: Vec<Location>,
        synced_at: DateTime<Utc>,
        include: &[String],
    ) -> Result<Vec<Location>> {
        self.check()?;
        if !records.is_empty() {
            self.writes.fetch_add(1, Ordering::SeqCst);
        }
        self.inner
            .replace_records(source_id, records, synced_at, include)
            .await
    }

    async fn get_or_create_status(
        &self,
        name: &str,
        preferred_color: Option<&str>,
        policy: PaletteExhaustion,
    ) -> Result<Status> {
        self.check()?;
        self.inner
            .get_or_create_status(name, preferred_color, policy)
            .await
    }

    async fn list_statuses(&self) -> Result<Vec<Status>> {
        self.inner.list_statuses().await
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// A Notion-shaped record
pub fn raw_record(
    id: &str,
    name: &str,
    coordinates: (f64, f64),
    status: Option<(&str, &str)>,
    edited: &str,
) -> RawRecord {
    let mut properties = json!({
        "Name": { "type": "title", "title": [{ "plain_text": name }] },
        "Latitude": { "type": "number", "number": coordinates.0 },
        "Longitude": { "type": "number", "number": coordinates.1 },
    });
    if let Some((status, color)) = status {
        properties["Status"] = json!({
            "type": "select",
            "select": { "name": status, "color": color }
        });
    }
    RawRecord {
        id: id.to_string(),
        last_edited_time: edited.to_string(),
        properties: properties.as_object().cloned().unwrap_or_default(),
    }
}

/// Configuration for the given sources with the default allow-list
pub fn config_for(source_ids: &[&str]) -> MapSyncConfig {
    source_ids.iter().fold(MapSyncConfig::new(), |config, id| {
        config.with_source(SourceConfig::Custom {
            factory: "scripted".to_string(),
            id: id.to_string(),
            config: serde_json::Value::Null,
        })
    })
}

/// Location ids in output order
pub fn ids(locations: &[Location]) -> Vec<&str> {
    locations.iter().map(|l| l.id.as_str()).collect()
}
