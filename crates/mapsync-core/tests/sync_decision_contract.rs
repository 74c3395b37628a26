//! Contract Test: Per-Source Sync Decision
//!
//! This test verifies when the engine replaces a source's stored records
//! and when it serves them untouched.
//!
//! Constraints verified:
//! - A never-synced source is fetched and stored
//! - An unchanged upstream never triggers a replacement
//! - An empty or unreachable upstream leaves stored rows and markers alone
//! - A newer upstream edit replaces the whole set, removing deleted records
//! - An edit in the same minute as the last sync is not missed
//!
//! If this test fails, the skip-if-unchanged behaviour is broken.

mod common;

use common::*;
use mapsync_core::engine::{SyncEngine, SyncEvent, SyncOutcome};
use mapsync_core::traits::{RawResponse, RecordStore};
use std::sync::Arc;

const OLD_EDIT: &str = "2024-01-01T09:30:00.000Z";
const FUTURE_EDIT: &str = "2099-01-01T00:00:00.000Z";

fn three_sites(edited: &str) -> Vec<mapsync_core::traits::RawRecord> {
    vec![
        raw_record("p1", "Charlie", (24.7, 46.6), Some(("Signed", "green")), edited),
        raw_record("p2", "Alpha", (24.8, 46.7), Some(("Follow up", "yellow")), edited),
        raw_record("p3", "Bravo", (24.9, 46.8), Some(("Rejected", "red")), edited),
    ]
}

fn engine_with(
    source: &ScriptedSource,
    store: &CountingStore,
) -> (SyncEngine, tokio::sync::mpsc::Receiver<SyncEvent>) {
    SyncEngine::new(
        vec![Box::new(ScriptedSource::sharing_counters_with(source))],
        Arc::new(store.clone()),
        &config_for(&["db-1"]),
    )
    .expect("engine construction succeeds")
}

#[tokio::test]
async fn first_sync_stores_everything_and_returns_visible() {
    let source = ScriptedSource::with_records("db-1", three_sites(OLD_EDIT));
    let store = CountingStore::new();
    let (engine, _events) = engine_with(&source, &store);

    let sync = engine.sync_one("db-1").await.unwrap();

    // Rejected is stored but hidden; output is sorted by name
    assert_eq!(ids(&sync.locations), vec!["p2", "p1"]);
    assert_eq!(store.inner().stored_count("db-1").await, 3);
    assert_eq!(
        sync.outcome,
        SyncOutcome::Refreshed {
            stored: 3,
            missing_status: 0,
            malformed: 0
        }
    );
    assert!(store.get_last_sync("db-1").await.unwrap().is_some());
}

#[tokio::test]
async fn unchanged_upstream_does_not_replace() {
    let source = ScriptedSource::with_records("db-1", three_sites(OLD_EDIT));
    let store = CountingStore::new();
    let (engine, _events) = engine_with(&source, &store);

    let first = engine.sync_one("db-1").await.unwrap();
    let marker = store.get_last_sync("db-1").await.unwrap();

    let second = engine.sync_one("db-1").await.unwrap();
    let third = engine.sync_one("db-1").await.unwrap();

    assert_eq!(store.write_count(), 1, "only the first sync should write");
    assert_eq!(source.fetch_count(), 3);
    assert_eq!(second.outcome, SyncOutcome::Unchanged);
    assert_eq!(second.locations, first.locations);
    assert_eq!(third.locations, first.locations);
    assert_eq!(store.get_last_sync("db-1").await.unwrap(), marker);
}

#[tokio::test]
async fn empty_upstream_keeps_stored_rows() {
    let source = ScriptedSource::with_records("db-1", three_sites(OLD_EDIT));
    let store = CountingStore::new();
    let (engine, _events) = engine_with(&source, &store);

    let first = engine.sync_one("db-1").await.unwrap();
    let marker = store.get_last_sync("db-1").await.unwrap();

    source.set_reply(Reply::Records(RawResponse::default()));
    let second = engine.sync_one("db-1").await.unwrap();

    assert_eq!(second.outcome, SyncOutcome::Empty);
    assert_eq!(second.locations, first.locations);
    assert_eq!(store.write_count(), 1);
    assert_eq!(store.get_last_sync("db-1").await.unwrap(), marker);
}

#[tokio::test]
async fn unreachable_upstream_serves_stored_rows() {
    let source = ScriptedSource::with_records("db-1", three_sites(OLD_EDIT));
    let store = CountingStore::new();
    let (engine, mut events) = engine_with(&source, &store);

    let first = engine.sync_one("db-1").await.unwrap();

    source.set_reply(Reply::Upstream(401));
    let second = engine.sync_one("db-1").await.unwrap();

    assert!(matches!(second.outcome, SyncOutcome::Unavailable { .. }));
    assert_eq!(second.locations, first.locations);
    assert_eq!(store.write_count(), 1);

    let mut saw_unavailable = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SyncEvent::SourceUnavailable { ref source_id, .. } if source_id == "db-1")
        {
            saw_unavailable = true;
        }
    }
    assert!(saw_unavailable, "an unavailable upstream must be reported");
}

#[tokio::test]
async fn newer_edit_replaces_whole_set() {
    let source = ScriptedSource::with_records("db-1", three_sites(OLD_EDIT));
    let store = CountingStore::new();
    let (engine, _events) = engine_with(&source, &store);

    engine.sync_one("db-1").await.unwrap();

    // p1 and p3 were deleted upstream, p2 edited
    source.set_reply(Reply::Records(RawResponse::new(vec![raw_record(
        "p2",
        "Alpha Renamed",
        (24.8, 46.7),
        Some(("Signed", "green")),
        FUTURE_EDIT,
    )])));
    let sync = engine.sync_one("db-1").await.unwrap();

    assert_eq!(store.write_count(), 2);
    assert_eq!(store.inner().stored_count("db-1").await, 1);
    assert_eq!(sync.locations.len(), 1);
    assert_eq!(sync.locations[0].name, "Alpha Renamed");
    assert_eq!(sync.locations[0].status.name, "Signed");
}

#[tokio::test]
async fn edit_in_same_minute_as_sync_is_picked_up() {
    let source = ScriptedSource::with_records("db-1", three_sites(OLD_EDIT));
    let store = CountingStore::new();
    let (engine, _events) = engine_with(&source, &store);

    engine.sync_one("db-1").await.unwrap();

    // Upstream reports edit times truncated to the minute
    let this_minute = chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:00.000Z")
        .to_string();
    source.set_reply(Reply::Records(RawResponse::new(vec![raw_record(
        "p1",
        "Charlie Moved",
        (25.0, 47.0),
        Some(("Signed", "green")),
        &this_minute,
    )])));
    let sync = engine.sync_one("db-1").await.unwrap();

    assert!(matches!(sync.outcome, SyncOutcome::Refreshed { .. }));
    assert_eq!(store.write_count(), 2);
    assert_eq!(sync.locations[0].name, "Charlie Moved");
}

#[tokio::test]
async fn unparseable_edit_time_counts_as_changed() {
    let source = ScriptedSource::with_records("db-1", three_sites(OLD_EDIT));
    let store = CountingStore::new();
    let (engine, _events) = engine_with(&source, &store);

    engine.sync_one("db-1").await.unwrap();
    source.set_reply(Reply::Records(RawResponse::new(three_sites("yesterday"))));
    let sync = engine.sync_one("db-1").await.unwrap();

    assert!(matches!(sync.outcome, SyncOutcome::Refreshed { .. }));
    assert_eq!(store.write_count(), 2);
}

#[tokio::test]
async fn records_without_status_are_counted_not_stored() {
    let source = ScriptedSource::with_records(
        "db-1",
        vec![
            raw_record("p1", "Kept", (1.0, 2.0), Some(("Signed", "green")), OLD_EDIT),
            raw_record("p2", "Dropped", (1.0, 2.0), None, OLD_EDIT),
        ],
    );
    let store = CountingStore::new();
    let (engine, _events) = engine_with(&source, &store);

    let sync = engine.sync_one("db-1").await.unwrap();

    assert_eq!(ids(&sync.locations), vec!["p1"]);
    assert_eq!(
        sync.outcome,
        SyncOutcome::Refreshed {
            stored: 1,
            missing_status: 1,
            malformed: 0
        }
    );
}

#[tokio::test]
async fn unknown_source_is_not_found() {
    let source = ScriptedSource::with_records("db-1", Vec::new());
    let store = CountingStore::new();
    let (engine, _events) = engine_with(&source, &store);

    let result = engine.sync_one("db-2").await;
    assert!(matches!(result, Err(mapsync_core::Error::NotFound(_))));
}
