//! Core traits for the mapsync system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`SourceClient`]: Fetch raw records from an upstream database
//! - [`RecordStore`]: Persistent locations, statuses, sync markers and snapshot

pub mod record_store;
pub mod source_client;

pub use record_store::{RecordStore, RecordStoreFactory};
pub use source_client::{RawRecord, RawResponse, SourceClient, SourceClientFactory, parse_timestamp};
