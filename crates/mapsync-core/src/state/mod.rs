// # Record Store Implementations
//
// This module provides implementations of the RecordStore trait for
// different persistence strategies.

pub mod memory;
pub mod sqlite;

pub use memory::{MemoryRecordStore, MemoryRecordStoreFactory};
pub use sqlite::{SqliteRecordStore, SqliteRecordStoreFactory};
