//! Data models for quotesync.
//!
//! This module contains the replication domain models:
//! - Record (a generic replicated row) and its Timestamp ordering
//! - TableDescriptor / TableSchema
//! - SyncRun

pub mod record;
pub mod sync_run;
pub mod table;

pub use record::{Record, Timestamp, SYNCED_AT, TRACKING_COLUMNS, UPDATED_AT, UPDATED_BY};
pub use sync_run::{RunStatus, SyncDirection, SyncRun};
pub use table::{TableDescriptor, TableSchema};
