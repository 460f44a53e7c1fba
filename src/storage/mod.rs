//! SQLite storage layer for quotesync.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for the local store, rollback journal for the network master
//! - Generic row access for application-owned replicated tables
//! - Embedded migrations for the engine's own tables
//! - A versioned schema registry for creating missing tables
//!
//! # Submodules
//!
//! - [`migrations`] - Engine bookkeeping tables
//! - [`schema`] - Pragmas and the schema registry
//! - [`sqlite`] - Store handles
//! - [`tables`] - Generic row operations

pub mod migrations;
pub mod schema;
pub mod sqlite;
pub mod tables;

pub use schema::SchemaRegistry;
pub use sqlite::SqliteStorage;
