//! quotesync - offline-first replication for a quoting database
//!
//! Each installation works against its own SQLite file and periodically
//! reconciles it with a shared master SQLite file on a network share.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`config`] - Configuration loading and validation
//! - [`model`] - Data types (Record, TableDescriptor, SyncRun)
//! - [`storage`] - SQLite store handles, migrations and the schema registry
//! - [`sync`] - The sync engine: probe, evolve, pull, push, journal
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
