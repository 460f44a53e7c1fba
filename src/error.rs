//! Error types for quotesync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 4=validation, 6=sync, etc.)
//! - Retryability flags for callers polling the engine
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

use crate::sync::SyncError;

/// Result type alias for quotesync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    DatabaseError,
    LocalStoreMissing,

    // Validation (exit 4)
    InvalidArgument,

    // Sync (exit 6)
    SyncError,
    RemoteUnavailable,
    EngineShutDown,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::LocalStoreMissing => "LOCAL_STORE_MISSING",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::SyncError => "SYNC_ERROR",
            Self::RemoteUnavailable => "REMOTE_UNAVAILABLE",
            Self::EngineShutDown => "ENGINE_SHUT_DOWN",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError | Self::LocalStoreMissing => 2,
            Self::InvalidArgument => 4,
            Self::SyncError | Self::RemoteUnavailable | Self::EngineShutDown => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether retrying later can succeed without changing anything.
    ///
    /// True for an unreachable master and busy databases; a later scheduled
    /// tick is the retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable | Self::DatabaseError | Self::SyncError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in quotesync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Local store not found at {path}")]
    LocalStoreMissing { path: PathBuf },

    #[error("Master database unreachable: {path}")]
    RemoteUnavailable { path: PathBuf },

    #[error("Sync engine has been shut down")]
    EngineShutDown,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Sync run failed: {0}")]
    RunFailed(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::LocalStoreMissing { .. } => ErrorCode::LocalStoreMissing,
            Self::RemoteUnavailable { .. } => ErrorCode::RemoteUnavailable,
            Self::EngineShutDown => ErrorCode::EngineShutDown,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Sync(SyncError::ShutDown) => ErrorCode::EngineShutDown,
            Self::Sync(_) | Self::RunFailed(_) => ErrorCode::SyncError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::LocalStoreMissing { path } => Some(format!(
                "No database at {}. Point --local-db (or QSYNC_LOCAL_DB) at the application's store.",
                path.display()
            )),
            Self::RemoteUnavailable { path } => Some(format!(
                "Check that the share containing {} is mounted. The local store keeps working offline.",
                path.display()
            )),
            Self::EngineShutDown => {
                Some("The engine was cleaned up; construct a new one to sync again.".to_string())
            }
            Self::Config(msg) if msg.contains("table") => Some(
                "Each table needs a unique non-empty name and primary key, e.g. \
                 {\"name\": \"customers\", \"primary_key\": \"id\"}"
                    .to_string(),
            ),
            Self::Config(msg) if msg.contains("interval") => {
                Some("interval_minutes must be at least 1".to_string())
            }
            Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Sync(_)
            | Self::RunFailed(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
