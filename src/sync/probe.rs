//! Connectivity probe for the master store.
//!
//! The master lives on a network share that may be unmounted or
//! unreachable. Before any store is opened, the probe checks that the
//! directory holding the master file can be listed.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Directory containing the master file (`.` for a bare file name).
#[must_use]
pub fn containing_dir(remote_path: &Path) -> PathBuf {
    match remote_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Whether the master's containing directory is reachable.
///
/// Never errors: any failure to access the directory yields `false`.
pub async fn check_remote_access(remote_path: &Path) -> bool {
    let dir = containing_dir(remote_path);
    match tokio::fs::read_dir(&dir).await {
        Ok(_) => true,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Master directory not reachable");
            false
        }
    }
}
