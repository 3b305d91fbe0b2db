//! On-disk snapshot envelope
//!
//! A snapshot is one pretty-printed JSON document per crawl stage:
//!
//! ```json
//! {
//!   "format": 1,
//!   "stage": "listing",
//!   "taxonomy_fingerprint": "9f2c…",
//!   "saved_at": "2024-05-01T08:30:00Z",
//!   "state": { … }
//! }
//! ```
//!
//! Writes go to a temporary file in the snapshot's directory which is then renamed over
//! the previous snapshot, so a reader only ever sees a complete document.

use crate::{CheckpointError, CheckpointResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Envelope format written by this version
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<S> {
    pub format: u32,
    pub stage: String,
    pub taxonomy_fingerprint: String,
    pub saved_at: DateTime<Utc>,
    pub state: S,
}

/// Reads a snapshot, or `None` if nothing has been written yet
pub fn read_snapshot<S: DeserializeOwned>(path: &Path) -> CheckpointResult<Option<Snapshot<S>>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(CheckpointError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };

    let snapshot: Snapshot<S> = serde_json::from_str(&content)?;
    if snapshot.format != FORMAT_VERSION {
        return Err(CheckpointError::Incompatible {
            path: path.display().to_string(),
            reason: format!(
                "format {} is not supported (expected {})",
                snapshot.format, FORMAT_VERSION
            ),
        });
    }

    Ok(Some(snapshot))
}

/// Atomically replaces the snapshot at `path`
pub fn write_snapshot<S: Serialize>(path: &Path, snapshot: &Snapshot<S>) -> CheckpointResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let io_error = |source| CheckpointError::Io {
        path: path.display().to_string(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(io_error)?;

    let body = serde_json::to_vec_pretty(snapshot)?;
    let mut file = NamedTempFile::new_in(dir).map_err(io_error)?;
    file.write_all(&body).map_err(io_error)?;
    file.as_file().sync_all().map_err(io_error)?;

    file.persist(path).map_err(|source| CheckpointError::Persist {
        path: path.display().to_string(),
        source,
    })?;

    // The rename itself lives in the directory entry
    sync_dir(dir).map_err(io_error)?;

    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
