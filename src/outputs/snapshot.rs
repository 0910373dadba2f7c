//! Atomic snapshot persistence.
//!
//! The snapshot is the only artifact a run leaves behind, and readers may
//! fetch it at any moment. It is therefore never written in place:
//!
//! ```text
//! out_dir/
//! ├── .items.json.tmp   # written, flushed and synced first
//! └── items.json        # replaced by a single rename
//! ```
//!
//! If anything fails before the rename, the previous `items.json` is left
//! exactly as it was and the temporary file is removed.

use crate::models::Snapshot;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, instrument};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("serializing snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("{action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        #[source]
        source: io::Error,
    },
}

fn io_err(action: &'static str, path: &Path) -> impl FnOnce(io::Error) -> SnapshotError {
    let path = path.display().to_string();
    move |source| SnapshotError::Io {
        action,
        path,
        source,
    }
}

/// Sibling temp path for `path`: same directory, so the final rename never
/// crosses filesystems.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}

async fn write_temp(temp: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(temp)
        .await
        .map_err(io_err("opening temp snapshot", temp))?;
    file.write_all(bytes)
        .await
        .map_err(io_err("writing temp snapshot", temp))?;
    file.flush()
        .await
        .map_err(io_err("flushing temp snapshot", temp))?;
    file.sync_all()
        .await
        .map_err(io_err("syncing temp snapshot", temp))?;
    Ok(())
}

/// Replace the file at `path` with `bytes` in one step.
///
/// Parent directories are created as needed. On error the temp file is
/// cleaned up and the old file, if any, is untouched.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(io_err("creating snapshot directory", parent))?;
    }

    let temp = temp_path_for(path);
    let result = match write_temp(&temp, bytes).await {
        Ok(()) => fs::rename(&temp, path)
            .await
            .map_err(io_err("renaming temp snapshot into", path)),
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        error!(path = %path.display(), error = %e, "Snapshot write failed; previous snapshot kept");
        let _ = fs::remove_file(&temp).await;
    }
    result
}

/// Serialize `snapshot` as pretty JSON and publish it at `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_snapshot(snapshot: &Snapshot, path: &Path) -> Result<(), SnapshotError> {
    let json = serde_json::to_vec_pretty(snapshot)?;
    write_atomic(path, &json).await?;
    info!(
        items = snapshot.items.len(),
        bytes = json.len(),
        generated_at = %snapshot.generated_at,
        "Published snapshot"
    );
    Ok(())
}
