//! JSON record codec.
//!
//! Reads demote both absence and corruption to `None`: a record file that
//! fails to parse reports its key as missing rather than poisoning the
//! whole partition. Writes stage the serialized bytes in a sibling temp
//! file, sync, and rename over the target, dispatched through
//! `spawn_blocking` so the async caller never blocks on disk. A reader
//! only ever observes the old record or the new one.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use log::warn;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;

/// Read and deserialize a JSON file.
///
/// Returns `Ok(None)` when the file does not exist or does not parse;
/// malformed content is logged with path context. Other I/O failures
/// propagate for the caller to demote.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("{}: skipping malformed record: {}", path.display(), e);
            Ok(None)
        }
    }
}

/// Serialize and atomically write a JSON file.
pub async fn write_json<T: Serialize + Send + Sync>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_staged(&path, &json))
        .await
        .map_err(|e| io::Error::other(format!("join error: {}", e)))?
}

/// Remove a file, reporting whether it existed.
pub async fn remove_file(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Sequence for staging-file names. The engine assumes a single logical
/// writer per partition directory, so per-process uniqueness is all the
/// rename staging needs.
static STAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Write `bytes` to a staged sibling of `path`, sync, then rename into
/// place.
///
/// The staging name appends to the full file name (`<K>.json.<n>.tmp`), so
/// it never carries the `.json` suffix key listings look for, and a crash
/// between stage and rename leaves the target untouched.
fn write_staged(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let seq = STAGE_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut staged = path.as_os_str().to_owned();
    staged.push(format!(".{}.tmp", seq));
    let staged = PathBuf::from(staged);

    let mut file = File::create(&staged)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    std::fs::rename(&staged, path)?;
    Ok(())
}
