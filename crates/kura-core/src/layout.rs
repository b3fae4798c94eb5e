//! Partition directory layout.
//!
//! A partition is a single directory. Each primary key `K` lives in
//! `<K>.json`; the reserved `__index__.json` holds the index-map snapshot.
//! Path methods are pure computations with no I/O; the listing helpers are
//! the only functions here that touch the filesystem.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;

/// File name stem reserved for the index snapshot.
pub const INDEX_FILE_STEM: &str = "__index__";

/// Full file name of the index snapshot.
pub const INDEX_FILE: &str = "__index__.json";

/// Extension shared by every record file and the index file.
const JSON_EXT: &str = ".json";

/// Path computations for one partition directory.
#[derive(Debug, Clone)]
pub struct PartitionLayout {
    dir: PathBuf,
}

impl PartitionLayout {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// The partition directory itself.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path to a primary key's record file.
    pub fn key_file(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}{}", key, JSON_EXT))
    }

    /// Path to the index snapshot file.
    pub fn index_file(&self) -> PathBuf {
        self.dir.join(INDEX_FILE)
    }

    /// Create the partition directory (idempotent).
    pub async fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// List every primary key stored in the partition, in directory order.
    ///
    /// Record files have their `.json` extension trimmed; the index file
    /// and anything that is not a `.json` file (temp files, stray
    /// directories) are ignored.
    pub async fn list_keys(&self) -> io::Result<Vec<String>> {
        if fs::metadata(&self.dir).await.is_err() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        let mut read_dir = fs::read_dir(&self.dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == INDEX_FILE {
                continue;
            }
            if let Some(stem) = name.strip_suffix(JSON_EXT) {
                keys.push(stem.to_string());
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PartitionLayout) {
        let dir = TempDir::new().unwrap();
        let layout = PartitionLayout::new(dir.path().join("songs"));
        (dir, layout)
    }

    #[test]
    fn key_file_paths() {
        let (_dir, layout) = setup();
        assert!(layout.key_file("gravity").ends_with("songs/gravity.json"));
        assert!(layout.index_file().ends_with("songs/__index__.json"));
    }

    #[tokio::test]
    async fn ensure_dir_is_idempotent() {
        let (_dir, layout) = setup();
        layout.ensure_dir().await.unwrap();
        layout.ensure_dir().await.unwrap();
        assert!(layout.dir().is_dir());
    }

    #[tokio::test]
    async fn list_keys_on_missing_dir_is_empty() {
        let (_dir, layout) = setup();
        assert!(layout.list_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_keys_trims_extension_and_skips_index() {
        let (_dir, layout) = setup();
        layout.ensure_dir().await.unwrap();
        std::fs::write(layout.key_file("k1"), b"{}").unwrap();
        std::fs::write(layout.key_file("k2"), b"{}").unwrap();
        std::fs::write(layout.index_file(), b"{}").unwrap();

        let mut keys = layout.list_keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["k1".to_string(), "k2".to_string()]);
    }

    #[tokio::test]
    async fn list_keys_ignores_unknown_files() {
        let (_dir, layout) = setup();
        layout.ensure_dir().await.unwrap();
        std::fs::write(layout.key_file("k1"), b"{}").unwrap();
        std::fs::write(layout.dir().join("notes.txt"), b"ignore me").unwrap();
        std::fs::write(layout.dir().join("k2.json.tmp.123"), b"partial").unwrap();
        std::fs::create_dir(layout.dir().join("subdir")).unwrap();

        let keys = layout.list_keys().await.unwrap();
        assert_eq!(keys, vec!["k1".to_string()]);
    }
}
