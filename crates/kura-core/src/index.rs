//! Persistent alternative-key index.
//!
//! A partition may declare a list of field paths at construction; the value
//! at each path, string-coerced, becomes an alternative lookup key bound to
//! the record's primary key. The whole map is persisted to
//! `__index__.json` and rewritten on every mutation — indices are small
//! relative to data, so snapshotting beats journaling here.
//!
//! Field paths use dotted-path semantics: `"a.b.c"` reads nested object
//! fields. A missing intermediate yields no entry. There is no array or
//! wildcard syntax.

use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::fs;

use crate::codec;

/// In-memory alternative-key map with its on-disk snapshot path.
#[derive(Debug)]
pub struct AltKeyIndex {
    file: PathBuf,
    paths: Vec<String>,
    map: Mutex<IndexMap<String, String>>,
}

impl AltKeyIndex {
    pub fn new(file: PathBuf, paths: Vec<String>) -> Self {
        Self {
            file,
            paths,
            map: Mutex::new(IndexMap::new()),
        }
    }

    /// Load the snapshot from disk. An absent or malformed file leaves the
    /// map empty — the index is derived state and rebuilds as keys are
    /// rewritten.
    pub async fn load(&self) -> io::Result<()> {
        let loaded: IndexMap<String, String> = match fs::read(&self.file).await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => IndexMap::new(),
            Err(e) => return Err(e),
        };
        *self.map.lock().unwrap() = loaded;
        Ok(())
    }

    /// Whether any field paths were declared for extraction.
    pub fn has_paths(&self) -> bool {
        !self.paths.is_empty()
    }

    /// Resolve a lookup string to a primary key.
    ///
    /// Alternative keys map to their bound primary key; anything else
    /// resolves to itself. Synchronous — purely in-memory.
    pub fn resolve(&self, key: &str) -> String {
        self.map
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }

    /// Extract the alternative keys of a value along the declared paths.
    pub fn extract(&self, value: &Value) -> Vec<String> {
        self.paths
            .iter()
            .filter_map(|path| extract_path(value, path).and_then(coerce_index_string))
            .collect()
    }

    /// Record a write: drop the prior value's entries, bind the new
    /// value's entries to `primary`, and flush the snapshot.
    pub async fn record_write(
        &self,
        primary: &str,
        old: Option<&Value>,
        new: &Value,
    ) -> io::Result<()> {
        let removed = old.map(|v| self.extract(v)).unwrap_or_default();
        let added = self.extract(new);
        if removed.is_empty() && added.is_empty() {
            return Ok(());
        }
        {
            let mut map = self.map.lock().unwrap();
            for alt in &removed {
                map.shift_remove(alt);
            }
            for alt in added {
                map.insert(alt, primary.to_string());
            }
        }
        self.flush().await
    }

    /// Record a delete: drop the removed value's entries and flush.
    pub async fn record_delete(&self, old: Option<&Value>) -> io::Result<()> {
        let removed = old.map(|v| self.extract(v)).unwrap_or_default();
        if removed.is_empty() {
            return Ok(());
        }
        {
            let mut map = self.map.lock().unwrap();
            for alt in &removed {
                map.shift_remove(alt);
            }
        }
        self.flush().await
    }

    /// Rewrite the whole snapshot. The map is cloned out of the lock first
    /// so the mutex is never held across the write.
    async fn flush(&self) -> io::Result<()> {
        let snapshot = self.map.lock().unwrap().clone();
        codec::write_json(&self.file, &snapshot).await
    }
}

/// Walk a dotted path through nested objects.
///
/// Returns `None` as soon as an intermediate is absent or not an object.
pub fn extract_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Coerce an extracted leaf into its index-key string form.
///
/// Strings pass through; numbers and booleans use their display form.
/// `null`, arrays and objects have no meaningful key and yield `None`.
pub fn coerce_index_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup(paths: &[&str]) -> (TempDir, AltKeyIndex) {
        let dir = TempDir::new().unwrap();
        let index = AltKeyIndex::new(
            dir.path().join("__index__.json"),
            paths.iter().map(|p| p.to_string()).collect(),
        );
        (dir, index)
    }

    #[test]
    fn extract_path_walks_nested_objects() {
        let v = json!({"a": {"b": {"c": "deep"}}});
        assert_eq!(extract_path(&v, "a.b.c"), Some(&json!("deep")));
        assert_eq!(extract_path(&v, "a.b"), Some(&json!({"c": "deep"})));
        assert_eq!(extract_path(&v, "a.x.c"), None);
        assert_eq!(extract_path(&v, "missing"), None);
    }

    #[test]
    fn coercion_covers_scalars_only() {
        assert_eq!(coerce_index_string(&json!("s")), Some("s".to_string()));
        assert_eq!(coerce_index_string(&json!(42)), Some("42".to_string()));
        assert_eq!(coerce_index_string(&json!(4.5)), Some("4.5".to_string()));
        assert_eq!(coerce_index_string(&json!(true)), Some("true".to_string()));
        assert_eq!(coerce_index_string(&json!(null)), None);
        assert_eq!(coerce_index_string(&json!([1])), None);
        assert_eq!(coerce_index_string(&json!({"k": 1})), None);
    }

    #[tokio::test]
    async fn resolve_falls_through_to_the_key_itself() {
        let (_dir, index) = setup(&["artist"]);
        index.load().await.unwrap();
        assert_eq!(index.resolve("gravity"), "gravity");
    }

    #[tokio::test]
    async fn write_binds_alternative_keys() {
        let (_dir, index) = setup(&["artist", "album.name"]);
        index.load().await.unwrap();

        let value = json!({"artist": "John Mayer", "album": {"name": "Continuum"}});
        index.record_write("gravity", None, &value).await.unwrap();

        assert_eq!(index.resolve("John Mayer"), "gravity");
        assert_eq!(index.resolve("Continuum"), "gravity");
    }

    #[tokio::test]
    async fn rewrite_drops_stale_entries_first() {
        let (_dir, index) = setup(&["artist"]);
        index.load().await.unwrap();

        let v1 = json!({"artist": "John Mayer"});
        let v2 = json!({"artist": "John Mayerz"});
        index.record_write("gravity", None, &v1).await.unwrap();
        index.record_write("gravity", Some(&v1), &v2).await.unwrap();

        assert_eq!(index.resolve("John Mayer"), "John Mayer");
        assert_eq!(index.resolve("John Mayerz"), "gravity");
    }

    #[tokio::test]
    async fn delete_removes_entries() {
        let (_dir, index) = setup(&["artist"]);
        index.load().await.unwrap();

        let value = json!({"artist": "Taylor Swift"});
        index.record_write("delicate", None, &value).await.unwrap();
        index.record_delete(Some(&value)).await.unwrap();

        assert_eq!(index.resolve("Taylor Swift"), "Taylor Swift");
    }

    #[tokio::test]
    async fn snapshot_survives_reload() {
        let (dir, index) = setup(&["artist"]);
        index.load().await.unwrap();
        index
            .record_write("gravity", None, &json!({"artist": "John Mayer"}))
            .await
            .unwrap();

        let reopened = AltKeyIndex::new(dir.path().join("__index__.json"), Vec::new());
        reopened.load().await.unwrap();
        assert_eq!(reopened.resolve("John Mayer"), "gravity");
    }

    #[tokio::test]
    async fn no_declared_paths_writes_no_snapshot() {
        let (dir, index) = setup(&[]);
        index.load().await.unwrap();
        index
            .record_write("k1", None, &json!({"artist": "x"}))
            .await
            .unwrap();
        assert!(!dir.path().join("__index__.json").exists());
    }

    #[tokio::test]
    async fn malformed_snapshot_loads_empty() {
        let (dir, index) = setup(&["artist"]);
        std::fs::write(dir.path().join("__index__.json"), b"not json").unwrap();
        index.load().await.unwrap();
        assert_eq!(index.resolve("anything"), "anything");
    }

    #[tokio::test]
    async fn absent_extractions_are_skipped() {
        let (_dir, index) = setup(&["artist", "year"]);
        index.load().await.unwrap();

        // "year" missing: only "artist" lands in the map.
        let value = json!({"artist": "John Mayer"});
        index.record_write("gravity", None, &value).await.unwrap();
        assert_eq!(index.resolve("John Mayer"), "gravity");

        // Numeric leaf coerces through its display form.
        let v2 = json!({"artist": "John Mayer", "year": 2006});
        index.record_write("gravity", Some(&value), &v2).await.unwrap();
        assert_eq!(index.resolve("2006"), "gravity");
    }
}
