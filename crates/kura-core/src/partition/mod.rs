//! Partition engine: three flavors over one substrate.
//!
//! [`PartitionCore`] owns everything the flavors share — the directory
//! layout, the alternative-key index, the latest-value cache, and the join
//! registry. The public flavor types ([`Partition`],
//! [`VersionedPartition`], [`BitemporalPartition`]) are thin wrappers that
//! add their own write and version-accessor semantics; the plain operations
//! (`exists`, `keys`, `data`, `delete`, joins) live here once.
//!
//! Every public operation first ensures the partition directory exists and
//! its index snapshot is loaded (idempotent). Reads consult the cache, then
//! the resolved key's file; writes mutate the file, then the index, then
//! the cache; deletes invert that order.
//!
//! # Error demotion
//!
//! Per the store's error model, I/O and codec failures never escape this
//! module as errors: read paths demote to the absent sentinel, write paths
//! to a `false` result, each with a warn-level log. Only join
//! misconfiguration, invalid valid-time intervals, and registry misses are
//! raised.

mod bitemporal;
mod join;
mod plain;
mod versioned;


pub use bitemporal::BitemporalPartition;
pub use join::Join;
pub use plain::Partition;
pub use versioned::VersionedPartition;

use std::io;
use std::sync::{Arc, Mutex};

use log::warn;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::sync::OnceCell;

use crate::cache::ValueCache;
use crate::codec;
use crate::index::AltKeyIndex;
use crate::key::is_valid_name;
use crate::kura::KuraInner;
use crate::layout::PartitionLayout;
use crate::record::{BitemporalRecord, VersionedRecord};
use crate::time::now_millis;

/// Storage flavor of a partition directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flavor {
    Plain,
    Versioned,
    Bitemporal,
}

/// Shared substrate owned by every partition handle.
pub(crate) struct PartitionCore {
    pub(crate) name: String,
    pub(crate) flavor: Flavor,
    pub(crate) layout: PartitionLayout,
    pub(crate) index: AltKeyIndex,
    pub(crate) cache: ValueCache,
    pub(crate) joins: Mutex<Vec<Join>>,
    pub(crate) registry: Arc<KuraInner>,
    opened: OnceCell<()>,
}

impl PartitionCore {
    pub(crate) fn new(
        registry: Arc<KuraInner>,
        name: &str,
        flavor: Flavor,
        index_paths: Vec<String>,
        cache_capacity: usize,
    ) -> Self {
        let layout = PartitionLayout::new(registry.base_dir().join(name));
        let index = AltKeyIndex::new(layout.index_file(), index_paths);
        Self {
            name: name.to_string(),
            flavor,
            layout,
            index,
            cache: ValueCache::new(cache_capacity),
            joins: Mutex::new(Vec::new()),
            registry,
            opened: OnceCell::new(),
        }
    }

    /// Create the partition directory and load the index snapshot, once.
    pub(crate) async fn ensure_open(&self) -> io::Result<()> {
        self.opened
            .get_or_try_init(|| async {
                self.layout.ensure_dir().await?;
                self.index.load().await
            })
            .await
            .map(|_| ())
    }

    /// Resolve a lookup string through the index map, then gate it on
    /// filename validity before it can touch storage.
    ///
    /// Alternative keys may contain anything; the primary key they resolve
    /// to must be a safe filename component.
    pub(crate) fn resolve(&self, key: &str) -> Option<String> {
        let primary = self.index.resolve(key);
        if is_valid_name(&primary) {
            Some(primary)
        } else {
            warn!(
                "partition '{}': ignoring unusable key '{}'",
                self.name, primary
            );
            None
        }
    }

    // ========================================================================
    // Flavor-aware record reads
    // ========================================================================

    /// The value `get` (with no version/as-of argument) observes right now.
    ///
    /// Plain: the raw file content. Versioned: the latest slot's value.
    /// Bitemporal: the live slice whose interval contains `now()`.
    async fn read_now_value(&self, primary: &str) -> io::Result<Option<Value>> {
        let path = self.layout.key_file(primary);
        match self.flavor {
            Flavor::Plain => codec::read_json(&path).await,
            Flavor::Versioned => {
                let record: Option<VersionedRecord> = codec::read_json(&path).await?;
                Ok(record
                    .as_ref()
                    .and_then(|r| r.latest_slot())
                    .map(|slot| slot.data.clone()))
            }
            Flavor::Bitemporal => {
                let record: Option<BitemporalRecord> = codec::read_json(&path).await?;
                Ok(record
                    .as_ref()
                    .and_then(|r| r.live_at(now_millis()))
                    .map(|slice| slice.data.clone()))
            }
        }
    }

    /// The value the index entries for `primary` were derived from: the
    /// most recent write. Differs from [`read_now_value`] only for
    /// bitemporal records, where the latest write may cover a historical
    /// interval.
    pub(crate) async fn index_basis_value(&self, primary: &str) -> io::Result<Option<Value>> {
        let path = self.layout.key_file(primary);
        match self.flavor {
            Flavor::Plain => codec::read_json(&path).await,
            Flavor::Versioned => {
                let record: Option<VersionedRecord> = codec::read_json(&path).await?;
                Ok(record
                    .as_ref()
                    .and_then(|r| r.latest_slot())
                    .map(|slot| slot.data.clone()))
            }
            Flavor::Bitemporal => {
                let record: Option<BitemporalRecord> = codec::read_json(&path).await?;
                Ok(record
                    .as_ref()
                    .and_then(|r| r.latest_write())
                    .map(|slice| slice.data.clone()))
            }
        }
    }

    // ========================================================================
    // Shared operations
    // ========================================================================

    /// Cache-first read of the current value, populating the cache on miss.
    pub(crate) async fn get_latest(&self, key: &str) -> Option<Value> {
        if let Err(e) = self.ensure_open().await {
            warn!("partition '{}': open failed: {}", self.name, e);
            return None;
        }
        let primary = self.resolve(key)?;
        if let Some(value) = self.cache.get(&primary) {
            return Some(value);
        }
        let value = match self.read_now_value(&primary).await {
            Ok(value) => value?,
            Err(e) => {
                warn!("partition '{}': read '{}' failed: {}", self.name, primary, e);
                return None;
            }
        };
        // Plain and versioned values change only through writes, so the
        // copy stays good until the next set/delete. A bitemporal now-slice
        // can expire as the clock passes its `validTo`, so bitemporal reads
        // never populate; their cache entries come only from writes whose
        // slice is open-ended (see `BitemporalPartition::set`).
        if self.flavor != Flavor::Bitemporal {
            self.cache.put(&primary, value.clone());
        }
        Some(value)
    }

    /// Cache hit or file present.
    pub(crate) async fn exists(&self, key: &str) -> bool {
        if self.ensure_open().await.is_err() {
            return false;
        }
        let Some(primary) = self.resolve(key) else {
            return false;
        };
        if self.cache.has(&primary) {
            return true;
        }
        fs::metadata(self.layout.key_file(&primary)).await.is_ok()
    }

    /// Every stored primary key, in directory order.
    pub(crate) async fn keys(&self) -> Vec<String> {
        if let Err(e) = self.ensure_open().await {
            warn!("partition '{}': open failed: {}", self.name, e);
            return Vec::new();
        }
        match self.layout.list_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("partition '{}': listing failed: {}", self.name, e);
                Vec::new()
            }
        }
    }

    /// `keys()` followed by per-key `get` aggregation.
    pub(crate) async fn data(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for key in self.keys().await {
            if let Some(value) = self.get_latest(&key).await {
                out.insert(key, value);
            }
        }
        out
    }

    /// Remove a key: file first, then its index entries, then the cache
    /// entry. Returns true iff a file was removed.
    pub(crate) async fn delete(&self, key: &str) -> bool {
        if let Err(e) = self.ensure_open().await {
            warn!("partition '{}': open failed: {}", self.name, e);
            return false;
        }
        let Some(primary) = self.resolve(key) else {
            return false;
        };

        // Read the current value first: its extracted indices are the ones
        // that must disappear with the record.
        let current = match self.index_basis_value(&primary).await {
            Ok(current) => current,
            Err(e) => {
                warn!("partition '{}': read '{}' failed: {}", self.name, primary, e);
                None
            }
        };

        let removed = match codec::remove_file(&self.layout.key_file(&primary)).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(
                    "partition '{}': delete '{}' failed: {}",
                    self.name, primary, e
                );
                return false;
            }
        };
        if !removed {
            return false;
        }

        if let Err(e) = self.index.record_delete(current.as_ref()).await {
            warn!(
                "partition '{}': index flush after delete '{}' failed: {}",
                self.name, primary, e
            );
        }
        self.cache.remove(&primary);
        true
    }

    /// Resolve and read a key's full envelope record, demoting absence,
    /// corruption and I/O failure to `None`.
    pub(crate) async fn read_record<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        if let Err(e) = self.ensure_open().await {
            warn!("partition '{}': open failed: {}", self.name, e);
            return None;
        }
        let primary = self.resolve(key)?;
        match codec::read_json(&self.layout.key_file(&primary)).await {
            Ok(record) => record,
            Err(e) => {
                warn!("partition '{}': read '{}' failed: {}", self.name, primary, e);
                None
            }
        }
    }

    /// Write tail shared by every flavor's `set`: persist the record and
    /// re-point the index at the new value.
    ///
    /// The cache step stays with the caller — what is safe to cache differs
    /// per flavor (a bitemporal write may carry an interval that never
    /// covers `now`).
    pub(crate) async fn commit_write<R>(
        &self,
        primary: &str,
        record: &R,
        old_value: Option<&Value>,
        new_value: &Value,
    ) -> io::Result<()>
    where
        R: Serialize + Send + Sync,
    {
        codec::write_json(&self.layout.key_file(primary), record).await?;
        self.index.record_write(primary, old_value, new_value).await?;
        Ok(())
    }

    /// Demote a write-path failure to `false`, logging it.
    pub(crate) fn demote_write(&self, key: &str, result: io::Result<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("partition '{}': write '{}' failed: {}", self.name, key, e);
                false
            }
        }
    }

    /// Gate a write on key validity and an open partition; `None` means the
    /// caller should report `false`.
    pub(crate) async fn begin_write(&self, key: &str) -> Option<()> {
        if !is_valid_name(key) {
            warn!(
                "partition '{}': rejecting invalid primary key '{}'",
                self.name, key
            );
            return None;
        }
        if let Err(e) = self.ensure_open().await {
            warn!("partition '{}': open failed: {}", self.name, e);
            return None;
        }
        Some(())
    }
}
