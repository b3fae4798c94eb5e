//! High-level store facade: the partition registry.
//!
//! `Kura` multiplexes partitions under one base directory. It hands out
//! partition handles, remembers what was registered so joins can re-resolve
//! targets by name, and archives the whole tree on demand.
//!
//! # Example
//!
//! ```ignore
//! use kura_core::Kura;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> kura_core::Result<()> {
//!     let store = Kura::open("./data")?;
//!
//!     let songs = store.partition("songs", &["artist"], None)?;
//!     songs.set("gravity", json!({"artist": "John Mayer"})).await;
//!
//!     // Alternative keys resolve through the index.
//!     let by_artist = songs.get("John Mayer").await;
//!     assert_eq!(by_artist, songs.get("gravity").await);
//!
//!     store.backup("./backups").await?;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::backup;
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::key::is_valid_name;
use crate::partition::{BitemporalPartition, Partition, VersionedPartition};
use crate::partition::{Flavor, PartitionCore};

/// What the registry remembers about a registration: enough to hand out a
/// fresh handle later. Flavor is deliberately not re-checked on lookup —
/// joins always treat targets as plain.
#[derive(Debug, Clone)]
struct Registration {
    cache_capacity: usize,
    versioned: bool,
}

/// Registry state shared by the facade and every partition handle.
///
/// Partitions hold an `Arc` to this so joins can resolve target names late,
/// on every call; partitions never hold references to each other.
pub(crate) struct KuraInner {
    base_dir: PathBuf,
    config: StoreConfig,
    registrations: Mutex<HashMap<String, Registration>>,
}

impl KuraInner {
    pub(crate) fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// New plain handle for a previously registered name.
    pub(crate) fn partition_by_name(self: &Arc<Self>, name: &str) -> Result<Partition> {
        let registration = self
            .registrations
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownPartition(name.to_string()))?;
        if registration.versioned {
            debug!("partition '{}' is versioned; re-lookup treats it as plain", name);
        }
        let core = PartitionCore::new(
            Arc::clone(self),
            name,
            Flavor::Plain,
            Vec::new(),
            registration.cache_capacity,
        );
        Ok(Partition::from_core(Arc::new(core)))
    }

    /// Record a registration and build its partition core.
    fn register(
        self: &Arc<Self>,
        name: &str,
        flavor: Flavor,
        index_paths: &[&str],
        cache_capacity: Option<usize>,
    ) -> Result<Arc<PartitionCore>> {
        if !is_valid_name(name) {
            return Err(StoreError::InvalidArgument(format!(
                "invalid partition name '{}'",
                name
            )));
        }
        let capacity = cache_capacity.unwrap_or_else(|| self.config.cache_capacity());
        self.registrations.lock().unwrap().insert(
            name.to_string(),
            Registration {
                cache_capacity: capacity,
                versioned: flavor != Flavor::Plain,
            },
        );
        let paths = index_paths.iter().map(|p| p.to_string()).collect();
        Ok(Arc::new(PartitionCore::new(
            Arc::clone(self),
            name,
            flavor,
            paths,
            capacity,
        )))
    }
}

/// File-backed key-value store over one base directory.
///
/// Cloning is cheap; clones share the registry.
#[derive(Clone)]
pub struct Kura {
    inner: Arc<KuraInner>,
}

impl Kura {
    /// Open a store at `base_dir`, creating it if missing and applying
    /// `config.toml` defaults when present.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(StoreError::Io)?;
        let config = StoreConfig::load(&base_dir)?;
        Ok(Self::from_parts(base_dir, config))
    }

    /// Open a store with explicit configuration, ignoring any `config.toml`.
    pub fn with_config(base_dir: impl Into<PathBuf>, config: StoreConfig) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).map_err(StoreError::Io)?;
        Ok(Self::from_parts(base_dir, config))
    }

    fn from_parts(base_dir: PathBuf, config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(KuraInner {
                base_dir,
                config,
                registrations: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The store's base directory.
    pub fn base_dir(&self) -> &Path {
        self.inner.base_dir()
    }

    /// Register and return a plain partition.
    ///
    /// `index_paths` are dotted field paths whose extracted values become
    /// alternative lookup keys. `cache_capacity` of `None` applies the
    /// store default; `Some(0)` disables caching for this partition.
    pub fn partition(
        &self,
        name: &str,
        index_paths: &[&str],
        cache_capacity: Option<usize>,
    ) -> Result<Partition> {
        let core = self
            .inner
            .register(name, Flavor::Plain, index_paths, cache_capacity)?;
        Ok(Partition::from_core(core))
    }

    /// Register and return a unitemporal (versioned) partition.
    pub fn versioned_partition(
        &self,
        name: &str,
        index_paths: &[&str],
        cache_capacity: Option<usize>,
    ) -> Result<VersionedPartition> {
        let core = self
            .inner
            .register(name, Flavor::Versioned, index_paths, cache_capacity)?;
        Ok(VersionedPartition::from_core(core))
    }

    /// Register and return a bitemporal partition.
    pub fn bitemporal_partition(
        &self,
        name: &str,
        index_paths: &[&str],
        cache_capacity: Option<usize>,
    ) -> Result<BitemporalPartition> {
        let core = self
            .inner
            .register(name, Flavor::Bitemporal, index_paths, cache_capacity)?;
        Ok(BitemporalPartition::from_core(core))
    }

    /// New plain handle for a previously registered name; fails with
    /// [`StoreError::UnknownPartition`] otherwise.
    pub fn partition_by_name(&self, name: &str) -> Result<Partition> {
        self.inner.partition_by_name(name)
    }

    /// Names of every registered partition, sorted.
    pub fn partitions(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .registrations
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Archive the base directory into a timestamp-named gzipped tar under
    /// `output_dir` and return the archive path.
    pub async fn backup(&self, output_dir: impl Into<PathBuf>) -> Result<PathBuf> {
        let base_dir = self.inner.base_dir.clone();
        let output_dir = output_dir.into();
        let archive = tokio::task::spawn_blocking(move || {
            backup::create_archive(&base_dir, &output_dir)
        })
        .await
        .map_err(|e| io::Error::other(format!("join error: {}", e)))??;
        Ok(archive)
    }
}
