//! Plain partition: direct key→value store.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::PartitionCore;
use crate::error::Result;

/// Direct key→value partition with index, cache and join support.
///
/// Obtained from [`Kura::partition`](crate::Kura::partition) or, as a
/// flavor-agnostic handle, from
/// [`Kura::partition_by_name`](crate::Kura::partition_by_name).
pub struct Partition {
    pub(crate) core: Arc<PartitionCore>,
}

impl std::fmt::Debug for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Partition")
            .field("name", &self.core.name)
            .finish()
    }
}

impl Partition {
    pub(crate) fn from_core(core: Arc<PartitionCore>) -> Self {
        Self { core }
    }

    /// The partition's registered name.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Write `value` under `key`, refresh indices, write through the cache.
    ///
    /// Returns false when the key is not a usable filename component or the
    /// write fails.
    pub async fn set(&self, key: &str, value: Value) -> bool {
        if self.core.begin_write(key).await.is_none() {
            return false;
        }
        // Prior value's index entries must go before the new ones land;
        // skip the extra read when nothing is indexed.
        let old = if self.core.index.has_paths() {
            self.core.index_basis_value(key).await.unwrap_or_default()
        } else {
            None
        };
        let result = self.core.commit_write(key, &value, old.as_ref(), &value).await;
        if !self.core.demote_write(key, result) {
            return false;
        }
        self.core.cache.put(key, value);
        true
    }

    /// Resolve `key` (which may be an alternative key) and return its
    /// value, or `None` if absent.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.core.get_latest(key).await
    }

    /// Cache hit or file present.
    pub async fn exists(&self, key: &str) -> bool {
        self.core.exists(key).await
    }

    /// Remove `key`. True iff a file was removed.
    pub async fn delete(&self, key: &str) -> bool {
        self.core.delete(key).await
    }

    /// Every stored primary key, in directory order.
    pub async fn keys(&self) -> Vec<String> {
        self.core.keys().await
    }

    /// All records as a key→value mapping.
    pub async fn data(&self) -> Map<String, Value> {
        self.core.data().await
    }

    /// Register a join against the partition named `db`. Non-persistent.
    pub fn create_join(
        &self,
        db: &str,
        join_name: &str,
        left_field: &str,
        right_field: Option<&str>,
    ) -> Result<()> {
        self.core.create_join(db, join_name, left_field, right_field)
    }

    /// Fetch `key` and materialize all registered joins into the result.
    pub async fn get_with_joins(&self, key: &str) -> Result<Option<Value>> {
        self.core.get_with_joins(key).await
    }
}
