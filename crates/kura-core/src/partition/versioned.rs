//! Unitemporal partition: an append-only version timeline under each key.
//!
//! Every write appends a new immutable version. Prior versions stay
//! readable with their transaction-time audit fields; only the latest
//! value flows through the index and the cache.

use std::sync::Arc;

use log::warn;
use serde_json::{Map, Value};

use super::PartitionCore;
use crate::codec;
use crate::error::Result;
use crate::record::{Metadata, VersionSlot, VersionedRecord};
use crate::time::now_millis;

/// Versioned key→value partition.
pub struct VersionedPartition {
    pub(crate) core: Arc<PartitionCore>,
}

impl VersionedPartition {
    pub(crate) fn from_core(core: Arc<PartitionCore>) -> Self {
        Self { core }
    }

    /// The partition's registered name.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Append `value` as the next version of `key`.
    ///
    /// The previous version's `deletedAt` is stamped with this write's
    /// `createdAt`, keeping the timeline gapless. Returns false on an
    /// unusable key or a failed write.
    pub async fn set(&self, key: &str, value: Value, metadata: Option<Metadata>) -> bool {
        if self.core.begin_write(key).await.is_none() {
            return false;
        }
        let path = self.core.layout.key_file(key);
        let existing: Option<VersionedRecord> = match codec::read_json(&path).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(
                    "partition '{}': read '{}' failed: {}",
                    self.core.name, key, e
                );
                return false;
            }
        };

        let old_value = existing
            .as_ref()
            .and_then(|r| r.latest_slot())
            .map(|slot| slot.data.clone());

        let t = now_millis();
        let record = match existing {
            Some(mut record) => {
                record.push_version(value.clone(), t, metadata);
                record
            }
            None => VersionedRecord::first(value.clone(), t, metadata),
        };

        let result = self
            .core
            .commit_write(key, &record, old_value.as_ref(), &value)
            .await;
        if !self.core.demote_write(key, result) {
            return false;
        }
        self.core.cache.put(key, value);
        true
    }

    /// Value at `version`, or the latest value when `version` is `None`.
    ///
    /// Only the latest path touches the cache; reads of a specific version
    /// always go to disk.
    pub async fn get(&self, key: &str, version: Option<u32>) -> Option<Value> {
        match version {
            None => self.core.get_latest(key).await,
            Some(version) => {
                let record: VersionedRecord = self.core.read_record(key).await?;
                record.data.get(&version).map(|slot| slot.data.clone())
            }
        }
    }

    /// Full version slot with audit fields, latest when `version` is `None`.
    pub async fn get_version(&self, key: &str, version: Option<u32>) -> Option<VersionSlot> {
        let record: VersionedRecord = self.core.read_record(key).await?;
        match version {
            Some(version) => record.data.get(&version).cloned(),
            None => record.latest_slot().cloned(),
        }
    }

    /// All version slots in increasing version order, or `None` if the key
    /// does not exist.
    pub async fn get_all_versions(&self, key: &str) -> Option<Vec<VersionSlot>> {
        let record: VersionedRecord = self.core.read_record(key).await?;
        Some(record.slots())
    }

    /// Cache hit or file present.
    pub async fn exists(&self, key: &str) -> bool {
        self.core.exists(key).await
    }

    /// Remove `key` and its whole version timeline. True iff a file was
    /// removed.
    pub async fn delete(&self, key: &str) -> bool {
        self.core.delete(key).await
    }

    /// Every stored primary key, in directory order.
    pub async fn keys(&self) -> Vec<String> {
        self.core.keys().await
    }

    /// All records as a key→latest-value mapping.
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

    /// Fetch the latest value of `key` and materialize all registered joins.
    pub async fn get_with_joins(&self, key: &str) -> Result<Option<Value>> {
        self.core.get_with_joins(key).await
    }
}
