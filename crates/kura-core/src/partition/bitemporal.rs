//! Bitemporal partition: valid-time milestoned store.
//!
//! Each write claims a half-open valid-time interval `[validFrom, validTo)`
//! and re-milestones the existing live timeline so live intervals stay
//! pairwise non-overlapping:
//!
//! - the live slice *enclosing* `validFrom` is superseded and re-appended
//!   with its interval closed at `validFrom`;
//! - live slices *starting at or after* `validFrom` are superseded; if the
//!   new interval's end falls strictly inside one of them, that slice is
//!   re-appended with its start moved to `validTo`.
//!
//! Superseded slices keep their `deletedAt` stamp and remain on disk for
//! audit; point-in-time reads only see the live timeline.

use std::sync::Arc;

use log::warn;
use serde_json::{Map, Value};

use super::PartitionCore;
use crate::codec;
use crate::error::{Result, StoreError};
use crate::record::{BitemporalRecord, Metadata, Slice};
use crate::time::{INFINITY_TIME, before_bound, now_millis};

/// Valid-time milestoned key→value partition.
pub struct BitemporalPartition {
    pub(crate) core: Arc<PartitionCore>,
}

impl BitemporalPartition {
    pub(crate) fn from_core(core: Arc<PartitionCore>) -> Self {
        Self { core }
    }

    /// The partition's registered name.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Write `value` valid over `[valid_from, valid_to)`.
    ///
    /// An omitted `valid_from` defaults to now, an omitted `valid_to` to
    /// open-ended. Raises [`StoreError::InvalidInterval`] when the closed
    /// interval is empty; write failures demote to `Ok(false)`.
    pub async fn set(
        &self,
        key: &str,
        value: Value,
        valid_from: Option<i64>,
        valid_to: Option<i64>,
        metadata: Option<Metadata>,
    ) -> Result<bool> {
        let t = now_millis();
        let nvf = valid_from.unwrap_or(t);
        let nvt = valid_to.unwrap_or(INFINITY_TIME);
        if nvt != INFINITY_TIME && nvt <= nvf {
            return Err(StoreError::InvalidInterval {
                valid_from: nvf,
                valid_to: nvt,
            });
        }

        if self.core.begin_write(key).await.is_none() {
            return Ok(false);
        }
        let path = self.core.layout.key_file(key);
        let mut record: BitemporalRecord = match codec::read_json(&path).await {
            Ok(existing) => existing.unwrap_or_default(),
            Err(e) => {
                warn!(
                    "partition '{}': read '{}' failed: {}",
                    self.core.name, key, e
                );
                return Ok(false);
            }
        };

        let old_value = record.latest_write().map(|slice| slice.data.clone());

        let new_slice = Slice {
            data: value.clone(),
            created_at: t,
            deleted_at: INFINITY_TIME,
            valid_from: nvf,
            valid_to: nvt,
            metadata,
        };
        // Only an open-ended slice already covering `now` stays the current
        // value without another write; the live timeline never changes out
        // from under it. Anything time-bounded (or future-dated) would go
        // stale in the cache as the clock moves, so those writes drop the
        // cached entry instead of refreshing it.
        let now_current = nvt == INFINITY_TIME && nvf <= t;

        if record.data.is_empty() {
            record.data.push(new_slice);
        } else {
            remilestone(&mut record, new_slice, t);
        }

        let result = self
            .core
            .commit_write(key, &record, old_value.as_ref(), &value)
            .await;
        if !self.core.demote_write(key, result) {
            return Ok(false);
        }
        if now_current {
            self.core.cache.put(key, value);
        } else {
            self.core.cache.remove(key);
        }
        Ok(true)
    }

    /// Value valid as of `valid_as_of` (default: now), or `None` when no
    /// live interval contains it.
    ///
    /// The cache is only consulted for the default-now path; explicit
    /// point-in-time reads always go to disk.
    pub async fn get(&self, key: &str, valid_as_of: Option<i64>) -> Option<Value> {
        match valid_as_of {
            None => self.core.get_latest(key).await,
            Some(as_of) => {
                let record: BitemporalRecord = self.core.read_record(key).await?;
                record.live_at(as_of).map(|slice| slice.data.clone())
            }
        }
    }

    /// Full slice valid as of `valid_as_of` (default: now).
    pub async fn get_version(&self, key: &str, valid_as_of: Option<i64>) -> Option<Slice> {
        let record: BitemporalRecord = self.core.read_record(key).await?;
        let as_of = valid_as_of.unwrap_or_else(now_millis);
        record.live_at(as_of).cloned()
    }

    /// Every slice ever written for `key` — live and superseded — in
    /// insertion order, or `None` if the key does not exist.
    pub async fn get_all_versions(&self, key: &str) -> Option<Vec<Slice>> {
        let record: BitemporalRecord = self.core.read_record(key).await?;
        Some(record.data)
    }

    /// Cache hit or file present.
    pub async fn exists(&self, key: &str) -> bool {
        self.core.exists(key).await
    }

    /// Remove `key` and every slice under it. True iff a file was removed.
    pub async fn delete(&self, key: &str) -> bool {
        self.core.delete(key).await
    }

    /// Every stored primary key, in directory order.
    pub async fn keys(&self) -> Vec<String> {
        self.core.keys().await
    }

    /// All records as a key→current-value mapping.
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

    /// Fetch the current value of `key` and materialize all registered
    /// joins.
    pub async fn get_with_joins(&self, key: &str) -> Result<Option<Value>> {
        self.core.get_with_joins(key).await
    }
}

/// Fold a new slice into an existing record, superseding and splitting
/// live slices so the live timeline stays non-overlapping.
///
/// `t` is the transaction time stamped onto every slice superseded by this
/// write.
fn remilestone(record: &mut BitemporalRecord, new_slice: Slice, t: i64) {
    let nvf = new_slice.valid_from;
    let nvt = new_slice.valid_to;

    let mut before: Option<Slice> = None;
    let mut after: Option<Slice> = None;

    for slice in record.data.iter_mut().filter(|s| s.is_live()) {
        if slice.valid_from <= nvf && before_bound(nvf, slice.valid_to) {
            // Enclosing slice: the predecessor to close at `validFrom`.
            before = Some(slice.clone());
            slice.deleted_at = t;
        } else if nvf <= slice.valid_from {
            // Starts at or after the new interval: superseded. If the new
            // interval ends strictly inside it, its tail survives.
            let pre = slice.clone();
            slice.deleted_at = t;
            if nvt != INFINITY_TIME && slice.valid_from < nvt && before_bound(nvt, slice.valid_to) {
                after = Some(pre);
            }
        }
    }

    if let Some(b) = before {
        // An empty [x, x) head would violate the live-timeline invariant.
        if b.valid_from < nvf {
            record.data.push(Slice {
                valid_to: nvf,
                ..b
            });
        }
    }
    record.data.push(new_slice);
    if let Some(a) = after {
        record.data.push(Slice {
            valid_from: nvt,
            ..a
        });
    }
}
