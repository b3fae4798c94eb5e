//! On-disk envelope records for the versioned partition flavors.
//!
//! Field names follow the wire format (`camelCase`); timestamps are epoch
//! milliseconds with [`INFINITY_TIME`](crate::time::INFINITY_TIME) marking
//! open-ended `deletedAt` / `validTo`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::time::{INFINITY_TIME, before_bound};

/// Free-form caller-supplied annotations attached to a write.
pub type Metadata = HashMap<String, String>;

// ============================================================================
// Unitemporal
// ============================================================================

/// One version of a unitemporal record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSlot {
    /// The value written at this version.
    pub data: Value,

    /// 1-based version number; contiguous within a record.
    pub version: u32,

    /// Transaction time of the write, epoch ms.
    pub created_at: i64,

    /// Transaction time this version was superseded; `INFINITY_TIME` while
    /// it is the latest.
    pub deleted_at: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

/// Versioned record: the full append-only timeline under one key.
///
/// Invariants at rest: versions contiguous from 1, exactly one slot with
/// `deletedAt = INFINITY_TIME` (the latest), and each superseded slot's
/// `deletedAt` equals its successor's `createdAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedRecord {
    pub latest_version: u32,
    pub data: BTreeMap<u32, VersionSlot>,
}

impl VersionedRecord {
    /// Start a fresh record with `value` as version 1.
    pub fn first(value: Value, created_at: i64, metadata: Option<Metadata>) -> Self {
        let mut data = BTreeMap::new();
        data.insert(
            1,
            VersionSlot {
                data: value,
                version: 1,
                created_at,
                deleted_at: INFINITY_TIME,
                metadata,
            },
        );
        Self {
            latest_version: 1,
            data,
        }
    }

    /// Append `value` as the next version, closing the previous slot at
    /// `created_at`.
    pub fn push_version(&mut self, value: Value, created_at: i64, metadata: Option<Metadata>) {
        let previous = self.latest_version;
        self.latest_version += 1;
        if let Some(slot) = self.data.get_mut(&previous) {
            slot.deleted_at = created_at;
        }
        self.data.insert(
            self.latest_version,
            VersionSlot {
                data: value,
                version: self.latest_version,
                created_at,
                deleted_at: INFINITY_TIME,
                metadata,
            },
        );
    }

    /// The slot currently holding the latest value.
    pub fn latest_slot(&self) -> Option<&VersionSlot> {
        self.data.get(&self.latest_version)
    }

    /// All slots in increasing version order.
    pub fn slots(&self) -> Vec<VersionSlot> {
        self.data.values().cloned().collect()
    }
}

// ============================================================================
// Bitemporal
// ============================================================================

/// One slice of a bitemporal record: a value plus both its valid-time
/// interval and its transaction-time audit fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slice {
    pub data: Value,

    /// Transaction time of the write that produced this slice, epoch ms.
    pub created_at: i64,

    /// Transaction time this slice was superseded; `INFINITY_TIME` while it
    /// is part of the live timeline.
    pub deleted_at: i64,

    /// Inclusive start of the valid-time interval, epoch ms.
    pub valid_from: i64,

    /// Exclusive end of the valid-time interval; `INFINITY_TIME` for
    /// open-ended.
    pub valid_to: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Slice {
    /// Whether this slice belongs to the live timeline.
    pub fn is_live(&self) -> bool {
        self.deleted_at == INFINITY_TIME
    }

    /// Whether the valid-time interval contains `at`.
    pub fn contains(&self, at: i64) -> bool {
        self.valid_from <= at && before_bound(at, self.valid_to)
    }
}

/// Bitemporal record: every slice ever written for one key, in insertion
/// order. Superseded slices are retained for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitemporalRecord {
    pub data: Vec<Slice>,
}

impl BitemporalRecord {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// The live slice whose interval contains `at`, if any.
    ///
    /// The live timeline is non-overlapping, so at most one slice matches.
    pub fn live_at(&self, at: i64) -> Option<&Slice> {
        self.data.iter().find(|s| s.is_live() && s.contains(at))
    }

    /// The most recently written live slice — the record's "now" value for
    /// indexing and caching.
    pub fn latest_write(&self) -> Option<&Slice> {
        self.data.iter().rev().find(|s| s.is_live())
    }
}

impl Default for BitemporalRecord {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn versioned_record_tracks_the_timeline() {
        let mut record = VersionedRecord::first(json!("v1"), 100, None);
        record.push_version(json!("v2"), 200, None);
        record.push_version(json!("v3"), 300, None);

        assert_eq!(record.latest_version, 3);
        assert_eq!(record.data[&1].deleted_at, 200);
        assert_eq!(record.data[&2].deleted_at, 300);
        assert_eq!(record.data[&3].deleted_at, INFINITY_TIME);
        assert_eq!(record.latest_slot().unwrap().data, json!("v3"));

        let versions: Vec<u32> = record.slots().iter().map(|s| s.version).collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn versioned_record_serde_round_trip() {
        let mut record = VersionedRecord::first(json!({"n": 1}), 100, None);
        record.push_version(
            json!({"n": 2}),
            200,
            Some(HashMap::from([("who".to_string(), "tests".to_string())])),
        );

        let text = serde_json::to_string_pretty(&record).unwrap();
        assert!(text.contains("latestVersion"));
        assert!(text.contains("createdAt"));

        let back: VersionedRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn slice_contains_respects_half_open_interval() {
        let slice = Slice {
            data: json!("x"),
            created_at: 0,
            deleted_at: INFINITY_TIME,
            valid_from: 1,
            valid_to: 500,
            metadata: None,
        };
        assert!(slice.contains(1));
        assert!(slice.contains(250));
        assert!(!slice.contains(0));
        assert!(!slice.contains(500));
    }

    #[test]
    fn open_ended_slice_contains_everything_after_start() {
        let slice = Slice {
            data: json!("x"),
            created_at: 0,
            deleted_at: INFINITY_TIME,
            valid_from: 7895,
            valid_to: INFINITY_TIME,
            metadata: None,
        };
        assert!(slice.contains(7895));
        assert!(slice.contains(i64::MAX));
        assert!(!slice.contains(7894));
    }

    #[test]
    fn live_at_skips_superseded_slices() {
        let record = BitemporalRecord {
            data: vec![
                Slice {
                    data: json!("old"),
                    created_at: 0,
                    deleted_at: 10,
                    valid_from: 0,
                    valid_to: INFINITY_TIME,
                    metadata: None,
                },
                Slice {
                    data: json!("new"),
                    created_at: 10,
                    deleted_at: INFINITY_TIME,
                    valid_from: 0,
                    valid_to: INFINITY_TIME,
                    metadata: None,
                },
            ],
        };
        assert_eq!(record.live_at(5).unwrap().data, json!("new"));
        assert_eq!(record.latest_write().unwrap().data, json!("new"));
    }

    #[test]
    fn bitemporal_record_serde_round_trip() {
        let record = BitemporalRecord {
            data: vec![Slice {
                data: json!({"depth": 3}),
                created_at: 42,
                deleted_at: INFINITY_TIME,
                valid_from: 1,
                valid_to: 500,
                metadata: None,
            }],
        };
        let text = serde_json::to_string_pretty(&record).unwrap();
        assert!(text.contains("validFrom"));
        assert!(text.contains("validTo"));

        let back: BitemporalRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }
}
