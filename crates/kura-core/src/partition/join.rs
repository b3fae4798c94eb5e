//! Cross-partition joins.
//!
//! A join names its target partition; the handle is fetched through the
//! parent registry on every resolution (late binding), so partitions never
//! hold references to each other and the registry stays the single source
//! of truth. Targets are always treated as plain partitions regardless of
//! their registered flavor.

use serde_json::{Map, Value};

use super::PartitionCore;
use crate::error::{Result, StoreError};
use crate::index::coerce_index_string;

/// A declared foreign-key relationship to another partition.
///
/// With only `left_field`, resolution is a direct `get` on the target using
/// the left record's field value as the key. With `right_field`, the target
/// is scanned linearly for the first record whose `right_field` matches —
/// O(N) in the target's key count.
#[derive(Debug, Clone)]
pub struct Join {
    /// Target partition name, resolved through the registry per call.
    pub db: String,
    /// Field name the joined record is merged under.
    pub name: String,
    /// Field of the left record supplying the lookup value.
    pub left_field: String,
    /// Optional field of the target records to match against.
    pub right_field: Option<String>,
}

impl PartitionCore {
    /// Register a join descriptor. All provided arguments must be
    /// non-empty. Synchronous and non-persistent: joins live only on this
    /// handle.
    pub(crate) fn create_join(
        &self,
        db: &str,
        join_name: &str,
        left_field: &str,
        right_field: Option<&str>,
    ) -> Result<()> {
        if db.is_empty() {
            return Err(StoreError::InvalidArgument(
                "join target partition name is empty".to_string(),
            ));
        }
        if join_name.is_empty() {
            return Err(StoreError::InvalidArgument("join name is empty".to_string()));
        }
        if left_field.is_empty() {
            return Err(StoreError::InvalidArgument(
                "join left field is empty".to_string(),
            ));
        }
        if right_field == Some("") {
            return Err(StoreError::InvalidArgument(
                "join right field is empty".to_string(),
            ));
        }
        self.joins.lock().unwrap().push(Join {
            db: db.to_string(),
            name: join_name.to_string(),
            left_field: left_field.to_string(),
            right_field: right_field.map(|f| f.to_string()),
        });
        Ok(())
    }

    /// Fetch the left record and materialize every registered join.
    ///
    /// Joined records land under their join names first; the left record's
    /// own fields are overlaid on top, so they win any collision. A join
    /// whose left field is absent, or whose target lookup misses,
    /// contributes nothing.
    pub(crate) async fn get_with_joins(&self, key: &str) -> Result<Option<Value>> {
        let joins: Vec<Join> = self.joins.lock().unwrap().clone();
        if joins.is_empty() {
            return Err(StoreError::InvalidArgument(format!(
                "partition '{}' has no joins registered",
                self.name
            )));
        }

        let Some(left) = self.get_latest(key).await else {
            return Ok(None);
        };
        let Value::Object(left_fields) = &left else {
            // Nothing to bind a join against; hand the record back as-is.
            return Ok(Some(left));
        };

        let mut merged = Map::new();
        for join in &joins {
            let target = self.registry.partition_by_name(&join.db)?;
            let Some(left_key) = left_fields.get(&join.left_field).and_then(coerce_index_string)
            else {
                continue;
            };
            let right = match &join.right_field {
                Some(right_field) => target
                    .data()
                    .await
                    .into_iter()
                    .map(|(_, candidate)| candidate)
                    .find(|candidate| {
                        candidate
                            .get(right_field)
                            .and_then(coerce_index_string)
                            .as_deref()
                            == Some(left_key.as_str())
                    }),
                None => target.get(&left_key).await,
            };
            if let Some(right) = right {
                merged.insert(join.name.clone(), right);
            }
        }

        for (field, value) in left_fields {
            merged.insert(field.clone(), value.clone());
        }
        Ok(Some(Value::Object(merged)))
    }
}
