use std::collections::BTreeSet;
use std::ops::Bound;

use bson::Document;
use imbl::OrdMap;
use shoal_query::TypedValue;

use crate::bucket::{Bucket, IndexState};
use crate::encoding;
use crate::error::DbError;
use crate::record::{Row, bson_type_name};

/// One bucket's data: schema, rows by key, and the index column entries.
///
/// Cloning is cheap (structural sharing), which is what lets every write
/// publish a fresh immutable snapshot while readers keep the old one.
#[derive(Debug, Clone)]
pub(crate) struct BucketTable {
    pub bucket: Bucket,
    pub rows: OrdMap<String, Row>,
    pub index: OrdMap<Vec<u8>, String>,
    next_id: u64,
    generation: u64,
}

impl BucketTable {
    pub fn new(bucket: Bucket) -> Self {
        Self {
            bucket,
            rows: OrdMap::new(),
            index: OrdMap::new(),
            next_id: 1,
            generation: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.bucket.name
    }

    // ── Writes ──────────────────────────────────────────────────

    /// Insert or replace the row at `key`, maintaining index entries.
    pub fn put(&mut self, key: &str, value: Document) -> Result<&Row, DbError> {
        self.check_index_types(&value)?;
        self.check_unique(key, &value)?;

        self.generation += 1;
        let version = self.bucket.version;
        let id = match self.rows.get(key) {
            Some(existing) => existing.id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        };
        let row = Row {
            id,
            key: key.to_string(),
            value,
            etag: format!("{:016X}", self.generation),
            mtime: bson::DateTime::now(),
            written_at_version: version,
            indexed_version: version,
        };

        if let Some(old) = self.rows.remove(key) {
            self.unindex_row(&old);
        }
        self.index_row(&row);
        self.rows.insert(key.to_string(), row);
        self.rows
            .get(key)
            .ok_or_else(|| DbError::Internal(format!("row {key} vanished after insert")))
    }

    pub fn remove(&mut self, key: &str) -> Option<Row> {
        let row = self.rows.remove(key)?;
        self.unindex_row(&row);
        Some(row)
    }

    /// Rebuild one row's index entries for the current schema version.
    pub fn reindex_row(&mut self, key: &str) -> bool {
        let Some(mut row) = self.rows.get(key).cloned() else {
            return false;
        };
        self.unindex_row(&row);
        row.indexed_version = self.bucket.version;
        self.index_row(&row);
        self.rows.insert(key.to_string(), row);
        true
    }

    /// Swap in a new schema version.
    pub fn set_bucket(&mut self, bucket: Bucket) -> Result<(), DbError> {
        for (field, def) in &bucket.index {
            if def.unique && !self.bucket.index.contains_key(field) {
                self.check_existing_unique(field, def.field_type)?;
            }
        }
        self.bucket = bucket;
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// First row with key strictly greater than `after` (or the first row).
    pub fn next_row(&self, after: Option<&str>) -> Option<&Row> {
        let lower = match after {
            Some(k) => Bound::Excluded(k.to_string()),
            None => Bound::Unbounded,
        };
        self.rows
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(_, row)| row)
    }

    /// First index entry under `prefix` strictly after `after`.
    pub fn next_index_entry(&self, prefix: &[u8], after: Option<&[u8]>) -> Option<(&Vec<u8>, &String)> {
        let lower = match after {
            Some(k) => Bound::Excluded(k.to_vec()),
            None => Bound::Included(prefix.to_vec()),
        };
        self.index
            .range((lower, Bound::Unbounded))
            .next()
            .filter(|(k, _)| k.starts_with(prefix))
    }

    /// Rows whose index columns predate the current schema version.
    pub fn stale_keys(&self, limit: usize) -> Vec<String> {
        let version = self.bucket.version;
        self.rows
            .values()
            .filter(|row| row.indexed_version < version)
            .take(limit)
            .map(|row| row.key.clone())
            .collect()
    }

    pub fn stale_count(&self) -> usize {
        let version = self.bucket.version;
        self.rows
            .values()
            .filter(|row| row.indexed_version < version)
            .count()
    }

    // ── Private helpers ─────────────────────────────────────────

    fn index_entries(&self, row: &Row) -> Vec<Vec<u8>> {
        self.bucket
            .fields_at(row.indexed_version)
            .filter_map(|(field, def)| {
                let stored = row.value.get(field)?;
                let typed = TypedValue::from_stored(stored, def.field_type)?;
                Some(encoding::index_key(field, &typed, &row.key))
            })
            .collect()
    }

    fn index_row(&mut self, row: &Row) {
        for key in self.index_entries(row) {
            self.index.insert(key, row.key.clone());
        }
    }

    fn unindex_row(&mut self, row: &Row) {
        for key in self.index_entries(row) {
            self.index.remove(&key);
        }
    }

    fn check_index_types(&self, value: &Document) -> Result<(), DbError> {
        for (field, def) in &self.bucket.index {
            match value.get(field) {
                None | Some(bson::Bson::Null) => {}
                Some(stored) => {
                    if TypedValue::from_stored(stored, def.field_type).is_none() {
                        return Err(DbError::InvalidIndexType {
                            bucket: self.bucket.name.clone(),
                            field: field.clone(),
                            expected: def.field_type,
                            actual: bson_type_name(stored).to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Unique fields are checked against every row. Fields whose backfill is
    /// incomplete cannot trust the index and fall back to raw values.
    fn check_unique(&self, key: &str, value: &Document) -> Result<(), DbError> {
        for (field, def) in self.bucket.index.iter().filter(|(_, d)| d.unique) {
            let Some(typed) = value
                .get(field)
                .and_then(|v| TypedValue::from_stored(v, def.field_type))
            else {
                continue;
            };

            let taken = match def.state {
                IndexState::Complete => {
                    let prefix = encoding::index_scan_prefix(field, &typed);
                    let mut after: Option<Vec<u8>> = None;
                    let mut hit = false;
                    while let Some((entry, owner)) = self.next_index_entry(&prefix, after.as_deref()) {
                        if owner != key && self.row_matches(owner, field, &typed) {
                            hit = true;
                            break;
                        }
                        after = Some(entry.clone());
                    }
                    hit
                }
                IndexState::PendingReindex => self.rows.values().any(|row| {
                    row.key != key && row.value.get(field).is_some_and(|v| typed.matches(v))
                }),
            };

            if taken {
                return Err(DbError::UniqueAttribute {
                    bucket: self.bucket.name.clone(),
                    field: field.clone(),
                    value: typed.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_existing_unique(
        &self,
        field: &str,
        field_type: shoal_query::FieldType,
    ) -> Result<(), DbError> {
        let mut seen: BTreeSet<Vec<u8>> = BTreeSet::new();
        for row in self.rows.values() {
            let Some(typed) = row
                .value
                .get(field)
                .and_then(|v| TypedValue::from_stored(v, field_type))
            else {
                continue;
            };
            if !seen.insert(encoding::encode_value(&typed)) {
                return Err(DbError::UniqueAttribute {
                    bucket: self.bucket.name.clone(),
                    field: field.to_string(),
                    value: typed.to_string(),
                });
            }
        }
        Ok(())
    }

    fn row_matches(&self, key: &str, field: &str, typed: &TypedValue) -> bool {
        self.rows
            .get(key)
            .and_then(|row| row.value.get(field))
            .is_some_and(|v| typed.matches(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::BucketConfig;
    use bson::doc;
    use shoal_query::FieldType;

    fn table() -> BucketTable {
        let config = BucketConfig::new()
            .with_unique_index("uuid", FieldType::String)
            .with_index("name", FieldType::String);
        BucketTable::new(Bucket::create("t", &config).unwrap())
    }

    #[test]
    fn put_indexes_declared_fields_only() {
        let mut t = table();
        t.put("k1", doc! { "uuid": "k1", "name": "bar", "extra": true }).unwrap();
        // uuid + name
        assert_eq!(t.index.len(), 2);
    }

    #[test]
    fn overwrite_keeps_id_and_replaces_entries() {
        let mut t = table();
        let first = t.put("k1", doc! { "uuid": "k1", "name": "foo" }).unwrap().clone();
        let second = t.put("k1", doc! { "uuid": "k1", "name": "bar" }).unwrap().clone();
        assert_eq!(first.id, second.id);
        assert_ne!(first.etag, second.etag);
        assert_eq!(t.index.len(), 2);
        let prefix = encoding::index_scan_prefix("name", &TypedValue::String("foo".into()));
        assert!(t.next_index_entry(&prefix, None).is_none());
    }

    #[test]
    fn unique_violation_is_rejected() {
        let mut t = table();
        t.put("k1", doc! { "uuid": "same" }).unwrap();
        let err = t.put("k2", doc! { "uuid": "same" }).unwrap_err();
        assert_eq!(err.name(), "UniqueAttributeError");
    }

    #[test]
    fn new_unique_field_checks_existing_values_exactly() {
        let mut t = table();
        t.put("k1", doc! { "n": 9_007_199_254_740_992_i64 }).unwrap();
        t.put("k2", doc! { "n": 9_007_199_254_740_993_i64 }).unwrap();
        let unique_n = |t: &BucketTable| {
            let config = BucketConfig::new()
                .with_unique_index("uuid", FieldType::String)
                .with_index("name", FieldType::String)
                .with_unique_index("n", FieldType::Number);
            t.bucket.evolve(&config, true).unwrap()
        };
        t.set_bucket(unique_n(&t)).unwrap();

        let mut t = table();
        t.put("k1", doc! { "n": 42_i32 }).unwrap();
        t.put("k2", doc! { "n": 42.0 }).unwrap();
        let err = t.set_bucket(unique_n(&t)).unwrap_err();
        assert_eq!(err.name(), "UniqueAttributeError");
    }

    #[test]
    fn wrong_index_type_is_rejected() {
        let mut t = table();
        let err = t.put("k1", doc! { "name": 5_i64 }).unwrap_err();
        assert_eq!(err.name(), "InvalidIndexTypeError");
        assert!(!err.is_retriable());
    }

    #[test]
    fn remove_drops_index_entries() {
        let mut t = table();
        t.put("k1", doc! { "uuid": "k1", "name": "bar" }).unwrap();
        assert!(t.remove("k1").is_some());
        assert!(t.index.is_empty());
        assert!(t.is_empty());
    }
}
