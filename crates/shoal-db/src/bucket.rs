use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shoal_query::FieldType;

use crate::error::DbError;

/// Caller-supplied bucket definition, used for both create and update.
///
/// ```json
/// { "index": { "uuid": { "type": "string", "unique": true } },
///   "options": { "version": 2 } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    #[serde(default)]
    pub index: BTreeMap<String, IndexConfig>,
    #[serde(default)]
    pub options: BucketOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub unique: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl BucketConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, field: impl Into<String>, field_type: FieldType) -> Self {
        self.index.insert(
            field.into(),
            IndexConfig {
                field_type,
                unique: false,
            },
        );
        self
    }

    pub fn with_unique_index(mut self, field: impl Into<String>, field_type: FieldType) -> Self {
        self.index.insert(
            field.into(),
            IndexConfig {
                field_type,
                unique: true,
            },
        );
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.options.version = Some(version);
        self
    }
}

/// Whether existing objects have been backfilled for an indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// Declared after objects existed; some of them lack the index column.
    PendingReindex,
    /// Every object's index column is populated.
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedField {
    pub field_type: FieldType,
    pub unique: bool,
    pub since_version: u32,
    pub state: IndexState,
}

impl IndexedField {
    pub fn reindex_complete(&self) -> bool {
        self.state == IndexState::Complete
    }
}

/// Bucket metadata: name, schema version and the indexed field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    pub version: u32,
    pub index: BTreeMap<String, IndexedField>,
}

impl Bucket {
    /// Initial schema. The bucket is empty, so every field starts complete.
    pub fn create(name: &str, config: &BucketConfig) -> Result<Self, DbError> {
        validate_name(name)?;
        let version = config.options.version.unwrap_or(1);
        if version == 0 {
            return Err(DbError::InvalidBucketConfig(
                "bucket version must be at least 1".into(),
            ));
        }

        let mut index = BTreeMap::new();
        for (field, def) in &config.index {
            validate_field(field)?;
            index.insert(
                field.clone(),
                IndexedField {
                    field_type: def.field_type,
                    unique: def.unique,
                    since_version: version,
                    state: IndexState::Complete,
                },
            );
        }

        Ok(Self {
            name: name.to_string(),
            version,
            index,
        })
    }

    /// Next schema version. Fields are only ever added; added fields start
    /// pending when the bucket already holds objects.
    pub fn evolve(&self, config: &BucketConfig, has_objects: bool) -> Result<Self, DbError> {
        let version = match config.options.version {
            Some(requested) if requested <= self.version => {
                return Err(DbError::VersionConflict {
                    bucket: self.name.clone(),
                    current: self.version,
                    requested,
                });
            }
            Some(requested) => requested,
            None => self.version.checked_add(1).ok_or_else(|| {
                DbError::InvalidBucketConfig(format!(
                    "bucket {} is at the last schema version {}",
                    self.name, self.version
                ))
            })?,
        };

        for (field, existing) in &self.index {
            match config.index.get(field) {
                None => {
                    return Err(DbError::InvalidBucketConfig(format!(
                        "index {field} cannot be removed from bucket {}",
                        self.name
                    )));
                }
                Some(def) if def.field_type != existing.field_type => {
                    return Err(DbError::InvalidBucketConfig(format!(
                        "index {field} cannot change type from {} to {}",
                        existing.field_type, def.field_type
                    )));
                }
                Some(def) if def.unique != existing.unique => {
                    return Err(DbError::InvalidBucketConfig(format!(
                        "index {field} cannot change its unique flag"
                    )));
                }
                Some(_) => {}
            }
        }

        let mut index = self.index.clone();
        for (field, def) in &config.index {
            if index.contains_key(field) {
                continue;
            }
            validate_field(field)?;
            let state = if has_objects {
                IndexState::PendingReindex
            } else {
                IndexState::Complete
            };
            index.insert(
                field.clone(),
                IndexedField {
                    field_type: def.field_type,
                    unique: def.unique,
                    since_version: version,
                    state,
                },
            );
        }

        Ok(Self {
            name: self.name.clone(),
            version,
            index,
        })
    }

    /// Promote every pending field once no object predates the current version.
    pub fn mark_reindexed(&mut self) -> Vec<String> {
        let mut promoted = Vec::new();
        for (field, def) in self.index.iter_mut() {
            if def.state == IndexState::PendingReindex {
                def.state = IndexState::Complete;
                promoted.push(field.clone());
            }
        }
        promoted
    }

    pub fn field(&self, name: &str) -> Option<&IndexedField> {
        self.index.get(name)
    }

    pub fn has_pending_reindex(&self) -> bool {
        self.index
            .values()
            .any(|f| f.state == IndexState::PendingReindex)
    }

    /// Fields whose index columns exist on a row materialized at `version`.
    pub fn fields_at(&self, version: u32) -> impl Iterator<Item = (&String, &IndexedField)> {
        self.index
            .iter()
            .filter(move |(_, def)| def.since_version <= version)
    }
}

fn validate_name(name: &str) -> Result<(), DbError> {
    if name.is_empty() {
        return Err(DbError::InvalidBucketConfig("bucket name must not be empty".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(DbError::InvalidBucketConfig(format!(
            "bucket name {name:?} may only contain letters, digits, '_' and '-'"
        )));
    }
    Ok(())
}

fn validate_field(field: &str) -> Result<(), DbError> {
    if field.is_empty() || field.contains(['(', ')', '=', '&', '\0']) {
        return Err(DbError::InvalidBucketConfig(format!(
            "invalid index name {field:?}"
        )));
    }
    Ok(())
}
