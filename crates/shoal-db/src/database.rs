use bson::Document;
use serde::{Deserialize, Serialize};
use shoal_query::{Filter, parse_filter};
use tracing::{debug, info};

use crate::bucket::{Bucket, BucketConfig};
use crate::catalog::Catalog;
use crate::cursor::Cursor;
use crate::error::DbError;
use crate::planner;
use crate::record::{ObjectRecord, validate_document};
use crate::reindex::{self, ReindexResult};
use crate::resolver;
use crate::table::BucketTable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Row cap applied to `find_objects` unless the caller sets `limit` or `no_limit`.
    pub default_find_limit: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            default_find_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PutOptions {
    /// Conditional write. `Some(None)` requires the object to be absent,
    /// `Some(Some(etag))` requires its current etag to equal `etag`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_bucket_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Return every match, ignoring the default row cap.
    #[serde(default)]
    pub no_limit: bool,
}

impl FindOptions {
    pub fn required_version(version: u32) -> Self {
        Self {
            required_bucket_version: Some(version),
            ..Self::default()
        }
    }

    pub fn unbounded(mut self) -> Self {
        self.no_limit = true;
        self
    }
}

pub struct Database {
    catalog: Catalog,
    config: DatabaseConfig,
}

impl Database {
    pub fn open(config: DatabaseConfig) -> Self {
        Self {
            catalog: Catalog::new(),
            config,
        }
    }

    // ── Buckets ─────────────────────────────────────────────────

    pub fn create_bucket(&self, name: &str, config: &BucketConfig) -> Result<Bucket, DbError> {
        let bucket = Bucket::create(name, config)?;
        self.catalog.insert(BucketTable::new(bucket.clone()))?;
        info!(bucket = name, version = bucket.version, "bucket created");
        Ok(bucket)
    }

    pub fn get_bucket(&self, name: &str) -> Result<Bucket, DbError> {
        Ok(self.catalog.snapshot(name)?.bucket.clone())
    }

    pub fn list_buckets(&self) -> Result<Vec<String>, DbError> {
        self.catalog.names()
    }

    /// Move the bucket to its next schema version. Fields added while objects
    /// exist stay pending until `reindex_objects` has covered every object.
    pub fn update_bucket(&self, name: &str, config: &BucketConfig) -> Result<Bucket, DbError> {
        let bucket = self.catalog.mutate(name, |table| {
            let next = table.bucket.evolve(config, !table.is_empty())?;
            table.set_bucket(next)?;
            Ok(table.bucket.clone())
        })?;
        info!(
            bucket = name,
            version = bucket.version,
            pending_reindex = bucket.has_pending_reindex(),
            "bucket updated"
        );
        Ok(bucket)
    }

    pub fn delete_bucket(&self, name: &str) -> Result<(), DbError> {
        self.catalog.remove(name)?;
        info!(bucket = name, "bucket deleted");
        Ok(())
    }

    // ── Objects ─────────────────────────────────────────────────

    pub fn put_object(
        &self,
        bucket: &str,
        key: &str,
        value: Document,
        options: &PutOptions,
    ) -> Result<ObjectRecord, DbError> {
        if key.is_empty() {
            return Err(DbError::InvalidObject("object key must not be empty".into()));
        }
        validate_document(&value)?;

        let record = self.catalog.mutate(bucket, |table| {
            if let Some(expected) = &options.etag {
                let actual = table.rows.get(key).map(|row| row.etag.clone());
                if *expected != actual {
                    return Err(DbError::EtagConflict {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                        expected: expected.clone(),
                        actual,
                    });
                }
            }
            let row = table.put(key, value)?;
            Ok(row.to_record(bucket))
        })?;
        debug!(bucket, key, version = record.written_at_version, "object put");
        Ok(record)
    }

    pub fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectRecord, DbError> {
        let table = self.catalog.snapshot(bucket)?;
        table
            .rows
            .get(key)
            .map(|row| row.to_record(bucket))
            .ok_or_else(|| DbError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }

    pub fn delete_object(&self, bucket: &str, key: &str) -> Result<(), DbError> {
        self.catalog.mutate(bucket, |table| {
            table
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| DbError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                })
        })?;
        debug!(bucket, key, "object deleted");
        Ok(())
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Parse `filter` and start a query. See [`Database::find`].
    pub fn find_objects(
        &self,
        bucket: &str,
        filter: &str,
        options: &FindOptions,
    ) -> Result<Cursor, DbError> {
        let filter = parse_filter(filter)?;
        self.find(bucket, &filter, options)
    }

    /// Resolve the filter against the bucket's current schema and return a
    /// lazy cursor over a snapshot taken now.
    pub fn find(
        &self,
        bucket: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Cursor, DbError> {
        let table = self.catalog.snapshot(bucket)?;
        resolver::check_required_version(&table.bucket, options.required_bucket_version)?;
        let predicate = resolver::resolve(&table.bucket, filter)?;

        let limit = if options.no_limit {
            None
        } else {
            Some(options.limit.unwrap_or(self.config.default_find_limit))
        };
        let plan = planner::plan(predicate, limit);
        debug!(bucket, %filter, access = ?plan.access, "find objects");
        Ok(Cursor::new(table, plan))
    }

    // ── Reindex ─────────────────────────────────────────────────

    /// Run one reindex batch of at most `batch_size` objects.
    pub fn reindex_objects(&self, bucket: &str, batch_size: usize) -> Result<ReindexResult, DbError> {
        if batch_size == 0 {
            return Err(DbError::InvalidQuery(
                "reindex batch size must be at least 1".into(),
            ));
        }
        self.catalog
            .mutate(bucket, |table| Ok(reindex::reindex_batch(table, batch_size)))
    }
}
