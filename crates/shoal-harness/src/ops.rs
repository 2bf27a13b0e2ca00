//! Store operations as the scenarios use them. Each maps client failures to
//! a `HarnessError` naming the operation.

use bson::Document;
use shoal_client::{Client, ClientError};
use shoal_db::{Bucket, BucketConfig, DbError, FindOptions, ObjectRecord};
use tracing::{debug, info};

use crate::error::HarnessError;
use crate::expect;

/// Delete `bucket`; a bucket that does not exist counts as deleted.
pub async fn delete_bucket(client: &Client, bucket: &str) -> Result<(), HarnessError> {
    match client.delete_bucket(bucket).await {
        Ok(()) => Ok(()),
        Err(ClientError::Store(DbError::BucketNotFound(_))) => {
            debug!(bucket, "bucket already absent");
            Ok(())
        }
        Err(e) => Err(HarnessError::client("deleteBucket", e)),
    }
}

pub async fn create_bucket(
    client: &Client,
    bucket: &str,
    config: &BucketConfig,
) -> Result<Bucket, HarnessError> {
    client
        .create_bucket(bucket, config)
        .await
        .map_err(|e| HarnessError::client("createBucket", e))
}

pub async fn update_bucket(
    client: &Client,
    bucket: &str,
    config: &BucketConfig,
) -> Result<Bucket, HarnessError> {
    client
        .update_bucket(bucket, config)
        .await
        .map_err(|e| HarnessError::client("updateBucket", e))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReindexSummary {
    pub calls: usize,
    pub processed: usize,
}

/// Call `reindex_objects` until a call processes nothing.
pub async fn reindex_bucket(
    client: &Client,
    bucket: &str,
    batch_size: usize,
) -> Result<ReindexSummary, HarnessError> {
    let mut summary = ReindexSummary {
        calls: 0,
        processed: 0,
    };
    loop {
        let result = client
            .reindex_objects(bucket, batch_size)
            .await
            .map_err(|e| HarnessError::client("reindexObjects", e))?;
        summary.calls += 1;
        if result.processed == 0 {
            break;
        }
        summary.processed += result.processed;
        debug!(bucket, processed = result.processed, remaining = result.remaining, "reindexed batch");
    }
    info!(bucket, calls = summary.calls, processed = summary.processed, "reindex finished");
    Ok(summary)
}

/// Run `filter` at schema `version` and collect every record.
pub async fn find_objects_with_filter(
    client: &Client,
    bucket: &str,
    filter: &str,
    version: u32,
) -> Result<Vec<ObjectRecord>, HarnessError> {
    let options = FindOptions::required_version(version).unbounded();
    let stream = client
        .find_objects(bucket, filter, &options)
        .await
        .map_err(|e| HarnessError::client("findObjects", e))?;
    stream
        .collect_all()
        .await
        .map_err(|e| HarnessError::client("findObjects", e))
}

/// Run `filter` and check both the number of results and that every result
/// carries the `expected` field values.
pub async fn search_for_objects(
    client: &Client,
    bucket: &str,
    filter: &str,
    version: u32,
    expected_count: usize,
    expected: &Document,
) -> Result<Vec<ObjectRecord>, HarnessError> {
    let records = find_objects_with_filter(client, bucket, filter, version).await?;
    debug!(bucket, filter, version, found = records.len(), "search");
    expect::count(&records, expected_count)?;
    expect::properties(&records, expected)?;
    Ok(records)
}

/// Run `filter` at a stale `version` and require the version guard to fire.
pub async fn expect_version_mismatch(
    client: &Client,
    bucket: &str,
    filter: &str,
    version: u32,
) -> Result<(), HarnessError> {
    let options = FindOptions::required_version(version);
    match client.find_objects(bucket, filter, &options).await {
        Err(ClientError::Store(DbError::SchemaVersionMismatch { .. })) => Ok(()),
        Err(e) => Err(HarnessError::client("findObjects", e)),
        Ok(stream) => {
            let found = stream.collect_all().await.map(|r| r.len());
            Err(HarnessError::Outcome {
                expected: "SchemaVersionMismatchError".into(),
                actual: match found {
                    Ok(n) => format!("{n} objects"),
                    Err(e) => e.to_string(),
                },
            })
        }
    }
}
