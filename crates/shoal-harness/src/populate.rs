use bson::Document;
use futures::future::join_all;
use shoal_client::Client;
use shoal_db::PutOptions;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::HarnessError;

/// Write `count` copies of `template`, each under a fresh uuid key that is
/// also stored in its `uuid` field. Writes go out in waves of at most
/// `concurrency`; transient failures are retried in a later wave, data errors
/// abort. A wave where every write fails aborts too. Returns the keys.
pub async fn add_objects(
    client: &Client,
    bucket: &str,
    template: &Document,
    count: usize,
    concurrency: usize,
) -> Result<Vec<String>, HarnessError> {
    let keys: Vec<String> = (0..count).map(|_| Uuid::new_v4().to_string()).collect();
    let mut pending = keys.clone();
    let mut wave = 0usize;

    while !pending.is_empty() {
        wave += 1;
        let take = pending.len().min(concurrency.max(1));
        let batch: Vec<String> = pending.drain(..take).collect();
        let options = PutOptions::default();

        let results = join_all(batch.iter().map(|key| {
            let mut value = template.clone();
            value.insert("uuid", key.as_str());
            client.put_object(bucket, key, value, &options)
        }))
        .await;

        let mut failed = Vec::new();
        let mut last_error = None;
        for (key, result) in batch.into_iter().zip(results) {
            match result {
                Ok(_) => {}
                Err(e) if !e.is_retriable() => return Err(HarnessError::client("putObject", e)),
                Err(e) => {
                    warn!(bucket, key = %key, error = %e, "put failed, will retry");
                    failed.push(key);
                    last_error = Some(e);
                }
            }
        }

        debug!(bucket, wave, written = take - failed.len(), retry = failed.len(), "population wave");
        if failed.len() == take {
            if let Some(e) = last_error {
                return Err(HarnessError::client("putObject", e));
            }
        }
        pending.extend(failed);
    }

    Ok(keys)
}
