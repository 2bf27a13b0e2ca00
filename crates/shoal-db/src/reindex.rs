use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::table::BucketTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReindexResult {
    /// Rows backfilled by this call.
    pub processed: usize,
    /// Stale rows left after this call.
    pub remaining: usize,
}

/// One backfill step: rebuild index columns for up to `batch_size` stale
/// rows, in key order. Once no stale row is left every pending field is
/// promoted to complete. With nothing stale this returns zero processed.
pub(crate) fn reindex_batch(table: &mut BucketTable, batch_size: usize) -> ReindexResult {
    let keys = table.stale_keys(batch_size);
    let mut processed = 0;
    for key in &keys {
        if table.reindex_row(key) {
            processed += 1;
        }
    }

    let remaining = table.stale_count();
    if remaining == 0 {
        let promoted = table.bucket.mark_reindexed();
        if !promoted.is_empty() {
            info!(
                bucket = table.name(),
                version = table.bucket.version,
                fields = ?promoted,
                "reindex complete"
            );
        }
    }

    debug!(bucket = table.name(), processed, remaining, "reindex batch");
    ReindexResult {
        processed,
        remaining,
    }
}
