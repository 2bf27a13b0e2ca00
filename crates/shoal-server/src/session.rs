use std::sync::Arc;

use shoal_db::{Cursor, Database, DbError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::{FindEvent, Request, Response};

/// Executes requests against one database.
#[derive(Clone)]
pub struct Session {
    db: Arc<Database>,
    find_buffer: usize,
}

impl Session {
    pub fn new(db: Arc<Database>, find_buffer: usize) -> Self {
        Self {
            db,
            find_buffer: find_buffer.max(1),
        }
    }

    /// Run one request. `FindObjects` must be called from within a tokio
    /// runtime: the cursor is drained by a spawned task.
    pub fn handle(&self, request: Request) -> Response {
        let op = request.op();
        let response = match request {
            Request::CreateBucket { bucket, config } => {
                self.reply(self.db.create_bucket(&bucket, &config), Response::Bucket)
            }
            Request::GetBucket { bucket } => {
                self.reply(self.db.get_bucket(&bucket), Response::Bucket)
            }
            Request::ListBuckets => self.reply(self.db.list_buckets(), Response::Buckets),
            Request::UpdateBucket { bucket, config } => {
                self.reply(self.db.update_bucket(&bucket, &config), Response::Bucket)
            }
            Request::DeleteBucket { bucket } => {
                self.reply(self.db.delete_bucket(&bucket), |()| Response::Ok)
            }
            Request::PutObject {
                bucket,
                key,
                value,
                options,
            } => self.reply(
                self.db.put_object(&bucket, &key, value, &options),
                Response::Object,
            ),
            Request::GetObject { bucket, key } => {
                self.reply(self.db.get_object(&bucket, &key), Response::Object)
            }
            Request::DeleteObject { bucket, key } => {
                self.reply(self.db.delete_object(&bucket, &key), |()| Response::Ok)
            }
            Request::FindObjects {
                bucket,
                filter,
                options,
            } => match self.db.find_objects(&bucket, &filter, &options) {
                Ok(cursor) => Response::Records(self.stream(cursor)),
                Err(e) => Response::Error(e),
            },
            Request::ReindexObjects { bucket, batch_size } => self.reply(
                self.db.reindex_objects(&bucket, batch_size),
                Response::Reindex,
            ),
        };

        if let Response::Error(e) = &response {
            debug!(op, error = e.name(), "request failed: {e}");
        }
        response
    }

    fn reply<T>(&self, result: Result<T, DbError>, ok: impl FnOnce(T) -> Response) -> Response {
        match result {
            Ok(value) => ok(value),
            Err(e) => Response::Error(e),
        }
    }

    fn stream(&self, cursor: Cursor) -> mpsc::Receiver<FindEvent> {
        let (tx, rx) = mpsc::channel(self.find_buffer);
        tokio::spawn(async move {
            let bucket = cursor.bucket().to_string();
            let mut sent = 0usize;
            for record in cursor {
                if tx.send(FindEvent::Record(record)).await.is_err() {
                    debug!(bucket = %bucket, sent, "find consumer went away");
                    return;
                }
                sent += 1;
            }
            if tx.send(FindEvent::End).await.is_err() {
                warn!(bucket = %bucket, sent, "find consumer dropped before end of stream");
            }
        });
        rx
    }
}
