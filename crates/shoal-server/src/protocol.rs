use serde::{Deserialize, Serialize};
use shoal_db::{
    Bucket, BucketConfig, DbError, FindOptions, ObjectRecord, PutOptions, ReindexResult,
};
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    CreateBucket {
        bucket: String,
        config: BucketConfig,
    },
    GetBucket {
        bucket: String,
    },
    ListBuckets,
    UpdateBucket {
        bucket: String,
        config: BucketConfig,
    },
    DeleteBucket {
        bucket: String,
    },
    PutObject {
        bucket: String,
        key: String,
        value: bson::Document,
        options: PutOptions,
    },
    GetObject {
        bucket: String,
        key: String,
    },
    DeleteObject {
        bucket: String,
        key: String,
    },
    FindObjects {
        bucket: String,
        filter: String,
        options: FindOptions,
    },
    ReindexObjects {
        bucket: String,
        batch_size: usize,
    },
}

impl Request {
    pub fn op(&self) -> &'static str {
        match self {
            Request::CreateBucket { .. } => "createBucket",
            Request::GetBucket { .. } => "getBucket",
            Request::ListBuckets => "listBuckets",
            Request::UpdateBucket { .. } => "updateBucket",
            Request::DeleteBucket { .. } => "deleteBucket",
            Request::PutObject { .. } => "putObject",
            Request::GetObject { .. } => "getObject",
            Request::DeleteObject { .. } => "delObject",
            Request::FindObjects { .. } => "findObjects",
            Request::ReindexObjects { .. } => "reindexObjects",
        }
    }
}

#[derive(Debug)]
pub enum Response {
    Ok,
    Bucket(Bucket),
    Buckets(Vec<String>),
    Object(ObjectRecord),
    Reindex(ReindexResult),
    /// Records stream in as the cursor advances. A complete stream ends
    /// with `End`; a stream that closes without it was cut short.
    Records(mpsc::Receiver<FindEvent>),
    Error(DbError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FindEvent {
    Record(ObjectRecord),
    End,
}

/// One request in flight, with the channel its response goes back on.
#[derive(Debug)]
pub struct Envelope {
    pub request: Request,
    pub reply: oneshot::Sender<Response>,
}
