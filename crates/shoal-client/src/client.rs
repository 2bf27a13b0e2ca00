use std::time::Duration;

use serde::{Deserialize, Serialize};
use shoal_db::{
    Bucket, BucketConfig, DbError, FindOptions, ObjectRecord, PutOptions, ReindexResult,
};
use shoal_server::{Envelope, Request, Response, ServerHandle};
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use crate::find::FindObjects;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    /// The store rejected the request.
    #[error("store error: {0}")]
    Store(#[from] DbError),

    #[error("server is gone")]
    Disconnected,

    #[error("{op} timed out after {timeout_ms}ms")]
    Timeout { op: &'static str, timeout_ms: u64 },

    #[error("unexpected response to {op}: {response}")]
    UnexpectedResponse { op: &'static str, response: String },

    #[error("find stream ended before completion")]
    Truncated,
}

impl ClientError {
    /// The store error name, when the store produced this error.
    pub fn name(&self) -> &'static str {
        match self {
            ClientError::Store(e) => e.name(),
            ClientError::Disconnected => "DisconnectedError",
            ClientError::Timeout { .. } => "TimeoutError",
            ClientError::UnexpectedResponse { .. } => "UnexpectedResponseError",
            ClientError::Truncated => "TruncatedStreamError",
        }
    }

    pub fn is_retriable(&self) -> bool {
        match self {
            ClientError::Store(e) => e.is_retriable(),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upper bound on waiting for a response. Does not cover draining a
    /// find stream.
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
        }
    }
}

/// Async handle to a running server. Cheap to clone; clones share nothing
/// but the request channel, so they can issue requests concurrently.
#[derive(Debug, Clone)]
pub struct Client {
    sender: mpsc::Sender<Envelope>,
    config: ClientConfig,
}

impl Client {
    pub fn new(sender: mpsc::Sender<Envelope>, config: ClientConfig) -> Self {
        Self { sender, config }
    }

    pub fn connect(server: &ServerHandle, config: ClientConfig) -> Self {
        Self::new(server.sender(), config)
    }

    async fn request(&self, request: Request) -> Result<Response, ClientError> {
        let op = request.op();
        let timeout_ms = self.config.request_timeout_ms;
        trace!(op, "request");

        let exchange = async {
            let (reply, rx) = oneshot::channel();
            self.sender
                .send(Envelope { request, reply })
                .await
                .map_err(|_| ClientError::Disconnected)?;
            rx.await.map_err(|_| ClientError::Disconnected)
        };
        match tokio::time::timeout(Duration::from_millis(timeout_ms), exchange).await {
            Ok(Ok(Response::Error(e))) => Err(ClientError::Store(e)),
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout { op, timeout_ms }),
        }
    }

    fn unexpected<T>(op: &'static str, response: Response) -> Result<T, ClientError> {
        Err(ClientError::UnexpectedResponse {
            op,
            response: format!("{response:?}"),
        })
    }

    async fn expect_ok(&self, request: Request) -> Result<(), ClientError> {
        let op = request.op();
        match self.request(request).await? {
            Response::Ok => Ok(()),
            other => Self::unexpected(op, other),
        }
    }

    async fn expect_bucket(&self, request: Request) -> Result<Bucket, ClientError> {
        let op = request.op();
        match self.request(request).await? {
            Response::Bucket(bucket) => Ok(bucket),
            other => Self::unexpected(op, other),
        }
    }

    async fn expect_object(&self, request: Request) -> Result<ObjectRecord, ClientError> {
        let op = request.op();
        match self.request(request).await? {
            Response::Object(record) => Ok(record),
            other => Self::unexpected(op, other),
        }
    }

    // ── Buckets ─────────────────────────────────────────────────

    pub async fn create_bucket(
        &self,
        bucket: &str,
        config: &BucketConfig,
    ) -> Result<Bucket, ClientError> {
        self.expect_bucket(Request::CreateBucket {
            bucket: bucket.to_string(),
            config: config.clone(),
        })
        .await
    }

    pub async fn get_bucket(&self, bucket: &str) -> Result<Bucket, ClientError> {
        self.expect_bucket(Request::GetBucket {
            bucket: bucket.to_string(),
        })
        .await
    }

    pub async fn list_buckets(&self) -> Result<Vec<String>, ClientError> {
        match self.request(Request::ListBuckets).await? {
            Response::Buckets(names) => Ok(names),
            other => Self::unexpected("listBuckets", other),
        }
    }

    pub async fn update_bucket(
        &self,
        bucket: &str,
        config: &BucketConfig,
    ) -> Result<Bucket, ClientError> {
        self.expect_bucket(Request::UpdateBucket {
            bucket: bucket.to_string(),
            config: config.clone(),
        })
        .await
    }

    pub async fn delete_bucket(&self, bucket: &str) -> Result<(), ClientError> {
        self.expect_ok(Request::DeleteBucket {
            bucket: bucket.to_string(),
        })
        .await
    }

    // ── Objects ─────────────────────────────────────────────────

    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        value: bson::Document,
        options: &PutOptions,
    ) -> Result<ObjectRecord, ClientError> {
        self.expect_object(Request::PutObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            value,
            options: options.clone(),
        })
        .await
    }

    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectRecord, ClientError> {
        self.expect_object(Request::GetObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
        .await
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ClientError> {
        self.expect_ok(Request::DeleteObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
        .await
    }

    // ── Queries ─────────────────────────────────────────────────

    /// Start a query. Errors detected before the first record (unknown
    /// bucket, version mismatch, bad filter) are returned here; the records
    /// themselves arrive through the returned stream.
    pub async fn find_objects(
        &self,
        bucket: &str,
        filter: &str,
        options: &FindOptions,
    ) -> Result<FindObjects, ClientError> {
        match self
            .request(Request::FindObjects {
                bucket: bucket.to_string(),
                filter: filter.to_string(),
                options: options.clone(),
            })
            .await?
        {
            Response::Records(rx) => Ok(FindObjects::new(rx)),
            other => Self::unexpected("findObjects", other),
        }
    }

    pub async fn reindex_objects(
        &self,
        bucket: &str,
        batch_size: usize,
    ) -> Result<ReindexResult, ClientError> {
        match self
            .request(Request::ReindexObjects {
                bucket: bucket.to_string(),
                batch_size,
            })
            .await?
        {
            Response::Reindex(result) => Ok(result),
            other => Self::unexpected("reindexObjects", other),
        }
    }
}
