use shoal_query::{CoercionError, FieldType, FilterParseError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DbError {
    #[error("bucket {0} does not exist")]
    BucketNotFound(String),

    #[error("bucket {0} already exists")]
    BucketAlreadyExists(String),

    #[error("bucket {bucket}: version {requested} is not newer than current version {current}")]
    VersionConflict {
        bucket: String,
        current: u32,
        requested: u32,
    },

    #[error("invalid bucket config: {0}")]
    InvalidBucketConfig(String),

    #[error("bucket {bucket}: index {field} requires a {expected} value, got {actual}")]
    InvalidIndexType {
        bucket: String,
        field: String,
        expected: FieldType,
        actual: String,
    },

    #[error("bucket {bucket}: unique index {field} already has value {value}")]
    UniqueAttribute {
        bucket: String,
        field: String,
        value: String,
    },

    #[error("bucket {bucket}: required version {required}, bucket is at version {current}")]
    SchemaVersionMismatch {
        bucket: String,
        required: u32,
        current: u32,
    },

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("object {key} not found in bucket {bucket}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("bucket {bucket}: etag mismatch on {key} (expected {expected:?}, found {actual:?})")]
    EtagConflict {
        bucket: String,
        key: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    #[error("invalid object: {0}")]
    InvalidObject(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DbError {
    /// The store's name for this error, as clients match on it.
    pub fn name(&self) -> &'static str {
        match self {
            DbError::BucketNotFound(_) => "BucketNotFoundError",
            DbError::BucketAlreadyExists(_) => "BucketAlreadyExistsError",
            DbError::VersionConflict { .. } => "VersionConflictError",
            DbError::InvalidBucketConfig(_) => "InvalidBucketConfigError",
            DbError::InvalidIndexType { .. } => "InvalidIndexTypeError",
            DbError::UniqueAttribute { .. } => "UniqueAttributeError",
            DbError::SchemaVersionMismatch { .. } => "SchemaVersionMismatchError",
            DbError::InvalidQuery(_) => "InvalidQueryError",
            DbError::ObjectNotFound { .. } => "ObjectNotFoundError",
            DbError::EtagConflict { .. } => "EtagConflictError",
            DbError::InvalidObject(_) => "InvalidObjectError",
            DbError::Internal(_) => "InternalError",
        }
    }

    /// Data errors are never retried by writers; everything else may be.
    pub fn is_retriable(&self) -> bool {
        !matches!(
            self,
            DbError::InvalidIndexType { .. } | DbError::UniqueAttribute { .. }
        )
    }
}

impl From<FilterParseError> for DbError {
    fn from(e: FilterParseError) -> Self {
        DbError::InvalidQuery(e.to_string())
    }
}

impl From<CoercionError> for DbError {
    fn from(e: CoercionError) -> Self {
        DbError::InvalidQuery(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for DbError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        DbError::Internal(format!("lock poisoned: {e}"))
    }
}
