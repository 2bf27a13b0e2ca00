use std::path::PathBuf;

use shoal_client::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("invalid config: {0}")]
    Config(String),

    #[error("reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{op}: {source}")]
    Client {
        op: &'static str,
        #[source]
        source: ClientError,
    },

    #[error("expected {expected} objects, found {actual}")]
    Count { expected: usize, actual: usize },

    #[error("object {key}: {field} expected {expected}, found {actual}")]
    Property {
        key: String,
        field: String,
        expected: String,
        actual: String,
    },

    #[error("expected {expected}, got {actual}")]
    Outcome { expected: String, actual: String },

    #[error("step {index} ({step}): {source}")]
    Step {
        index: usize,
        step: String,
        #[source]
        source: Box<HarnessError>,
    },
}

impl HarnessError {
    pub fn client(op: &'static str, source: ClientError) -> Self {
        HarnessError::Client { op, source }
    }
}
