use std::io;

use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The collaborator reported its specific "missing object" condition.
    #[error("object {bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    #[error("invalid object key: {0:?}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // Any other collaborator failure, kept unchanged as the source.
    #[error("{operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BoxError,
    },
}

impl StorageError {
    pub fn backend(operation: &'static str, source: impl Into<BoxError>) -> Self {
        StorageError::Backend {
            operation,
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to serialize segment: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to send segment: {0}")]
    Send(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("invalid invocation event: {0}")]
    InvalidEvent(#[from] serde_json::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
