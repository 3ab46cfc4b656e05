//! Error types for resource-tree and request operations.
//!
//! Every asynchronous resource operation reports failure through [`Result`].
//! [`DavError::status_code`] gives the default HTTP mapping; commands that need
//! protocol-specific codes pick them explicitly.

use http::StatusCode;
use thiserror::Error;

/// Result type for resource and dispatch operations.
pub type Result<T> = std::result::Result<T, DavError>;

#[derive(Error, Debug)]
pub enum DavError {
    #[error("resource not found")]
    ResourceNotFound,

    #[error("authentication property missing")]
    AuthenticationPropertyMissing,

    #[error("resource is not a collection")]
    NotACollection,

    #[error("resource is not a file")]
    NotAFile,

    #[error("resource is already attached to a parent")]
    AlreadyAttached,

    #[error("no file system manager registered under `{0}`")]
    UnknownManager(String),

    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    /// Failure that already knows which status the client should see.
    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DavError {
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        DavError::Status {
            status,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            DavError::ResourceNotFound => StatusCode::NOT_FOUND,
            DavError::AuthenticationPropertyMissing => StatusCode::FORBIDDEN,
            DavError::InvalidDestination(_) => StatusCode::BAD_REQUEST,
            DavError::Status { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
