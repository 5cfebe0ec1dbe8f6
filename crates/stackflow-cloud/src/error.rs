//! Remote platform error types

use thiserror::Error;

/// Errors returned by a [`ResourceApi`](crate::ResourceApi) backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// A create collided with an existing resource of the same name and scope
    #[error("Resource already exists: {0}")]
    ResourceAlreadyExists(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Platform unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl CloudError {
    /// Whether the failure is transient and the call may succeed later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CloudError::ApiError(_) | CloudError::Unavailable(_) | CloudError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for CloudError {
    fn from(err: serde_json::Error) -> Self {
        CloudError::Json(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
