//! Resolution error taxonomy

use serde::{Deserialize, Serialize};
use stackflow_cloud::{CloudError, ResourceKind, Scope};
use thiserror::Error;

/// What was being resolved when an error occurred
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub name: String,
    pub scope: Scope,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, name: impl Into<String>, scope: Scope) -> Self {
        Self {
            kind,
            name: name.into(),
            scope,
        }
    }

    pub fn global(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self::new(kind, name, Scope::global())
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} '{}' ({})", self.kind, self.name, self.scope)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("{target} not found")]
    NotFound { target: ResourceRef },

    #[error("{target} is ambiguous: {} candidates ({})", .candidates.len(), .candidates.join(", "))]
    Ambiguous {
        target: ResourceRef,
        candidates: Vec<String>,
    },

    #[error("platform unavailable while resolving {target}: {message}")]
    RemoteUnavailable { target: ResourceRef, message: String },

    #[error("invalid spec for {target}: {reason}")]
    InvalidSpec { target: ResourceRef, reason: String },

    #[error("refusing to delete {target} ({resource_id}): not created by this controller")]
    OwnershipConflict {
        target: ResourceRef,
        resource_id: String,
    },

    #[error("invariant violated for {target}: {detail}")]
    InvariantViolation { target: ResourceRef, detail: String },
}

/// Error class, used for status conditions and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    NotFound,
    Ambiguous,
    RemoteUnavailable,
    InvalidSpec,
    OwnershipConflict,
    InvariantViolation,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::NotFound => write!(f, "NotFound"),
            ErrorClass::Ambiguous => write!(f, "Ambiguous"),
            ErrorClass::RemoteUnavailable => write!(f, "RemoteUnavailable"),
            ErrorClass::InvalidSpec => write!(f, "InvalidSpec"),
            ErrorClass::OwnershipConflict => write!(f, "OwnershipConflict"),
            ErrorClass::InvariantViolation => write!(f, "InvariantViolation"),
        }
    }
}

impl ResolveError {
    pub fn not_found(target: ResourceRef) -> Self {
        ResolveError::NotFound { target }
    }

    pub fn invalid(target: ResourceRef, reason: impl Into<String>) -> Self {
        ResolveError::InvalidSpec {
            target,
            reason: reason.into(),
        }
    }

    pub fn invariant(target: ResourceRef, detail: impl Into<String>) -> Self {
        ResolveError::InvariantViolation {
            target,
            detail: detail.into(),
        }
    }

    /// Classify a platform error raised while working on `target`
    pub fn remote(target: ResourceRef, err: CloudError) -> Self {
        match err {
            CloudError::ResourceNotFound(_) => ResolveError::NotFound { target },
            CloudError::InvalidRequest(reason) => ResolveError::InvalidSpec { target, reason },
            CloudError::ResourceAlreadyExists(existing) => ResolveError::Ambiguous {
                target,
                candidates: vec![existing],
            },
            other => ResolveError::RemoteUnavailable {
                target,
                message: other.to_string(),
            },
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ResolveError::NotFound { .. } => ErrorClass::NotFound,
            ResolveError::Ambiguous { .. } => ErrorClass::Ambiguous,
            ResolveError::RemoteUnavailable { .. } => ErrorClass::RemoteUnavailable,
            ResolveError::InvalidSpec { .. } => ErrorClass::InvalidSpec,
            ResolveError::OwnershipConflict { .. } => ErrorClass::OwnershipConflict,
            ResolveError::InvariantViolation { .. } => ErrorClass::InvariantViolation,
        }
    }

    pub fn target(&self) -> &ResourceRef {
        match self {
            ResolveError::NotFound { target }
            | ResolveError::Ambiguous { target, .. }
            | ResolveError::RemoteUnavailable { target, .. }
            | ResolveError::InvalidSpec { target, .. }
            | ResolveError::OwnershipConflict { target, .. }
            | ResolveError::InvariantViolation { target, .. } => target,
        }
    }

    /// Only transient platform failures are worth an automatic retry
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::RemoteUnavailable
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;
