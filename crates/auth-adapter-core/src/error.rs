// Error taxonomy shared by every adapter.
//
// "Not found" is never an error here: lookups return `Ok(None)`. The variants
// below cover uniqueness violations, mutations aimed at missing records,
// malformed input, and failures coming from the storage engine itself.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Boxed source error carried by [`BackendError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Entity kinds named in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Entity {
    User,
    Account,
    Session,
    VerificationToken,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Account => "account",
            Self::Session => "session",
            Self::VerificationToken => "verificationToken",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input rejected before any storage call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{entity}.{field} must not be empty")]
    Empty { entity: Entity, field: &'static str },

    #[error("{entity}.{field} is malformed: {reason}")]
    Malformed {
        entity: Entity,
        field: &'static str,
        reason: String,
    },

    #[error("update for {entity} {key} changes nothing")]
    EmptyUpdate { entity: Entity, key: String },
}

/// A failure that originated below the contract.
///
/// The source is kept intact so callers can inspect the driver error.
#[derive(Debug, thiserror::Error)]
#[error("{backend} backend failed during {operation}: {source}")]
pub struct BackendError {
    pub backend: &'static str,
    pub operation: &'static str,
    #[source]
    pub source: BoxError,
}

impl BackendError {
    pub fn new(
        backend: &'static str,
        operation: &'static str,
        source: impl Into<BoxError>,
    ) -> Self {
        Self {
            backend,
            operation,
            source: source.into(),
        }
    }
}

/// Errors returned by adapter operations.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// A uniqueness invariant would be violated.
    #[error("{entity} {key} already exists")]
    Conflict { entity: Entity, key: String },

    /// The mutation targets a record that does not exist.
    #[error("{entity} {key} does not exist")]
    PreconditionFailed { entity: Entity, key: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl AdapterError {
    pub fn conflict(entity: Entity, key: impl fmt::Display) -> Self {
        Self::Conflict {
            entity,
            key: key.to_string(),
        }
    }

    pub fn precondition_failed(entity: Entity, key: impl fmt::Display) -> Self {
        Self::PreconditionFailed {
            entity,
            key: key.to_string(),
        }
    }

    pub fn backend(
        backend: &'static str,
        operation: &'static str,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Backend(BackendError::new(backend, operation, source))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }

    /// Stable short name of the error kind, used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => "conflict",
            Self::PreconditionFailed { .. } => "precondition_failed",
            Self::Validation(_) => "validation",
            Self::Backend(_) => "backend_unavailable",
        }
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = std::result::Result<T, AdapterError>;
