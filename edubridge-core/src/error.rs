//! Error types for edubridge-core

use thiserror::Error;

/// Machine-usable classification of a domain error.
///
/// Outer surfaces (HTTP controllers, report jobs) map these onto their own
/// status codes: `NotFound` → 404, `InvalidState`/`Validation` → 400,
/// `Unauthorized` → 403, `Internal` → 500.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Unauthorized,
    Validation,
    Internal,
}

/// Top-level domain error for engine operations
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DomainError {
    /// Classify this error for outer surfaces
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a missing program
    pub fn program_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity: "Program",
            id: id.to_string(),
        }
    }
}

/// Infrastructure errors from the backing data store.
///
/// These are never disguised as domain errors; they propagate as-is so
/// callers can distinguish "you asked for something invalid" from "the
/// storage layer fell over".
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the notification dispatch channel
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to dispatch notification: {0}")]
    DispatchFailed(String),

    #[error("Notification channel closed")]
    ChannelClosed,
}

/// Convenience alias for engine results
pub type CoreResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_displays_entity_and_id() {
        let err = DomainError::NotFound {
            entity: "Program",
            id: "p-123".into(),
        };
        assert_eq!(err.to_string(), "Program not found: p-123");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn invalid_state_carries_reason() {
        let err = DomainError::InvalidState("Checkpoint 2 must be completed first".into());
        assert!(err.to_string().contains("Checkpoint 2"));
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn store_error_classifies_as_internal() {
        let err = DomainError::from(StoreError::Backend("connection reset".into()));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn unauthorized_classifies_correctly() {
        let err = DomainError::Unauthorized("not the sponsor contact".into());
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
