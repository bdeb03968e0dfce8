//! Error taxonomy for tracking operations
//!
//! Every failure carries a stable kind (mapped to an HTTP status) plus a
//! human-readable message. All checks run before any mutation, so a
//! rejected request never leaves partial state behind.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    /// No or invalid credentials (missing identity header)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but the wrong party for this session
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Session or ride does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation not legal for the session's current status
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A non-terminal session already exists where a fresh one was requested
    #[error("conflict: {0}")]
    Conflict(String),

    /// Missing or malformed location / type fields
    #[error("validation error: {0}")]
    Validation(String),
}

impl TrackingError {
    /// Stable machine-readable kind, part of the wire contract
    pub fn kind(&self) -> &'static str {
        match self {
            TrackingError::Unauthorized(_) => "unauthorized",
            TrackingError::Forbidden(_) => "forbidden",
            TrackingError::NotFound(_) => "not_found",
            TrackingError::InvalidState(_) => "invalid_state",
            TrackingError::Conflict(_) => "conflict",
            TrackingError::Validation(_) => "validation_error",
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            TrackingError::Unauthorized(_) => 401,
            TrackingError::Forbidden(_) => 403,
            TrackingError::NotFound(_) => 404,
            TrackingError::InvalidState(_) => 409,
            TrackingError::Conflict(_) => 409,
            TrackingError::Validation(_) => 400,
        }
    }
}

pub type TrackingResult<T> = Result<T, TrackingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_status() {
        assert_eq!(TrackingError::Forbidden("x".into()).kind(), "forbidden");
        assert_eq!(TrackingError::Forbidden("x".into()).http_status(), 403);
        assert_eq!(TrackingError::Conflict("x".into()).http_status(), 409);
        assert_eq!(TrackingError::InvalidState("x".into()).http_status(), 409);
        assert_eq!(TrackingError::Validation("x".into()).kind(), "validation_error");
    }

    #[test]
    fn test_display_includes_message() {
        let e = TrackingError::NotFound("session abc".into());
        assert_eq!(e.to_string(), "not found: session abc");
    }
}
