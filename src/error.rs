//! Error types for the guard layer.
//!
//! [`GuardError`] covers every way a guard can fail an invocation. The
//! variants mirror the failure taxonomy: validation, determinism,
//! concurrency, timeout and key generation, plus the two ways the
//! surrounding infrastructure can fail (the dedup store and serialization).
//!
//! A duplicate request is not an error. Deduplication reports it through
//! [`DedupOutcome::Duplicate`](crate::idempotency::DedupOutcome::Duplicate).

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::InvocationId;
use crate::violation::ViolationCategory;

/// The main error type for the guard layer.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Missing or malformed idempotency key.
    #[error("Validation error: {message}")]
    Validation {
        /// Error message describing the validation failure
        message: String,
    },

    /// Context capture or non-deterministic container use.
    #[error("Determinism violation ({category}): {message}")]
    DeterminismViolation {
        /// The violation category that triggered the error
        category: ViolationCategory,
        /// Error message describing the violation
        message: String,
        /// The invocation that violated determinism
        invocation_id: Option<InvocationId>,
    },

    /// A stateful actor would call itself and deadlock.
    #[error("Concurrency violation: {message}")]
    ConcurrencyViolation {
        /// Error message naming the actor involved
        message: String,
        /// The invocation that attempted the call
        invocation_id: Option<InvocationId>,
    },

    /// The handler ran past its deadline. Its result has been discarded.
    #[error("Timeout: {message}")]
    Timeout {
        /// Error message describing the deadline
        message: String,
        /// The invocation that timed out
        invocation_id: Option<InvocationId>,
    },

    /// An idempotency key could not be built.
    #[error("Key generation error: {message}")]
    KeyGeneration {
        /// Error message describing which part was rejected
        message: String,
    },

    /// The deduplication store failed.
    #[error("Dedup store error: {message}")]
    Store {
        /// Error message from the store
        message: String,
    },

    /// A stored result could not be serialized or deserialized.
    #[error("Serialization error: {message}")]
    SerDes {
        /// Error message describing the serialization failure
        message: String,
    },
}

impl GuardError {
    /// Creates a new Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new KeyGeneration error.
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration {
            message: message.into(),
        }
    }

    /// Creates a new Store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Creates a new SerDes error.
    pub fn serdes(message: impl Into<String>) -> Self {
        Self::SerDes {
            message: message.into(),
        }
    }

    /// Returns the category that triggered this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::DeterminismViolation { .. } => ErrorCategory::DeterminismViolation,
            Self::ConcurrencyViolation { .. } => ErrorCategory::ConcurrencyViolation,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::KeyGeneration { .. } => ErrorCategory::KeyGeneration,
            Self::Store { .. } => ErrorCategory::Store,
            Self::SerDes { .. } => ErrorCategory::Serialization,
        }
    }

    /// Returns true if no policy can turn this error into a warning.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyViolation { .. } | Self::Timeout { .. } | Self::KeyGeneration { .. }
        )
    }

    /// Returns true if this is a Timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Error categories reported to callers when an invocation is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    Validation,
    DeterminismViolation,
    ConcurrencyViolation,
    Timeout,
    KeyGeneration,
    Store,
    Serialization,
}

impl ErrorCategory {
    /// The error type name exposed to callers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::DeterminismViolation => "DeterminismViolation",
            Self::ConcurrencyViolation => "ConcurrencyViolation",
            Self::Timeout => "TimeoutViolation",
            Self::KeyGeneration => "KeyGenerationError",
            Self::Store => "DedupStoreError",
            Self::Serialization => "SerializationError",
        }
    }

    /// The status code a request boundary should answer with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation | Self::KeyGeneration => StatusCode::BAD_REQUEST,
            Self::DeterminismViolation => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ConcurrencyViolation => StatusCode::CONFLICT,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Store | Self::Serialization => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-visible description of a rejected invocation.
///
/// Always names the category that triggered the rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// The error type/name
    #[serde(rename = "ErrorType")]
    pub error_type: String,
    /// The error message
    #[serde(rename = "ErrorMessage")]
    pub error_message: String,
    /// HTTP-equivalent status code
    #[serde(rename = "StatusCode")]
    pub status: u16,
}

impl Rejection {
    /// Creates a new Rejection.
    pub fn new(category: ErrorCategory, error_message: impl Into<String>) -> Self {
        Self {
            error_type: category.as_str().to_string(),
            error_message: error_message.into(),
            status: category.status_code().as_u16(),
        }
    }

    /// Returns the status code as an [`http::StatusCode`].
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<&GuardError> for Rejection {
    fn from(error: &GuardError) -> Self {
        Rejection::new(error.category(), error.to_string())
    }
}

impl From<GuardError> for Rejection {
    fn from(error: GuardError) -> Self {
        Rejection::from(&error)
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(error: serde_json::Error) -> Self {
        Self::SerDes {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(GuardError::key_generation("empty namespace").is_fatal());
        assert!(GuardError::Timeout {
            message: "deadline of 1s elapsed".to_string(),
            invocation_id: None,
        }
        .is_fatal());
        assert!(GuardError::ConcurrencyViolation {
            message: "self call".to_string(),
            invocation_id: None,
        }
        .is_fatal());
        assert!(!GuardError::validation("missing key").is_fatal());
    }

    #[test]
    fn test_rejection_names_category() {
        let err = GuardError::validation("malformed key");
        let rejection = Rejection::from(&err);
        assert_eq!(rejection.error_type, "ValidationError");
        assert_eq!(rejection.status_code(), StatusCode::BAD_REQUEST);
        assert!(rejection.error_message.contains("malformed key"));
    }

    #[test]
    fn test_rejection_serializes_with_pascal_case_fields() {
        let rejection = Rejection::new(ErrorCategory::ConcurrencyViolation, "Cart/u-1 calls itself");
        let json = serde_json::to_value(&rejection).unwrap();
        assert_eq!(json["ErrorType"], "ConcurrencyViolation");
        assert_eq!(json["StatusCode"], 409);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorCategory::Timeout.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            ErrorCategory::DeterminismViolation.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ErrorCategory::KeyGeneration.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: GuardError = serde_json::from_str::<i32>("nope").unwrap_err().into();
        assert_eq!(err.category(), ErrorCategory::Serialization);
    }
}
