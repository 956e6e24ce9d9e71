//! Guard violations: the record every check produces when it fires.
//!
//! A [`GuardViolation`] is created once by a guard and never mutated. It is
//! handed to the [`GuardObserver`](crate::observer::GuardObserver), counted by
//! [`GuardMetrics`](crate::metrics::GuardMetrics), and, when policy demands it,
//! converted into a [`GuardError`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::GuardError;
use crate::types::InvocationId;

/// The kind of mistake a guard detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ViolationCategory {
    /// A side effect closure was handed the parent invocation's context.
    ContextMisuse,
    /// A stateful actor called itself, directly or through its callers.
    Deadlock,
    /// A guarded region blocked longer than the configured threshold.
    BlockingOperation,
    /// A handler ran past its hard deadline.
    Timeout,
    /// A value without a stable iteration order was used in handler code.
    NonDeterministic,
    /// An idempotency key was missing or malformed.
    ValidationError,
    /// An idempotency key could not be built from the supplied parts.
    KeyGeneration,
}

impl ViolationCategory {
    /// Every category, in declaration order.
    pub const ALL: [ViolationCategory; 7] = [
        Self::ContextMisuse,
        Self::Deadlock,
        Self::BlockingOperation,
        Self::Timeout,
        Self::NonDeterministic,
        Self::ValidationError,
        Self::KeyGeneration,
    ];

    /// Stable position of this category in [`ViolationCategory::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Stable snake_case name used in log fields and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContextMisuse => "context_misuse",
            Self::Deadlock => "deadlock",
            Self::BlockingOperation => "blocking_operation",
            Self::Timeout => "timeout",
            Self::NonDeterministic => "non_deterministic",
            Self::ValidationError => "validation_error",
            Self::KeyGeneration => "key_generation",
        }
    }

    /// Returns true if policy decides whether this category fails the invocation.
    ///
    /// Deadlocks, timeouts and key generation failures are always fatal.
    pub fn is_policy_routed(self) -> bool {
        matches!(
            self,
            Self::ContextMisuse | Self::NonDeterministic | Self::ValidationError
        )
    }
}

impl fmt::Display for ViolationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How serious a violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    /// Advisory only; never fails the invocation.
    Warning,
    /// Fails the invocation when policy (or the category) says so.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// A single detected violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardViolation {
    category: ViolationCategory,
    message: String,
    severity: Severity,
    invocation_id: Option<InvocationId>,
}

impl GuardViolation {
    /// Creates an error-severity violation.
    pub fn error(category: ViolationCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            severity: Severity::Error,
            invocation_id: None,
        }
    }

    /// Creates a warning-severity violation.
    pub fn warning(category: ViolationCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
            severity: Severity::Warning,
            invocation_id: None,
        }
    }

    /// Attributes the violation to an invocation.
    pub fn with_invocation(mut self, invocation_id: InvocationId) -> Self {
        self.invocation_id = Some(invocation_id);
        self
    }

    /// Lowers the violation to warning severity, for violations that policy
    /// lets through.
    pub fn downgraded(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn category(&self) -> ViolationCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// The invocation that produced the violation. `None` at the ingress
    /// boundary, before any invocation exists.
    pub fn invocation_id(&self) -> Option<&InvocationId> {
        self.invocation_id.as_ref()
    }

    /// Converts the violation into the error that rejects the invocation.
    pub fn into_error(self) -> GuardError {
        let invocation_id = self.invocation_id;
        match self.category {
            ViolationCategory::ValidationError => GuardError::Validation {
                message: self.message,
            },
            ViolationCategory::ContextMisuse
            | ViolationCategory::NonDeterministic
            | ViolationCategory::BlockingOperation => GuardError::DeterminismViolation {
                category: self.category,
                message: self.message,
                invocation_id,
            },
            ViolationCategory::Deadlock => GuardError::ConcurrencyViolation {
                message: self.message,
                invocation_id,
            },
            ViolationCategory::Timeout => GuardError::Timeout {
                message: self.message,
                invocation_id,
            },
            ViolationCategory::KeyGeneration => GuardError::KeyGeneration {
                message: self.message,
            },
        }
    }
}

impl fmt::Display for GuardViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.category, self.message)?;
        if let Some(id) = &self.invocation_id {
            write!(f, " (invocation {})", id)?;
        }
        Ok(())
    }
}
