//! Identifiers and the per-invocation context read by the guard layer.
//!
//! The durable execution runtime creates one [`InvocationContext`] per handler
//! execution attempt. Guards only read it: they never mutate or persist it.
//!
//! # Example
//!
//! ```rust
//! use durable_guards::types::{ActorRef, ExecutionMode, InvocationContext};
//!
//! let ctx = InvocationContext::new("inv-1", "cart-service")
//!     .with_actor(ActorRef::new("Cart", "user-42"))
//!     .with_mode(ExecutionMode::Replaying);
//!
//! assert!(ctx.is_replaying());
//! assert_eq!(ctx.actor().unwrap().key(), "user-42");
//! ```

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Error returned when newtype validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The type name that failed validation
    pub type_name: &'static str,
    /// Description of the validation failure
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl std::error::Error for ValidationError {}

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new value, rejecting the empty string.
            pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(ValidationError {
                        type_name: stringify!($name),
                        message: "value cannot be empty".to_string(),
                    });
                }
                Ok(Self(value))
            }

            /// Creates a new value without validation.
            #[inline]
            pub fn new_unchecked(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns a reference to the inner string.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the inner string value.
            #[inline]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Deref for $name {
            type Target = str;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            #[inline]
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            #[inline]
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            #[inline]
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_newtype!(
    /// Identifies one handler execution attempt, as assigned by the runtime.
    InvocationId
);

string_newtype!(
    /// Name of the service a handler belongs to.
    ///
    /// Used as the outermost component of deduplication record addresses.
    ServiceName
);

/// A stateful actor addressed by type and key.
///
/// The runtime serializes every invocation that shares the same `ActorRef`,
/// so two equal refs always contend for the same execution slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorRef {
    actor_type: String,
    key: String,
}

impl ActorRef {
    /// Creates a reference to the actor `actor_type` bound to `key`.
    pub fn new(actor_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            actor_type: actor_type.into(),
            key: key.into(),
        }
    }

    /// Returns the actor type.
    pub fn actor_type(&self) -> &str {
        &self.actor_type
    }

    /// Returns the actor key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.actor_type, self.key)
    }
}

/// Whether the handler is running for the first time or replaying its journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionMode {
    /// First execution; side effects actually run.
    #[default]
    Fresh,
    /// Replay from the journal; recorded side effect results are substituted.
    Replaying,
}

/// Describes one handler execution attempt.
///
/// Besides the invocation id and the bound actor, the context carries the
/// chain of actors that led to this invocation. Self-call detection walks
/// that chain, so an actor calling back into any of its callers is caught
/// before the call is dispatched.
///
/// The context is not `Clone`, so side effect closures cannot carry a copy of
/// it. Use [`InvocationContext::child_for`] to derive the context of a callee.
#[derive(Debug, PartialEq, Eq)]
pub struct InvocationContext {
    invocation_id: InvocationId,
    service: ServiceName,
    actor: Option<ActorRef>,
    call_chain: Vec<ActorRef>,
    mode: ExecutionMode,
}

impl InvocationContext {
    /// Creates a context for a fresh, unbound invocation.
    pub fn new(invocation_id: impl Into<InvocationId>, service: impl Into<ServiceName>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            service: service.into(),
            actor: None,
            call_chain: Vec::new(),
            mode: ExecutionMode::Fresh,
        }
    }

    /// Binds the invocation to a stateful actor.
    pub fn with_actor(mut self, actor: ActorRef) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Sets the execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Records an actor that is waiting on this invocation.
    pub fn with_caller(mut self, caller: ActorRef) -> Self {
        self.call_chain.push(caller);
        self
    }

    /// Builds the context the runtime would hand to a callee of this invocation.
    ///
    /// The callee inherits this invocation's call chain, extended with this
    /// invocation's own actor when it has one.
    pub fn child_for(
        &self,
        invocation_id: impl Into<InvocationId>,
        target: Option<ActorRef>,
    ) -> Self {
        let mut call_chain = self.call_chain.clone();
        if let Some(actor) = &self.actor {
            call_chain.push(actor.clone());
        }
        Self {
            invocation_id: invocation_id.into(),
            service: self.service.clone(),
            actor: target,
            call_chain,
            mode: ExecutionMode::Fresh,
        }
    }

    /// Returns the invocation id.
    pub fn invocation_id(&self) -> &InvocationId {
        &self.invocation_id
    }

    /// Returns the service name.
    pub fn service(&self) -> &ServiceName {
        &self.service
    }

    /// Returns the actor this invocation is bound to, if any.
    pub fn actor(&self) -> Option<&ActorRef> {
        self.actor.as_ref()
    }

    /// Returns the actors waiting on this invocation, outermost first.
    pub fn call_chain(&self) -> &[ActorRef] {
        &self.call_chain
    }

    /// Returns the execution mode.
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Returns true while the runtime is replaying the journal.
    pub fn is_replaying(&self) -> bool {
        self.mode == ExecutionMode::Replaying
    }
}
