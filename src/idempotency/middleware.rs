//! Ingress validation of idempotency keys.
//!
//! [`IdempotencyMiddleware`] runs before the handler. It reads the caller's
//! `Idempotency-Key` header, validates it, and exposes the accepted key to
//! downstream code in two places:
//!
//! - the `X-Idempotency-Key` header, for code that only sees headers;
//! - the request extensions, read with [`trusted_key`].
//!
//! Any `X-Idempotency-Key` sent by the caller is removed first, so the
//! trusted header only ever holds a key this middleware validated.
//!
//! On a missing or malformed key the strict policy rejects the request with
//! a 400 [`Rejection`] without calling the handler. The permissive policy
//! records the violation as a warning and lets the request through without
//! a trusted key.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use durable_guards::config::{GuardConfig, GuardPolicy};
//! use durable_guards::idempotency::{trusted_key, IdempotencyMiddleware};
//! use durable_guards::observer::TracingObserver;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let middleware = IdempotencyMiddleware::new(
//!     Arc::new(GuardConfig::default().with_policy(GuardPolicy::Strict)),
//!     Arc::new(TracingObserver),
//! );
//!
//! let request = http::Request::builder()
//!     .header("Idempotency-Key", "order:user123:default-checkout")
//!     .body(())
//!     .unwrap();
//!
//! let key = middleware
//!     .handle(request, |req| async move { trusted_key(&req).cloned() })
//!     .await
//!     .unwrap();
//! assert_eq!(key.unwrap(), "order:user123:default-checkout");
//! # });
//! ```

use std::future::Future;
use std::sync::Arc;

use http::{HeaderValue, Request};

use crate::config::{GuardConfig, GuardPolicy};
use crate::error::Rejection;
use crate::idempotency::key::IdempotencyKey;
use crate::idempotency::validate::{validate_key, KeyFormat};
use crate::metrics::GuardMetric;
use crate::observer::GuardObserver;
use crate::violation::{GuardViolation, ViolationCategory};

/// The middleware's decision for a request that was not rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// The key is valid and has been attached to the request.
    Validated {
        key: IdempotencyKey,
        format: KeyFormat,
    },
    /// The key was missing or malformed and the policy let the request through.
    Unvalidated(GuardViolation),
}

impl Admission {
    /// The validated key, if any.
    pub fn key(&self) -> Option<&IdempotencyKey> {
        match self {
            Admission::Validated { key, .. } => Some(key),
            Admission::Unvalidated(_) => None,
        }
    }
}

/// Validates the idempotency key of every inbound request.
pub struct IdempotencyMiddleware {
    config: Arc<GuardConfig>,
    observer: Arc<dyn GuardObserver>,
    policy: GuardPolicy,
}

impl IdempotencyMiddleware {
    /// Creates a middleware that uses the process-wide policy.
    pub fn new(config: Arc<GuardConfig>, observer: Arc<dyn GuardObserver>) -> Self {
        let policy = config.resolve_policy(None);
        Self {
            config,
            observer,
            policy,
        }
    }

    /// Overrides the policy for the routes this middleware guards.
    pub fn with_policy(mut self, policy: GuardPolicy) -> Self {
        self.policy = self.config.resolve_policy(Some(policy));
        self
    }

    pub fn policy(&self) -> GuardPolicy {
        self.policy
    }

    /// Validates the key on `request` and attaches it for downstream code.
    ///
    /// Returns `Err` only when the request must be rejected.
    pub fn admit<B>(&self, request: &mut Request<B>) -> Result<Admission, Rejection> {
        request.headers_mut().remove(&self.config.trusted_key_header);
        request.extensions_mut().remove::<IdempotencyKey>();

        self.observer.record_metric(GuardMetric::ValidationAttempt);

        let violation = match self.read_key(request) {
            Ok((key, format)) => {
                // Key characters are always valid header bytes.
                if let Ok(value) = HeaderValue::from_str(key.as_str()) {
                    request
                        .headers_mut()
                        .insert(self.config.trusted_key_header.clone(), value);
                }
                request.extensions_mut().insert(key.clone());
                self.observer.record_metric(GuardMetric::ValidationPassed);
                tracing::debug!(key = %key, format = format.as_str(), "Idempotency key accepted");
                return Ok(Admission::Validated { key, format });
            }
            Err(violation) => violation,
        };

        self.observer.record_metric(GuardMetric::ValidationFailed);

        if self.policy.is_strict() {
            self.observer.record_event(&violation);
            return Err(Rejection::from(violation.into_error()));
        }
        let violation = violation.downgraded();
        self.observer.record_event(&violation);
        Ok(Admission::Unvalidated(violation))
    }

    /// Admits `request` and, unless it was rejected, hands it to `handler`.
    pub async fn handle<B, R, F, Fut>(
        &self,
        mut request: Request<B>,
        handler: F,
    ) -> Result<R, Rejection>
    where
        F: FnOnce(Request<B>) -> Fut,
        Fut: Future<Output = R>,
    {
        self.admit(&mut request)?;
        Ok(handler(request).await)
    }

    fn read_key<B>(&self, request: &Request<B>) -> Result<(IdempotencyKey, KeyFormat), GuardViolation> {
        let header = &self.config.key_header;
        let value = request.headers().get(header).ok_or_else(|| {
            GuardViolation::error(
                ViolationCategory::ValidationError,
                format!("missing key: request has no {} header", header),
            )
        })?;

        let raw = value.to_str().map_err(|_| {
            GuardViolation::error(
                ViolationCategory::ValidationError,
                format!("malformed key: {} header is not visible ASCII", header),
            )
        })?;

        let format = validate_key(raw, self.config.known_namespaces.as_slice()).map_err(|e| {
            GuardViolation::error(
                ViolationCategory::ValidationError,
                format!("malformed key: {}", e),
            )
        })?;

        Ok((IdempotencyKey::new_unchecked(raw), format))
    }
}

/// The key validated by [`IdempotencyMiddleware`], if the request was admitted with one.
pub fn trusted_key<B>(request: &Request<B>) -> Option<&IdempotencyKey> {
    request.extensions().get::<IdempotencyKey>()
}
