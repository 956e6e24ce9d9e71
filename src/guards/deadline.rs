//! Hard deadlines for handler bodies.
//!
//! [`enforce_deadline`] races the handler against a timer. When the timer
//! wins, the handler's future is dropped, its [`CancellationSignal`] is
//! tripped so that any work it spawned can stop, and the caller gets a
//! timeout error. A result produced after the deadline never reaches the
//! caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::GuardError;
use crate::types::InvocationContext;
use crate::violation::{GuardViolation, ViolationCategory};

/// Cooperative stop signal handed to a deadline-guarded region.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Trips the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Returns true once the signal has been tripped.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes when the signal is tripped.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close while we wait.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Builds the violation reported when `ctx` runs past `deadline`.
pub fn timeout_violation(ctx: &InvocationContext, deadline: Duration) -> GuardViolation {
    GuardViolation::error(
        ViolationCategory::Timeout,
        format!(
            "handler exceeded its deadline of {}ms; result discarded",
            deadline.as_millis()
        ),
    )
    .with_invocation(ctx.invocation_id().clone())
}

/// Runs the region built by `func` with a hard deadline.
///
/// Returns the region's output if it finishes in time. Otherwise the region
/// is abandoned and a [`GuardError::Timeout`] is returned immediately.
pub async fn enforce_deadline<T, F, Fut>(
    ctx: &InvocationContext,
    deadline: Duration,
    func: F,
) -> Result<T, GuardError>
where
    F: FnOnce(CancellationSignal) -> Fut,
    Fut: Future<Output = T>,
{
    let signal = CancellationSignal::new();
    let region = func(signal.clone());

    match tokio::time::timeout(deadline, region).await {
        Ok(output) => Ok(output),
        Err(_) => {
            signal.cancel();
            tracing::debug!(
                invocation_id = %ctx.invocation_id(),
                deadline_ms = deadline.as_millis() as u64,
                "Handler deadline elapsed, region abandoned"
            );
            Err(timeout_violation(ctx, deadline).into_error())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_completes_within_deadline() {
        let ctx = InvocationContext::new("inv-1", "svc");
        let result = enforce_deadline(&ctx, Duration::from_secs(1), |_signal| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            "done"
        })
        .await;
        assert_eq!(result.unwrap(), "done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses() {
        let ctx = InvocationContext::new("inv-1", "svc");
        let started = tokio::time::Instant::now();
        let result = enforce_deadline(&ctx, Duration::from_millis(100), |_signal| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            "too late"
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.is_fatal());
        assert!(err.to_string().contains("100ms"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_work_observes_cancellation() {
        let ctx = InvocationContext::new("inv-1", "svc");
        let stopped = Arc::new(AtomicBool::new(false));
        let stopped_flag = stopped.clone();
        let (done_tx, done_rx) = tokio::sync::oneshot::channel();

        let result = enforce_deadline(&ctx, Duration::from_millis(50), move |signal| async move {
            tokio::spawn(async move {
                signal.cancelled().await;
                stopped_flag.store(true, Ordering::SeqCst);
                let _ = done_tx.send(());
            });
            std::future::pending::<()>().await
        })
        .await;

        assert!(result.is_err());
        done_rx.await.unwrap();
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_signal_is_idempotent() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_cancelled());
        signal.cancel();
        signal.cancel();
        assert!(signal.is_cancelled());
        assert!(signal.clone().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_returns_after_cancel() {
        let signal = CancellationSignal::new();
        signal.cancel();
        signal.cancelled().await;
    }
}
