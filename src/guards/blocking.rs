//! Warnings for guarded regions that block too long.
//!
//! A [`BlockingTimer`] records the start instant when the region begins and
//! compares the elapsed time against the threshold once, when it ends. The
//! region itself runs untouched and its result is always returned.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::InvocationContext;
use crate::violation::{GuardViolation, ViolationCategory};

/// Measures one guarded region.
#[derive(Debug)]
pub struct BlockingTimer {
    region: String,
    started: Instant,
}

impl BlockingTimer {
    /// Starts timing `region`.
    pub fn start(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            started: Instant::now(),
        }
    }

    /// Returns the region name.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Stops timing and reports a warning if the region exceeded `threshold`.
    pub fn finish(self, ctx: &InvocationContext, threshold: Duration) -> Option<GuardViolation> {
        check_blocking_duration(ctx, &self.region, self.started.elapsed(), threshold)
    }
}

/// Reports a warning if `elapsed` is strictly greater than `threshold`.
pub fn check_blocking_duration(
    ctx: &InvocationContext,
    region: &str,
    elapsed: Duration,
    threshold: Duration,
) -> Option<GuardViolation> {
    if elapsed <= threshold {
        return None;
    }
    Some(
        GuardViolation::warning(
            ViolationCategory::BlockingOperation,
            format!(
                "region '{}' blocked for {}ms (threshold {}ms)",
                region,
                elapsed.as_millis(),
                threshold.as_millis()
            ),
        )
        .with_invocation(ctx.invocation_id().clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::violation::Severity;

    #[test]
    fn test_within_threshold() {
        let ctx = InvocationContext::new("inv-1", "svc");
        assert!(check_blocking_duration(
            &ctx,
            "db",
            Duration::from_millis(100),
            Duration::from_millis(100)
        )
        .is_none());
    }

    #[test]
    fn test_over_threshold() {
        let ctx = InvocationContext::new("inv-1", "svc");
        let violation = check_blocking_duration(
            &ctx,
            "db",
            Duration::from_millis(150),
            Duration::from_millis(100),
        )
        .unwrap();
        assert_eq!(violation.severity(), Severity::Warning);
        assert_eq!(violation.category(), ViolationCategory::BlockingOperation);
        assert_eq!(violation.message(), "region 'db' blocked for 150ms (threshold 100ms)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_measures_region() {
        let ctx = InvocationContext::new("inv-1", "svc");
        let timer = BlockingTimer::start("sleep");
        tokio::time::sleep(Duration::from_millis(250)).await;
        let violation = timer.finish(&ctx, Duration::from_millis(100)).unwrap();
        assert!(violation.message().contains("'sleep'"));

        let timer = BlockingTimer::start("fast");
        assert_eq!(timer.region(), "fast");
        assert!(timer.finish(&ctx, Duration::from_millis(100)).is_none());
    }
}
