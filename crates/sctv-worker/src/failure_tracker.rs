//! Log suppression for failures that repeat while a stream is down.

use tracing::{info, warn};

/// Tracks consecutive failures of a repeating operation.
///
/// An unreachable camera fails every backoff period until it comes back,
/// which would otherwise flood the log.
#[derive(Debug, Default)]
pub struct FailureTracker {
    consecutive_failures: u32,
    max_logged_failures: u32,
    suppressed: bool,
}

impl FailureTracker {
    pub fn new(max_logged_failures: u32) -> Self {
        Self {
            consecutive_failures: 0,
            max_logged_failures,
            suppressed: false,
        }
    }

    /// Record a success. Returns the failure streak it ended, if any.
    pub fn record_success(&mut self, operation: &str) -> Option<u32> {
        let streak = self.consecutive_failures;
        self.consecutive_failures = 0;
        self.suppressed = false;

        if streak > 0 {
            info!("{} recovered after {} consecutive failures", operation, streak);
            Some(streak)
        } else {
            None
        }
    }

    /// Record a failure.
    ///
    /// Returns `true` if this failure should be logged.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.consecutive_failures <= self.max_logged_failures {
            true
        } else {
            if !self.suppressed {
                self.suppressed = true;
                warn!(
                    "Suppressing further failure logs after {} consecutive failures",
                    self.max_logged_failures
                );
            }
            false
        }
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}
