//! Cooldown after authentication failures.
//!
//! An invalid or expired token will not fix itself within one poll interval,
//! so after an auth error the poller skips cycles until the cooldown passes.

use std::time::Duration;

use tokio::time::Instant;

/// Tracks the auth-failure cooldown window.
#[derive(Debug, Clone)]
pub struct BackoffController {
    cooldown: Duration,
    until: Option<Instant>,
}

impl BackoffController {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            until: None,
        }
    }

    /// Whether a cycle starting at `now` should be skipped.
    ///
    /// An expired window is cleared here.
    pub fn should_skip(&mut self, now: Instant) -> bool {
        match self.until {
            Some(until) if now < until => true,
            Some(_) => {
                self.until = None;
                false
            }
            None => false,
        }
    }

    /// Start (or restart) the cooldown from `now`.
    pub fn record_auth_failure(&mut self, now: Instant) {
        self.until = Some(now + self.cooldown);
    }

    pub fn reset(&mut self) {
        self.until = None;
    }

    /// Time left in the window, zero when not backing off.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOLDOWN: Duration = Duration::from_secs(600);

    #[test]
    fn test_no_skip_without_failure() {
        let mut backoff = BackoffController::new(COOLDOWN);
        assert!(!backoff.should_skip(Instant::now()));
        assert_eq!(backoff.remaining(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn test_skip_inside_window() {
        let mut backoff = BackoffController::new(COOLDOWN);
        let t0 = Instant::now();
        backoff.record_auth_failure(t0);

        assert!(backoff.should_skip(t0 + Duration::from_secs(60)));
        assert!(backoff.should_skip(t0 + Duration::from_secs(599)));
        assert_eq!(
            backoff.remaining(t0 + Duration::from_secs(100)),
            Duration::from_secs(500)
        );
    }

    #[test]
    fn test_window_clears_once_passed() {
        let mut backoff = BackoffController::new(COOLDOWN);
        let t0 = Instant::now();
        backoff.record_auth_failure(t0);

        assert!(!backoff.should_skip(t0 + COOLDOWN));
        // Cleared, not just expired
        assert_eq!(backoff.remaining(t0), Duration::ZERO);
    }

    #[test]
    fn test_reset_clears_window() {
        let mut backoff = BackoffController::new(COOLDOWN);
        backoff.record_auth_failure(Instant::now());
        backoff.reset();
        assert!(!backoff.should_skip(Instant::now()));
    }
}
