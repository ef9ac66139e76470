//! Poller task handle and lifecycle state.

use std::fmt;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Lifecycle of the poll scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Not started, or finished after cancellation.
    Stopped,
    /// Polling on the configured interval.
    Running,
    /// Cancellation observed, finishing the current write.
    Stopping,
    /// Required configuration is missing; never polls.
    Disabled,
}

impl SchedulerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to the spawned poller.
#[derive(Debug)]
pub struct PollerHandle {
    cancellation_token: CancellationToken,
    state: watch::Receiver<SchedulerState>,
    join: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub(crate) fn new(
        cancellation_token: CancellationToken,
        state: watch::Receiver<SchedulerState>,
        join: JoinHandle<()>,
    ) -> Self {
        Self {
            cancellation_token,
            state,
            join: Some(join),
        }
    }

    /// A handle for a poller that was never started.
    pub fn disabled() -> Self {
        let (_tx, state) = watch::channel(SchedulerState::Disabled);
        Self {
            cancellation_token: CancellationToken::new(),
            state,
            join: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// A receiver that follows state changes.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Cancel the poller and wait for it to exit, aborting it after `grace`.
    pub async fn shutdown(&mut self, grace: Duration) {
        self.cancellation_token.cancel();

        let Some(join) = self.join.take() else {
            return;
        };
        let abort = join.abort_handle();

        match tokio::time::timeout(grace, join).await {
            Ok(Ok(())) => info!("Poller stopped"),
            Ok(Err(e)) => warn!(error = %e, "Poller task ended abnormally"),
            Err(_) => {
                warn!(?grace, "Poller did not stop within grace period, aborting");
                abort.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(SchedulerState::Running.to_string(), "running");
        assert_eq!(SchedulerState::Disabled.as_str(), "disabled");
    }

    #[tokio::test]
    async fn test_disabled_handle() {
        let mut handle = PollerHandle::disabled();
        assert_eq!(handle.state(), SchedulerState::Disabled);

        handle.shutdown(Duration::from_secs(1)).await;
        assert_eq!(handle.state(), SchedulerState::Disabled);
        assert!(handle.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_gives_up_after_grace() {
        let token = CancellationToken::new();
        let (_tx, rx) = watch::channel(SchedulerState::Running);
        let join = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let started = tokio::time::Instant::now();
        let mut handle = PollerHandle::new(token, rx, join);
        handle.shutdown(Duration::from_secs(1)).await;

        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(1));
        assert!(waited < Duration::from_secs(3600));
    }
}
