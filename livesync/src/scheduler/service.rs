//! Poll loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::task::{PollerHandle, SchedulerState};
use crate::config::PollerTiming;
use crate::domain::PollTarget;
use crate::monitor::{BackoffController, LiveFetcher, LiveSetReconciler};

/// Runs fetch + reconcile on a fixed interval until cancelled.
pub struct PollScheduler {
    fetcher: Arc<dyn LiveFetcher>,
    target: PollTarget,
    reconciler: LiveSetReconciler,
    backoff: BackoffController,
    interval: Duration,
}

impl PollScheduler {
    pub fn new(
        fetcher: Arc<dyn LiveFetcher>,
        target: PollTarget,
        reconciler: LiveSetReconciler,
        timing: &PollerTiming,
    ) -> Self {
        Self {
            fetcher,
            target,
            reconciler,
            backoff: BackoffController::new(timing.auth_backoff),
            interval: timing.interval,
        }
    }

    /// Spawn the loop. The first cycle runs immediately.
    ///
    /// The task listens on a child of `parent_token`, so either the returned
    /// handle or the parent can stop it.
    pub fn spawn(self, parent_token: &CancellationToken) -> PollerHandle {
        let token = parent_token.child_token();
        let (state_tx, state_rx) = watch::channel(SchedulerState::Running);
        let join = tokio::spawn(self.run(token.clone(), state_tx));
        PollerHandle::new(token, state_rx, join)
    }

    async fn run(mut self, token: CancellationToken, state: watch::Sender<SchedulerState>) {
        info!(
            target = %self.target,
            interval = ?self.interval,
            auth_backoff = ?self.backoff.cooldown(),
            "Poller started"
        );

        loop {
            let Some(delay) = self.run_cycle(&token).await else {
                break;
            };
            if token.is_cancelled() {
                break;
            }

            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        state.send_replace(SchedulerState::Stopping);
        debug!("Poller received cancellation signal");
        state.send_replace(SchedulerState::Stopped);
    }

    /// One poll cycle. Returns the delay before the next one, or `None` when
    /// cancelled mid-fetch.
    async fn run_cycle(&mut self, token: &CancellationToken) -> Option<Duration> {
        let now = Instant::now();
        if self.backoff.should_skip(now) {
            debug!(
                remaining = ?self.backoff.remaining(now),
                "Auth backoff active, skipping poll"
            );
            return Some(self.interval);
        }

        let result = tokio::select! {
            _ = token.cancelled() => return None,
            result = self.fetcher.fetch(&self.target) => result,
        };

        match result {
            Ok(snapshot) => {
                self.backoff.reset();
                let report = self
                    .reconciler
                    .reconcile_cancellable(&snapshot, Some(token))
                    .await;
                if report.is_noop() {
                    debug!(live = snapshot.len(), "Poll cycle: no changes");
                } else {
                    info!(
                        live = snapshot.len(),
                        created = report.created,
                        reactivated = report.reactivated,
                        ended = report.ended,
                        failed = report.failed,
                        "Poll cycle reconciled"
                    );
                }
                Some(self.interval)
            }
            Err(e) if e.is_auth() => {
                self.backoff.record_auth_failure(Instant::now());
                error!(
                    error = %e,
                    backoff = ?self.backoff.cooldown(),
                    "Provider rejected poll credentials, backing off"
                );
                Some(self.backoff.cooldown())
            }
            Err(e) => {
                warn!(error = %e, "Poll failed, retrying next interval");
                Some(self.interval)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use graph_api::{FetchError, LiveVideo};

    use super::*;
    use crate::database::InMemoryLivestreamRepository;
    use crate::monitor::{LiveSnapshot, LivestreamDefaults, LivestreamTransitions};

    /// Replays scripted results, then keeps returning the last one.
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Result<Vec<&'static str>, FetchError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn new(script: Vec<Result<Vec<&'static str>, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LiveFetcher for ScriptedFetcher {
        async fn fetch(&self, _target: &PollTarget) -> Result<LiveSnapshot, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            };
            next.unwrap_or(Ok(Vec::new()))
                .map(|ids| LiveSnapshot::new(ids.into_iter().map(LiveVideo::new)))
        }
    }

    fn auth_error() -> FetchError {
        FetchError::Auth {
            code: 190,
            message: "Error validating access token".to_string(),
        }
    }

    fn timing() -> PollerTiming {
        PollerTiming {
            interval: Duration::from_secs(60),
            auth_backoff: Duration::from_secs(600),
            request_timeout: Duration::from_secs(15),
        }
    }

    fn scheduler(
        fetcher: Arc<ScriptedFetcher>,
    ) -> (Arc<InMemoryLivestreamRepository>, PollScheduler) {
        let repo = Arc::new(InMemoryLivestreamRepository::new());
        let reconciler = LiveSetReconciler::new(
            LivestreamTransitions::new(repo.clone()),
            LivestreamDefaults::for_poller(None, None),
        );
        let scheduler = PollScheduler::new(
            fetcher,
            PollTarget::Group("g1".to_string()),
            reconciler,
            &timing(),
        );
        (repo, scheduler)
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_suppresses_fetch_until_cooldown() {
        let fetcher = ScriptedFetcher::new(vec![Err(auth_error()), Ok(vec!["a"])]);
        let (repo, scheduler) = scheduler(fetcher.clone());
        let root = CancellationToken::new();
        let mut handle = scheduler.spawn(&root);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fetcher.calls(), 1);

        tokio::time::sleep(Duration::from_secs(58)).await;
        assert_eq!(fetcher.calls(), 1, "no fetch at t=59s");

        tokio::time::sleep(Duration::from_secs(542)).await;
        assert_eq!(fetcher.calls(), 2, "fetch resumes at t>=600s");
        assert_eq!(repo.create_count(), 1);

        handle.shutdown(Duration::from_secs(5)).await;
        assert_eq!(handle.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_do_not_back_off() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(FetchError::Transient("connection reset".to_string())),
            Ok(vec![]),
        ]);
        let (_repo, scheduler) = scheduler(fetcher.clone());
        let root = CancellationToken::new();
        let mut handle = scheduler.spawn(&root);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(fetcher.calls(), 2);
        assert_eq!(handle.state(), SchedulerState::Running);

        handle.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let fetcher = ScriptedFetcher::new(vec![Ok(vec!["a"])]);
        let (_repo, scheduler) = scheduler(fetcher.clone());
        let root = CancellationToken::new();
        let mut handle = scheduler.spawn(&root);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let started = Instant::now();
        root.cancel();
        handle.shutdown(Duration::from_secs(5)).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(handle.state(), SchedulerState::Stopped);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_then_empty_ends_stream() {
        let fetcher = ScriptedFetcher::new(vec![Ok(vec!["a"]), Ok(vec![])]);
        let (repo, scheduler) = scheduler(fetcher.clone());
        let root = CancellationToken::new();
        let mut handle = scheduler.spawn(&root);

        tokio::time::sleep(Duration::from_secs(61)).await;
        let records = repo.all().await;
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_active);
        assert!(records[0].ended_at.is_some());

        handle.shutdown(Duration::from_secs(5)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_truncated_listing_keeps_streams_active() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(vec!["a", "b"]),
            Err(FetchError::Truncated { pages: 10 }),
        ]);
        let (repo, scheduler) = scheduler(fetcher.clone());
        let root = CancellationToken::new();
        let mut handle = scheduler.spawn(&root);

        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(fetcher.calls(), 3);
        let records = repo.all().await;
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.is_active));
        assert_eq!(repo.update_count(), 0);

        handle.shutdown(Duration::from_secs(5)).await;
    }
}
