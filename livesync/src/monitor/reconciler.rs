//! Live-set reconciliation.
//!
//! Diffs each poll snapshot against the ids believed live and drives the
//! START/END transitions. The known-live set lives only in memory and is a
//! hint: the record store decides what is actually written.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fetcher::LiveSnapshot;
use super::transition::{
    ActivateOutcome, DeactivateOutcome, LivestreamDefaults, LivestreamTransitions,
};

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub created: usize,
    pub reactivated: usize,
    /// Newly seen ids whose record was already active.
    pub confirmed: usize,
    pub ended: usize,
    pub failed: usize,
    /// The pass stopped early on cancellation.
    pub interrupted: bool,
}

impl ReconcileReport {
    pub fn writes(&self) -> usize {
        self.created + self.reactivated + self.ended
    }

    pub fn is_noop(&self) -> bool {
        self.writes() == 0 && self.failed == 0
    }
}

/// Owns the known-live set. Only the scheduler task holds one.
pub struct LiveSetReconciler {
    transitions: LivestreamTransitions,
    defaults: LivestreamDefaults,
    known_live: HashSet<String>,
}

impl LiveSetReconciler {
    pub fn new(transitions: LivestreamTransitions, defaults: LivestreamDefaults) -> Self {
        Self {
            transitions,
            defaults,
            known_live: HashSet::new(),
        }
    }

    pub fn known_live(&self) -> &HashSet<String> {
        &self.known_live
    }

    pub async fn reconcile(&mut self, snapshot: &LiveSnapshot) -> ReconcileReport {
        self.reconcile_cancellable(snapshot, None).await
    }

    /// Reconcile one snapshot.
    ///
    /// Newly live ids are handled before ended ones. A failed activation keeps
    /// the id out of the known set so the next cycle retries it; an ended id
    /// leaves the set whatever the write outcome. With a token, the pass stops
    /// between ids once it is cancelled.
    pub async fn reconcile_cancellable(
        &mut self,
        snapshot: &LiveSnapshot,
        cancel: Option<&CancellationToken>,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let cancelled = || cancel.is_some_and(CancellationToken::is_cancelled);

        let newly_live: Vec<_> = snapshot
            .iter()
            .filter(|v| !self.known_live.contains(&v.id))
            .cloned()
            .collect();

        for video in newly_live {
            if cancelled() {
                report.interrupted = true;
                return report;
            }

            match self
                .transitions
                .activate(&video.id, video.title.as_deref(), &self.defaults)
                .await
            {
                Ok(outcome) => {
                    match &outcome {
                        ActivateOutcome::Created(record) => {
                            info!(
                                video_id = %video.id,
                                record_id = %record.id,
                                title = %record.title,
                                "Livestream started"
                            );
                            report.created += 1;
                        }
                        ActivateOutcome::Reactivated(record) => {
                            info!(
                                video_id = %video.id,
                                record_id = %record.id,
                                "Livestream resumed"
                            );
                            report.reactivated += 1;
                        }
                        ActivateOutcome::AlreadyActive(_) => {
                            debug!(video_id = %video.id, "Livestream already active");
                            report.confirmed += 1;
                        }
                    }
                    self.known_live.insert(video.id);
                }
                Err(e) => {
                    warn!(
                        video_id = %video.id,
                        error = %e,
                        "Failed to activate livestream, retrying next cycle"
                    );
                    report.failed += 1;
                }
            }
        }

        let ended: Vec<String> = self
            .known_live
            .iter()
            .filter(|id| !snapshot.contains(id))
            .cloned()
            .collect();

        for id in ended {
            if cancelled() {
                report.interrupted = true;
                return report;
            }

            match self.transitions.deactivate(&id).await {
                Ok(DeactivateOutcome::Deactivated(record)) => {
                    info!(video_id = %id, record_id = %record.id, "Livestream ended");
                    report.ended += 1;
                }
                Ok(outcome) => {
                    debug!(video_id = %id, ?outcome, "Nothing to deactivate");
                }
                Err(e) => {
                    warn!(video_id = %id, error = %e, "Failed to deactivate livestream");
                    report.failed += 1;
                }
            }
            self.known_live.remove(&id);
        }

        report
    }
}
