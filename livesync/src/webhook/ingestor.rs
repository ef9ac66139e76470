//! Webhook verification and status-change ingestion.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::payload::{ChangeKind, parse_changes};
use crate::monitor::{
    ActivateOutcome, DeactivateOutcome, LivestreamDefaults, LivestreamTransitions,
};

const SUBSCRIBE_MODE: &str = "subscribe";

/// Webhook settings taken from configuration.
#[derive(Debug, Clone, Default)]
pub struct WebhookSettings {
    pub verify_token: Option<String>,
    pub default_group_id: Option<String>,
    /// Required to create records from LIVE events.
    pub default_class_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerifyRejected {
    #[error("no verify token configured")]
    NotConfigured,
    #[error("mode is not subscribe")]
    WrongMode,
    #[error("verify token mismatch")]
    TokenMismatch,
}

/// Tally of one webhook delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiveReport {
    pub activated: usize,
    pub deactivated: usize,
    /// Changes that needed no write.
    pub unchanged: usize,
    /// LIVE changes dropped because no default class is configured.
    pub dropped: usize,
    /// Statuses that are neither LIVE nor ended, plus malformed changes.
    pub ignored: usize,
    pub failed: usize,
}

pub struct WebhookIngestor {
    transitions: LivestreamTransitions,
    settings: WebhookSettings,
}

impl WebhookIngestor {
    pub fn new(transitions: LivestreamTransitions, settings: WebhookSettings) -> Self {
        Self {
            transitions,
            settings,
        }
    }

    /// Subscription handshake. Returns the challenge to echo back.
    pub fn verify(
        &self,
        mode: Option<&str>,
        token: Option<&str>,
        challenge: Option<&str>,
    ) -> Result<String, VerifyRejected> {
        let expected = self
            .settings
            .verify_token
            .as_deref()
            .ok_or(VerifyRejected::NotConfigured)?;
        if mode != Some(SUBSCRIBE_MODE) {
            return Err(VerifyRejected::WrongMode);
        }
        if token != Some(expected) {
            return Err(VerifyRejected::TokenMismatch);
        }
        Ok(challenge.unwrap_or_default().to_string())
    }

    /// Apply every status change in `payload`. Never fails; problems are
    /// logged and counted.
    pub async fn receive(&self, payload: &Value) -> ReceiveReport {
        let parsed = parse_changes(payload);
        let mut report = ReceiveReport {
            ignored: parsed.skipped,
            ..Default::default()
        };

        for change in parsed.changes {
            match change.kind() {
                ChangeKind::Live => {
                    let Some(class_id) = self.settings.default_class_id.clone() else {
                        warn!(
                            video_id = %change.video_id,
                            "No default class configured, dropping LIVE event"
                        );
                        report.dropped += 1;
                        continue;
                    };
                    let defaults = LivestreamDefaults::for_webhook(
                        self.settings.default_group_id.clone(),
                        Some(class_id),
                    );
                    match self
                        .transitions
                        .activate(&change.video_id, change.title.as_deref(), &defaults)
                        .await
                    {
                        Ok(ActivateOutcome::AlreadyActive(_)) => report.unchanged += 1,
                        Ok(outcome) => {
                            info!(
                                video_id = %change.video_id,
                                record_id = %outcome.record().id,
                                "Livestream activated from webhook"
                            );
                            report.activated += 1;
                        }
                        Err(e) => {
                            warn!(
                                video_id = %change.video_id,
                                error = %e,
                                "Webhook activation failed"
                            );
                            report.failed += 1;
                        }
                    }
                }
                ChangeKind::Ended => match self.transitions.deactivate(&change.video_id).await {
                    Ok(DeactivateOutcome::Deactivated(record)) => {
                        info!(
                            video_id = %change.video_id,
                            record_id = %record.id,
                            "Livestream deactivated from webhook"
                        );
                        report.deactivated += 1;
                    }
                    Ok(_) => report.unchanged += 1,
                    Err(e) => {
                        warn!(
                            video_id = %change.video_id,
                            error = %e,
                            "Webhook deactivation failed"
                        );
                        report.failed += 1;
                    }
                },
                ChangeKind::Other => {
                    debug!(video_id = %change.video_id, status = %change.status, "Ignoring status");
                    report.ignored += 1;
                }
            }
        }

        report
    }
}
