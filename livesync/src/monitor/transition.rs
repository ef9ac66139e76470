//! Activate/deactivate transitions shared by the poller and the webhook.
//!
//! Both read the record first and then write conditionally, so running the
//! same transition twice, or from both paths at once, converges on one record
//! in the expected state.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::database::LivestreamRepository;
use crate::domain::{LivestreamRecord, NewLivestream};
use crate::{Error, Result};

/// Read-then-write attempts before giving up on a record that keeps changing.
const MAX_ACTIVATE_ATTEMPTS: usize = 3;

/// Field values for records created on first detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivestreamDefaults {
    /// Title used when the provider sends none.
    pub fallback_title: String,
    pub is_private: bool,
    pub group_id: Option<String>,
    pub class_id: Option<String>,
}

impl LivestreamDefaults {
    /// Records discovered by polling are public.
    pub fn for_poller(group_id: Option<String>, class_id: Option<String>) -> Self {
        Self {
            fallback_title: "Facebook Live".to_string(),
            is_private: false,
            group_id,
            class_id,
        }
    }

    /// Records announced by the webhook are private to their class.
    pub fn for_webhook(group_id: Option<String>, class_id: Option<String>) -> Self {
        Self {
            fallback_title: "Live Class".to_string(),
            is_private: true,
            group_id,
            class_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivateOutcome {
    Created(LivestreamRecord),
    Reactivated(LivestreamRecord),
    /// Already active; nothing written.
    AlreadyActive(LivestreamRecord),
}

impl ActivateOutcome {
    pub fn record(&self) -> &LivestreamRecord {
        match self {
            Self::Created(r) | Self::Reactivated(r) | Self::AlreadyActive(r) => r,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeactivateOutcome {
    Deactivated(LivestreamRecord),
    AlreadyInactive,
    NotFound,
}

#[derive(Clone)]
pub struct LivestreamTransitions {
    repo: Arc<dyn LivestreamRepository>,
}

impl LivestreamTransitions {
    pub fn new(repo: Arc<dyn LivestreamRepository>) -> Self {
        Self { repo }
    }

    /// Make sure an active record exists for `external_video_id`.
    ///
    /// A create that loses a race against another writer re-reads and
    /// continues from the stored state.
    pub async fn activate(
        &self,
        external_video_id: &str,
        title: Option<&str>,
        defaults: &LivestreamDefaults,
    ) -> Result<ActivateOutcome> {
        for attempt in 1..=MAX_ACTIVATE_ATTEMPTS {
            match self.repo.find_by_external_id(external_video_id).await? {
                Some(record) if record.is_active => {
                    return Ok(ActivateOutcome::AlreadyActive(record));
                }
                Some(record) => {
                    if let Some(updated) = self.repo.activate(&record.id, Utc::now()).await? {
                        return Ok(ActivateOutcome::Reactivated(updated));
                    }
                    debug!(external_video_id, attempt, "Record changed, retrying");
                }
                None => {
                    let new = NewLivestream {
                        external_video_id: external_video_id.to_string(),
                        title: title
                            .map(str::trim)
                            .filter(|t| !t.is_empty())
                            .unwrap_or(defaults.fallback_title.as_str())
                            .to_string(),
                        is_private: defaults.is_private,
                        group_id: defaults.group_id.clone(),
                        class_id: defaults.class_id.clone(),
                        started_at: Utc::now(),
                    };
                    match self.repo.create(&new).await {
                        Ok(record) => return Ok(ActivateOutcome::Created(record)),
                        Err(e) if e.is_conflict() => {
                            debug!(external_video_id, attempt, "Concurrent create, re-reading");
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
        }

        Err(Error::store(format!(
            "livestream {external_video_id} kept changing during activation"
        )))
    }

    /// Mark the record for `external_video_id` inactive if it is active.
    pub async fn deactivate(&self, external_video_id: &str) -> Result<DeactivateOutcome> {
        let Some(record) = self.repo.find_by_external_id(external_video_id).await? else {
            return Ok(DeactivateOutcome::NotFound);
        };
        if !record.is_active {
            return Ok(DeactivateOutcome::AlreadyInactive);
        }

        Ok(match self.repo.deactivate(&record.id, Utc::now()).await? {
            Some(updated) => DeactivateOutcome::Deactivated(updated),
            None => DeactivateOutcome::AlreadyInactive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryLivestreamRepository;

    fn setup() -> (Arc<InMemoryLivestreamRepository>, LivestreamTransitions) {
        let repo = Arc::new(InMemoryLivestreamRepository::new());
        let transitions = LivestreamTransitions::new(repo.clone());
        (repo, transitions)
    }

    #[tokio::test]
    async fn test_activate_creates_with_defaults() {
        let (repo, transitions) = setup();
        let defaults = LivestreamDefaults::for_poller(Some("g1".into()), None);

        let blank = Some("  ");
        let outcome = transitions.activate("v1", blank, &defaults).await.unwrap();
        let ActivateOutcome::Created(record) = outcome else {
            panic!("expected a created record");
        };
        assert_eq!(record.title, "Facebook Live");
        assert_eq!(record.group_id.as_deref(), Some("g1"));
        assert!(record.is_active);
        assert!(!record.is_private);
        assert_eq!(repo.create_count(), 1);
    }

    #[tokio::test]
    async fn test_activate_twice_writes_once() {
        let (repo, transitions) = setup();
        let defaults = LivestreamDefaults::for_webhook(None, Some("c1".into()));

        let title = Some("Math");
        transitions.activate("v1", title, &defaults).await.unwrap();
        let second = transitions.activate("v1", title, &defaults).await.unwrap();

        assert!(matches!(second, ActivateOutcome::AlreadyActive(_)));
        assert_eq!(repo.write_count(), 1);
    }

    #[tokio::test]
    async fn test_reactivate_clears_end() {
        let (repo, transitions) = setup();
        let defaults = LivestreamDefaults::for_poller(None, None);

        transitions.activate("v1", None, &defaults).await.unwrap();
        assert!(matches!(
            transitions.deactivate("v1").await.unwrap(),
            DeactivateOutcome::Deactivated(_)
        ));

        let outcome = transitions.activate("v1", None, &defaults).await.unwrap();
        let ActivateOutcome::Reactivated(record) = outcome else {
            panic!("expected reactivation");
        };
        assert!(record.is_active);
        assert!(record.ended_at.is_none());
        assert_eq!(repo.create_count(), 1);
    }

    #[tokio::test]
    async fn test_deactivate_missing_and_inactive() {
        let (repo, transitions) = setup();
        assert_eq!(
            transitions.deactivate("nope").await.unwrap(),
            DeactivateOutcome::NotFound
        );

        transitions
            .activate("v1", None, &LivestreamDefaults::default())
            .await
            .unwrap();
        transitions.deactivate("v1").await.unwrap();
        assert_eq!(
            transitions.deactivate("v1").await.unwrap(),
            DeactivateOutcome::AlreadyInactive
        );
        assert_eq!(repo.update_count(), 1);
    }
}
