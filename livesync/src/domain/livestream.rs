//! Livestream record entity and the write shapes the record store accepts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A livestream record as held by the record store.
///
/// `external_video_id` is the provider's broadcast id and is unique within the
/// store. Records are never deleted here; `is_active` toggles instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivestreamRecord {
    pub id: String,
    pub external_video_id: String,
    pub title: String,
    pub is_active: bool,
    pub is_private: bool,
    /// Facebook group the broadcast belongs to.
    pub group_id: Option<String>,
    /// Class the broadcast is attached to.
    pub class_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Fields for a record created on first detection. New records start active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLivestream {
    pub external_video_id: String,
    pub title: String,
    pub is_private: bool,
    pub group_id: Option<String>,
    pub class_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Partial update of a record.
///
/// `None` leaves a field untouched. `ended_at: Some(None)` clears the column.
/// When `expect_active` is set the update only applies to a record whose
/// current `is_active` equals it, which makes activation and deactivation a
/// single compare-and-set at the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LivestreamUpdate {
    pub title: Option<String>,
    pub is_active: Option<bool>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<Option<DateTime<Utc>>>,
    pub expect_active: Option<bool>,
}

impl LivestreamUpdate {
    /// Flip an inactive record to active, restarting its timestamps.
    pub fn activate(at: DateTime<Utc>) -> Self {
        Self {
            is_active: Some(true),
            started_at: Some(at),
            ended_at: Some(None),
            expect_active: Some(false),
            ..Default::default()
        }
    }

    /// Flip an active record to inactive.
    pub fn deactivate(at: DateTime<Utc>) -> Self {
        Self {
            is_active: Some(false),
            ended_at: Some(Some(at)),
            expect_active: Some(true),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.is_active.is_none()
            && self.started_at.is_none()
            && self.ended_at.is_none()
    }
}
