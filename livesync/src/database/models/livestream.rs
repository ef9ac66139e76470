//! Livestream row model.

use sqlx::FromRow;

use crate::database::time::{from_ms, now_ms, opt_from_ms, to_ms};
use crate::domain::{LivestreamRecord, NewLivestream};

/// A row of the `livestreams` table.
#[derive(Debug, Clone, FromRow)]
pub struct LivestreamDbModel {
    pub id: String,
    pub external_video_id: String,
    pub title: String,
    pub is_active: bool,
    pub is_private: bool,
    pub group_id: Option<String>,
    pub class_id: Option<String>,
    /// Unix epoch milliseconds (UTC).
    pub started_at: Option<i64>,
    /// Unix epoch milliseconds (UTC).
    pub ended_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl LivestreamDbModel {
    /// Build a fresh active row with a generated id.
    pub fn from_new(new: &NewLivestream) -> Self {
        let now = now_ms();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            external_video_id: new.external_video_id.clone(),
            title: new.title.clone(),
            is_active: true,
            is_private: new.is_private,
            group_id: new.group_id.clone(),
            class_id: new.class_id.clone(),
            started_at: Some(to_ms(new.started_at)),
            ended_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl From<LivestreamDbModel> for LivestreamRecord {
    fn from(row: LivestreamDbModel) -> Self {
        Self {
            id: row.id,
            external_video_id: row.external_video_id,
            title: row.title,
            is_active: row.is_active,
            is_private: row.is_private,
            group_id: row.group_id,
            class_id: row.class_id,
            started_at: row.started_at.map(from_ms),
            ended_at: opt_from_ms(row.ended_at),
        }
    }
}
