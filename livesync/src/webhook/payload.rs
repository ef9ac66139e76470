//! Lenient reading of `live_videos` webhook payloads.
//!
//! The provider sends `{"entry": [{"changes": [{"value": {...}}]}]}`. Each
//! entry is read on its own so one malformed change never hides its siblings.

use serde_json::Value;

/// Statuses that mean the broadcast is over.
pub const ENDED_STATUSES: &[&str] = &["VOD", "PROCESSING", "LIVE_STOPPED"];

/// One status change extracted from a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub video_id: String,
    pub status: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Live,
    Ended,
    Other,
}

impl StatusChange {
    pub fn kind(&self) -> ChangeKind {
        if self.status == graph_api::LIVE_STATUS {
            ChangeKind::Live
        } else if ENDED_STATUSES.contains(&self.status.as_str()) {
            ChangeKind::Ended
        } else {
            ChangeKind::Other
        }
    }
}

/// Result of walking a payload: the usable changes and how many were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPayload {
    pub changes: Vec<StatusChange>,
    pub skipped: usize,
}

pub fn parse_changes(payload: &Value) -> ParsedPayload {
    let mut parsed = ParsedPayload::default();

    let entries = payload
        .get("entry")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for entry in entries {
        let Some(changes) = entry.get("changes").and_then(Value::as_array) else {
            parsed.skipped += 1;
            continue;
        };
        for change in changes {
            match read_change(change) {
                Some(status_change) => parsed.changes.push(status_change),
                None => parsed.skipped += 1,
            }
        }
    }

    parsed
}

fn read_change(change: &Value) -> Option<StatusChange> {
    let value = change.get("value")?.as_object()?;

    let video_id = match value.get("video_id")? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if video_id.is_empty() {
        return None;
    }

    let status = value
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let title = value
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(StatusChange {
        video_id,
        status,
        title,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_reads_all_entries_and_changes() {
        let payload = json!({
            "object": "group",
            "entry": [
                {"changes": [
                    {"value": {"video_id": "1", "status": "LIVE", "title": "Algebra"}},
                    {"field": "live_videos", "value": {"video_id": 2, "status": "VOD"}}
                ]},
                {"changes": [
                    {"value": {"video_id": "3", "status": "SCHEDULED_UNPUBLISHED"}}
                ]}
            ]
        });

        let parsed = parse_changes(&payload);
        assert_eq!(parsed.skipped, 0);
        assert_eq!(parsed.changes.len(), 3);
        assert_eq!(parsed.changes[0].kind(), ChangeKind::Live);
        assert_eq!(parsed.changes[0].title.as_deref(), Some("Algebra"));
        assert_eq!(parsed.changes[1].video_id, "2");
        assert_eq!(parsed.changes[1].kind(), ChangeKind::Ended);
        assert_eq!(parsed.changes[2].kind(), ChangeKind::Other);
    }

    #[test]
    fn test_malformed_changes_are_skipped() {
        let payload = json!({
            "entry": [
                {"changes": [
                    {"value": {"status": "LIVE"}},
                    {"value": {"video_id": "", "status": "LIVE"}},
                    {"value": "not an object"},
                    {"value": {"video_id": {"nested": true}, "status": "LIVE"}},
                    {"value": {"video_id": "9", "status": "LIVE_STOPPED"}}
                ]},
                {"id": "no changes here"}
            ]
        });

        let parsed = parse_changes(&payload);
        assert_eq!(parsed.skipped, 5);
        assert_eq!(parsed.changes.len(), 1);
        assert_eq!(parsed.changes[0].kind(), ChangeKind::Ended);
    }

    #[test]
    fn test_missing_entry_is_empty() {
        assert_eq!(parse_changes(&json!({})), ParsedPayload::default());
        assert_eq!(parse_changes(&json!([1, 2])), ParsedPayload::default());
    }
}
