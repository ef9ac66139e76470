//! Live-set fetching.

use std::collections::HashSet;

use async_trait::async_trait;
use graph_api::{FetchError, GraphClient, LIVE_STATUS, LiveVideo};

use crate::domain::PollTarget;

/// The broadcasts on air at one poll, in provider order, one entry per id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSnapshot {
    videos: Vec<LiveVideo>,
}

impl LiveSnapshot {
    /// Build a snapshot, dropping duplicate ids and entries the provider
    /// reports with a status other than `LIVE`.
    pub fn new(videos: impl IntoIterator<Item = LiveVideo>) -> Self {
        let mut seen = HashSet::new();
        let videos = videos
            .into_iter()
            .filter(|v| v.status.as_deref().is_none_or(|s| s == LIVE_STATUS))
            .filter(|v| !v.id.is_empty() && seen.insert(v.id.clone()))
            .collect();
        Self { videos }
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.videos.iter().map(|v| v.id.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.videos.iter().any(|v| v.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&LiveVideo> {
        self.videos.iter().find(|v| v.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LiveVideo> {
        self.videos.iter()
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

/// Source of the current live set.
#[async_trait]
pub trait LiveFetcher: Send + Sync {
    async fn fetch(&self, target: &PollTarget) -> Result<LiveSnapshot, FetchError>;
}

/// [`LiveFetcher`] backed by the Graph API `live_videos` edge.
pub struct GraphFetcher {
    client: GraphClient,
}

impl GraphFetcher {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LiveFetcher for GraphFetcher {
    async fn fetch(&self, target: &PollTarget) -> Result<LiveSnapshot, FetchError> {
        let videos = self.client.list_live_videos(target.id()).await?;
        Ok(LiveSnapshot::new(videos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_dedupes_and_keeps_order() {
        let snapshot = LiveSnapshot::new(vec![
            LiveVideo::new("b").with_title("first b"),
            LiveVideo::new("a"),
            LiveVideo::new("b").with_title("second b"),
        ]);

        assert_eq!(snapshot.ids().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(
            snapshot.get("b").and_then(|v| v.title.as_deref()),
            Some("first b")
        );
    }

    #[test]
    fn test_snapshot_drops_non_live_entries() {
        let mut ended = LiveVideo::new("old");
        ended.status = Some("VOD".to_string());
        let mut unknown = LiveVideo::new("bare");
        unknown.status = None;

        let snapshot = LiveSnapshot::new(vec![ended, unknown, LiveVideo::new("")]);
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains("bare"));
        assert!(!snapshot.contains("old"));
    }
}
