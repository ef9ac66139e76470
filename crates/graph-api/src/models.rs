use serde::{Deserialize, Serialize};

/// A live video as returned by the `live_videos` edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveVideo {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl LiveVideo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            status: Some(LIVE_STATUS.to_string()),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Status value the provider uses for broadcasts that are currently on air.
pub const LIVE_STATUS: &str = "LIVE";

/// One page of the `live_videos` edge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiveVideoPage {
    #[serde(default)]
    pub data: Vec<LiveVideo>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<String>,
}
