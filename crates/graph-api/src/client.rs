use std::time::Duration;

use reqwest::{Client, ClientBuilder, StatusCode};
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{FetchError, GraphErrorEnvelope};
use crate::models::{LIVE_STATUS, LiveVideo, LiveVideoPage};

pub const DEFAULT_BASE_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_API_VERSION: &str = "v25.0";

/// Fields requested for every live video.
const LIVE_VIDEO_FIELDS: &str = "id,title,description,status";

/// Upper bound on followed `paging.next` links per listing.
pub const DEFAULT_MAX_PAGES: usize = 10;

/// Create a reqwest client builder with the settings used for Graph API calls.
pub fn create_client_builder(timeout: Option<Duration>) -> ClientBuilder {
    let mut builder = Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if let Some(timeout) = timeout.filter(|t| !t.is_zero()) {
        builder = builder.timeout(timeout);
    }
    builder
}

#[derive(Debug, Clone)]
pub struct GraphClientConfig {
    pub base_url: String,
    pub api_version: String,
    pub access_token: String,
    pub max_pages: usize,
}

impl GraphClientConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            access_token: access_token.into(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }
}

/// Graph API client scoped to one access token.
#[derive(Debug, Clone)]
pub struct GraphClient {
    client: Client,
    base_url: Url,
    api_version: String,
    access_token: String,
    max_pages: usize,
}

impl GraphClient {
    pub fn new(config: GraphClientConfig, client: Client) -> Result<Self, FetchError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(FetchError::InvalidUrl(config.base_url));
        }

        Ok(Self {
            client,
            base_url,
            api_version: config.api_version.trim_matches('/').to_string(),
            access_token: config.access_token,
            max_pages: config.max_pages.max(1),
        })
    }

    fn live_videos_url(&self, target_id: &str) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FetchError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend([self.api_version.as_str(), target_id, "live_videos"]);

        url.query_pairs_mut()
            .append_pair("status", LIVE_STATUS)
            .append_pair("fields", LIVE_VIDEO_FIELDS)
            .append_pair("access_token", &self.access_token);
        Ok(url)
    }

    /// List the videos of `target_id` (a group or a user) that are currently live.
    ///
    /// Follows `paging.next` up to the configured page cap. An empty list is a
    /// valid answer meaning nothing is on air. A listing that still has a next
    /// page at the cap fails with [`FetchError::Truncated`].
    pub async fn list_live_videos(&self, target_id: &str) -> Result<Vec<LiveVideo>, FetchError> {
        let mut videos = Vec::new();
        let mut next = Some(self.live_videos_url(target_id)?);
        let mut pages = 0usize;

        while let Some(url) = next.take() {
            pages += 1;
            let page = self.fetch_page(url).await?;
            trace!(count = page.data.len(), page = pages, "live_videos page");
            videos.extend(page.data);

            let Some(link) = page.paging.and_then(|p| p.next) else {
                break;
            };
            if pages >= self.max_pages {
                warn!(
                    target_id,
                    max_pages = self.max_pages,
                    "live_videos listing exceeds page cap"
                );
                return Err(FetchError::Truncated { pages });
            }
            let url =
                Url::parse(&link).map_err(|e| FetchError::InvalidUrl(format!("{link}: {e}")))?;
            next = Some(url);
        }

        debug!(target_id, count = videos.len(), "fetched live videos");
        Ok(videos)
    }

    async fn fetch_page(&self, url: Url) -> Result<LiveVideoPage, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<LiveVideoPage>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_error_body(status, &body))
    }
}

fn classify_error_body(status: StatusCode, body: &str) -> FetchError {
    let envelope = serde_json::from_str::<GraphErrorEnvelope>(body).ok();
    let error = envelope.and_then(|e| e.error);

    if error.is_none() {
        let snippet: String = body.chars().take(200).collect();
        debug!(status = status.as_u16(), body = %snippet, "undecodable Graph API error body");
    }

    FetchError::from_response(status.as_u16(), error.as_ref())
}
