//! Facebook Graph API client for live-video polling.
//!
//! Only the `live_videos` edge is covered: list the broadcasts of a group or
//! user that are currently on air, and classify failures so callers can tell
//! an expired token apart from throttling or a flaky network.

pub mod client;
pub mod error;
pub mod models;

pub use client::{
    DEFAULT_API_VERSION, DEFAULT_BASE_URL, GraphClient, GraphClientConfig, create_client_builder,
};
pub use error::{FetchError, GraphErrorBody};
pub use models::{LIVE_STATUS, LiveVideo, LiveVideoPage};
