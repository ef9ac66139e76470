//! Domain types shared by the poller, the webhook ingestor and the record store.

pub mod livestream;
pub mod target;

pub use livestream::{LivestreamRecord, LivestreamUpdate, NewLivestream};
pub use target::PollTarget;
