//! Poll scheduler.
//!
//! A single background task owns the reconciler and its known-live set,
//! fetching the provider's live set on a fixed interval until cancelled.

mod service;
mod task;

pub use service::PollScheduler;
pub use task::{PollerHandle, SchedulerState};
