//! Live-status monitoring.
//!
//! - Fetching the provider's current live set
//! - Backoff after authentication failures
//! - Diffing snapshots into START/END transitions against the record store

pub mod backoff;
pub mod fetcher;
pub mod reconciler;
pub mod transition;

pub use backoff::BackoffController;
pub use fetcher::{GraphFetcher, LiveFetcher, LiveSnapshot};
pub use reconciler::{LiveSetReconciler, ReconcileReport};
pub use transition::{
    ActivateOutcome, DeactivateOutcome, LivestreamDefaults, LivestreamTransitions,
};
