//! livesync library crate.
//!
//! Keeps livestream records in step with the provider's live status, fed by
//! a periodic poll and by push webhooks.

pub mod api;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod scheduler;
pub mod services;
pub mod webhook;

pub use error::{Error, Result};
