//! API route modules.

pub mod health;
pub mod livestreams;
pub mod webhooks;

use axum::Router;

use crate::api::server::AppState;

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(webhooks::router())
        .merge(livestreams::router())
        .with_state(state)
}
