//! Read-only livestream routes.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::ApiResult;
use crate::api::server::AppState;
use crate::domain::LivestreamRecord;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/livestreams/active", get(list_active))
}

/// Records currently marked active, most recently started first.
async fn list_active(State(state): State<AppState>) -> ApiResult<Json<Vec<LivestreamRecord>>> {
    let records = state.repository.list_active().await?;
    Ok(Json(records))
}
