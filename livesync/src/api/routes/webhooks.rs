//! Provider webhook routes.
//!
//! Served at `/webhook` and `/api/webhooks/facebook`:
//! - `GET` answers the subscription handshake
//! - `POST` receives status changes and always acknowledges

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::WebhookAck;
use crate::api::server::AppState;
use crate::webhook::{SIGNATURE_HEADER, verify_signature};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .route("/api/webhooks/facebook", get(verify).post(receive))
}

/// Handshake query. Accepts both plain names and the provider's `hub.*` names.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(default, alias = "hub.mode")]
    pub mode: Option<String>,
    #[serde(default, alias = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(default, alias = "hub.challenge")]
    pub challenge: Option<String>,
}

async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<String> {
    state
        .ingestor
        .verify(
            query.mode.as_deref(),
            query.verify_token.as_deref(),
            query.challenge.as_deref(),
        )
        .map_err(|e| {
            warn!(reason = %e, "Webhook verification rejected");
            ApiError::forbidden("Webhook verification failed")
        })
}

async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    if let Some(secret) = state.app_secret.as_deref() {
        let header = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        verify_signature(secret, header, &body).map_err(|e| {
            warn!(reason = %e, "Webhook signature rejected");
            ApiError::unauthorized("Invalid webhook signature")
        })?;
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "Ignoring webhook body that is not JSON");
            return Ok(Json(WebhookAck::ok()));
        }
    };

    let report = state.ingestor.receive(&payload).await;
    debug!(?report, "Webhook processed");

    Ok(Json(WebhookAck::ok()))
}
