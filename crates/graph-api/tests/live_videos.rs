//! Tests the Graph API client against an in-process mock of the `live_videos` edge.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use graph_api::{FetchError, GraphClient, GraphClientConfig};
use serde_json::json;
use tokio::net::TcpListener;

async fn spawn_mock(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr, token: &str) -> GraphClient {
    GraphClient::new(
        GraphClientConfig::new(token).with_base_url(format!("http://{addr}")),
        reqwest::Client::new(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_lists_live_videos_across_pages() {
    async fn live_videos(
        State(addr): State<String>,
        Query(params): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        assert_eq!(params.get("status").map(String::as_str), Some("LIVE"));
        if params.get("after").is_some() {
            return axum::Json(json!({
                "data": [{"id": "v3", "title": "Evening", "status": "LIVE"}]
            }));
        }
        axum::Json(json!({
            "data": [
                {"id": "v1", "title": "Morning", "status": "LIVE"},
                {"id": "v2", "status": "LIVE"}
            ],
            "paging": {
                "next": format!("http://{addr}/v25.0/group-1/live_videos?status=LIVE&after=c1")
            }
        }))
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new()
        .route("/v25.0/group-1/live_videos", get(live_videos))
        .with_state(addr.to_string());
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let videos = client_for(addr, "good-token")
        .list_live_videos("group-1")
        .await
        .unwrap();

    let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["v1", "v2", "v3"]);
    assert_eq!(videos[0].title.as_deref(), Some("Morning"));
}

#[tokio::test]
async fn test_empty_listing_is_ok() {
    let router = Router::new().route(
        "/v25.0/me/live_videos",
        get(|| async { axum::Json(json!({"data": []})) }),
    );
    let addr = spawn_mock(router).await;

    let videos = client_for(addr, "t").list_live_videos("me").await.unwrap();
    assert!(videos.is_empty());
}

#[tokio::test]
async fn test_expired_token_is_classified_as_auth() {
    let router = Router::new().route(
        "/v25.0/me/live_videos",
        get(|| async {
            (
                StatusCode::BAD_REQUEST,
                axum::Json(json!({
                    "error": {
                        "message": "Error validating access token: Session has expired",
                        "type": "OAuthException",
                        "code": 190
                    }
                })),
            )
        }),
    );
    let addr = spawn_mock(router).await;

    let err = client_for(addr, "expired")
        .list_live_videos("me")
        .await
        .unwrap_err();
    assert!(err.is_auth(), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_throttled_response_is_rate_limited() {
    let router = Router::new().route(
        "/v25.0/me/live_videos",
        get(|| async {
            (
                StatusCode::FORBIDDEN,
                axum::Json(json!({"error": {"message": "User request limit reached", "code": 17}})),
            )
        }),
    );
    let addr = spawn_mock(router).await;

    let err = client_for(addr, "t")
        .list_live_videos("me")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::RateLimited { code: 17, .. }));
}

#[tokio::test]
async fn test_connection_refused_is_transient() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client_for(addr, "t")
        .list_live_videos("me")
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Transient(_)));
}

/// Serves one video per page; `last` is the final page index, `None` never ends.
async fn spawn_paged_mock(last: Option<usize>) -> SocketAddr {
    async fn live_videos(
        State((addr, last)): State<(String, Option<usize>)>,
        Query(params): Query<HashMap<String, String>>,
    ) -> impl IntoResponse {
        let page: usize = params
            .get("after")
            .and_then(|p| p.parse().ok())
            .unwrap_or(0);
        let mut body = json!({"data": [{"id": format!("v{page}"), "status": "LIVE"}]});
        if last.is_none_or(|last| page < last) {
            body["paging"] = json!({
                "next": format!("http://{addr}/v25.0/me/live_videos?status=LIVE&after={}", page + 1)
            });
        }
        axum::Json(body)
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new()
        .route("/v25.0/me/live_videos", get(live_videos))
        .with_state((addr.to_string(), last));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_listing_beyond_page_cap_is_an_error() {
    let addr = spawn_paged_mock(None).await;

    let err = client_for(addr, "t")
        .list_live_videos("me")
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::Truncated { pages: 10 });
    assert!(!err.is_auth());
}

#[tokio::test]
async fn test_listing_ending_at_page_cap_is_complete() {
    let addr = spawn_paged_mock(Some(2)).await;
    let client = GraphClient::new(
        GraphClientConfig::new("t")
            .with_base_url(format!("http://{addr}"))
            .with_max_pages(3),
        reqwest::Client::new(),
    )
    .unwrap();

    let videos = client.list_live_videos("me").await.unwrap();
    let ids: Vec<&str> = videos.iter().map(|v| v.id.as_str()).collect();
    assert_eq!(ids, vec!["v0", "v1", "v2"]);
}
