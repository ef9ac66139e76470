//! API server setup and configuration.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::Request;
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::api::routes;
use crate::config::ApiSettings;
use crate::database::LivestreamRepository;
use crate::error::Result;
use crate::scheduler::SchedulerState;
use crate::webhook::WebhookIngestor;

/// Request body limit; webhook deliveries are small.
const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Single allowed CORS origin. `None` disables CORS handling.
    pub cors_origin: Option<String>,
    pub body_limit: usize,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self::from(&ApiSettings::default())
    }
}

impl From<&ApiSettings> for ApiServerConfig {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            bind_address: settings.bind_address.clone(),
            port: settings.port,
            cors_origin: settings.frontend_url.clone(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    pub repository: Arc<dyn LivestreamRepository>,
    pub ingestor: Arc<WebhookIngestor>,
    /// Key for `X-Hub-Signature-256`; unchecked when `None`.
    pub app_secret: Option<Arc<str>>,
    /// Follows the poll scheduler; `None` before it is wired.
    pub poller_state: Option<watch::Receiver<SchedulerState>>,
}

impl AppState {
    pub fn new(repository: Arc<dyn LivestreamRepository>, ingestor: Arc<WebhookIngestor>) -> Self {
        Self {
            start_time: Instant::now(),
            repository,
            ingestor,
            app_secret: None,
            poller_state: None,
        }
    }

    pub fn with_app_secret(mut self, secret: Option<String>) -> Self {
        self.app_secret = secret.map(Arc::from);
        self
    }

    pub fn with_poller_state(mut self, state: watch::Receiver<SchedulerState>) -> Self {
        self.poller_state = Some(state);
        self
    }

    pub fn poller_state(&self) -> SchedulerState {
        self.poller_state
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(SchedulerState::Stopped)
    }
}

/// API server.
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
    cancel_token: CancellationToken,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self {
            config,
            state,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Get the cancellation token for graceful shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Build the router with all middleware and routes.
    pub fn build_router(&self) -> Router {
        let mut router = routes::create_router(self.state.clone())
            .layer(axum::extract::DefaultBodyLimit::max(self.config.body_limit));

        if let Some(origin) = self.config.cors_origin.as_deref() {
            match HeaderValue::from_str(origin) {
                Ok(origin) => {
                    let cors = CorsLayer::new()
                        .allow_origin(origin)
                        .allow_methods(Any)
                        .allow_headers(Any);
                    router = router.layer(cors);
                }
                Err(e) => {
                    tracing::warn!(origin, error = %e, "Invalid CORS origin, CORS disabled");
                }
            }
        }

        router.layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request| {
                    if req.uri().path().starts_with("/health") {
                        Span::none()
                    } else {
                        let mut make_span =
                            tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO);
                        use tower_http::trace::MakeSpan;
                        make_span.make_span(req)
                    }
                })
                .on_request(|req: &Request, span: &Span| {
                    if span.is_disabled() {
                        return;
                    }
                    let mut on_request =
                        tower_http::trace::DefaultOnRequest::new().level(tracing::Level::INFO);
                    use tower_http::trace::OnRequest;
                    on_request.on_request(req, span);
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        if span.is_disabled() {
                            return;
                        }
                        let on_response =
                            tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO);
                        use tower_http::trace::OnResponse;
                        on_response.on_response(res, latency, span);
                    },
                ),
        )
    }

    /// Start the server and serve until the cancel token fires.
    pub async fn run(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| crate::error::Error::ApiError(format!("Invalid address: {}", e)))?;

        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let router = self.build_router();
        if let Ok(addr) = listener.local_addr() {
            tracing::info!("API server listening on http://{}", addr);
        }

        let cancel_token = self.cancel_token.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                tracing::info!("API server shutting down...");
            })
            .await
            .map_err(|e| crate::error::Error::ApiError(format!("Server error: {}", e)))?;

        Ok(())
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
