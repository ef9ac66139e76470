//! Service container.
//!
//! Builds the record store, webhook ingestor, poll scheduler and API server
//! from configuration and manages their lifecycle.

use std::sync::Arc;
use std::time::Duration;

use graph_api::{GraphClient, GraphClientConfig, create_client_builder};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::Result;
use crate::api::{ApiServer, ApiServerConfig, AppState};
use crate::config::{AppConfig, PollCredentials};
use crate::database::{
    self, DbPool, LivestreamRepository, PostgrestLivestreamRepository, SqlxLivestreamRepository,
};
use crate::monitor::{
    GraphFetcher, LiveFetcher, LiveSetReconciler, LivestreamDefaults, LivestreamTransitions,
};
use crate::scheduler::{PollScheduler, PollerHandle, SchedulerState};
use crate::webhook::{WebhookIngestor, WebhookSettings};

/// Service container holding all application services.
pub struct ServiceContainer {
    config: AppConfig,
    /// Present when the SQLite store is in use.
    pool: Option<DbPool>,
    pub repository: Arc<dyn LivestreamRepository>,
    pub ingestor: Arc<WebhookIngestor>,
    transitions: LivestreamTransitions,
    poller: PollerHandle,
    api_server: Option<Arc<ApiServer>>,
    api_task: Option<JoinHandle<Result<()>>>,
    cancellation_token: CancellationToken,
}

impl ServiceContainer {
    /// Open the configured record store and build the services on top of it.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        info!("Initializing service container");

        let timeout = Some(config.poller.request_timeout);
        let (repository, pool): (Arc<dyn LivestreamRepository>, Option<DbPool>) =
            match &config.postgrest {
                Some(postgrest) => {
                    info!(url = %postgrest.url, "Using PostgREST record store");
                    let client = create_client_builder(timeout).build()?;
                    let repo = PostgrestLivestreamRepository::new(
                        client,
                        &postgrest.url,
                        postgrest.service_key.clone(),
                    );
                    (Arc::new(repo), None)
                }
                None => {
                    let pool = database::init_pool(&config.database_url).await?;
                    database::run_migrations(&pool).await?;
                    let repo = SqlxLivestreamRepository::new(pool.clone());
                    (Arc::new(repo), Some(pool))
                }
            };

        Ok(Self::with_repository(config, repository, pool))
    }

    /// Build the services over an existing store.
    pub fn with_repository(
        config: AppConfig,
        repository: Arc<dyn LivestreamRepository>,
        pool: Option<DbPool>,
    ) -> Self {
        let transitions = LivestreamTransitions::new(repository.clone());
        let ingestor = Arc::new(WebhookIngestor::new(
            transitions.clone(),
            WebhookSettings {
                verify_token: config.facebook.webhook_verify_token.clone(),
                default_group_id: config.facebook.default_group_id.clone(),
                default_class_id: config.facebook.default_class_id.clone(),
            },
        ));

        Self {
            config,
            pool,
            repository,
            ingestor,
            transitions,
            poller: PollerHandle::disabled(),
            api_server: None,
            api_task: None,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Bind the API address, then start the poller (when configured) and the
    /// API server. Nothing is spawned if the bind fails.
    pub async fn start(&mut self) -> Result<()> {
        let config = ApiServerConfig::from(&self.config.api);
        let addr = format!("{}:{}", config.bind_address, config.port);
        let listener = TcpListener::bind(&addr).await?;

        self.start_poller()?;
        self.start_api(config, listener);
        Ok(())
    }

    /// Start the poller with a Graph API fetcher, or leave it disabled when
    /// credentials or a target are missing.
    pub fn start_poller(&mut self) -> Result<()> {
        let credentials = match self.config.facebook.poll_credentials() {
            Ok(credentials) => credentials,
            Err(missing) => {
                info!(reason = %missing, "Poller disabled");
                self.poller = PollerHandle::disabled();
                return Ok(());
            }
        };

        let fetcher = self.graph_fetcher(&credentials)?;
        self.start_poller_with(fetcher, credentials);
        Ok(())
    }

    /// Start the poller with a given fetcher.
    pub fn start_poller_with(
        &mut self,
        fetcher: Arc<dyn LiveFetcher>,
        credentials: PollCredentials,
    ) {
        let reconciler = LiveSetReconciler::new(
            self.transitions.clone(),
            LivestreamDefaults::for_poller(
                self.config.facebook.default_group_id.clone(),
                self.config.facebook.default_class_id.clone(),
            ),
        );
        let scheduler = PollScheduler::new(
            fetcher,
            credentials.target,
            reconciler,
            &self.config.poller,
        );
        self.poller = scheduler.spawn(&self.cancellation_token);
    }

    fn graph_fetcher(&self, credentials: &PollCredentials) -> Result<Arc<dyn LiveFetcher>> {
        let http = create_client_builder(Some(self.config.poller.request_timeout)).build()?;
        let client = GraphClient::new(
            GraphClientConfig::new(credentials.access_token.clone())
                .with_base_url(self.config.facebook.graph_base_url.clone())
                .with_api_version(self.config.facebook.graph_api_version.clone()),
            http,
        )?;
        Ok(Arc::new(GraphFetcher::new(client)))
    }

    /// Serve the API on `listener` in a background task.
    pub fn start_api(&mut self, config: ApiServerConfig, listener: TcpListener) {
        let server = Arc::new(ApiServer::new(config, self.app_state()));
        let task_server = server.clone();
        let task = tokio::spawn(async move { task_server.serve(listener).await });
        self.api_task = Some(task);
        self.api_server = Some(server);
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.repository.clone(), self.ingestor.clone())
            .with_app_secret(self.config.facebook.app_secret.clone())
            .with_poller_state(self.poller.subscribe())
    }

    pub fn poller_state(&self) -> SchedulerState {
        self.poller.state()
    }

    /// Get the cancellation token for external use.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        let timeout = self.config.shutdown_timeout;
        self.shutdown_with_timeout(timeout).await
    }

    /// Stop the poller, then the API server, then close the pool.
    ///
    /// `timeout` bounds the poller and the API server together.
    pub async fn shutdown_with_timeout(&mut self, timeout: Duration) -> Result<()> {
        info!("Shutting down services (timeout: {:?})", timeout);
        let deadline = Instant::now() + timeout;

        self.cancellation_token.cancel();
        self.poller.shutdown(timeout).await;

        if let Some(server) = self.api_server.take() {
            server.shutdown();
        }
        if let Some(mut task) = self.api_task.take() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, &mut task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => warn!(error = %e, "API server exited with error"),
                Ok(Err(e)) => warn!(error = %e, "API server task failed"),
                Err(_) => {
                    warn!("Shutdown timeout reached, forcing API server stop");
                    task.abort();
                }
            }
        }

        if let Some(pool) = self.pool.take() {
            info!("Closing database pool...");
            pool.close().await;
        }

        info!("Services shut down");
        Ok(())
    }
}
