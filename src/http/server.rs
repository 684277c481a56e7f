//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: `/health` beside the pipeline, everything
//!   else through it
//! - Wire up middleware (request ID, tracing, CORS, security headers,
//!   compression)
//! - Run the expiry sweepers for rate-limit windows and sessions
//! - Serve until the shutdown coordinator starts draining

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    compression::CompressionLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::health::HealthProbe;
use crate::http::handlers::ApiHandlers;
use crate::lifecycle::{ShutdownCoordinator, ShutdownOutcome};
use crate::pipeline::{Pipeline, RequestContext};
use crate::resources::ResourceHandler;
use crate::routing::RouteTable;
use crate::security::headers::{client_ip, cors_layer, with_security_headers};
use crate::security::{KeyError, SecurityComponents};
use crate::store::DataStore;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub health: Arc<HealthProbe>,
    pub trust_proxy: bool,
}

/// HTTP server for the quiz API.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    security: SecurityComponents,
}

impl HttpServer {
    /// Create a server with freshly built security components.
    pub fn new(
        config: GatewayConfig,
        store: Arc<dyn DataStore>,
        questions: Arc<dyn ResourceHandler>,
    ) -> Result<Self, KeyError> {
        let security = SecurityComponents::from_config(&config)?;
        Ok(Self::with_security(config, store, questions, security))
    }

    /// Create a server around existing security components.
    pub fn with_security(
        config: GatewayConfig,
        store: Arc<dyn DataStore>,
        questions: Arc<dyn ResourceHandler>,
        security: SecurityComponents,
    ) -> Self {
        let routes = Arc::new(RouteTable::quiz_api(&config.server.api_prefix));
        let handlers = Arc::new(ApiHandlers::new(questions, security.csrf.clone()));
        let pipeline = Pipeline::standard(&config, &security, routes, handlers);

        tracing::debug!(stages = ?pipeline.stage_names(), "Pipeline assembled");

        let state = AppState {
            pipeline: Arc::new(pipeline),
            health: Arc::new(HealthProbe::new(store, config.environment)),
            trust_proxy: config.security.trust_proxy,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            security,
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The request ID is assigned outermost so the trace span can carry it.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/health", get(health_handler))
            .fallback(gateway_handler)
            .with_state(state);

        let router = if config.security.enable_headers {
            with_security_headers(router, config.is_production())
        } else {
            router
        };

        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors_layer(&config.cors))
            .layer(CompressionLayer::new())
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server on `listener` until `coordinator` finishes shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Result<ShutdownOutcome, std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = %self.config.environment,
            "Server running on port {}",
            addr.port()
        );

        self.spawn_sweepers(&coordinator);

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        let server = axum::serve(listener, app)
            .with_graceful_shutdown(coordinator.draining())
            .into_future();

        let outcome = coordinator.drive(server).await;
        tracing::info!(?outcome, "Shutdown complete");
        Ok(outcome)
    }

    fn spawn_sweepers(&self, coordinator: &ShutdownCoordinator) {
        if self.config.rate_limit.enabled {
            let limiter = self.security.limiter.clone();
            spawn_sweeper(
                "rate_limit",
                Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
                coordinator.background(),
                move || limiter.purge_expired(),
            );
        }

        let sessions = self.security.sessions.clone();
        spawn_sweeper(
            "session",
            Duration::from_secs(self.config.session.sweep_interval_secs),
            coordinator.background(),
            move || sessions.purge_expired(),
        );
    }

    /// Router with all layers, for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn security(&self) -> &SecurityComponents {
        &self.security
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Periodically evict expired entries until the stop signal fires.
fn spawn_sweeper<F>(name: &'static str, every: Duration, mut stop: broadcast::Receiver<()>, sweep: F)
where
    F: Fn() -> usize + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = sweep();
                    if removed > 0 {
                        tracing::debug!(sweeper = name, removed, "Evicted expired entries");
                    }
                }
                _ = stop.recv() => {
                    tracing::debug!(sweeper = name, "Sweeper stopped");
                    break;
                }
            }
        }
    });
}

fn request_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}

/// Liveness report, served outside the pipeline.
async fn health_handler(State(state): State<AppState>) -> Response {
    let snapshot = state.health.snapshot();
    (snapshot.http_status(), Json(snapshot)).into_response()
}

/// Every other request runs through the pipeline.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = client_ip(request.headers(), peer, state.trust_proxy);

    let (parts, body) = request.into_parts();
    state
        .pipeline
        .execute(RequestContext::new(parts, body, client_ip))
        .await
}
