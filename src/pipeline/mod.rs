//! Request-processing pipeline.
//!
//! # Data Flow
//! ```text
//! RequestContext
//!     → rate_limit (429 before any state lookup)
//!     → session    (signed cookie → server-side session)
//!     → csrf       (state-changing API requests only)
//!     → body       (413 / 400 on oversized or malformed input)
//!     → route      (404 on no match)
//!     → validate   (400 with every failing field)
//!     → RequestHandler
//!     (stages plus handler bounded by the request timeout, 408 on expiry)
//!     → ErrorFormatter on any failure
//!     → `after` hooks in reverse order (cookie, rate-limit headers)
//! ```
//!
//! # Design Decisions
//! - Stages are an explicit ordered list run by one loop; there is no
//!   `next` callback threading
//! - A stage enriches the context in place and either returns `Ok(())` or
//!   a typed error that ends the request
//! - `after` hooks run for success and failure alike

pub mod context;
pub mod stages;

use std::sync::Arc;
use std::time::Duration;

use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;

use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::http::response::{ErrorFormatter, Reply};
use crate::observability::metrics;
use crate::routing::RouteTable;
use crate::security::SecurityComponents;

pub use context::RequestContext;
use stages::{BodyStage, CsrfStage, RateLimitStage, RouteStage, SessionStage, ValidateStage};

/// One step of request processing.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inspect or enrich the context. An error short-circuits the request.
    fn run<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<(), ApiError>>;

    /// Decorate the outgoing response, whether or not the request succeeded.
    fn after(&self, _ctx: &RequestContext, _response: &mut Response) {}
}

/// Terminal handler invoked once every stage has passed.
pub trait RequestHandler: Send + Sync {
    fn handle<'a>(&'a self, ctx: &'a mut RequestContext) -> BoxFuture<'a, Result<Reply, ApiError>>;
}

/// Ordered stages plus the terminal handler.
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
    handler: Arc<dyn RequestHandler>,
    formatter: ErrorFormatter,
    timeout: Option<Duration>,
}

impl Pipeline {
    pub fn new(
        stages: Vec<Arc<dyn Stage>>,
        handler: Arc<dyn RequestHandler>,
        formatter: ErrorFormatter,
    ) -> Self {
        Self {
            stages,
            handler,
            formatter,
            timeout: None,
        }
    }

    /// Bound stages plus handler; expiry renders an `ERR_TIMEOUT` envelope.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The standard stage order for the API.
    pub fn standard(
        config: &GatewayConfig,
        security: &SecurityComponents,
        routes: Arc<RouteTable>,
        handler: Arc<dyn RequestHandler>,
    ) -> Self {
        let prefix = config.server.api_prefix.as_str();
        let mut stages: Vec<Arc<dyn Stage>> = Vec::with_capacity(6);

        if config.rate_limit.enabled {
            stages.push(Arc::new(RateLimitStage::new(security.limiter.clone(), prefix)));
        }
        stages.push(Arc::new(SessionStage::new(security.sessions.clone())));
        stages.push(Arc::new(CsrfStage::new(security.csrf.clone(), prefix)));
        stages.push(Arc::new(BodyStage::new(config.security.max_body_size)));
        stages.push(Arc::new(RouteStage::new(routes)));
        stages.push(Arc::new(ValidateStage));

        Self::new(stages, handler, ErrorFormatter::new(config.is_production()))
            .with_timeout(Duration::from_secs(config.server.request_timeout_secs))
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Run the request to completion and render the response.
    pub async fn execute(&self, mut ctx: RequestContext) -> Response {
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.run(&mut ctx))
                .await
                .unwrap_or_else(|_| Err(ApiError::timeout(limit.as_secs()))),
            None => self.run(&mut ctx).await,
        };

        let mut response = match outcome {
            Ok(reply) => reply.into_response(),
            Err(err) => self.formatter.render(&err, &ctx),
        };

        for stage in self.stages.iter().rev() {
            stage.after(&ctx, &mut response);
        }

        metrics::record_request(
            ctx.method.as_str(),
            ctx.route_label(),
            response.status().as_u16(),
            ctx.started,
        );
        response
    }

    async fn run(&self, ctx: &mut RequestContext) -> Result<Reply, ApiError> {
        for stage in &self.stages {
            stage.run(ctx).await?;
        }
        self.handler.handle(ctx).await
    }
}
