//! Quiz content API gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────▶ tower-http layers (trace, request id, cors, timeout, headers)
//!                         │
//!                         ├── /health ──▶ HealthProbe
//!                         │
//!                         ▼
//!                    Pipeline
//!                    rate_limit → session → csrf → body → route → validate
//!                         │
//!                         ▼
//!                    ApiHandlers ──▶ QuestionHandler ──▶ MemoryStore
//!                         │
//!     ◀───────────── Reply / ErrorFormatter envelope
//!
//!     SIGTERM/SIGINT ──▶ ShutdownCoordinator (drain, close store, exit code)
//! ```

use std::path::PathBuf;

use clap::Parser;

use quiz_gateway::config::load_config;
use quiz_gateway::lifecycle::startup;
use quiz_gateway::observability::logging;

#[derive(Parser)]
#[command(name = "quiz-gateway")]
#[command(about = "CRUD API gateway for quiz content", long_about = None)]
struct Cli {
    /// TOML config file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listening port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.set_port(port);
    }

    logging::init(&config.observability, config.environment)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        bind_address = %config.server.bind_address,
        "quiz-gateway starting"
    );

    let outcome = match startup::run(config).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            std::process::exit(1);
        }
    };

    std::process::exit(outcome.exit_code());
}
