//! Greet Stream Binary
//!
//! Starts the greeting and entity extraction service.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin greet-stream
//! ```
//!
//! # Environment Variables
//!
//! - `GREET_GRPC_HOST`: Listen host (default: 127.0.0.1)
//! - `GREET_GRPC_PORT`: gRPC and gRPC-Web port (default: 8080)
//! - `GREET_HEALTH_PORT`: Health check HTTP port, 0 disables (default: 8081)
//! - `GREET_SUBSCRIBER_CAPACITY`: Buffered names per stream listener (default: 10)
//! - `GREET_OUTBOUND_CAPACITY`: Extraction response queue depth (default: 16)
//! - `GREET_EXTRACTION_MAX_INPUT_BYTES`: Engine input limit (default: 65536)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: greet-stream)
//! - `RUST_LOG`: Log filter (default: info)

use std::sync::Arc;
use std::time::Duration;

use greet_stream::infrastructure::telemetry;
use greet_stream::{
    BroadcastConfig, Broadcaster, GreetServer, GreetServerConfig, HealthServer,
    HealthServerState, HeuristicExtractor, ServiceConfig, init_metrics, serve,
};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting Greet Stream");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = ServiceConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let broadcaster = Arc::new(Broadcaster::<String>::new(BroadcastConfig::from(
        config.broadcast,
    )));
    let extractor = Arc::new(HeuristicExtractor::new(config.extraction.into()));

    let grpc_server = Arc::new(GreetServer::new(
        GreetServerConfig::from(config.stream),
        Arc::clone(&broadcaster),
        extractor,
        shutdown_token.clone(),
    ));

    let mut servers = JoinSet::new();

    // Spawn health server
    if let Some(health_addr) = config.server.health_addr() {
        let health_state = Arc::new(HealthServerState::new(Arc::clone(&grpc_server)));
        let health_server = HealthServer::new(health_addr, health_state, shutdown_token.clone());
        servers.spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    // Spawn gRPC server
    let listener = TcpListener::bind(config.server.grpc_addr()).await?;
    let grpc_shutdown = shutdown_token.clone();
    servers.spawn(async move {
        if let Err(e) = serve(listener, grpc_server, grpc_shutdown).await {
            tracing::error!(error = %e, "gRPC server error");
        }
    });

    tracing::info!("Greet Stream ready");

    await_shutdown().await;

    // Ends every open GreetStream call once its buffered names are sent.
    broadcaster.close();
    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, servers.join_all())
        .await
        .is_err()
    {
        tracing::warn!("Graceful shutdown timed out, aborting open calls");
    }

    tracing::info!("Greet Stream stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &ServiceConfig) {
    tracing::info!(
        grpc_addr = %config.server.grpc_addr(),
        health_port = config.server.health_port,
        subscriber_capacity = config.broadcast.subscriber_capacity,
        outbound_capacity = config.stream.outbound_capacity,
        max_input_bytes = config.extraction.max_input_bytes,
        "Configuration loaded"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
