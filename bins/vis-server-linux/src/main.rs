use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vis_core::config::VisConfig;
use vis_core::{PathPattern, Value, VisError};
use vis_providers::{DemoEngineAdapter, VisDataAdapter};
use vis_server::{DataProvider, DataProviderHandle, PathAccess, ProviderError, ProviderStats, PublicPaths};

/// Config file read when `--config` is not given. Missing means built-in defaults.
const DEFAULT_CONFIG: &str = "visconfig.json";

/// Vehicle Information Service - current signal values and change subscriptions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path [default: visconfig.json]
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(
        short = 'v',
        long,
        default_value = "info",
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Vehicle data server starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let shutdown = shutdown_signal()?;

    // Configuration
    let config = load_config(args.config.as_deref())?;
    let access = Arc::new(PublicPaths::from_config(&config)?);

    // Start the provider loop
    let (provider, handle) = DataProvider::new(&config.provider, config.data_points.clone());
    let provider_task = provider.spawn();

    // Start HTTP lookup server
    let state = AppState {
        provider: handle.clone(),
        access,
    };
    let http_addr = config.http_addr;
    let http_handle = tokio::spawn(async move {
        if let Err(e) = start_http_server(http_addr, state).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    // Start demo data source
    let adapter = DemoEngineAdapter::default();
    let adapter_name = adapter.name().to_string();
    let sink = handle.update_sender();
    let adapter_handle = tokio::spawn(async move {
        if let Err(e) = adapter.run(sink).await {
            tracing::error!("Adapter {} failed: {}", adapter_name, e);
        }
    });

    tracing::info!("Vehicle data server ready!");
    tracing::info!("   HTTP API: http://localhost:{}/vis/v1/api", http_addr.port());
    tracing::info!("");
    tracing::info!("Try these commands:");
    tracing::info!("   curl http://localhost:{}/vis/v1/api/Signal/Drivetrain/*", http_addr.port());
    tracing::info!("   curl http://localhost:{}/vis/v1/stats", http_addr.port());

    // Wait for shutdown signal
    tokio::select! {
        _ = shutdown => {
            tracing::info!("Received shutdown signal, shutting down...");
        }
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = adapter_handle => {
            tracing::warn!("Data source stopped");
        }
    }

    if handle.shutdown().await.is_err() {
        tracing::warn!("Data provider already stopped");
    }
    provider_task.await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Load the configuration file.
///
/// An explicit path must exist. Without one, `visconfig.json` in the working
/// directory is used when present, and the built-in defaults otherwise.
fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<VisConfig> {
    let path = match path {
        Some(path) => path,
        None if std::path::Path::new(DEFAULT_CONFIG).exists() => std::path::Path::new(DEFAULT_CONFIG),
        None => {
            tracing::info!("No {} found, using built-in defaults", DEFAULT_CONFIG);
            let config = VisConfig::default();
            config.validate()?;
            return Ok(config);
        }
    };

    tracing::info!("Loading configuration from {}", path.display());
    Ok(VisConfig::load(path)?)
}

/// Register the shutdown signals. The returned future completes on the
/// first SIGINT (Ctrl+C) or SIGTERM.
#[cfg(unix)]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => {},
            _ = sigterm.recv() => {},
        }
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> std::io::Result<impl Future<Output = ()>> {
    Ok(async {
        let _ = tokio::signal::ctrl_c().await;
    })
}

/// Shared state of the HTTP handlers.
#[derive(Clone)]
struct AppState {
    provider: DataProviderHandle,
    access: Arc<PublicPaths>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

/// Start the HTTP API server
async fn start_http_server(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/vis/v1/api/*path", get(path_handler))
        .route("/vis/v1/stats", get(stats_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

/// Path lookup. Accepts `Signal/Drivetrain/*` as well as `Signal.Drivetrain.*`.
async fn path_handler(
    Path(path): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Value>>, ApiError> {
    let path = path.strip_prefix('/').unwrap_or(&path);
    let pattern = path.replace('/', ".");

    let compiled = PathPattern::new(&pattern)
        .map_err(|e| api_error(ProviderError::Vis(VisError::InvalidPattern(e))))?;
    if !state.access.is_permitted(&compiled) {
        return Err(api_error(ProviderError::Forbidden(pattern)));
    }

    state
        .provider
        .get_by_path(&pattern)
        .await
        .map(Json)
        .map_err(api_error)
}

/// Provider counters.
async fn stats_handler(State(state): State<AppState>) -> Result<Json<ProviderStats>, ApiError> {
    state.provider.stats().await.map(Json).map_err(api_error)
}

fn api_error(error: ProviderError) -> ApiError {
    let status = match &error {
        ProviderError::Vis(VisError::InvalidPattern(_)) => StatusCode::BAD_REQUEST,
        ProviderError::Vis(VisError::NotFound(_)) => StatusCode::NOT_FOUND,
        ProviderError::Forbidden(_) => StatusCode::FORBIDDEN,
        ProviderError::Stopped => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(serde_json::json!({ "error": error.to_string() })))
}
