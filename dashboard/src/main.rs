use axum::http::{header, HeaderValue, Method};
use dashboard::actors::family::load_seed;
use dashboard::api;
use dashboard::app_state::AppState;
use dashboard::config::{DashboardConfig, LogFormat};
use dashboard::transport::LoopbackTransport;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Load the nearest `.env`, searching the current directory and its ancestors.
/// Runs before logging is up, so the outcome is returned for later reporting.
fn load_env_file() -> Result<Option<PathBuf>, String> {
    let cwd = std::env::current_dir().map_err(|e| e.to_string())?;

    let mut current = cwd;
    loop {
        let candidate = current.join(".env");
        if candidate.exists() {
            return dotenvy::from_path(&candidate)
                .map(|_| Some(candidate.clone()))
                .map_err(|e| format!("{}: {e}", candidate.display()));
        }
        if !current.pop() {
            return Ok(None);
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,dashboard=debug,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(std::time::Duration::from_secs(3600));

    if allowed_origins.is_empty() {
        return Ok(cors.allow_origin(AllowOrigin::any()));
    }
    let origins = allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin)
                .map_err(|e| anyhow::anyhow!("Invalid CORS origin '{origin}': {e}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(cors.allow_origin(AllowOrigin::list(origins)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_file = load_env_file();
    let config = DashboardConfig::from_env()?;
    init_tracing(config.log_format);

    match env_file {
        Ok(Some(path)) => tracing::info!(path = %path.display(), "Loaded environment from .env"),
        Ok(None) => tracing::info!("No .env file found; using process environment only"),
        Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
    }

    tracing::info!("Starting guardian dashboard");

    let seed = match &config.family_seed {
        Some(path) => {
            let families = load_seed(path)?;
            tracing::info!(path = %path.display(), families = families.len(), "Loaded family roster");
            families
        }
        None => Vec::new(),
    };

    // No media transport is wired in this binary; calls connect in-process.
    let transport = Arc::new(LoopbackTransport::new());
    let app_state = AppState::start(
        config.initial_environment.clone(),
        config.dev_hosts.clone(),
        seed,
        transport,
    )
    .await?;

    let api_state = api::ApiState {
        app_state: app_state.clone(),
    };
    let app = api::router()
        .with_state(api_state)
        .layer(cors_layer(&config.allowed_origins)?)
        .layer(TraceLayer::new_for_http());

    tracing::info!(addr = %config.bind_addr, "Starting HTTP server");
    let listener = TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
        })
        .await?;

    app_state.shutdown();
    Ok(())
}
