use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::Instant;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dashboard_api::assistant::sessions::{
    MemorySessionStore, RedisSessionStore, SessionLimits, SessionStore,
};
use dashboard_api::config::Config;
use dashboard_api::db::{create_pool, run_migrations};
use dashboard_api::errors::expose_error_details;
use dashboard_api::llm_client::{self, GeminiClient};
use dashboard_api::middleware::RateLimiter;
use dashboard_api::routes::{build_router, cors_layer};
use dashboard_api::state::AppState;
use dashboard_api::store::PgStore;

/// In-flight requests get this long to finish after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "dashboard_api={},tower_http={}",
                &config.rust_log, &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting dashboard API v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.environment.as_str()
    );
    expose_error_details(!config.environment.is_production());

    let pool = create_pool(config.database.clone()).await?;
    run_migrations(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    let model = Arc::new(GeminiClient::new(config.gemini_api_key.clone())?);
    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; chat and auto-fill requests will fail");
    } else {
        info!("LLM client initialized (model: {})", llm_client::MODEL);
    }

    let limits = SessionLimits::from_config(&config);
    let sessions: Arc<dyn SessionStore> = match &config.redis_url {
        Some(url) => {
            info!("Chat sessions stored in Redis");
            Arc::new(RedisSessionStore::new(url, limits).context("invalid REDIS_URL")?)
        }
        None => {
            info!(
                capacity = limits.capacity,
                "Chat sessions held in process memory"
            );
            Arc::new(MemorySessionStore::new(limits))
        }
    };

    let state = AppState {
        store,
        model,
        sessions,
        limiter: Arc::new(RateLimiter::from_config(&config)),
        config: config.clone(),
        started_at: Instant::now(),
    };

    let app = build_router(state)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM and arms a hard exit in case draining stalls.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
    tokio::spawn(async {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        warn!("Graceful shutdown timed out, forcing exit");
        std::process::exit(1);
    });
}
