//! Web server using Axum.

use anyhow::Context;
use axum::http::HeaderValue;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::router::create_app_router;
use super::AppState;
use crate::coach::Coach;
use crate::config::Settings;
use crate::providers;
use crate::scheduler::run_scheduler;
use crate::storage::SqliteStore;

const MAX_BODY_BYTES: usize = 256 * 1024;

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Open the configured database. The service keeps running in memory when it
/// cannot be opened.
fn open_store(settings: &Settings) -> Option<Arc<SqliteStore>> {
    let path = match settings.database_path() {
        Ok(path) => path,
        Err(e) => {
            tracing::warn!("No database path available, running in memory: {}", e);
            return None;
        }
    };
    match SqliteStore::open(&path) {
        Ok(store) => {
            tracing::info!("Using database at {:?}", path);
            Some(Arc::new(store))
        }
        Err(e) => {
            tracing::warn!("Failed to open database {:?}, running in memory: {}", path, e);
            None
        }
    }
}

/// Run the web server and the check-in scheduler.
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let coach = Arc::new(Coach::from_settings(&settings, open_store(&settings)));
    if let Err(e) = coach.hydrate().await {
        tracing::warn!("Failed to hydrate state from storage: {}", e);
    }

    let threads = Arc::new(providers::create_thread_registry(&settings));
    let _scheduler = run_scheduler(coach.clone(), &settings);

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .with_context(|| "Invalid listen address")?;

    let app = create_app_router(AppState::new(coach, threads, settings.clone()))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors_layer(&settings.server.allowed_origins))
        .layer(TraceLayer::new_for_http());

    tracing::info!("Starting web server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

/// Run the web server, optionally overriding the configured port.
pub async fn run_web_server(mut settings: Settings, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        settings.server.port = port;
    }
    run_server(settings).await
}
