use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::bail;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use pointsmap_api::auth::AppStateInner;

/// Secrets that ship in sample configs and must never sign real sessions.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "",
    "changeme",
    "change-me",
    "dev-secret-change-me",
    "secret",
];

/// Used when `RUST_LOG` is unset. Each library crate logs under its own target.
const DEFAULT_LOG_FILTER: &str =
    "pointsmap=debug,pointsmap_api=debug,pointsmap_db=debug,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    // Config
    let jwt_secret = std::env::var("POINTSMAP_JWT_SECRET").unwrap_or_default();
    if PLACEHOLDER_SECRETS.contains(&jwt_secret.trim()) {
        bail!("POINTSMAP_JWT_SECRET must be set to the platform's session signing secret");
    }
    if jwt_secret.len() < 32 {
        warn!("POINTSMAP_JWT_SECRET is shorter than 32 bytes");
    }
    let db_path = std::env::var("POINTSMAP_DB_PATH").unwrap_or_else(|_| "pointsmap.db".into());
    let host = std::env::var("POINTSMAP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("POINTSMAP_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = pointsmap_db::Database::open(&PathBuf::from(&db_path))?;

    let app = pointsmap_api::router(AppStateInner::new(db, jwt_secret))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Pointsmap server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_library_crates() {
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
        for target in ["pointsmap", "pointsmap_api", "pointsmap_db", "tower_http"] {
            let directive = format!("{}=debug", target);
            assert!(DEFAULT_LOG_FILTER.split(',').any(|d| d == directive), "{}", target);
        }
    }
}
