//! HTTP surface of pointsmap: award, report and map endpoints plus the
//! controllers behind them.

pub mod activities;
pub mod auth;
pub mod award;
pub mod awards;
pub mod error;
pub mod layout;
pub mod maps;
pub mod middleware;
pub mod report;
pub mod reports;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};

use crate::auth::AppState;
use crate::middleware::require_auth;

/// All routes. Everything except `/health` requires a session token.
pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/activities/{activity_id}", put(activities::put_activity))
        .route("/activities/{activity_id}/roster", put(activities::put_roster))
        .route("/activities/{activity_id}/award", post(awards::award))
        .route("/activities/{activity_id}/report/{user_id}", get(reports::get_report))
        .route(
            "/activities/{activity_id}/map",
            get(maps::get_map).post(maps::map_action),
        )
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .merge(protected_routes)
}

async fn health() -> &'static str {
    "ok"
}
