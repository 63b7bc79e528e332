use std::sync::Arc;

use axum::http::StatusCode;
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::error;
use uuid::Uuid;

use pointsmap_db::Database;
use pointsmap_types::api::Claims;

use crate::error::PointsError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: impl Into<String>) -> AppState {
        Arc::new(Self {
            db,
            jwt_secret: jwt_secret.into(),
        })
    }
}

/// Run controller work against the database off the async runtime.
pub async fn run_blocking<T, F>(state: &AppState, f: F) -> Result<T, StatusCode>
where
    F: FnOnce(&Database) -> Result<T, PointsError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(StatusCode::from)
}

/// Reject callers without grading capability before anything is touched.
pub fn require_grader(claims: &Claims) -> Result<(), PointsError> {
    if claims.can_grade {
        Ok(())
    } else {
        Err(PointsError::Forbidden)
    }
}

/// Sign a session token. Tokens are normally minted by the course platform;
/// this is used by tooling and tests that stand in for it.
pub fn create_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    can_grade: bool,
) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
        can_grade,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
