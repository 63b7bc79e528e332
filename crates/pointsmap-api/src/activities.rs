use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use pointsmap_types::api::{ActivitySettingsRequest, Claims, RosterRequest};
use pointsmap_types::models::{Activity, DEFAULT_TILE_HEIGHT, DEFAULT_TILE_WIDTH};

use crate::auth::{AppState, require_grader, run_blocking};
use crate::error::PointsError;

/// Create or update an activity's settings.
pub async fn put_activity(
    State(state): State<AppState>,
    Path(activity_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ActivitySettingsRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    require_grader(&claims)?;

    let name = req.name.trim().to_string();
    if name.is_empty() || name.len() > 255 {
        return Err(StatusCode::BAD_REQUEST);
    }
    let tile_width = req.tile_width.unwrap_or(DEFAULT_TILE_WIDTH);
    let tile_height = req.tile_height.unwrap_or(DEFAULT_TILE_HEIGHT);
    if tile_width <= 0 || tile_height <= 0 {
        return Err(StatusCode::BAD_REQUEST);
    }

    let activity = Activity {
        id: activity_id,
        name,
        points_mode: req.points_mode,
        grading_method: req.grading_method,
        tile_width,
        tile_height,
    };

    let activity = run_blocking(&state, move |db| {
        db.upsert_activity(&activity)?;
        info!("Activity {} saved by {}", activity.id, claims.sub);
        Ok(activity)
    })
    .await?;

    Ok(Json(activity))
}

/// Replace the roster pushed by the enrolment system.
pub async fn put_roster(
    State(state): State<AppState>,
    Path(activity_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RosterRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    require_grader(&claims)?;

    let count = run_blocking(&state, move |db| {
        if db.get_activity(activity_id)?.is_none() {
            return Err(PointsError::NotFound("activity"));
        }
        db.replace_roster(activity_id, &req.participants)?;
        Ok(req.participants.len())
    })
    .await?;

    info!("Roster of {} replaced with {} entries", activity_id, count);
    Ok(StatusCode::NO_CONTENT)
}
