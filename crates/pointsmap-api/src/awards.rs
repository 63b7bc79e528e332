use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use pointsmap_types::api::{AwardRequest, Claims};

use crate::auth::{AppState, require_grader, run_blocking};
use crate::award::{self, Awarder};
use crate::error::PointsError;

/// Award points, or with `ajax` and no recipients only persist tile
/// positions.
pub async fn award(
    State(state): State<AppState>,
    Path(activity_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AwardRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    require_grader(&claims)?;

    let response = run_blocking(&state, move |db| {
        db.remember_user_name(claims.sub, &claims.username)?;
        let activity = db
            .get_activity(activity_id)?
            .ok_or(PointsError::NotFound("activity"))?;
        let awarder = Awarder {
            user_id: claims.sub,
            activity: &activity,
        };
        award::award_points(db, &awarder, &req)
    })
    .await?;

    Ok(Json(response))
}
