use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use pointsmap_types::api::Claims;

use crate::auth::{AppState, run_blocking};
use crate::error::PointsError;
use crate::report::build_report;

pub async fn get_report(
    State(state): State<AppState>,
    Path((activity_id, user_id)): Path<(Uuid, Uuid)>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let report = run_blocking(&state, move |db| {
        let activity = db
            .get_activity(activity_id)?
            .ok_or(PointsError::NotFound("activity"))?;
        build_report(db, &claims, &activity, user_id, chrono::Utc::now())
    })
    .await?;

    Ok(Json(report))
}
