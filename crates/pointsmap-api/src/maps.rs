use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use pointsmap_types::api::{Claims, MapActionRequest, MapQuery};
use pointsmap_types::events::MapCommand;

use crate::auth::{AppState, require_grader, run_blocking};
use crate::error::PointsError;
use crate::layout::{self, MapScope};

/// Current map of the caller, reconciled with the roster.
pub async fn get_map(
    State(state): State<AppState>,
    Path(activity_id): Path<Uuid>,
    Query(query): Query<MapQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    require_grader(&claims)?;

    let view = run_blocking(&state, move |db| {
        let activity = db
            .get_activity(activity_id)?
            .ok_or(PointsError::NotFound("activity"))?;
        let scope = MapScope {
            owner_id: claims.sub,
            group_id: query.group_id,
            activity_id,
        };
        layout::run_command(db, &scope, &activity, query.map_id, &MapCommand::None)
    })
    .await?;

    Ok(Json(view))
}

pub async fn map_action(
    State(state): State<AppState>,
    Path(activity_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MapActionRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    require_grader(&claims)?;

    let view = run_blocking(&state, move |db| {
        db.remember_user_name(claims.sub, &claims.username)?;
        let activity = db
            .get_activity(activity_id)?
            .ok_or(PointsError::NotFound("activity"))?;
        let scope = MapScope {
            owner_id: claims.sub,
            group_id: req.group_id,
            activity_id,
        };
        layout::run_command(db, &scope, &activity, req.map_id, &req.command)
    })
    .await?;

    Ok(Json(view))
}
