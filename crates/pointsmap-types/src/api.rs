use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::MapCommand;
use crate::models::{
    CommentFormat, GradingMethod, GroupId, Participant, PointsMode, UserMap, Visibility,
};

// -- JWT Claims --

/// Claims of the session token issued by the course platform. `can_grade`
/// carries the grading capability for the activities of the token's course.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
    #[serde(default)]
    pub can_grade: bool,
}

// -- Awards --

/// A single recipient id or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecipientIds {
    One(Uuid),
    Many(Vec<Uuid>),
}

impl Default for RecipientIds {
    fn default() -> Self {
        RecipientIds::Many(Vec::new())
    }
}

impl RecipientIds {
    /// Deduplicated, ordered recipients.
    pub fn to_set(&self) -> BTreeSet<Uuid> {
        match self {
            RecipientIds::One(id) => BTreeSet::from([*id]),
            RecipientIds::Many(ids) => ids.iter().copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, RecipientIds::Many(ids) if ids.is_empty())
    }
}

/// Award endpoint input. With `ajax` set and no recipients it only
/// persists the tile positions in `awardto_x` / `awardto_y`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AwardRequest {
    pub recipient_ids: RecipientIds,
    pub points: i64,
    pub comment: String,
    pub comment_format: CommentFormat,
    pub group_id: GroupId,
    pub map_id: Option<Uuid>,
    pub ajax: bool,
    /// Set on replayed undo descriptors.
    pub undo: bool,
    pub awardto_x: BTreeMap<Uuid, i32>,
    pub awardto_y: BTreeMap<Uuid, i32>,
    pub map_width: Option<i32>,
    pub map_height: Option<i32>,
    pub user_width: Option<i32>,
    pub user_height: Option<i32>,
    /// Overrides the activity's configured points mode.
    pub points_mode: Option<PointsMode>,
}

impl AwardRequest {
    /// True when the request carries tile positions to persist.
    pub fn has_coordinates(&self) -> bool {
        !self.awardto_x.is_empty() || !self.awardto_y.is_empty()
    }
}

/// Feedback message selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKey {
    AwardNoPoints,
    AwardOnePointOneUser,
    AwardOnePointManyUsers,
    AwardManyPointsOneUser,
    AwardManyPointsManyUsers,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub points: i64,
    pub recipient_count: usize,
    pub recipient_names: String,
    pub message_key: MessageKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeUpdate {
    pub user_id: Uuid,
    pub grade: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AwardResponse {
    /// Empty for coordinate-only syncs.
    pub feedback_html: String,
    pub summary: FeedbackSummary,
    pub grades: Vec<GradeUpdate>,
    /// Replaying this request reverts the award.
    pub undo: Option<AwardRequest>,
}

// -- Reports --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportItem {
    pub time_awarded: DateTime<Utc>,
    pub points: i64,
    pub awarder_id: Uuid,
    pub awarder_name: String,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwarderSubtotal {
    pub awarder_id: Uuid,
    pub awarder_name: String,
    pub points: i64,
    pub award_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse {
    pub user_id: Uuid,
    pub full_name: String,
    pub grading_method: GradingMethod,
    pub grade: i64,
    pub total: i64,
    pub today: i64,
    pub award_count: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ReportItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub awarders: Vec<AwarderSubtotal>,
    pub html: String,
}

// -- Maps --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MapQuery {
    pub group_id: GroupId,
    pub map_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MapActionRequest {
    #[serde(default)]
    pub group_id: GroupId,
    #[serde(default)]
    pub map_id: Option<Uuid>,
    pub command: MapCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapTile {
    pub user_id: Uuid,
    pub full_name: String,
    pub x: i32,
    pub y: i32,
    pub grade: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutSummary {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub visibility: Visibility,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapView {
    pub map: UserMap,
    pub tiles: Vec<MapTile>,
    pub layouts: Vec<LayoutSummary>,
}

// -- Activity administration --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivitySettingsRequest {
    pub name: String,
    #[serde(default)]
    pub points_mode: PointsMode,
    #[serde(default)]
    pub grading_method: GradingMethod,
    pub tile_width: Option<i32>,
    pub tile_height: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RosterRequest {
    pub participants: Vec<Participant>,
}
