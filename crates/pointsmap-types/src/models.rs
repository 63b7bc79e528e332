use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Course group id as handed over by the enrolment system.
pub type GroupId = i64;

/// Group id meaning "every participant of the activity".
pub const ALL_PARTICIPANTS: GroupId = 0;

/// Tile size used when an activity does not configure one.
pub const DEFAULT_TILE_WIDTH: i32 = 60;
pub const DEFAULT_TILE_HEIGHT: i32 = 20;

/// Who can see and select a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Only the owner, within the owner's group.
    #[default]
    Private,
    /// Everyone grading the same group.
    Group,
    /// Everyone grading the activity.
    Shared,
}

impl Visibility {
    /// Specificity rank: lower ranks win when resolving the active map.
    pub fn rank(self) -> i64 {
        match self {
            Visibility::Private => 0,
            Visibility::Group => 1,
            Visibility::Shared => 2,
        }
    }

    pub fn from_rank(rank: i64) -> Option<Self> {
        match rank {
            0 => Some(Visibility::Private),
            1 => Some(Visibility::Group),
            2 => Some(Visibility::Shared),
            _ => None,
        }
    }
}

/// How a recipient's displayed grade is derived from their awards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsMode {
    /// Running sum of every award.
    #[default]
    Incremental,
    /// The most recent award is the grade.
    Total,
}

impl PointsMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PointsMode::Incremental => "incremental",
            PointsMode::Total => "total",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "incremental" => Some(PointsMode::Incremental),
            "total" => Some(PointsMode::Total),
            _ => None,
        }
    }
}

/// Report flavour, configured outside this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradingMethod {
    #[default]
    Simple,
    Advanced,
}

impl GradingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            GradingMethod::Simple => "simple",
            GradingMethod::Advanced => "advanced",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "simple" => Some(GradingMethod::Simple),
            "advanced" => Some(GradingMethod::Advanced),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentFormat {
    #[default]
    Plain,
    Html,
    Markdown,
}

impl CommentFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentFormat::Plain => "plain",
            CommentFormat::Html => "html",
            CommentFormat::Markdown => "markdown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "plain" => Some(CommentFormat::Plain),
            "html" => Some(CommentFormat::Html),
            "markdown" => Some(CommentFormat::Markdown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub name: String,
    pub points_mode: PointsMode,
    pub grading_method: GradingMethod,
    pub tile_width: i32,
    pub tile_height: i32,
}

/// One enrolled user of an activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: Uuid,
    pub group_id: GroupId,
    pub full_name: String,
}

/// One discrete point grant. Never edited after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Award {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub recipient_id: Uuid,
    pub awarder_id: Uuid,
    pub points: i64,
    pub comment: String,
    pub comment_format: CommentFormat,
    pub time_created: DateTime<Utc>,
    pub time_awarded: DateTime<Utc>,
    pub time_modified: DateTime<Utc>,
}

/// A user-map: the working canvas of one (owner, group, activity) scope or a
/// saved layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMap {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub group_id: GroupId,
    pub activity_id: Uuid,
    pub visibility: Visibility,
    pub width: i32,
    pub height: i32,
    pub tile_width: i32,
    pub tile_height: i32,
    pub time_modified: DateTime<Utc>,
}

/// One user's tile position on a map. Unique per (map, user).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinate {
    pub map_id: Uuid,
    pub user_id: Uuid,
    pub x: i32,
    pub y: i32,
}
