//! Database row types. These map directly to SQLite rows and are converted
//! into `pointsmap-types` models at the store boundary.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use pointsmap_types::models::{
    Activity, Award, CommentFormat, Coordinate, GradingMethod, Participant, PointsMode, UserMap,
    Visibility,
};

pub struct ActivityRow {
    pub id: String,
    pub name: String,
    pub points_mode: String,
    pub grading_method: String,
    pub tile_width: i32,
    pub tile_height: i32,
}

pub struct ParticipantRow {
    pub user_id: String,
    pub group_id: i64,
    pub full_name: String,
}

pub struct AwardRow {
    pub id: String,
    pub activity_id: String,
    pub recipient_id: String,
    pub awarder_id: String,
    pub points: i64,
    pub comment: String,
    pub comment_format: String,
    pub time_created: i64,
    pub time_awarded: i64,
    pub time_modified: i64,
}

pub struct MapRow {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub group_id: i64,
    pub activity_id: String,
    pub visibility: i64,
    pub width: i32,
    pub height: i32,
    pub tile_width: i32,
    pub tile_height: i32,
    pub time_modified: i64,
}

pub struct CoordinateRow {
    pub map_id: String,
    pub user_id: String,
    pub x: i32,
    pub y: i32,
}

fn parse_id(value: &str, column: &str) -> Result<Uuid> {
    value
        .parse()
        .with_context(|| format!("Corrupt {} '{}'", column, value))
}

/// Unix seconds to UTC. Out-of-range values fall back to the epoch.
pub fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(|| {
        warn!("Corrupt timestamp {}", secs);
        DateTime::default()
    })
}

impl ActivityRow {
    pub fn into_model(self) -> Result<Activity> {
        Ok(Activity {
            id: parse_id(&self.id, "activity id")?,
            points_mode: PointsMode::parse(&self.points_mode)
                .ok_or_else(|| anyhow!("Unknown points mode '{}'", self.points_mode))?,
            grading_method: GradingMethod::parse(&self.grading_method)
                .ok_or_else(|| anyhow!("Unknown grading method '{}'", self.grading_method))?,
            name: self.name,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
        })
    }
}

impl ParticipantRow {
    pub fn into_model(self) -> Result<Participant> {
        Ok(Participant {
            user_id: parse_id(&self.user_id, "participant user_id")?,
            group_id: self.group_id,
            full_name: self.full_name,
        })
    }
}

impl AwardRow {
    pub fn into_model(self) -> Result<Award> {
        Ok(Award {
            id: parse_id(&self.id, "award id")?,
            activity_id: parse_id(&self.activity_id, "award activity_id")?,
            recipient_id: parse_id(&self.recipient_id, "award recipient_id")?,
            awarder_id: parse_id(&self.awarder_id, "award awarder_id")?,
            points: self.points,
            comment_format: CommentFormat::parse(&self.comment_format).unwrap_or_default(),
            comment: self.comment,
            time_created: timestamp(self.time_created),
            time_awarded: timestamp(self.time_awarded),
            time_modified: timestamp(self.time_modified),
        })
    }
}

impl MapRow {
    pub fn into_model(self) -> Result<UserMap> {
        Ok(UserMap {
            id: parse_id(&self.id, "map id")?,
            owner_id: parse_id(&self.owner_id, "map owner_id")?,
            activity_id: parse_id(&self.activity_id, "map activity_id")?,
            visibility: Visibility::from_rank(self.visibility)
                .ok_or_else(|| anyhow!("Unknown map visibility {}", self.visibility))?,
            name: self.name,
            group_id: self.group_id,
            width: self.width,
            height: self.height,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            time_modified: timestamp(self.time_modified),
        })
    }
}

impl CoordinateRow {
    pub fn into_model(self) -> Result<Coordinate> {
        Ok(Coordinate {
            map_id: parse_id(&self.map_id, "coordinate map_id")?,
            user_id: parse_id(&self.user_id, "coordinate user_id")?,
            x: self.x,
            y: self.y,
        })
    }
}
