//! Award controller: records point awards, recalculates grades and builds
//! the feedback shown to the awarder.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use pointsmap_db::Database;
use pointsmap_types::api::{
    AwardRequest, AwardResponse, FeedbackSummary, GradeUpdate, MessageKey, RecipientIds,
};
use pointsmap_types::models::{Activity, Award, Participant, PointsMode};

use crate::error::PointsError;
use crate::layout::{self, MapScope};

pub const PREF_LAST_POINTS: &str = "last_points";
pub const PREF_COMMENT_FORMAT: &str = "comment_format";

/// Request fields a pass must leave alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RequestField {
    /// `awardto_x` / `awardto_y` and the map sizes.
    Coordinates,
    /// Awarder preferences.
    Settings,
    /// Generation of a further undo descriptor.
    UndoLink,
}

/// Fields to ignore for this request. Undo replays skip everything but the
/// award itself.
pub fn ignored_fields(req: &AwardRequest) -> BTreeSet<RequestField> {
    let mut ignored = BTreeSet::new();
    if req.undo {
        ignored.extend([
            RequestField::Coordinates,
            RequestField::Settings,
            RequestField::UndoLink,
        ]);
    }
    if !req.has_coordinates() {
        ignored.insert(RequestField::Coordinates);
    }
    ignored
}

/// Who is awarding, and where.
pub struct Awarder<'a> {
    pub user_id: Uuid,
    pub activity: &'a Activity,
}

/// Process an award request: sync coordinates, insert one award per valid
/// recipient and recalculate their grades.
///
/// Recipients who are not on the group's roster are skipped. An empty valid
/// set persists no award and yields [`MessageKey::AwardNoPoints`]; with
/// `ajax` set it is a pure coordinate sync and the feedback is empty.
pub fn award_points(
    db: &Database,
    awarder: &Awarder<'_>,
    req: &AwardRequest,
) -> Result<AwardResponse, PointsError> {
    let activity = awarder.activity;
    let ignored = ignored_fields(req);
    let roster = db.get_roster(activity.id, req.group_id)?;

    if !ignored.contains(&RequestField::Coordinates) {
        let scope = MapScope {
            owner_id: awarder.user_id,
            group_id: req.group_id,
            activity_id: activity.id,
        };
        layout::sync_coordinates(db, &scope, activity, req)?;
    }

    let recipients: Vec<&Participant> = {
        let requested = req.recipient_ids.to_set();
        let valid: Vec<&Participant> = roster
            .iter()
            .filter(|p| requested.contains(&p.user_id))
            .collect();
        if valid.len() < requested.len() {
            debug!(
                "Skipped {} recipients not on the roster of group {}",
                requested.len() - valid.len(),
                req.group_id
            );
        }
        valid
    };

    if recipients.is_empty() {
        let summary = summarize(req.points, &[]);
        let feedback_html = if req.ajax {
            String::new()
        } else {
            render_feedback(&summary, false)
        };
        return Ok(AwardResponse {
            feedback_html,
            summary,
            grades: Vec::new(),
            undo: None,
        });
    }

    let mode = req.points_mode.unwrap_or(activity.points_mode);
    let now = Utc::now();
    let mut grades = Vec::with_capacity(recipients.len());
    for recipient in &recipients {
        db.insert_award(&Award {
            id: Uuid::new_v4(),
            activity_id: activity.id,
            recipient_id: recipient.user_id,
            awarder_id: awarder.user_id,
            points: req.points,
            comment: req.comment.clone(),
            comment_format: req.comment_format,
            time_created: now,
            time_awarded: now,
            time_modified: now,
        })?;

        let grade = current_grade(db, activity.id, recipient.user_id, mode)?;
        db.upsert_grade(activity.id, recipient.user_id, grade)?;
        grades.push(GradeUpdate {
            user_id: recipient.user_id,
            grade,
        });
    }

    if !ignored.contains(&RequestField::Settings) {
        db.set_preference(awarder.user_id, activity.id, PREF_LAST_POINTS, &req.points.to_string())?;
        db.set_preference(
            awarder.user_id,
            activity.id,
            PREF_COMMENT_FORMAT,
            req.comment_format.as_str(),
        )?;
    }

    let undo = (!ignored.contains(&RequestField::UndoLink)).then(|| undo_request(req, &recipients));
    let summary = summarize(req.points, &recipients);
    info!(
        "{} awarded {} points to {} users in activity {}",
        awarder.user_id,
        req.points,
        recipients.len(),
        activity.id
    );

    Ok(AwardResponse {
        feedback_html: render_feedback(&summary, undo.is_some()),
        summary,
        grades,
        undo,
    })
}

/// Grade from the award history: the running sum in incremental mode, the
/// latest award in total mode.
pub fn current_grade(
    db: &Database,
    activity_id: Uuid,
    user_id: Uuid,
    mode: PointsMode,
) -> Result<i64, PointsError> {
    let grade = match mode {
        PointsMode::Incremental => db.sum_points(activity_id, user_id)?,
        PointsMode::Total => db.latest_points(activity_id, user_id)?.unwrap_or(0),
    };
    Ok(grade)
}

/// The request that reverts an award: same recipients, negated points,
/// flagged so its replay produces no further undo.
fn undo_request(req: &AwardRequest, recipients: &[&Participant]) -> AwardRequest {
    AwardRequest {
        recipient_ids: RecipientIds::Many(recipients.iter().map(|p| p.user_id).collect()),
        points: -req.points,
        undo: true,
        ajax: false,
        awardto_x: BTreeMap::new(),
        awardto_y: BTreeMap::new(),
        map_width: None,
        map_height: None,
        user_width: None,
        user_height: None,
        ..req.clone()
    }
}

pub fn message_key(points: i64, recipient_count: usize) -> MessageKey {
    match (recipient_count, points == 1) {
        (0, _) => MessageKey::AwardNoPoints,
        (1, true) => MessageKey::AwardOnePointOneUser,
        (_, true) => MessageKey::AwardOnePointManyUsers,
        (1, false) => MessageKey::AwardManyPointsOneUser,
        (_, false) => MessageKey::AwardManyPointsManyUsers,
    }
}

pub fn summarize(points: i64, recipients: &[&Participant]) -> FeedbackSummary {
    FeedbackSummary {
        points,
        recipient_count: recipients.len(),
        recipient_names: recipients
            .iter()
            .map(|p| p.full_name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        message_key: message_key(points, recipients.len()),
    }
}

pub fn feedback_text(summary: &FeedbackSummary) -> String {
    let FeedbackSummary {
        points,
        recipient_count,
        recipient_names,
        message_key,
    } = summary;
    match message_key {
        MessageKey::AwardNoPoints => "No points were awarded.".to_string(),
        MessageKey::AwardOnePointOneUser => format!("1 point awarded to {}.", recipient_names),
        MessageKey::AwardOnePointManyUsers => {
            format!("1 point awarded to each of {} users: {}.", recipient_count, recipient_names)
        }
        MessageKey::AwardManyPointsOneUser => {
            format!("{} points awarded to {}.", points, recipient_names)
        }
        MessageKey::AwardManyPointsManyUsers => format!(
            "{} points awarded to each of {} users: {}.",
            points, recipient_count, recipient_names
        ),
    }
}

pub fn render_feedback(summary: &FeedbackSummary, with_undo: bool) -> String {
    let mut html = format!(
        "<div class=\"pointsmap-feedback\">{}",
        escape_html(&feedback_text(summary))
    );
    if with_undo {
        html.push_str(" <a href=\"#\" class=\"pointsmap-undo\">Undo</a>");
    }
    html.push_str("</div>");
    html
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(name: &str) -> Participant {
        Participant {
            user_id: Uuid::new_v4(),
            group_id: 1,
            full_name: name.into(),
        }
    }

    #[test]
    fn message_keys() {
        assert_eq!(message_key(1, 1), MessageKey::AwardOnePointOneUser);
        assert_eq!(message_key(1, 3), MessageKey::AwardOnePointManyUsers);
        assert_eq!(message_key(-1, 1), MessageKey::AwardManyPointsOneUser);
        assert_eq!(message_key(2, 2), MessageKey::AwardManyPointsManyUsers);
        assert_eq!(message_key(5, 0), MessageKey::AwardNoPoints);
    }

    #[test]
    fn undo_replay_ignores_everything_but_the_award() {
        let req = AwardRequest {
            undo: true,
            ..Default::default()
        };
        let ignored = ignored_fields(&req);
        assert!(ignored.contains(&RequestField::Settings));
        assert!(ignored.contains(&RequestField::UndoLink));
        assert!(ignored.contains(&RequestField::Coordinates));

        let fresh = ignored_fields(&AwardRequest::default());
        assert_eq!(fresh, BTreeSet::from([RequestField::Coordinates]));
    }

    #[test]
    fn undo_negates_and_drops_positions() {
        let (ann, bob) = (participant("Ann"), participant("Bob"));
        let mut req = AwardRequest {
            recipient_ids: RecipientIds::Many(vec![ann.user_id, bob.user_id, Uuid::new_v4()]),
            points: 3,
            comment: "Nice".into(),
            ..Default::default()
        };
        req.awardto_x.insert(ann.user_id, 10);

        let undo = undo_request(&req, &[&ann, &bob]);
        assert_eq!(undo.points, -3);
        assert!(undo.undo);
        assert!(!undo.has_coordinates());
        assert_eq!(undo.comment, "Nice");
        assert_eq!(undo.recipient_ids.to_set(), BTreeSet::from([ann.user_id, bob.user_id]));
    }

    #[test]
    fn feedback_is_escaped() {
        let eve = participant("Eve <script>");
        let summary = summarize(2, &[&eve]);
        assert_eq!(summary.recipient_names, "Eve <script>");
        let html = render_feedback(&summary, true);
        assert!(html.contains("2 points awarded to Eve &lt;script&gt;."));
        assert!(html.contains("pointsmap-undo"));
    }
}
