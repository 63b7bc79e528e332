//! Award controller and reports against an in-memory store.

use uuid::Uuid;

use pointsmap_api::award::{self, Awarder, PREF_LAST_POINTS};
use pointsmap_api::error::PointsError;
use pointsmap_api::layout::{self, MapScope};
use pointsmap_api::report::build_report;
use pointsmap_db::Database;
use pointsmap_types::api::{AwardRequest, Claims, MessageKey, RecipientIds};
use pointsmap_types::events::MapCommand;
use pointsmap_types::models::{Activity, GradingMethod, Participant, PointsMode};

struct Fixture {
    db: Database,
    activity: Activity,
    roster: Vec<Participant>,
    grader: Uuid,
}

impl Fixture {
    fn new(mode: PointsMode, method: GradingMethod) -> Self {
        let db = Database::open_in_memory().unwrap();
        let activity = Activity {
            id: Uuid::new_v4(),
            name: "Lab".into(),
            points_mode: mode,
            grading_method: method,
            tile_width: 60,
            tile_height: 20,
        };
        db.upsert_activity(&activity).unwrap();

        let roster: Vec<Participant> = ["Ada", "Ben", "Cleo"]
            .iter()
            .map(|name| Participant {
                user_id: Uuid::new_v4(),
                group_id: 2,
                full_name: name.to_string(),
            })
            .collect();
        db.replace_roster(activity.id, &roster).unwrap();

        let grader = Uuid::new_v4();
        db.remember_user_name(grader, "Prof. Grey").unwrap();
        Self {
            db,
            activity,
            roster,
            grader,
        }
    }

    fn award(&self, req: &AwardRequest) -> pointsmap_types::api::AwardResponse {
        let awarder = Awarder {
            user_id: self.grader,
            activity: &self.activity,
        };
        award::award_points(&self.db, &awarder, req).unwrap()
    }

    fn request(&self, points: i64, recipients: &[Uuid]) -> AwardRequest {
        AwardRequest {
            recipient_ids: RecipientIds::Many(recipients.to_vec()),
            points,
            group_id: 2,
            ..Default::default()
        }
    }

    fn user(&self, i: usize) -> Uuid {
        self.roster[i].user_id
    }

    fn claims(&self, user: Uuid, can_grade: bool) -> Claims {
        Claims {
            sub: user,
            username: String::new(),
            exp: 0,
            can_grade,
        }
    }
}

#[test]
fn one_point_one_user() {
    let f = Fixture::new(PointsMode::Incremental, GradingMethod::Simple);
    let res = f.award(&f.request(1, &[f.user(0)]));

    assert_eq!(res.summary.message_key, MessageKey::AwardOnePointOneUser);
    assert_eq!(res.summary.recipient_names, "Ada");
    assert_eq!(res.feedback_html.matches("1 point awarded to Ada.").count(), 1);
    assert_eq!(res.grades.len(), 1);
    assert_eq!(res.grades[0].grade, 1);
}

#[test]
fn two_points_two_users() {
    let f = Fixture::new(PointsMode::Incremental, GradingMethod::Simple);
    let res = f.award(&f.request(2, &[f.user(1), f.user(0)]));

    assert_eq!(res.summary.message_key, MessageKey::AwardManyPointsManyUsers);
    assert_eq!(res.summary.recipient_count, 2);
    assert_eq!(res.summary.recipient_names, "Ada, Ben");
}

#[test]
fn undo_restores_incremental_totals() {
    let f = Fixture::new(PointsMode::Incremental, GradingMethod::Simple);
    let recipients = [f.user(0), f.user(2)];
    f.award(&f.request(3, &recipients));
    let before: Vec<i64> = recipients
        .iter()
        .map(|u| f.db.sum_points(f.activity.id, *u).unwrap())
        .collect();

    let res = f.award(&f.request(5, &recipients));
    let undo = res.undo.expect("award returns an undo descriptor");
    assert_eq!(undo.points, -5);

    let replay = f.award(&undo);
    assert!(replay.undo.is_none());
    let after: Vec<i64> = recipients
        .iter()
        .map(|u| f.db.sum_points(f.activity.id, *u).unwrap())
        .collect();
    assert_eq!(after, before);
    assert!(replay.grades.iter().all(|g| g.grade == 3));
}

#[test]
fn undo_replay_keeps_preferences() {
    let f = Fixture::new(PointsMode::Incremental, GradingMethod::Simple);
    let res = f.award(&f.request(4, &[f.user(1)]));
    f.award(&res.undo.unwrap());

    let pref = f.db.get_preference(f.grader, f.activity.id, PREF_LAST_POINTS).unwrap();
    assert_eq!(pref.as_deref(), Some("4"));
}

#[test]
fn total_mode_uses_latest_award() {
    let f = Fixture::new(PointsMode::Total, GradingMethod::Simple);
    f.award(&f.request(3, &[f.user(0)]));
    let res = f.award(&f.request(7, &[f.user(0)]));

    assert_eq!(res.grades[0].grade, 7);
    assert_eq!(f.db.get_grade(f.activity.id, f.user(0)).unwrap(), Some(7));
}

#[test]
fn unknown_recipients_are_skipped() {
    let f = Fixture::new(PointsMode::Incremental, GradingMethod::Simple);
    let stranger = Uuid::new_v4();
    let res = f.award(&f.request(2, &[f.user(0), stranger]));

    assert_eq!(res.summary.recipient_count, 1);
    assert_eq!(res.summary.message_key, MessageKey::AwardManyPointsOneUser);
    assert_eq!(f.db.sum_points(f.activity.id, stranger).unwrap(), 0);
}

#[test]
fn empty_recipient_set_persists_nothing() {
    let f = Fixture::new(PointsMode::Incremental, GradingMethod::Simple);
    let res = f.award(&f.request(2, &[Uuid::new_v4()]));

    assert_eq!(res.summary.message_key, MessageKey::AwardNoPoints);
    assert!(res.grades.is_empty());
    assert!(res.undo.is_none());
    assert!(f.db.get_grades(f.activity.id).unwrap().is_empty());
}

#[test]
fn ajax_sync_persists_positions() {
    let f = Fixture::new(PointsMode::Incremental, GradingMethod::Simple);
    let scope = MapScope {
        owner_id: f.grader,
        group_id: 2,
        activity_id: f.activity.id,
    };
    let map = layout::run_command(&f.db, &scope, &f.activity, None, &MapCommand::Reset)
        .unwrap()
        .map;

    let mut req = AwardRequest {
        ajax: true,
        group_id: 2,
        map_id: Some(map.id),
        ..Default::default()
    };
    req.awardto_x.insert(f.user(1), 300);
    req.awardto_y.insert(f.user(1), 140);
    req.awardto_x.insert(Uuid::new_v4(), 10);

    let res = f.award(&req);
    assert!(res.feedback_html.is_empty());
    assert_eq!(res.summary.message_key, MessageKey::AwardNoPoints);

    let coords = f.db.get_coordinates(map.id).unwrap();
    assert_eq!(coords.len(), 3);
    let moved = coords.iter().find(|c| c.user_id == f.user(1)).unwrap();
    assert_eq!((moved.x, moved.y), (300, 140));

    let map = f.db.get_map(map.id).unwrap().unwrap();
    assert!(map.width >= 300 + 60);
    assert!(map.height >= 140 + 20);
}

#[test]
fn simple_report() {
    let f = Fixture::new(PointsMode::Incremental, GradingMethod::Simple);
    f.award(&f.request(2, &[f.user(0)]));
    f.award(&f.request(3, &[f.user(0)]));

    let claims = f.claims(f.user(0), false);
    let report = build_report(&f.db, &claims, &f.activity, f.user(0), chrono::Utc::now()).unwrap();
    assert_eq!(report.full_name, "Ada");
    assert_eq!(report.total, 5);
    assert_eq!(report.today, 5);
    assert_eq!(report.grade, 5);
    assert_eq!(report.award_count, 2);
    assert!(report.items.is_empty());
    assert!(report.html.contains("Ada"));
}

#[test]
fn advanced_report_itemizes_by_awarder() {
    let f = Fixture::new(PointsMode::Incremental, GradingMethod::Advanced);
    let mut req = f.request(4, &[f.user(2)]);
    req.comment = "Good <work>".into();
    f.award(&req);
    f.award(&f.request(-1, &[f.user(2)]));

    let claims = f.claims(f.grader, true);
    let report = build_report(&f.db, &claims, &f.activity, f.user(2), chrono::Utc::now()).unwrap();
    assert_eq!(report.items.len(), 2);
    assert_eq!(report.items[0].awarder_name, "Prof. Grey");
    assert_eq!(report.awarders.len(), 1);
    assert_eq!(report.awarders[0].points, 3);
    assert_eq!(report.awarders[0].award_count, 2);
    assert!(report.html.contains("Good &lt;work&gt;"));
}

#[test]
fn students_only_read_their_own_report() {
    let f = Fixture::new(PointsMode::Incremental, GradingMethod::Simple);
    let claims = f.claims(f.user(0), false);
    let err = build_report(&f.db, &claims, &f.activity, f.user(1), chrono::Utc::now()).unwrap_err();
    assert!(matches!(err, PointsError::Forbidden));
}
