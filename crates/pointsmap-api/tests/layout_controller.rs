//! Layout controller against an in-memory store.

use std::collections::{BTreeMap, HashSet};

use uuid::Uuid;

use pointsmap_api::error::PointsError;
use pointsmap_api::layout::{self, MapScope};
use pointsmap_db::Database;
use pointsmap_geometry::{Axis, COORD_LIMIT, CountKind, PADDING, Point, TileSize, overlaps};
use pointsmap_types::api::{AwardRequest, MapView};
use pointsmap_types::events::{MapCommand, SetupPattern};
use pointsmap_types::models::{Activity, GradingMethod, Participant, PointsMode, Visibility};

const SIZE: TileSize = TileSize {
    width: 60,
    height: 20,
};

struct Fixture {
    db: Database,
    activity: Activity,
    scope: MapScope,
}

impl Fixture {
    fn new(users: usize) -> Self {
        let db = Database::open_in_memory().unwrap();
        let activity = Activity {
            id: Uuid::new_v4(),
            name: "Seminar".into(),
            points_mode: PointsMode::Incremental,
            grading_method: GradingMethod::Simple,
            tile_width: SIZE.width,
            tile_height: SIZE.height,
        };
        db.upsert_activity(&activity).unwrap();

        let roster: Vec<Participant> = (0..users)
            .map(|i| Participant {
                user_id: Uuid::new_v4(),
                group_id: 1,
                full_name: format!("Student {:02}", i),
            })
            .collect();
        db.replace_roster(activity.id, &roster).unwrap();

        let scope = MapScope {
            owner_id: Uuid::new_v4(),
            group_id: 1,
            activity_id: activity.id,
        };
        Self { db, activity, scope }
    }

    fn run(&self, requested: Option<Uuid>, command: MapCommand) -> MapView {
        layout::run_command(&self.db, &self.scope, &self.activity, requested, &command).unwrap()
    }

    fn positions(&self, map_id: Uuid) -> BTreeMap<Uuid, (i32, i32)> {
        self.db
            .get_coordinates(map_id)
            .unwrap()
            .into_iter()
            .map(|c| (c.user_id, (c.x, c.y)))
            .collect()
    }
}

fn assert_separated(view: &MapView) {
    for (i, a) in view.tiles.iter().enumerate() {
        for b in &view.tiles[i + 1..] {
            assert!(
                !overlaps(Point::new(a.x, a.y), Point::new(b.x, b.y), SIZE),
                "{:?} overlaps {:?}",
                (a.x, a.y),
                (b.x, b.y)
            );
        }
    }
}

fn assert_inside(view: &MapView) {
    for t in &view.tiles {
        assert!(t.x >= 0 && t.y >= 0);
        assert!(t.x + SIZE.width + PADDING <= view.map.width);
        assert!(t.y + SIZE.height + PADDING <= view.map.height);
    }
}

#[test]
fn first_visit_creates_private_map() {
    let f = Fixture::new(4);
    let view = f.run(None, MapCommand::None);

    assert_eq!(view.map.visibility, Visibility::Private);
    assert_eq!(view.map.owner_id, f.scope.owner_id);
    assert_eq!(view.tiles.len(), 4);
    assert_eq!(view.layouts.len(), 1);
    assert!(view.layouts[0].active);

    // Everyone starts stacked at the origin; the box is sized on first render.
    assert!(view.tiles.iter().all(|t| (t.x, t.y) == (0, 0)));
    assert_eq!((view.map.width, view.map.height), (SIZE.width + PADDING, SIZE.height + PADDING));

    let again = f.run(None, MapCommand::None);
    assert_eq!(again.map.id, view.map.id);
}

#[test]
fn reset_spreads_coincident_tiles() {
    let f = Fixture::new(25);
    let view = f.run(None, MapCommand::Reset);

    assert_eq!(view.tiles.len(), 25);
    assert_separated(&view);
    assert_inside(&view);
}

#[test]
fn square_setup_for_thirteen_users() {
    let f = Fixture::new(13);
    let view = f.run(None, MapCommand::Setup(SetupPattern::Square { percent: 75 }));

    let distinct: HashSet<(i32, i32)> = view.tiles.iter().map(|t| (t.x, t.y)).collect();
    assert_eq!(distinct.len(), 13);
    assert_inside(&view);
}

#[test]
fn degenerate_setup_keeps_positions() {
    let f = Fixture::new(6);
    let before = f.run(None, MapCommand::Setup(SetupPattern::Circle { percent: 100 }));
    let after = f.run(None, MapCommand::Setup(SetupPattern::Square { percent: 0 }));

    assert_eq!(f.positions(after.map.id), f.positions(before.map.id));
    assert_eq!(after.map.width, before.map.width);
}

#[test]
fn roster_changes_are_reconciled() {
    let f = Fixture::new(3);
    let view = f.run(None, MapCommand::Reset);
    assert_eq!(view.tiles.len(), 3);

    let mut roster = f.db.get_roster(f.activity.id, 1).unwrap();
    let gone = roster.remove(0).user_id;
    let newcomer = Participant {
        user_id: Uuid::new_v4(),
        group_id: 1,
        full_name: "Zed".into(),
    };
    roster.push(newcomer.clone());
    f.db.replace_roster(f.activity.id, &roster).unwrap();

    let view = f.run(None, MapCommand::None);
    let ids: HashSet<Uuid> = view.tiles.iter().map(|t| t.user_id).collect();
    let expected: HashSet<Uuid> = roster.iter().map(|p| p.user_id).collect();
    assert_eq!(ids, expected);
    assert!(!ids.contains(&gone));

    let zed = view.tiles.iter().find(|t| t.user_id == newcomer.user_id).unwrap();
    assert_eq!((zed.x, zed.y), (0, 0));
    assert_eq!(zed.full_name, "Zed");
}

#[test]
fn shuffle_permutes_positions() {
    let f = Fixture::new(8);
    let before = f.run(
        None,
        MapCommand::Setup(SetupPattern::Lines {
            axis: Axis::X,
            count_kind: CountKind::PerGroup,
            count_value: 4,
        }),
    );
    let after = f.run(None, MapCommand::Shuffle);

    let mut a: Vec<(i32, i32)> = before.tiles.iter().map(|t| (t.x, t.y)).collect();
    let mut b: Vec<(i32, i32)> = after.tiles.iter().map(|t| (t.x, t.y)).collect();
    a.sort();
    b.sort();
    assert_eq!(a, b);
}

#[test]
fn rotate_turns_a_row_into_a_column() {
    let f = Fixture::new(3);
    f.run(
        None,
        MapCommand::Setup(SetupPattern::Lines {
            axis: Axis::X,
            count_kind: CountKind::Groups,
            count_value: 1,
        }),
    );
    let view = f.run(None, MapCommand::Rotate);

    let xs: HashSet<i32> = view.tiles.iter().map(|t| t.x).collect();
    assert_eq!(xs.len(), 1);
    assert_separated(&view);
    assert_inside(&view);
}

#[test]
fn save_then_resolve_round_trips() {
    let f = Fixture::new(7);
    let original = f.run(None, MapCommand::Setup(SetupPattern::Circle { percent: 100 }));

    let saved = f.run(
        Some(original.map.id),
        MapCommand::Save {
            name: "Exam".into(),
            visibility: Visibility::Private,
        },
    );
    assert_eq!(saved.map.name, "Exam");
    assert_ne!(saved.map.id, original.map.id);

    let resolved =
        layout::resolve_active_map(&f.db, &f.scope, &f.activity, Some(saved.map.id)).unwrap();
    assert_eq!(resolved.id, saved.map.id);
    assert_eq!((resolved.width, resolved.height), (original.map.width, original.map.height));
    assert_eq!(f.positions(resolved.id), f.positions(original.map.id));
}

#[test]
fn save_numbers_colliding_names() {
    let f = Fixture::new(2);
    let base = f.run(None, MapCommand::Reset).map.id;

    let save = |name: &str| {
        f.run(
            Some(base),
            MapCommand::Save {
                name: name.into(),
                visibility: Visibility::Private,
            },
        )
        .map
        .name
    };
    assert_eq!(save("Exam"), "Exam");
    assert_eq!(save("Exam"), "Exam (2)");
    assert_eq!(save("Exam"), "Exam (3)");
    assert_eq!(save("Exam (2)"), "Exam (4)");
}

#[test]
fn load_copies_saved_positions() {
    let f = Fixture::new(6);
    let original = f.run(
        None,
        MapCommand::Setup(SetupPattern::Lines {
            axis: Axis::Y,
            count_kind: CountKind::Groups,
            count_value: 2,
        }),
    );
    let saved = f.run(
        Some(original.map.id),
        MapCommand::Save {
            name: "Rows".into(),
            visibility: Visibility::Group,
        },
    );

    f.run(Some(original.map.id), MapCommand::Reset);
    assert_ne!(f.positions(original.map.id), f.positions(saved.map.id));

    let loaded = f.run(
        Some(original.map.id),
        MapCommand::Load {
            layout_id: saved.map.id,
        },
    );
    assert_eq!(loaded.map.id, original.map.id);
    assert_eq!(f.positions(original.map.id), f.positions(saved.map.id));
}

#[test]
fn deleting_the_active_map_falls_back() {
    let f = Fixture::new(3);
    let original = f.run(None, MapCommand::Reset);
    let saved = f.run(
        Some(original.map.id),
        MapCommand::Save {
            name: "Quiz".into(),
            visibility: Visibility::Private,
        },
    );

    // The newest private map wins without an explicit request.
    assert_eq!(f.run(None, MapCommand::None).map.id, saved.map.id);

    let view = f.run(
        Some(saved.map.id),
        MapCommand::Delete {
            layout_id: saved.map.id,
        },
    );
    assert_eq!(view.map.id, original.map.id);
    assert!(view.layouts.iter().all(|l| l.id != saved.map.id));
    assert!(f.db.get_coordinates(saved.map.id).unwrap().is_empty());
}

#[test]
fn only_the_owner_deletes() {
    let f = Fixture::new(2);
    let map = f.run(None, MapCommand::None).map;

    let intruder = MapScope {
        owner_id: Uuid::new_v4(),
        ..f.scope
    };
    let err = layout::delete_layout(&f.db, &intruder, map.id).unwrap_err();
    assert!(matches!(err, PointsError::Forbidden));
    assert!(f.db.get_map(map.id).unwrap().is_some());
}

#[test]
fn private_maps_of_others_are_not_honoured() {
    let f = Fixture::new(2);
    let mine = f.run(None, MapCommand::None).map;

    let other = MapScope {
        owner_id: Uuid::new_v4(),
        ..f.scope
    };
    let theirs = layout::resolve_active_map(&f.db, &other, &f.activity, Some(mine.id)).unwrap();
    assert_ne!(theirs.id, mine.id);
    assert_eq!(theirs.owner_id, other.owner_id);
}

#[test]
fn shared_map_opened_from_another_group_keeps_positions() {
    let f = Fixture::new(4);
    let original = f.run(None, MapCommand::Setup(SetupPattern::Circle { percent: 100 }));
    let shared = f
        .run(
            Some(original.map.id),
            MapCommand::Save {
                name: "Circle".into(),
                visibility: Visibility::Shared,
            },
        )
        .map;
    let before = f.positions(shared.id);
    assert_eq!(before.len(), 4);

    let mut roster = f.db.get_roster(f.activity.id, 1).unwrap();
    roster.extend((0..3).map(|i| Participant {
        user_id: Uuid::new_v4(),
        group_id: 4,
        full_name: format!("Visitor {}", i),
    }));
    f.db.replace_roster(f.activity.id, &roster).unwrap();

    let visitor = MapScope {
        owner_id: Uuid::new_v4(),
        group_id: 4,
        activity_id: f.activity.id,
    };
    let view = layout::run_command(&f.db, &visitor, &f.activity, None, &MapCommand::None).unwrap();
    assert_eq!(view.map.id, shared.id);
    assert_eq!(view.tiles.len(), 4);
    assert!(view.tiles.iter().all(|t| t.full_name.starts_with("Student")));
    assert_eq!(f.positions(shared.id), before);
}

#[test]
fn foreign_layouts_are_loaded_not_opened() {
    let f = Fixture::new(3);
    let colleague = MapScope {
        owner_id: Uuid::new_v4(),
        ..f.scope
    };
    let theirs = layout::run_command(&f.db, &colleague, &f.activity, None, &MapCommand::Reset)
        .unwrap()
        .map;

    let mine = f.run(None, MapCommand::Setup(SetupPattern::Circle { percent: 100 }));
    let shared = f
        .run(
            Some(mine.map.id),
            MapCommand::Save {
                name: "Ring".into(),
                visibility: Visibility::Shared,
            },
        )
        .map;

    let resolved =
        layout::resolve_active_map(&f.db, &colleague, &f.activity, Some(shared.id)).unwrap();
    assert_eq!(resolved.id, theirs.id);

    let loaded = layout::run_command(
        &f.db,
        &colleague,
        &f.activity,
        Some(theirs.id),
        &MapCommand::Load {
            layout_id: shared.id,
        },
    )
    .unwrap();
    assert_eq!(loaded.map.id, theirs.id);
    assert_eq!(f.positions(theirs.id), f.positions(shared.id));
}

#[test]
fn far_drags_are_clamped_and_separable() {
    let f = Fixture::new(3);
    let map = f.run(None, MapCommand::Reset).map;
    let roster = f.db.get_roster(f.activity.id, 1).unwrap();

    let mut req = AwardRequest {
        ajax: true,
        group_id: 1,
        map_id: Some(map.id),
        ..Default::default()
    };
    for p in &roster[..2] {
        req.awardto_x.insert(p.user_id, i32::MAX);
        req.awardto_y.insert(p.user_id, i32::MAX);
    }
    let synced = layout::sync_coordinates(&f.db, &f.scope, &f.activity, &req).unwrap();
    assert_eq!(synced.width, COORD_LIMIT + SIZE.width + PADDING);
    assert!(f
        .positions(map.id)
        .values()
        .all(|&(x, y)| x <= COORD_LIMIT && y <= COORD_LIMIT));

    let view = f.run(Some(map.id), MapCommand::Separate);
    assert_separated(&view);
    assert_inside(&view);
}
