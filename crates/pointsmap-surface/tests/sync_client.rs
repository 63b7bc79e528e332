//! Sync client against a live router on a loopback port.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use pointsmap_api::auth::{AppStateInner, create_token};
use pointsmap_db::Database;
use pointsmap_geometry::Point;
use pointsmap_surface::{Surface, SurfaceCommand, SyncClient, SyncError, SyncQueue, spawn_sync_loop};
use pointsmap_types::api::MapActionRequest;
use pointsmap_types::events::{MapCommand, SetupPattern, TileMoved};
use pointsmap_types::models::{Activity, GradingMethod, Participant, PointsMode};

const SECRET: &str = "surface-test-secret";

struct Server {
    base_url: String,
    activity_id: Uuid,
}

async fn start(students: usize) -> Server {
    let db = Database::open_in_memory().unwrap();
    let activity_id = Uuid::new_v4();
    db.upsert_activity(&Activity {
        id: activity_id,
        name: "Studio".into(),
        points_mode: PointsMode::Incremental,
        grading_method: GradingMethod::Simple,
        tile_width: 60,
        tile_height: 20,
    })
    .unwrap();
    let roster: Vec<Participant> = (0..students)
        .map(|i| Participant {
            user_id: Uuid::new_v4(),
            group_id: 5,
            full_name: format!("Student {}", i),
        })
        .collect();
    db.replace_roster(activity_id, &roster).unwrap();

    let app = pointsmap_api::router(AppStateInner::new(db, SECRET));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Server {
        base_url: format!("http://{}", addr),
        activity_id,
    }
}

fn grader_client(server: &Server) -> SyncClient {
    let token = create_token(SECRET, Uuid::new_v4(), "grader", true).unwrap();
    SyncClient::new(server.base_url.clone(), token, server.activity_id)
}

#[tokio::test]
async fn drag_sync_and_award_round_trip() {
    let server = start(3).await;
    let client = grader_client(&server);

    let view = client
        .map_action(&MapActionRequest {
            group_id: 5,
            map_id: None,
            command: MapCommand::Setup(SetupPattern::Square { percent: 100 }),
        })
        .await
        .unwrap();

    let queue = Arc::new(SyncQueue::new());
    let mut surface = Surface::new(&view, queue.clone());
    let tile = surface.tiles()[0].clone();

    surface.pointer_down(Point::new(tile.pos.x + 1, tile.pos.y + 1));
    surface.pointer_up(Point::new(tile.pos.x + 301, tile.pos.y + 201));
    assert!(queue.update_needed());

    assert!(client.flush(&queue).await.unwrap());
    assert!(!client.flush(&queue).await.unwrap());

    let fresh = client.fetch_map(5, Some(view.map.id)).await.unwrap();
    let synced = fresh.tiles.iter().find(|t| t.user_id == tile.user_id).unwrap();
    assert_eq!((synced.x, synced.y), (tile.pos.x + 300, tile.pos.y + 200));

    let cmd = {
        let moved = surface.tile(tile.user_id).unwrap().pos;
        surface.pointer_down(Point::new(moved.x + 1, moved.y + 1));
        surface.pointer_up(Point::new(moved.x + 1, moved.y + 1))
    };
    let Some(SurfaceCommand::Award { recipients }) = cmd else {
        panic!("click in award mode should award");
    };
    let res = client.award_with_pending(&queue, recipients, 2, "").await.unwrap();
    assert_eq!(res.summary.recipient_count, 1);
    for g in &res.grades {
        surface.set_grade(g.user_id, g.grade);
    }
    assert_eq!(surface.tile(tile.user_id).unwrap().grade, 2);

    let report = client.fetch_report(tile.user_id).await.unwrap();
    assert_eq!(report.total, 2);
}

#[tokio::test]
async fn sync_loop_flushes_in_the_background() {
    let server = start(2).await;
    let client = Arc::new(grader_client(&server));
    let view = client.fetch_map(5, None).await.unwrap();

    let queue = Arc::new(SyncQueue::new());
    let mut surface = Surface::new(&view, queue.clone());
    let user = surface.tiles()[1].user_id;
    let handle = spawn_sync_loop(client.clone(), queue.clone(), Duration::from_millis(20));

    // Both tiles start stacked at the origin; the later one is on top.
    surface.pointer_down(Point::new(5, 5));
    surface.pointer_up(Point::new(125, 65));

    let mut synced = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if !queue.update_needed() {
            let fresh = client.fetch_map(5, Some(view.map.id)).await.unwrap();
            let tile = fresh.tiles.iter().find(|t| t.user_id == user).unwrap();
            if (tile.x, tile.y) == (120, 60) {
                synced = true;
                break;
            }
        }
    }
    handle.abort();
    assert!(synced);
}

#[tokio::test]
async fn rejected_requests_surface_the_status() {
    let server = start(1).await;
    let token = create_token(SECRET, Uuid::new_v4(), "student", false).unwrap();
    let client = SyncClient::new(server.base_url.clone(), token, server.activity_id);

    let err = client.fetch_map(5, None).await.unwrap_err();
    match err {
        SyncError::Status { status, .. } => assert_eq!(status, reqwest::StatusCode::FORBIDDEN),
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn failed_awards_keep_pending_positions() {
    let server = start(1).await;
    let token = create_token(SECRET, Uuid::new_v4(), "student", false).unwrap();
    let client = SyncClient::new(server.base_url.clone(), token, server.activity_id);

    let queue = SyncQueue::new();
    queue.set_map(5, None);
    let user = Uuid::new_v4();
    queue.push(TileMoved { user_id: user, x: 40, y: 80 });

    let err = client.award_with_pending(&queue, vec![user], 1, "").await.unwrap_err();
    assert!(matches!(err, SyncError::Status { .. }));
    assert!(queue.update_needed());

    let retry = queue.take_sync_request().unwrap();
    assert_eq!((retry.awardto_x[&user], retry.awardto_y[&user]), (40, 80));
}
