//! Batched synchronisation of tile positions.
//!
//! Drag stops push [`TileMoved`] events into a [`SyncQueue`]. The queue keeps
//! only the latest position per user and raises `update_needed`; the sync
//! loop turns everything pending into one coordinate-only award request.
//! Nothing is cancelled or reordered: the last request to land wins.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use pointsmap_types::api::{
    AwardRequest, AwardResponse, MapActionRequest, MapView, RecipientIds, ReportResponse,
};
use pointsmap_types::events::TileMoved;
use pointsmap_types::models::GroupId;

use crate::error::SyncError;

#[derive(Default)]
struct Pending {
    group_id: GroupId,
    map_id: Option<Uuid>,
    moves: BTreeMap<Uuid, (i32, i32)>,
    update_needed: bool,
}

#[derive(Default)]
pub struct SyncQueue {
    pending: Mutex<Pending>,
}

impl SyncQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Map and group the queued positions belong to.
    pub fn set_map(&self, group_id: GroupId, map_id: Option<Uuid>) {
        let mut pending = self.lock();
        if pending.map_id != map_id && !pending.moves.is_empty() {
            debug!("Dropping {} moves queued for another map", pending.moves.len());
            pending.moves.clear();
            pending.update_needed = false;
        }
        pending.group_id = group_id;
        pending.map_id = map_id;
    }

    pub fn push(&self, moved: TileMoved) {
        let mut pending = self.lock();
        pending.moves.insert(moved.user_id, (moved.x, moved.y));
        pending.update_needed = true;
    }

    pub fn update_needed(&self) -> bool {
        self.lock().update_needed
    }

    fn drain_into(pending: &mut Pending, req: &mut AwardRequest) {
        for (user_id, (x, y)) in std::mem::take(&mut pending.moves) {
            req.awardto_x.insert(user_id, x);
            req.awardto_y.insert(user_id, y);
        }
        pending.update_needed = false;
        req.group_id = pending.group_id;
        req.map_id = pending.map_id;
    }

    /// Everything pending as one coordinate-only request, or `None` when
    /// nothing changed since the last flush.
    pub fn take_sync_request(&self) -> Option<AwardRequest> {
        let mut pending = self.lock();
        if !pending.update_needed {
            return None;
        }
        let mut req = AwardRequest {
            ajax: true,
            ..Default::default()
        };
        Self::drain_into(&mut pending, &mut req);
        Some(req)
    }

    /// An award request that also carries every pending position.
    pub fn award_request(
        &self,
        recipients: Vec<Uuid>,
        points: i64,
        comment: &str,
    ) -> AwardRequest {
        let mut req = AwardRequest {
            recipient_ids: RecipientIds::Many(recipients),
            points,
            comment: comment.to_string(),
            ajax: true,
            ..Default::default()
        };
        Self::drain_into(&mut self.lock(), &mut req);
        req
    }

    /// Put positions of a failed request back unless newer ones arrived.
    pub fn requeue(&self, req: &AwardRequest) {
        let mut pending = self.lock();
        if pending.map_id != req.map_id {
            return;
        }
        for (user_id, x) in &req.awardto_x {
            let y = req.awardto_y.get(user_id).copied().unwrap_or_default();
            pending.moves.entry(*user_id).or_insert((*x, y));
        }
        if !pending.moves.is_empty() {
            pending.update_needed = true;
        }
    }
}

/// HTTP client for one activity.
pub struct SyncClient {
    http: Client,
    base_url: String,
    token: String,
    activity_id: Uuid,
}

impl SyncClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, activity_id: Uuid) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            activity_id,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/activities/{}{}", self.base_url, self.activity_id, path)
    }

    async fn read<R: DeserializeOwned>(resp: reqwest::Response) -> Result<R, SyncError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::Status { status, body });
        }
        Ok(resp.json().await?)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, SyncError> {
        let resp = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        Self::read(resp).await
    }

    pub async fn award(&self, req: &AwardRequest) -> Result<AwardResponse, SyncError> {
        self.post("/award", req).await
    }

    /// Award points together with every pending position. On failure the
    /// positions go back into the queue.
    pub async fn award_with_pending(
        &self,
        queue: &SyncQueue,
        recipients: Vec<Uuid>,
        points: i64,
        comment: &str,
    ) -> Result<AwardResponse, SyncError> {
        let req = queue.award_request(recipients, points, comment);
        let result = self.award(&req).await;
        if result.is_err() {
            queue.requeue(&req);
        }
        result
    }

    pub async fn map_action(&self, req: &MapActionRequest) -> Result<MapView, SyncError> {
        self.post("/map", req).await
    }

    pub async fn fetch_map(
        &self,
        group_id: GroupId,
        map_id: Option<Uuid>,
    ) -> Result<MapView, SyncError> {
        let mut query = vec![("group_id", group_id.to_string())];
        if let Some(id) = map_id {
            query.push(("map_id", id.to_string()));
        }
        let resp = self
            .http
            .get(self.url("/map"))
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await?;
        Self::read(resp).await
    }

    pub async fn fetch_report(&self, user_id: Uuid) -> Result<ReportResponse, SyncError> {
        let resp = self
            .http
            .get(self.url(&format!("/report/{}", user_id)))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::read(resp).await
    }

    /// Send pending positions, if any. Returns whether a request was made.
    /// On failure the positions go back into the queue.
    pub async fn flush(&self, queue: &SyncQueue) -> Result<bool, SyncError> {
        let Some(req) = queue.take_sync_request() else {
            return Ok(false);
        };
        match self.award(&req).await {
            Ok(_) => {
                debug!("Synced {} positions", req.awardto_x.len());
                Ok(true)
            }
            Err(e) => {
                queue.requeue(&req);
                Err(e)
            }
        }
    }
}

/// Flush the queue every `period` while updates are pending.
pub fn spawn_sync_loop(
    client: Arc<SyncClient>,
    queue: Arc<SyncQueue>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            if !queue.update_needed() {
                continue;
            }
            if let Err(e) = client.flush(&queue).await {
                warn!("Position sync failed: {}", e);
            }
        }
    })
}
