//! Layout controller.
//!
//! Resolves which map a caller is looking at, keeps its coordinate set equal
//! to the roster, runs the geometry engine for map actions and manages saved
//! layouts. Every function here is synchronous and expects to be called from
//! a blocking task.

use std::collections::HashMap;

use chrono::Utc;
use rand::seq::SliceRandom;
use tracing::{debug, info};
use uuid::Uuid;

use pointsmap_db::Database;
use pointsmap_geometry::{self as geometry, COORD_LIMIT, PADDING, Point, Tile, TileSize};
use pointsmap_types::api::{AwardRequest, LayoutSummary, MapTile, MapView};
use pointsmap_types::events::{MapCommand, SetupPattern};
use pointsmap_types::models::{Activity, Coordinate, GroupId, Participant, UserMap, Visibility};

use crate::error::PointsError;

/// The (owner, group, activity) a map request is made in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapScope {
    pub owner_id: Uuid,
    pub group_id: GroupId,
    pub activity_id: Uuid,
}

impl MapScope {
    /// Private maps are visible to their owner within their group, group maps
    /// to every grader of the group, shared maps to the whole activity.
    pub fn can_see(&self, map: &UserMap) -> bool {
        if map.activity_id != self.activity_id {
            return false;
        }
        match map.visibility {
            Visibility::Private => map.owner_id == self.owner_id && map.group_id == self.group_id,
            Visibility::Group => map.group_id == self.group_id,
            Visibility::Shared => true,
        }
    }

    /// The caller's own map in this group and activity.
    pub fn owns(&self, map: &UserMap) -> bool {
        map.owner_id == self.owner_id
            && map.group_id == self.group_id
            && map.activity_id == self.activity_id
    }
}

fn tile_size(map: &UserMap) -> TileSize {
    TileSize::new(map.tile_width, map.tile_height)
}

// -- Active map --

/// Pick the map a caller works on.
///
/// A requested map wins when the caller owns it in this scope. Other visible
/// layouts are only applied through [`MapCommand::Load`]. Otherwise the most
/// specific visible map is used (private, then group, then shared; most
/// recently modified first). With nothing visible a new, unsized private map
/// is created.
pub fn resolve_active_map(
    db: &Database,
    scope: &MapScope,
    activity: &Activity,
    requested: Option<Uuid>,
) -> Result<UserMap, PointsError> {
    if let Some(id) = requested {
        match db.get_map(id)? {
            Some(map) if scope.owns(&map) => return Ok(map),
            _ => debug!("Requested map {} is not owned by {}, falling back", id, scope.owner_id),
        }
    }

    let visible = db.list_visible_maps(scope.activity_id, scope.owner_id, scope.group_id)?;
    if let Some(map) = visible.into_iter().next() {
        return Ok(map);
    }

    let map = UserMap {
        id: Uuid::new_v4(),
        name: String::new(),
        owner_id: scope.owner_id,
        group_id: scope.group_id,
        activity_id: scope.activity_id,
        visibility: Visibility::Private,
        width: 0,
        height: 0,
        tile_width: activity.tile_width,
        tile_height: activity.tile_height,
        time_modified: Utc::now(),
    };
    db.insert_map(&map)?;
    info!(
        "Created map {} for {} (group {}, activity {})",
        map.id, scope.owner_id, scope.group_id, scope.activity_id
    );
    Ok(map)
}

// -- Reconciliation --

/// Participants in the map's own group scope, whoever is looking at it.
pub fn map_roster(db: &Database, map: &UserMap) -> Result<Vec<Participant>, PointsError> {
    Ok(db.get_roster(map.activity_id, map.group_id)?)
}

/// Make the map's coordinates match the roster and return them in roster
/// order. New users start at (0, 0); rows of users who left are deleted.
pub fn reconcile(
    db: &Database,
    map: &UserMap,
    participants: &[Participant],
) -> Result<Vec<Coordinate>, PointsError> {
    let ids: Vec<Uuid> = participants.iter().map(|p| p.user_id).collect();
    let (added, removed) = db.reconcile_coordinates(map.id, &ids)?;
    if added + removed > 0 {
        debug!("Map {} reconciled: {} added, {} removed", map.id, added, removed);
    }

    let mut by_user: HashMap<Uuid, Coordinate> = db
        .get_coordinates(map.id)?
        .into_iter()
        .map(|c| (c.user_id, c))
        .collect();
    Ok(ids.iter().filter_map(|id| by_user.remove(id)).collect())
}

// -- Map actions --

/// Reconcile, run one geometry action and persist the result.
///
/// Map size and coordinates are written in one transaction. Save and delete
/// do not touch geometry and are rejected here; see [`run_command`].
pub fn apply_layout(
    db: &Database,
    scope: &MapScope,
    mut map: UserMap,
    participants: &[Participant],
    command: &MapCommand,
) -> Result<(UserMap, Vec<Coordinate>), PointsError> {
    let mut coords = reconcile(db, &map, participants)?;
    let size = tile_size(&map);
    let mut points: Vec<Point> = coords.iter().map(|c| Point::new(c.x, c.y).clamped()).collect();

    match command {
        MapCommand::None => {
            // Unsized maps get their box on first render.
            if map.width > 0 || map.height > 0 || points.is_empty() {
                return Ok((map, coords));
            }
        }
        MapCommand::Reset => {
            points.fill(Point::default());
            separate(&mut points, size);
        }
        MapCommand::Cleanup => geometry::compact(&mut points, size),
        MapCommand::Separate => separate(&mut points, size),
        MapCommand::Shuffle => points.shuffle(&mut rand::rng()),
        MapCommand::Resize => {}
        MapCommand::Rotate => geometry::rotate_quarter(&mut points, map.width, size),
        MapCommand::Load { layout_id } => {
            copy_positions(db, scope, *layout_id, &coords, &mut points)?;
            separate(&mut points, size);
        }
        MapCommand::Setup(pattern) => {
            let placed = setup_points(pattern, points.len(), size, map.width);
            if placed.len() == points.len() {
                points = placed;
            } else {
                debug!("Degenerate setup {:?} on map {}, positions kept", pattern, map.id);
            }
        }
        MapCommand::Save { .. } | MapCommand::Delete { .. } => {
            return Err(PointsError::Invalid("save and delete are not geometry actions".into()));
        }
    }

    let (width, height) = geometry::resize_to_fit(&mut points, size);
    for (c, p) in coords.iter_mut().zip(&points) {
        c.x = p.x;
        c.y = p.y;
    }
    map.width = width;
    map.height = height;
    map.time_modified = Utc::now();

    db.save_map_state(&map, &coords)?;
    debug!("Map {} after {:?}: {}x{}", map.id, command, width, height);
    Ok((map, coords))
}

fn separate(points: &mut [Point], size: TileSize) {
    let mut tiles: Vec<Tile> = points
        .iter()
        .enumerate()
        .map(|(z, p)| Tile::new(p.x, p.y, z as i32))
        .collect();
    geometry::separate_overlaps(&mut tiles, size);
    for (p, t) in points.iter_mut().zip(&tiles) {
        *p = t.pos;
    }
}

fn setup_points(
    pattern: &SetupPattern,
    count: usize,
    size: TileSize,
    map_width: i32,
) -> Vec<Point> {
    match *pattern {
        SetupPattern::Square { percent } => geometry::layout_square(count, size, percent),
        SetupPattern::Circle { percent } => geometry::layout_circle(count, size, percent),
        SetupPattern::Lines {
            axis,
            count_kind,
            count_value,
        } => geometry::layout_lines(count, size, axis, count_kind, count_value),
        SetupPattern::Islands {
            shape,
            count_kind,
            count_value,
        } => geometry::layout_islands(count, size, shape, count_kind, count_value, map_width),
    }
}

fn copy_positions(
    db: &Database,
    scope: &MapScope,
    layout_id: Uuid,
    coords: &[Coordinate],
    points: &mut [Point],
) -> Result<(), PointsError> {
    let layout = db
        .get_map(layout_id)?
        .filter(|m| scope.can_see(m))
        .ok_or(PointsError::NotFound("layout"))?;

    let saved: HashMap<Uuid, Point> = db
        .get_coordinates(layout.id)?
        .into_iter()
        .map(|c| (c.user_id, Point::new(c.x, c.y).clamped()))
        .collect();

    for (c, p) in coords.iter().zip(points.iter_mut()) {
        if let Some(pos) = saved.get(&c.user_id) {
            *p = *pos;
        }
    }
    Ok(())
}

// -- Saved layouts --

/// Copy positions of a saved layout onto `map`, then separate and resize.
pub fn load_layout(
    db: &Database,
    scope: &MapScope,
    map: UserMap,
    participants: &[Participant],
    layout_id: Uuid,
) -> Result<(UserMap, Vec<Coordinate>), PointsError> {
    apply_layout(db, scope, map, participants, &MapCommand::Load { layout_id })
}

/// Clone `map` and its coordinates under a new name owned by the caller.
pub fn save_layout(
    db: &Database,
    scope: &MapScope,
    map: &UserMap,
    name: &str,
    visibility: Visibility,
) -> Result<UserMap, PointsError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PointsError::Invalid("layout name is empty".into()));
    }

    let taken = db.get_map_names(scope.activity_id, scope.owner_id)?;
    let copy = UserMap {
        id: Uuid::new_v4(),
        name: unique_name(name, &taken),
        owner_id: scope.owner_id,
        group_id: scope.group_id,
        visibility,
        time_modified: Utc::now(),
        ..map.clone()
    };
    db.clone_map(map.id, &copy)?;
    info!("Saved map {} as '{}' ({})", map.id, copy.name, copy.id);
    Ok(copy)
}

/// Delete a layout. Only its owner may do so.
pub fn delete_layout(db: &Database, scope: &MapScope, layout_id: Uuid) -> Result<(), PointsError> {
    let map = db.get_map(layout_id)?.ok_or(PointsError::NotFound("layout"))?;
    if map.owner_id != scope.owner_id || map.activity_id != scope.activity_id {
        return Err(PointsError::Forbidden);
    }
    db.delete_map(layout_id)?;
    info!("Deleted map {} ('{}')", layout_id, map.name);
    Ok(())
}

/// First free name: `name` itself, else `base (n)` for the lowest `n >= 2`.
/// A trailing `(n)` on `name` is replaced, never stacked.
pub fn unique_name(name: &str, taken: &[String]) -> String {
    if !taken.iter().any(|t| t == name) {
        return name.to_string();
    }
    let base = strip_counter(name);
    let mut n = 2;
    loop {
        let candidate = format!("{} ({})", base, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn strip_counter(name: &str) -> &str {
    let Some(rest) = name.strip_suffix(')') else {
        return name;
    };
    match rest.rfind(" (") {
        Some(open)
            if rest.len() > open + 2 && rest[open + 2..].chars().all(|c| c.is_ascii_digit()) =>
        {
            &rest[..open]
        }
        _ => name,
    }
}

// -- Entry points --

/// Execute one map command in a scope and return the resulting view.
///
/// Coordinates are always reconciled against the roster of the map's own
/// group, so opening another group's shared map never drops its users.
pub fn run_command(
    db: &Database,
    scope: &MapScope,
    activity: &Activity,
    requested: Option<Uuid>,
    command: &MapCommand,
) -> Result<MapView, PointsError> {
    let active = resolve_active_map(db, scope, activity, requested)?;
    let mut participants = map_roster(db, &active)?;

    let (map, coords) = match command {
        MapCommand::Save { name, visibility } => {
            let (active, _) = apply_layout(db, scope, active, &participants, &MapCommand::None)?;
            let saved = save_layout(db, scope, &active, name, *visibility)?;
            if saved.group_id != active.group_id {
                participants = map_roster(db, &saved)?;
            }
            let coords = reconcile(db, &saved, &participants)?;
            (saved, coords)
        }
        MapCommand::Delete { layout_id } => {
            delete_layout(db, scope, *layout_id)?;
            let map = if active.id == *layout_id {
                let fallback = resolve_active_map(db, scope, activity, None)?;
                participants = map_roster(db, &fallback)?;
                fallback
            } else {
                active
            };
            apply_layout(db, scope, map, &participants, &MapCommand::None)?
        }
        other => apply_layout(db, scope, active, &participants, other)?,
    };

    map_view(db, scope, map, coords, &participants)
}

/// Tiles, grades and selectable layouts for a map.
pub fn map_view(
    db: &Database,
    scope: &MapScope,
    map: UserMap,
    coords: Vec<Coordinate>,
    participants: &[Participant],
) -> Result<MapView, PointsError> {
    let grades = db.get_grades(scope.activity_id)?;
    let names: HashMap<Uuid, &str> = participants
        .iter()
        .map(|p| (p.user_id, p.full_name.as_str()))
        .collect();

    let tiles = coords
        .into_iter()
        .map(|c| MapTile {
            user_id: c.user_id,
            full_name: names.get(&c.user_id).map(|n| n.to_string()).unwrap_or_default(),
            x: c.x,
            y: c.y,
            grade: grades.get(&c.user_id).copied().unwrap_or(0),
        })
        .collect();

    let layouts = db
        .list_visible_maps(scope.activity_id, scope.owner_id, scope.group_id)?
        .into_iter()
        .map(|m| LayoutSummary {
            active: m.id == map.id,
            id: m.id,
            name: m.name,
            owner_id: m.owner_id,
            visibility: m.visibility,
        })
        .collect();

    Ok(MapView { map, tiles, layouts })
}

/// Persist drag-driven positions carried by an award request.
///
/// Only users on the map's roster are written and positions are clamped to
/// the coordinate range. The map box grows to cover every tile and never
/// shrinks below the size the client reports.
pub fn sync_coordinates(
    db: &Database,
    scope: &MapScope,
    activity: &Activity,
    req: &AwardRequest,
) -> Result<UserMap, PointsError> {
    let mut map = resolve_active_map(db, scope, activity, req.map_id)?;
    let participants = map_roster(db, &map)?;
    let mut coords = reconcile(db, &map, &participants)?;

    if let (Some(w), Some(h)) = (req.user_width, req.user_height) {
        if w > 0 && h > 0 {
            map.tile_width = w;
            map.tile_height = h;
        }
    }

    let mut moved = 0;
    for c in coords.iter_mut() {
        let (x, y) = (req.awardto_x.get(&c.user_id), req.awardto_y.get(&c.user_id));
        if x.is_none() && y.is_none() {
            continue;
        }
        let pos = Point::new(x.copied().unwrap_or(c.x), y.copied().unwrap_or(c.y)).clamped();
        c.x = pos.x;
        c.y = pos.y;
        moved += 1;
    }

    let skipped = req
        .awardto_x
        .keys()
        .chain(req.awardto_y.keys())
        .filter(|id| !participants.iter().any(|p| p.user_id == **id))
        .count();
    if skipped > 0 {
        debug!("Ignored {} positions for users off the roster", skipped);
    }

    let size = tile_size(&map);
    let extent = |edge: i32, tile: i32| edge.saturating_add(tile).saturating_add(PADDING);
    let width = coords.iter().map(|c| extent(c.x, size.width)).max().unwrap_or(0);
    let height = coords.iter().map(|c| extent(c.y, size.height)).max().unwrap_or(0);
    map.width = width.max(req.map_width.unwrap_or(0).min(COORD_LIMIT));
    map.height = height.max(req.map_height.unwrap_or(0).min(COORD_LIMIT));
    map.time_modified = Utc::now();

    db.save_map_state(&map, &coords)?;
    debug!("Synced {} positions on map {}", moved, map.id);
    Ok(map)
}
