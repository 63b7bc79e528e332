use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use pointsmap_geometry::{Point, TileSize};
use pointsmap_types::api::MapView;
use pointsmap_types::events::TileMoved;

use crate::sync::SyncQueue;

/// What a plain click on a tile does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Award,
    Select,
    Absent,
    Report,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceTile {
    pub user_id: Uuid,
    pub full_name: String,
    pub pos: Point,
    pub grade: i64,
    /// Local marker only, never persisted.
    pub absent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceState {
    Idle,
    Dragging(Drag),
    Selecting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drag {
    /// Tile under the pointer when the drag started.
    pub grabbed: usize,
    pub origin: Point,
    /// Index and start position of every tile moving with the drag.
    pub start: Vec<(usize, Point)>,
    pub moved: bool,
}

/// Work a gesture hands to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCommand {
    Award { recipients: Vec<Uuid> },
    FetchReport { user_id: Uuid },
}

/// Pointer state machine over the tiles of one map.
pub struct Surface {
    tiles: Vec<SurfaceTile>,
    tile_size: TileSize,
    selection: BTreeSet<Uuid>,
    mode: Mode,
    modifier_held: bool,
    state: SurfaceState,
    queue: Arc<SyncQueue>,
}

impl Surface {
    pub fn new(view: &MapView, queue: Arc<SyncQueue>) -> Self {
        let mut surface = Self {
            tiles: Vec::new(),
            tile_size: TileSize::new(view.map.tile_width, view.map.tile_height),
            selection: BTreeSet::new(),
            mode: Mode::default(),
            modifier_held: false,
            state: SurfaceState::Idle,
            queue,
        };
        surface.load(view);
        surface
    }

    /// Replace the tiles with a fresh server view. Selection and absent
    /// markers survive for users still present.
    pub fn load(&mut self, view: &MapView) {
        let absent: BTreeSet<Uuid> = self
            .tiles
            .iter()
            .filter(|t| t.absent)
            .map(|t| t.user_id)
            .collect();
        self.tile_size = TileSize::new(view.map.tile_width, view.map.tile_height);
        self.tiles = view
            .tiles
            .iter()
            .map(|t| SurfaceTile {
                user_id: t.user_id,
                full_name: t.full_name.clone(),
                pos: Point::new(t.x, t.y),
                grade: t.grade,
                absent: absent.contains(&t.user_id),
            })
            .collect();
        let present: BTreeSet<Uuid> = self.tiles.iter().map(|t| t.user_id).collect();
        self.selection.retain(|id| present.contains(id));
        self.queue.set_map(view.map.group_id, Some(view.map.id));
        self.state = SurfaceState::Idle;
    }

    pub fn tiles(&self) -> &[SurfaceTile] {
        &self.tiles
    }

    pub fn tile(&self, user_id: Uuid) -> Option<&SurfaceTile> {
        self.tiles.iter().find(|t| t.user_id == user_id)
    }

    pub fn selection(&self) -> &BTreeSet<Uuid> {
        &self.selection
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn state(&self) -> &SurfaceState {
        &self.state
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    /// Sticky mode, or Select while the modifier is held.
    pub fn mode(&self) -> Mode {
        if self.modifier_held {
            Mode::Select
        } else {
            self.mode
        }
    }

    pub fn set_modifier(&mut self, held: bool) {
        self.modifier_held = held;
    }

    /// Apply grades returned by an award.
    pub fn set_grade(&mut self, user_id: Uuid, grade: i64) {
        if let Some(tile) = self.tiles.iter_mut().find(|t| t.user_id == user_id) {
            tile.grade = grade;
        }
    }

    /// Topmost tile under `pos`. Later tiles are drawn above earlier ones.
    fn hit(&self, pos: Point) -> Option<usize> {
        let TileSize { width, height } = self.tile_size;
        self.tiles.iter().rposition(|t| {
            pos.x >= t.pos.x
                && pos.x < t.pos.x + width
                && pos.y >= t.pos.y
                && pos.y < t.pos.y + height
        })
    }

    fn toggle_selection(&mut self, user_id: Uuid) {
        if !self.selection.remove(&user_id) {
            self.selection.insert(user_id);
        }
    }

    pub fn pointer_down(&mut self, pos: Point) {
        let Some(index) = self.hit(pos) else {
            self.state = SurfaceState::Idle;
            return;
        };

        if self.modifier_held {
            let user_id = self.tiles[index].user_id;
            self.toggle_selection(user_id);
            self.state = SurfaceState::Selecting;
            return;
        }

        let grabbed_id = self.tiles[index].user_id;
        let start = if self.selection.contains(&grabbed_id) {
            self.tiles
                .iter()
                .enumerate()
                .filter(|(_, t)| self.selection.contains(&t.user_id))
                .map(|(i, t)| (i, t.pos))
                .collect()
        } else {
            vec![(index, self.tiles[index].pos)]
        };

        self.state = SurfaceState::Dragging(Drag {
            grabbed: index,
            origin: pos,
            start,
            moved: false,
        });
    }

    pub fn pointer_move(&mut self, pos: Point) {
        let SurfaceState::Dragging(drag) = &mut self.state else {
            return;
        };
        let (dx, dy) = (pos.x - drag.origin.x, pos.y - drag.origin.y);
        if dx != 0 || dy != 0 {
            drag.moved = true;
        }
        for &(i, start) in &drag.start {
            self.tiles[i].pos = Point::new(start.x + dx, start.y + dy);
        }
    }

    /// Finish a gesture. A drag queues one [`TileMoved`] per moved tile; a
    /// click acts according to [`mode`](Self::mode).
    pub fn pointer_up(&mut self, pos: Point) -> Option<SurfaceCommand> {
        self.pointer_move(pos);
        match std::mem::replace(&mut self.state, SurfaceState::Idle) {
            SurfaceState::Idle | SurfaceState::Selecting => None,
            SurfaceState::Dragging(drag) if drag.moved => {
                for (i, _) in &drag.start {
                    let tile = &self.tiles[*i];
                    self.queue.push(TileMoved {
                        user_id: tile.user_id,
                        x: tile.pos.x,
                        y: tile.pos.y,
                    });
                }
                debug!("Queued {} moved tiles", drag.start.len());
                None
            }
            SurfaceState::Dragging(drag) => self.click(drag.grabbed),
        }
    }

    fn click(&mut self, index: usize) -> Option<SurfaceCommand> {
        let user_id = self.tiles[index].user_id;
        match self.mode() {
            Mode::Award => {
                let recipients = if self.selection.contains(&user_id) {
                    self.selection.iter().copied().collect()
                } else {
                    vec![user_id]
                };
                Some(SurfaceCommand::Award { recipients })
            }
            Mode::Select => {
                self.toggle_selection(user_id);
                None
            }
            Mode::Absent => {
                let tile = &mut self.tiles[index];
                tile.absent = !tile.absent;
                None
            }
            Mode::Report => Some(SurfaceCommand::FetchReport { user_id }),
        }
    }
}
