//! Tile primitives shared by every layout pass.
//!
//! All coordinates are integer pixels with the origin at the top-left of the
//! map. Every tile on a map has the same size.

use serde::{Deserialize, Serialize};

/// Padding added to the right and bottom of the tight bounding box.
pub const PADDING: i32 = 8;

/// Gap between two consecutive lines in a lines layout.
pub const LINE_PADDING: i32 = 24;

/// Gap between two neighbouring islands.
pub const ISLAND_PADDING: i32 = 24;

/// Largest absolute pixel coordinate a tile may take.
pub const COORD_LIMIT: i32 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

impl Axis {
    pub fn other(self) -> Axis {
        match self {
            Axis::X => Axis::Y,
            Axis::Y => Axis::X,
        }
    }
}

/// How the `count_value` of a lines/islands layout is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountKind {
    /// `count_value` is the number of lines (or islands).
    Groups,
    /// `count_value` is the number of tiles in each line (or island).
    PerGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IslandShape {
    Circle,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn get(self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    pub fn set(&mut self, axis: Axis, value: i32) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
        }
    }

    /// Squared Euclidean distance, widened so large maps cannot overflow.
    pub fn distance_sq(self, other: Point) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        dx * dx + dy * dy
    }

    /// Both axes limited to `-COORD_LIMIT..=COORD_LIMIT`.
    pub fn clamped(self) -> Point {
        Point::new(
            self.x.clamp(-COORD_LIMIT, COORD_LIMIT),
            self.y.clamp(-COORD_LIMIT, COORD_LIMIT),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSize {
    pub width: i32,
    pub height: i32,
}

impl TileSize {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn along(self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
        }
    }

    /// A tile with no area cannot be laid out or separated.
    pub fn is_degenerate(self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// A placed tile together with its stacking order (higher `z` is on top).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub pos: Point,
    pub z: i32,
}

impl Tile {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self {
            pos: Point::new(x, y),
            z,
        }
    }
}

/// Bounding-box intersection of two equally sized tiles. Touching edges do
/// not count as an overlap.
pub fn overlaps(a: Point, b: Point, size: TileSize) -> bool {
    let (w, h) = (size.width as i64, size.height as i64);
    let (ax, ay, bx, by) = (a.x as i64, a.y as i64, b.x as i64, b.y as i64);
    ax < bx + w && bx < ax + w && ay < by + h && by < ay + h
}
