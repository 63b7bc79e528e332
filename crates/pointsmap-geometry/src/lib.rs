//! Pointsmap geometry engine.
//!
//! Pure functions that place user tiles on the map: perimeter and circle
//! patterns, lines, islands, plus the arrangement passes (compaction,
//! overlap separation, resize-to-fit, rotation). Nothing here performs I/O;
//! callers own the mapping between positions and users.

pub mod arrange;
pub mod pattern;
pub mod tile;

pub use arrange::{compact, compact_axis, resize_to_fit, rotate_quarter, separate_overlaps};
pub use pattern::{
    circle_radius, layout_circle, layout_islands, layout_lines, layout_square, split_count,
    square_side_counts,
};
pub use tile::{
    Axis, COORD_LIMIT, CountKind, ISLAND_PADDING, IslandShape, LINE_PADDING, PADDING, Point, Tile,
    TileSize, overlaps,
};
