//! Pattern layouts: square perimeter, circle, lines and islands.
//!
//! Every function returns one point per tile, in the order the caller will
//! assign users to them. Points are not normalised; run
//! [`resize_to_fit`](crate::arrange::resize_to_fit) afterwards to move the
//! pattern to the origin and obtain the map size.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use crate::arrange::{compact, resize_to_fit};
use crate::tile::{Axis, CountKind, ISLAND_PADDING, IslandShape, LINE_PADDING, Point, TileSize};

/// Number of slots a full pattern needs so that `count` tiles fill `percent`
/// of it. Returns `None` for degenerate input.
fn full_count(count: usize, percent: u32) -> Option<usize> {
    if count == 0 || percent == 0 {
        return None;
    }
    let percent = percent.min(100) as usize;
    Some((count * 100).div_ceil(percent))
}

/// Split `count` tiles into groups (lines or islands).
///
/// Returns `(groups, per_group)`. The group count is recomputed from the
/// capacity so that no trailing group is empty.
pub fn split_count(count: usize, kind: CountKind, value: usize) -> (usize, usize) {
    if count == 0 {
        return (0, 0);
    }
    let value = value.max(1);
    let per_group = match kind {
        CountKind::Groups => count.div_ceil(value.min(count)),
        CountKind::PerGroup => value.min(count),
    };
    (count.div_ceil(per_group), per_group)
}

/// Tiles on each side of the square, in traversal order: left, top, right,
/// bottom.
pub fn square_side_counts(count: usize, percent: u32) -> [usize; 4] {
    let Some(full) = full_count(count, percent) else {
        return [0; 4];
    };
    let percent = percent.min(100);
    let sides = if percent >= 75 {
        4
    } else if percent > 25 {
        3
    } else {
        1
    };

    let mut counts = [0usize; 4];
    if sides == 1 {
        counts[0] = count;
    } else {
        counts[0] = (full / sides).min(count);
        let mut remaining = count - counts[0];
        for (side, slot) in counts.iter_mut().enumerate().take(sides).skip(1) {
            let on_side = remaining.div_ceil(sides - side);
            *slot = on_side;
            remaining -= on_side;
        }
    }

    // The first computed side is the full one; put it on top so the path
    // starts on the left.
    counts.swap(0, 1);
    counts
}

/// Place `count` tiles along the perimeter of a square holding
/// `ceil(count * 100 / percent)` tiles.
///
/// The path runs up the left side, right along the top, down the right side
/// and left along the bottom. Tiles are centred within their side and the
/// corners stay empty.
pub fn layout_square(count: usize, size: TileSize, percent: u32) -> Vec<Point> {
    let Some(full) = full_count(count, percent) else {
        return Vec::new();
    };
    let counts = square_side_counts(count, percent);
    let slots = counts
        .iter()
        .copied()
        .max()
        .unwrap_or(0)
        .max(full.div_ceil(4)) as i32;
    let (tw, th) = (size.width, size.height);

    let mut points = Vec::with_capacity(count);
    for (side, &on_side) in counts.iter().enumerate() {
        let offset = (slots - on_side as i32) / 2;
        for i in 0..on_side as i32 {
            let slot = offset + i;
            let point = match side {
                0 => Point::new(0, th + (slots - 1 - slot) * th),
                1 => Point::new(tw + slot * tw, 0),
                2 => Point::new((slots + 1) * tw, th + slot * th),
                _ => Point::new(tw + (slots - 1 - slot) * tw, (slots + 1) * th),
            };
            points.push(point);
        }
    }
    points
}

/// Radius at which `full` equally spaced tiles do not overlap, treating the
/// tile diagonal as the chord between neighbours.
pub fn circle_radius(full: usize, size: TileSize) -> f64 {
    if full < 2 {
        return 0.0;
    }
    let diagonal = (size.width as f64).hypot(size.height as f64);
    diagonal / (2.0 * (PI / full as f64).sin())
}

/// Place `count` tiles on a circle with room for
/// `ceil(count * 100 / percent)` tiles. Empty slots are split evenly between
/// both ends of the arc.
pub fn layout_circle(count: usize, size: TileSize, percent: u32) -> Vec<Point> {
    let Some(full) = full_count(count, percent) else {
        return Vec::new();
    };
    let radius = circle_radius(full, size);
    let step = TAU / full as f64;
    let offset = if full % 2 == 1 { FRAC_PI_2 } else { 0.0 };
    let start = (full - count) / 2;

    (0..count)
        .map(|i| {
            let angle = offset + (start + i) as f64 * step;
            Point::new(
                (radius * (1.0 + angle.cos())).round() as i32,
                (radius * (1.0 + angle.sin())).round() as i32,
            )
        })
        .collect()
}

/// Place tiles in lines advancing along `axis`. Line 0 is the bottom-most
/// (x axis) or right-most (y axis) line.
pub fn layout_lines(
    count: usize,
    size: TileSize,
    axis: Axis,
    kind: CountKind,
    value: usize,
) -> Vec<Point> {
    let (lines, per_line) = split_count(count, kind, value);
    if lines == 0 {
        return Vec::new();
    }

    (0..count)
        .map(|i| {
            let from_far_edge = (lines - 1 - i / per_line) as i32;
            let along = (i % per_line) as i32;
            match axis {
                Axis::X => Point::new(
                    along * size.width,
                    from_far_edge * (size.height + LINE_PADDING),
                ),
                Axis::Y => Point::new(
                    from_far_edge * (size.width + LINE_PADDING),
                    along * size.height,
                ),
            }
        })
        .collect()
}

/// Relative tile positions of one full island, normalised to the origin.
fn island_slots(per_island: usize, size: TileSize, shape: IslandShape) -> Vec<Point> {
    let mut slots = match shape {
        IslandShape::Circle => {
            let mut slots = layout_circle(per_island, size, 100);
            compact(&mut slots, size);
            slots
        }
        IslandShape::Square => (0..per_island as i32)
            .map(|u| Point::new((u % 2) * size.width, (u / 2) * size.height))
            .collect(),
    };
    resize_to_fit(&mut slots, size);
    slots
}

/// Slots used by an island with `members` tiles. A partial island keeps the
/// first `ceil(m/2)` and last `floor(m/2)` slots and drops the middle run,
/// so its members split evenly between both ends of the shape.
fn partial_slots(slots: &[Point], members: usize) -> Vec<Point> {
    if members >= slots.len() {
        return slots.to_vec();
    }
    let head = members.div_ceil(2);
    let tail = members / 2;
    slots[..head]
        .iter()
        .chain(&slots[slots.len() - tail..])
        .copied()
        .collect()
}

/// Place tiles in islands tiled left to right, wrapping to a new row when the
/// next island would cross `wrap_width`. A `wrap_width` of 0 wraps after
/// `ceil(sqrt(islands))` columns.
pub fn layout_islands(
    count: usize,
    size: TileSize,
    shape: IslandShape,
    kind: CountKind,
    value: usize,
    wrap_width: i32,
) -> Vec<Point> {
    let (islands, per_island) = split_count(count, kind, value);
    if islands == 0 || size.is_degenerate() {
        return Vec::new();
    }

    let slots = island_slots(per_island, size, shape);
    let island_width = slots.iter().map(|p| p.x).max().unwrap_or(0) + size.width;
    let island_height = slots.iter().map(|p| p.y).max().unwrap_or(0) + size.height;
    let default_columns = (islands as f64).sqrt().ceil() as usize;

    let mut points = Vec::with_capacity(count);
    let mut origin = Point::default();
    let mut column = 0usize;
    for island in 0..islands {
        let members = if island + 1 == islands {
            count - per_island * (islands - 1)
        } else {
            per_island
        };

        let overflows = if wrap_width > 0 {
            origin.x + island_width > wrap_width
        } else {
            column >= default_columns
        };
        if column > 0 && overflows {
            origin = Point::new(0, origin.y + island_height + ISLAND_PADDING);
            column = 0;
        }

        points.extend(
            partial_slots(&slots, members)
                .into_iter()
                .map(|slot| Point::new(origin.x + slot.x, origin.y + slot.y)),
        );

        origin.x += island_width + ISLAND_PADDING;
        column += 1;
    }
    points
}
