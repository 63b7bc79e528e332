//! Arrangement passes over already placed tiles.

use crate::tile::{Axis, PADDING, Point, Tile, TileSize, overlaps};

const MIN_GRID_SPAN: i64 = 256;

/// Remove empty stretches along `axis`.
///
/// Points are visited in (axis, other axis) order. Every uncovered stretch
/// between the trailing edge seen so far and the next value is added to a
/// running gap, which is subtracted from that point and every later one.
/// Slice order is preserved. Returns true if any point moved.
pub fn compact_axis(axis: Axis, tile_size: i32, points: &mut [Point]) -> bool {
    let other = axis.other();
    let mut order: Vec<usize> = (0..points.len()).collect();
    order.sort_by_key(|&i| (points[i].get(axis), points[i].get(other)));

    let mut gap = 0;
    let mut edge: Option<i32> = None;
    let mut shifted = false;
    for i in order {
        let value = points[i].get(axis);
        if let Some(edge) = edge {
            gap += (value - edge).max(0);
        }
        // Tracked on the original value; the gap is applied afterwards.
        edge = Some(edge.map_or(value + tile_size, |e| e.max(value + tile_size)));
        if gap > 0 {
            points[i].set(axis, value - gap);
            shifted = true;
        }
    }
    shifted
}

/// Compact along x then y until neither axis moves.
pub fn compact(points: &mut [Point], size: TileSize) {
    loop {
        let moved_x = compact_axis(Axis::X, size.width, points);
        let moved_y = compact_axis(Axis::Y, size.height, points);
        if !moved_x && !moved_y {
            break;
        }
    }
}

/// Availability grid of tile-sized cells anchored at the origin.
///
/// Each axis spans at most `max(4 * tiles, MIN_GRID_SPAN)` cells. Fixed tiles
/// beyond that span cannot touch a cell inside it.
struct SlotGrid {
    size: TileSize,
    cols: i32,
    rows: i32,
    free: Vec<bool>,
}

impl SlotGrid {
    fn covering(tiles: &[Tile], size: TileSize) -> Self {
        let span = (tiles.len() as i64 * 4).max(MIN_GRID_SPAN);
        let cells = |far: i64, cell: i32| {
            let cell = cell as i64;
            ((far.max(0) + cell - 1) / cell).clamp(1, span) as i32
        };
        let right = tiles.iter().map(|t| t.pos.x as i64 + size.width as i64).max().unwrap_or(0);
        let bottom = tiles.iter().map(|t| t.pos.y as i64 + size.height as i64).max().unwrap_or(0);
        let square = (tiles.len() as f64).sqrt().ceil() as i32;
        let cols = cells(right, size.width).max(square);
        let rows = cells(bottom, size.height);
        Self {
            size,
            cols,
            rows,
            free: vec![true; cols as usize * rows as usize],
        }
    }

    fn index(&self, col: i32, row: i32) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    fn origin(&self, col: i32, row: i32) -> Point {
        Point::new(
            col.saturating_mul(self.size.width),
            row.saturating_mul(self.size.height),
        )
    }

    /// Mark every cell a tile at `pos` touches as unavailable.
    fn block(&mut self, pos: Point) {
        let span = |start: i32, cell: i32, limit: i32| {
            let (start, cell) = (start as i64, cell as i64);
            let first = start.div_euclid(cell).max(0);
            let last = (start + cell - 1).div_euclid(cell).min(limit as i64 - 1);
            (first as i32, last.max(-1) as i32)
        };
        let (first_col, last_col) = span(pos.x, self.size.width, self.cols);
        let (first_row, last_row) = span(pos.y, self.size.height, self.rows);
        if first_col > last_col || first_row > last_row {
            return;
        }
        for row in first_row..=last_row {
            for col in first_col..=last_col {
                let idx = self.index(col, row);
                self.free[idx] = false;
            }
        }
    }

    /// Free cell whose origin is closest to `pos`; ties go to the first cell
    /// in row-major order.
    fn nearest_free(&self, pos: Point) -> Option<(i32, i32)> {
        let mut best: Option<((i32, i32), i64)> = None;
        for row in 0..self.rows {
            for col in 0..self.cols {
                if !self.free[self.index(col, row)] {
                    continue;
                }
                let distance = self.origin(col, row).distance_sq(pos);
                match best {
                    Some((_, best_distance)) if distance >= best_distance => {}
                    _ => best = Some(((col, row), distance)),
                }
            }
        }
        best.map(|(cell, _)| cell)
    }

    fn push_row(&mut self) {
        self.rows += 1;
        self.free.extend(std::iter::repeat_n(true, self.cols as usize));
    }
}

/// Move overlapping tiles onto the nearest free grid cell.
///
/// Tiles that overlap nobody stay put and block the cells they touch. The
/// rest are processed by (overlap count, z, y, x) and each claims the free
/// cell closest to its current position; a new row is appended when the grid
/// is full. Returns the number of tiles that moved.
pub fn separate_overlaps(tiles: &mut [Tile], size: TileSize) -> usize {
    if tiles.is_empty() || size.is_degenerate() {
        return 0;
    }

    let overlap_counts: Vec<usize> = (0..tiles.len())
        .map(|i| {
            (0..tiles.len())
                .filter(|&j| j != i && overlaps(tiles[i].pos, tiles[j].pos, size))
                .count()
        })
        .collect();

    let mut order: Vec<usize> = (0..tiles.len()).collect();
    order.sort_by_key(|&i| (overlap_counts[i], tiles[i].z, tiles[i].pos.y, tiles[i].pos.x));

    let mut grid = SlotGrid::covering(tiles, size);
    let mut moved = 0;
    for i in order {
        if overlap_counts[i] == 0 {
            grid.block(tiles[i].pos);
            continue;
        }

        let (col, row) = loop {
            match grid.nearest_free(tiles[i].pos) {
                Some(cell) => break cell,
                None => grid.push_row(),
            }
        };
        let idx = grid.index(col, row);
        grid.free[idx] = false;

        let target = grid.origin(col, row);
        if target != tiles[i].pos {
            tiles[i].pos = target;
            moved += 1;
        }
    }
    moved
}

/// Translate points so the smallest x and y become 0 and return the map size
/// (tight bounding box plus [`PADDING`]). An empty map is 0 × 0.
pub fn resize_to_fit(points: &mut [Point], size: TileSize) -> (i32, i32) {
    let (Some(min_x), Some(min_y)) = (
        points.iter().map(|p| p.x).min(),
        points.iter().map(|p| p.y).min(),
    ) else {
        return (0, 0);
    };

    let mut width = 0;
    let mut height = 0;
    for p in points.iter_mut() {
        p.x = p.x.saturating_sub(min_x);
        p.y = p.y.saturating_sub(min_y);
        width = width.max(p.x.saturating_add(size.width).saturating_add(PADDING));
        height = height.max(p.y.saturating_add(size.height).saturating_add(PADDING));
    }
    (width, height)
}

/// Quarter turn in tile-aspect space: `x' = (w/h)·y`,
/// `y' = (h/w)·(map_width - x - w)`. Applying it repeatedly gives
/// successive quarter turns.
pub fn rotate_quarter(points: &mut [Point], map_width: i32, size: TileSize) {
    if size.is_degenerate() {
        return;
    }
    let (w, h) = (size.width as f64, size.height as f64);
    for p in points.iter_mut() {
        let x = ((w / h) * p.y as f64).round() as i32;
        let y = ((h / w) * (map_width - p.x - size.width) as f64).round() as i32;
        *p = Point::new(x, y);
    }
}
