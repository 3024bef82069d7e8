/// Water sources and drains: cascading flood and drain over the tile grid.
///
/// A source seeds `initial_level` rows on its first update, then raises the
/// surface by one row each time it is triggered. A drain lowers the surface
/// above it by one row per trigger. New water spreads breadth-first: straight
/// down into empty cells, then sideways along each row.
///
/// Every converted tile goes from Passable to Water exactly once per pass, so
/// propagation always terminates.

use std::collections::VecDeque;

use tracing::debug;

use super::grid::TileGrid;
use super::tile::TileCollision;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Scan {
    Left,
    Right,
}

impl Scan {
    fn step(self) -> i32 {
        match self {
            Scan::Left => -1,
            Scan::Right => 1,
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Source
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct WaterSource {
    pub col: i32,
    pub row: i32,
    /// Rows to seed on the first fill. Consumed once.
    initial_level: Option<u32>,
    fill: bool,
}

impl WaterSource {
    pub fn new(col: i32, row: i32, initial_level: u32) -> Self {
        WaterSource { col, row, initial_level: Some(initial_level), fill: true }
    }

    /// Schedule one rise for the next update.
    pub fn increase_water_level(&mut self) {
        self.fill = true;
    }

    pub fn is_pending(&self) -> bool {
        self.fill
    }

    /// Run a scheduled fill. Returns the number of tiles flooded.
    pub fn update(&mut self, grid: &mut TileGrid) -> usize {
        if !self.fill {
            return 0;
        }
        self.fill = false;

        let mut fresh = Vec::new();
        match self.initial_level.take() {
            Some(level) => {
                for dy in 0..level as i32 {
                    let row = self.row - dy;
                    fresh.extend(fill_row(grid, self.col, row, Scan::Left));
                    fresh.extend(fill_row(grid, self.col + 1, row, Scan::Right));
                }
            }
            None => {
                let row = surface_above(grid, self.col, self.row);
                fresh.extend(fill_row(grid, self.col, row, Scan::Left));
                fresh.extend(fill_row(grid, self.col + 1, row, Scan::Right));
            }
        }

        let seeded = fresh.len();
        let spread = propagate(grid, fresh);
        debug!(col = self.col, row = self.row, seeded, spread, "water source filled");
        seeded + spread
    }
}

/// First non-water row scanning upward from `row` (the row that would fill next).
fn surface_above(grid: &TileGrid, col: i32, row: i32) -> i32 {
    let mut r = row;
    while r >= 0 && (grid.get_collision(col, r) == TileCollision::Water || grid.tile(col, r).is_fixture()) {
        r -= 1;
    }
    r
}

/// Flood contiguous empty tiles along a row starting at `col`.
/// Fixture tiles are passed over untouched. Returns the newly flooded cells.
fn fill_row(grid: &mut TileGrid, col: i32, row: i32, dir: Scan) -> Vec<(i32, i32)> {
    let mut flooded = Vec::new();
    let mut c = col;
    while grid.is_tile_in_bounds(c, row) {
        let Some(tile) = grid.tile_mut(c, row) else { break };
        if tile.is_fixture() {
            c += dir.step();
            continue;
        }
        if tile.collision != TileCollision::Passable {
            break;
        }
        tile.flood();
        flooded.push((c, row));
        c += dir.step();
    }
    flooded
}

/// Breadth-first spread of newly flooded tiles. Returns how many more tiles
/// were converted.
pub fn propagate(grid: &mut TileGrid, seeds: Vec<(i32, i32)>) -> usize {
    let mut queue: VecDeque<(i32, i32)> = seeds.into();
    let mut converted = 0;

    while let Some((col, row)) = queue.pop_front() {
        let below = row + 1;
        if grid.is_tile_in_bounds(col, below) {
            if let Some(tile) = grid.tile_mut(col, below) {
                if tile.collision == TileCollision::Passable && !tile.is_fixture() {
                    tile.flood();
                    converted += 1;
                    queue.push_back((col, below));
                }
            }
        }
        for cell in fill_row(grid, col - 1, row, Scan::Left)
            .into_iter()
            .chain(fill_row(grid, col + 1, row, Scan::Right))
        {
            converted += 1;
            queue.push_back(cell);
        }
    }
    converted
}

// ══════════════════════════════════════════════════════════════
// Drain
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug)]
pub struct WaterDrain {
    pub col: i32,
    pub row: i32,
    drain: bool,
}

impl WaterDrain {
    pub fn new(col: i32, row: i32) -> Self {
        WaterDrain { col, row, drain: false }
    }

    /// Schedule one drop for the next update.
    pub fn decrease_water_level(&mut self) {
        self.drain = true;
    }

    pub fn is_pending(&self) -> bool {
        self.drain
    }

    /// Run a scheduled drain. Returns the number of tiles emptied.
    pub fn update(&mut self, grid: &mut TileGrid) -> usize {
        if !self.drain {
            return 0;
        }
        self.drain = false;

        let mut surface = self.row;
        while grid.get_collision(self.col, surface - 1) == TileCollision::Water
            && grid.is_tile_in_bounds(self.col, surface - 1)
        {
            surface -= 1;
        }

        let emptied = drain_row(grid, self.col, surface, Scan::Left)
            + drain_row(grid, self.col + 1, surface, Scan::Right);
        debug!(col = self.col, row = surface, emptied, "water drain lowered surface");
        emptied
    }
}

/// Dry contiguous water along a row. Fixtures are skipped, never erased.
fn drain_row(grid: &mut TileGrid, col: i32, row: i32, dir: Scan) -> usize {
    let mut emptied = 0;
    let mut c = col;
    while grid.is_tile_in_bounds(c, row) {
        let Some(tile) = grid.tile_mut(c, row) else { break };
        if tile.is_fixture() {
            c += dir.step();
            continue;
        }
        if tile.collision != TileCollision::Water {
            break;
        }
        tile.dry();
        emptied += 1;
        c += dir.step();
    }
    emptied
}
