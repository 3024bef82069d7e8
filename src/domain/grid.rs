/// The tile grid and its bounds-safe collision query surface.
///
/// Out-of-bounds policy:
///   - columns outside `[0, width)` read as `Impassable` (level side walls)
///   - rows outside `[0, height)` read as `Passable` (open sky, open pit)
///
/// The column rule wins at the corners. Queries never fail.

use super::geometry::{Rect, Vec2};
use super::tile::{Tile, TileCollision, TILE_HEIGHT, TILE_WIDTH};

#[derive(Clone, Debug)]
pub struct TileGrid {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn new(width: usize, height: usize) -> Self {
        TileGrid { width, height, tiles: vec![Tile::passable(); width * height] }
    }

    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }

    pub fn pixel_width(&self) -> f32 { self.width as f32 * TILE_WIDTH }
    pub fn pixel_height(&self) -> f32 { self.height as f32 * TILE_HEIGHT }

    pub fn is_tile_in_bounds(&self, col: i32, row: i32) -> bool {
        col >= 0 && row >= 0 && (col as usize) < self.width && (row as usize) < self.height
    }

    fn index(&self, col: i32, row: i32) -> Option<usize> {
        if self.is_tile_in_bounds(col, row) {
            Some(row as usize * self.width + col as usize)
        } else {
            None
        }
    }

    pub fn get_collision(&self, col: i32, row: i32) -> TileCollision {
        self.tile(col, row).collision
    }

    /// Stored tile, or a synthetic boundary tile outside the grid.
    pub fn tile(&self, col: i32, row: i32) -> Tile {
        if col < 0 || col as usize >= self.width {
            return Tile::impassable();
        }
        match self.index(col, row) {
            Some(i) => self.tiles[i],
            None => Tile::passable(),
        }
    }

    pub fn tile_mut(&mut self, col: i32, row: i32) -> Option<&mut Tile> {
        let i = self.index(col, row)?;
        Some(&mut self.tiles[i])
    }

    pub fn set_tile(&mut self, col: i32, row: i32, tile: Tile) {
        if let Some(t) = self.tile_mut(col, row) {
            *t = tile;
        }
    }

    /// World-space rectangle covered by a cell (valid for any cell).
    pub fn bounds(&self, col: i32, row: i32) -> Rect {
        Rect::new(col as f32 * TILE_WIDTH, row as f32 * TILE_HEIGHT, TILE_WIDTH, TILE_HEIGHT)
    }

    /// Cell containing a world position.
    pub fn grid_position(&self, x: f32, y: f32) -> (i32, i32) {
        ((x / TILE_WIDTH).floor() as i32, (y / TILE_HEIGHT).floor() as i32)
    }

    pub fn cell_origin(col: i32, row: i32) -> Vec2 {
        Vec2::new(col as f32 * TILE_WIDTH, row as f32 * TILE_HEIGHT)
    }

    /// Iterate `(col, row, tile)` in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32, &Tile)> {
        let w = self.width;
        self.tiles.iter().enumerate().map(move |(i, t)| ((i % w) as i32, (i / w) as i32, t))
    }
}

/// Build a grid from ASCII rows. Test fixture shorthand:
/// `.` empty, `#` solid, `-` platform, `L` ladder, `~` water, `^` spikes,
/// `W` water source, `E` water drain.
#[cfg(test)]
pub fn grid_from(rows: &[&str]) -> TileGrid {
    use super::tile::{Fixture, Sprite};

    let height = rows.len();
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut grid = TileGrid::new(width, height);
    for (y, row) in rows.iter().enumerate() {
        for (x, ch) in row.chars().enumerate() {
            let tile = match ch {
                '#' => Tile::new(Some(Sprite::BlockA(0)), TileCollision::Impassable),
                '-' => Tile::new(Some(Sprite::BlockB(0)), TileCollision::Platform),
                'L' => Tile::new(Some(Sprite::Ladder), TileCollision::Ladder),
                '^' => Tile::new(Some(Sprite::Spikes), TileCollision::Death),
                '~' => {
                    let mut t = Tile::passable();
                    t.flood();
                    t
                }
                'W' => Tile::fixture(Fixture::WaterSource),
                'E' => Tile::fixture(Fixture::WaterDrain),
                _ => Tile::passable(),
            };
            grid.set_tile(x as i32, y as i32, tile);
        }
    }
    grid
}
