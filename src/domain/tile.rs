/// Tile types and their collision properties.
/// Properties are queried via methods, not stored as flags,
/// so collision semantics are centralized here.

/// Size of one grid cell in world pixels.
pub const TILE_WIDTH: f32 = 40.0;
pub const TILE_HEIGHT: f32 = 32.0;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TileCollision {
    #[default]
    Passable,
    Impassable, // Blocks from every side
    Platform,   // One-way: only blocks from above
    Ladder,     // Climbable, stands on top
    Water,      // Slows, floods
    Death,      // Kills on contact
}

impl TileCollision {
    /// Can an entity stand on top of this collision type?
    pub fn is_ground(self) -> bool {
        matches!(self, TileCollision::Impassable | TileCollision::Platform | TileCollision::Ladder)
    }

    /// Does this collision type stop horizontal and upward motion?
    pub fn is_solid(self) -> bool {
        matches!(self, TileCollision::Impassable)
    }

    /// Does a moving chain bounce off this collision type?
    pub fn stops_chain(self) -> bool {
        matches!(self, TileCollision::Impassable | TileCollision::Platform)
    }
}

/// Visual handle. The renderer decides how each one looks.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Sprite {
    BlockA(u8),   // solid block, one of several variants
    BlockB(u8),   // ledge / backdrop, one of several variants
    Ladder,
    Spikes,
    Water,
}

/// Tiles that host a water fixture. Fill and drain pass over them
/// without converting them.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Fixture {
    WaterSource,
    WaterDrain,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Tile {
    pub visual: Option<Sprite>,
    pub collision: TileCollision,
    pub flooded: bool,
    pub fixture: Option<Fixture>,
}

impl Tile {
    pub const fn new(visual: Option<Sprite>, collision: TileCollision) -> Self {
        Tile { visual, collision, flooded: false, fixture: None }
    }

    pub const fn passable() -> Self {
        Tile::new(None, TileCollision::Passable)
    }

    pub const fn impassable() -> Self {
        Tile::new(None, TileCollision::Impassable)
    }

    pub fn fixture(kind: Fixture) -> Self {
        let collision = match kind {
            Fixture::WaterSource => TileCollision::Water,
            Fixture::WaterDrain => TileCollision::Passable,
        };
        Tile { visual: None, collision, flooded: kind == Fixture::WaterSource, fixture: Some(kind) }
    }

    pub fn is_fixture(&self) -> bool {
        self.fixture.is_some()
    }

    /// Turn a plain passable tile into water.
    pub fn flood(&mut self) {
        self.collision = TileCollision::Water;
        self.visual = Some(Sprite::Water);
        self.flooded = true;
    }

    /// Turn a water tile back into empty space.
    pub fn dry(&mut self) {
        self.collision = TileCollision::Passable;
        self.visual = None;
        self.flooded = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_types() {
        assert!(TileCollision::Impassable.is_ground());
        assert!(TileCollision::Platform.is_ground());
        assert!(TileCollision::Ladder.is_ground());
        assert!(!TileCollision::Water.is_ground());
        assert!(!TileCollision::Death.is_ground());
        assert!(!TileCollision::Passable.is_ground());
    }

    #[test]
    fn flood_then_dry_restores_empty() {
        let mut t = Tile::passable();
        t.flood();
        assert_eq!(t.collision, TileCollision::Water);
        assert!(t.flooded);
        t.dry();
        assert_eq!(t, Tile::passable());
    }

    #[test]
    fn source_fixture_starts_flooded() {
        let src = Tile::fixture(Fixture::WaterSource);
        assert_eq!(src.collision, TileCollision::Water);
        assert!(src.flooded);
        let drain = Tile::fixture(Fixture::WaterDrain);
        assert_eq!(drain.collision, TileCollision::Passable);
        assert!(drain.is_fixture());
    }
}
