/// WorldState: the running game around the current level.
///
/// The level owns the grid, the activation network and the moving chains.
/// The world owns everything that outlives a level: the story, the level
/// factory, the player and the presentation state (phase, message, camera).
///
/// ## Camera / Viewport
///
/// World coordinates (tiles) and screen coordinates are separate:
///   - `camera` is a viewport into the world (top-left tile + size)
///   - Renderer maps: `screen(sx, sy) = world(camera.x + sx, camera.y + sy)`
///   - Camera follows the player's tile with a dead-zone approach
///   - Levels smaller than the viewport are centered

use tracing::info;

use crate::config::GameConfig;
use crate::domain::entity::InputTracker;
use crate::domain::player::{Player, PlayerTuning};
use crate::domain::tile::{TILE_HEIGHT, TILE_WIDTH};

use super::error::LevelError;
use super::factory::LevelFactory;
use super::level::Level;
use super::loader::Story;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Title,
    LevelIntro,
    Playing,
    Dying,
    LevelComplete,
    GameComplete,
}

/// Camera: a viewport into the world.
///
/// `(x, y)` is the tile at the top-left of the view.
/// `(view_w, view_h)` is how many tiles fit in the viewport.
/// These are computed from terminal size and set during `render()`.
#[derive(Clone, Debug)]
pub struct Camera {
    /// Column of the top-left visible tile (can be negative for centering)
    pub x: i32,
    /// Row of the top-left visible tile
    pub y: i32,
    pub view_w: usize,
    pub view_h: usize,
}

impl Camera {
    pub fn new() -> Self {
        Camera { x: 0, y: 0, view_w: 0, view_h: 0 }
    }

    /// Scroll only when the target leaves the inner area of the viewport.
    pub fn follow(&mut self, col: i32, row: i32, world_w: usize, world_h: usize) {
        if self.view_w == 0 || self.view_h == 0 { return; }
        self.x = follow_axis(self.x, col, self.view_w, world_w);
        self.y = follow_axis(self.y, row, self.view_h, world_h);
    }

    /// Snap directly onto a position (no dead zone). Used on load and respawn.
    pub fn center_on(&mut self, col: i32, row: i32, world_w: usize, world_h: usize) {
        if self.view_w == 0 || self.view_h == 0 { return; }
        self.x = center_axis(col, self.view_w, world_w);
        self.y = center_axis(row, self.view_h, world_h);
    }

    /// Convert a world tile to a viewport tile, or None if off screen.
    pub fn world_to_view(&self, col: i32, row: i32) -> Option<(usize, usize)> {
        let vx = col - self.x;
        let vy = row - self.y;
        if vx >= 0 && vx < self.view_w as i32 && vy >= 0 && vy < self.view_h as i32 {
            Some((vx as usize, vy as usize))
        } else {
            None
        }
    }
}

fn clamp_axis(origin: i32, view: usize, world: usize) -> i32 {
    origin.max(0).min((world as i32 - view as i32).max(0))
}

fn follow_axis(origin: i32, target: i32, view: usize, world: usize) -> i32 {
    if world <= view {
        return -((view as i32 - world as i32) / 2);
    }
    // 20% margin on each side
    let margin = view as i32 / 5;
    let low = origin + margin;
    let high = origin + view as i32 - margin - 1;
    let origin = if target < low {
        target - margin
    } else if target > high {
        target - view as i32 + margin + 1
    } else {
        origin
    };
    clamp_axis(origin, view, world)
}

fn center_axis(target: i32, view: usize, world: usize) -> i32 {
    if world <= view {
        return -((view as i32 - world as i32) / 2);
    }
    clamp_axis(target - view as i32 / 2, view, world)
}

pub struct WorldState {
    // ── Level ──
    pub level: Option<Level>,
    pub story: Story,
    factory: LevelFactory,

    // ── Player ──
    pub player: Player,
    pub tracker: InputTracker,
    pub tuning: PlayerTuning,
    /// Simulated seconds per tick.
    pub elapsed: f32,

    // ── Meta ──
    pub phase: Phase,
    pub current_level: usize,
    /// Where the exit just taken leads.
    pub next_level: Option<usize>,
    pub deaths: u32,
    pub tick: u64,
    pub anim_tick: u32,

    // ── UI ──
    pub message: String,
    pub message_timer: u32,
    pub paused: bool,
    pub camera: Camera,
}

impl WorldState {
    pub fn new(story: Story, config: &GameConfig) -> Self {
        WorldState {
            level: None,
            story,
            factory: LevelFactory::new(&config.tuning),
            player: Player::spawn_at(0, 0),
            tracker: InputTracker::new(),
            tuning: config.tuning.player(),
            elapsed: config.timing.elapsed_s(),
            phase: Phase::Title,
            current_level: 0,
            next_level: None,
            deaths: 0,
            tick: 0,
            anim_tick: 0,
            message: String::new(),
            message_timer: 0,
            paused: false,
            camera: Camera::new(),
        }
    }

    pub fn set_message(&mut self, msg: &str, duration: u32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }

    pub fn level_name(&self) -> &str {
        self.level.as_ref().map_or("", |l| l.name.as_str())
    }

    /// Build story level `index` and start its intro.
    pub fn load_level(&mut self, index: usize) -> Result<(), LevelError> {
        let desc = self.story.description(index)?;
        let level = self.factory.create_level(&desc)?;
        info!(index, name = %level.name, "level loaded");

        let title = format!("{}. {}", index + 1, level.name);
        self.level = Some(level);
        self.current_level = index;
        self.next_level = None;
        self.phase = Phase::LevelIntro;
        self.anim_tick = 0;
        self.place_player();
        self.set_message(&title, 50);
        Ok(())
    }

    /// Put a fresh player at the active spawner and snap the camera to it.
    pub fn place_player(&mut self) {
        let Some(level) = &self.level else { return };
        let (col, row) = level.spawn_cell().unwrap_or((0, 0));
        let (w, h) = (level.grid.width(), level.grid.height());
        self.player = Player::spawn_at(col, row);
        self.tracker.reset();
        self.camera.center_on(col, row, w, h);
    }

    /// Tile under the player's center.
    pub fn player_cell(&self) -> (i32, i32) {
        let c = self.player.rect().center();
        ((c.x / TILE_WIDTH).floor() as i32, (c.y / TILE_HEIGHT).floor() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera(w: usize, h: usize) -> Camera {
        Camera { x: 0, y: 0, view_w: w, view_h: h }
    }

    #[test]
    fn small_worlds_are_centered() {
        let mut cam = camera(20, 10);
        cam.follow(3, 3, 16, 8);
        assert_eq!((cam.x, cam.y), (-2, -1));
    }

    #[test]
    fn dead_zone_scrolls_only_near_the_edge() {
        let mut cam = camera(10, 10);
        cam.follow(5, 0, 40, 10);
        assert_eq!(cam.x, 0);
        cam.follow(8, 0, 40, 10);
        assert_eq!(cam.x, 1);
        cam.follow(39, 0, 40, 10);
        assert_eq!(cam.x, 30);
    }

    #[test]
    fn center_on_clamps_to_the_world() {
        let mut cam = camera(10, 10);
        cam.center_on(1, 1, 40, 40);
        assert_eq!((cam.x, cam.y), (0, 0));
        cam.center_on(20, 20, 40, 40);
        assert_eq!((cam.x, cam.y), (15, 15));
        assert_eq!(cam.world_to_view(15, 24), Some((0, 9)));
        assert_eq!(cam.world_to_view(14, 20), None);
    }

    #[test]
    fn loading_a_level_places_the_player_on_the_spawner() {
        let mut world = WorldState::new(Story::embedded(), &GameConfig::default());
        world.load_level(0).unwrap();
        assert_eq!(world.phase, Phase::LevelIntro);
        assert_eq!(world.level_name(), "First Light");
        let spawn = world.level.as_ref().and_then(Level::spawn_cell).unwrap();
        assert_eq!(world.player_cell(), spawn);
        assert!(world.message.starts_with("1. "));
    }

    #[test]
    fn unknown_level_is_an_error() {
        let mut world = WorldState::new(Story::embedded(), &GameConfig::default());
        let err = world.load_level(99).unwrap_err();
        assert!(matches!(err, LevelError::UnknownLevel { index: 99 }));
        assert!(world.level.is_none());
    }
}
