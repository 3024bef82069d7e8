/// Player physics and animation state machine.
///
/// ## Motion
///
///   Standing ──Left/Right──► Running(dir) ──release──► Standing
///      │ Up (grounded)            │ Up (grounded)
///      ▼                          ▼
///   Jumping ◄──── walked off a ledge / head bump
///      │ jump_count >= 10 and ground below
///      ▼
///   Standing / Running
///
/// Ladders switch to `Climbing`. Death tiles and falling off the bottom of
/// the grid switch to `Dead`; the simulation respawns from there.
///
/// ## Jump arc
///
/// Vertical position is a function of the tick counter, not an integrated
/// velocity: a parabola for `jump_count < 20`, then a straight line at the
/// parabola's final slope (20 px/tick). Walking off a ledge enters the same
/// curve just past its apex.
///
/// ## Collision
///
/// The player only reads the grid through its query surface, plus the
/// rectangles of moving chain members (`Body`), which can be stood on and
/// carry whoever rides them.

use super::entity::{Facing, FrameInput, Key};
use super::geometry::{Rect, Vec2};
use super::grid::TileGrid;
use super::tile::{TileCollision, TILE_HEIGHT, TILE_WIDTH};

pub const PLAYER_WIDTH: f32 = 28.0;
pub const PLAYER_HEIGHT: f32 = 48.0;
/// Ticks each animation frame is held.
pub const FRAME_DELAY: u32 = 4;

const AIR_CONTROL: f32 = 0.2;
const RUN_ACCEL: f32 = 1.0;
const STOP_DECEL: f32 = 2.0;
/// Below this the standing-jump row is used.
const SLOW_SPEED: f32 = 4.0;
const APEX: i32 = 10;
const ARC_END: i32 = 20;
const TERMINAL_VELOCITY: f32 = 20.0;
const EPS: f32 = 0.01;

/// Height of the jump arc at tick `jump_count`.
pub fn jump_y(start_y: f32, jump_count: i32) -> f32 {
    if jump_count < ARC_END {
        let t = (jump_count - APEX) as f32;
        t * t - 100.0 + start_y
    } else {
        start_y + TERMINAL_VELOCITY * (jump_count - ARC_END) as f32
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct PlayerTuning {
    pub max_speed: f32,
    pub climb_speed: f32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        PlayerTuning { max_speed: 8.0, climb_speed: 4.0 }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Motion {
    Standing,
    Running(Facing),
    Jumping,
    Climbing,
    Dead,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AnimRow {
    Idle,
    Run,
    StandingJump,
    RunningJump,
    Climb,
    Dead,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Animation {
    pub row: AnimRow,
    pub frame: u32,
}

/// A moving chain member as the player sees it.
#[derive(Clone, Copy, Debug)]
pub struct Body {
    pub rect: Rect,
    pub collision: TileCollision,
    /// How far the body moved this tick.
    pub carry: Vec2,
}

/// Everything the player collides with this tick.
pub struct Surroundings<'a> {
    pub grid: &'a TileGrid,
    pub bodies: &'a [Body],
}

#[derive(Clone, Copy, Debug)]
struct Support {
    top: f32,
    body: Option<usize>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub jumped: bool,
    pub landed: bool,
    pub splashed: bool,
    pub died: bool,
}

#[derive(Clone, Debug)]
pub struct Player {
    /// Top-left corner in pixels.
    pub position: Vec2,
    pub speed: f32,
    pub facing: Facing,
    pub motion: Motion,
    pub jump_count: i32,
    pub start_y: f32,
    pub frame_count: u32,
    pub animation: Animation,
    pub in_water: bool,
    /// Body index stood on last tick.
    pub riding: Option<usize>,
    climb: Vec2,
}

impl Player {
    /// Stand on the floor of cell (col, row), centered.
    pub fn spawn_at(col: i32, row: i32) -> Self {
        let origin = TileGrid::cell_origin(col, row);
        let position = Vec2::new(
            origin.x + (TILE_WIDTH - PLAYER_WIDTH) / 2.0,
            origin.y + TILE_HEIGHT - PLAYER_HEIGHT,
        );
        Player {
            position,
            speed: 0.0,
            facing: Facing::Right,
            motion: Motion::Standing,
            jump_count: 0,
            start_y: position.y,
            frame_count: 0,
            animation: Animation { row: AnimRow::Idle, frame: 0 },
            in_water: false,
            riding: None,
            climb: Vec2::ZERO,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::at(self.position, PLAYER_WIDTH, PLAYER_HEIGHT)
    }

    pub fn is_alive(&self) -> bool {
        self.motion != Motion::Dead
    }

    pub fn kill(&mut self) {
        self.motion = Motion::Dead;
        self.speed = 0.0;
        self.set_row(AnimRow::Dead);
    }

    /// Ticks spent dead, for the respawn delay.
    pub fn dead_ticks(&self) -> u32 {
        if self.is_alive() { 0 } else { self.frame_count }
    }

    // ══════════════════════════════════════════════════════════
    // Tick
    // ══════════════════════════════════════════════════════════

    pub fn update(&mut self, input: &FrameInput, env: &Surroundings, tuning: &PlayerTuning) -> StepReport {
        let mut report = StepReport::default();
        if !self.is_alive() {
            self.animate(env.grid, self.jump_count);
            return report;
        }

        if let Some(body) = self.riding.take().and_then(|i| env.bodies.get(i)) {
            self.position += body.carry;
        }

        let was_in_water = self.in_water;
        self.in_water = self.center_collision(env.grid) == TileCollision::Water;
        report.splashed = self.in_water && !was_in_water;

        self.read_input(input, env.grid, tuning, &mut report);

        let prev_bottom = self.rect().bottom();
        let arc_count = (self.motion == Motion::Jumping).then_some(self.jump_count);
        let mut step = self.integrate(tuning);
        if self.in_water {
            let full_dy = step.y;
            step = step * 0.5;
            if self.motion == Motion::Jumping {
                self.start_y += step.y - full_dy;
            }
        }

        self.position.x += step.x;
        self.resolve_horizontal(env, step.x);

        self.position.y += step.y;
        if step.y < 0.0 {
            if let Some(ceiling) = self.ceiling(env) {
                self.position.y = ceiling;
                if self.motion == Motion::Jumping {
                    self.begin_fall();
                }
            }
        }

        self.settle_vertical(input, env, prev_bottom, step.y, &mut report);

        if self.touches_death(env.grid) || self.position.y > env.grid.pixel_height() {
            self.kill();
            report.died = true;
        }

        // Frames follow the arc position this tick used, unless the jump was reset.
        let jump_band = match arc_count {
            Some(n) if self.jump_count == n + 1 => n,
            _ => self.jump_count,
        };
        self.animate(env.grid, jump_band);
        report
    }

    fn read_input(&mut self, input: &FrameInput, grid: &TileGrid, tuning: &PlayerTuning, report: &mut StepReport) {
        let left = input.is_down(Key::Left);
        let right = input.is_down(Key::Right);
        if right {
            self.facing = Facing::Right;
        } else if left {
            self.facing = Facing::Left;
        }

        match self.motion {
            Motion::Jumping => {
                if right {
                    self.speed += AIR_CONTROL;
                }
                if left {
                    self.speed -= AIR_CONTROL;
                }
                self.speed = self.speed.clamp(-tuning.max_speed, tuning.max_speed);
                if self.in_water && input.is_new_press(Key::Up) {
                    self.start_jump();
                    report.jumped = true;
                }
            }
            Motion::Climbing => {
                self.speed = 0.0;
                let dx = if right { 1.0 } else if left { -1.0 } else { 0.0 };
                let dy = if input.is_down(Key::Up) {
                    -1.0
                } else if input.is_down(Key::Down) {
                    1.0
                } else {
                    0.0
                };
                self.climb = Vec2::new(dx, dy) * tuning.climb_speed;
            }
            Motion::Standing | Motion::Running(_) => {
                if right || left {
                    self.motion = Motion::Running(self.facing);
                } else {
                    self.motion = Motion::Standing;
                }
                if input.is_down(Key::Up) {
                    if self.ladder_in_body(grid) {
                        self.start_climb();
                    } else {
                        self.start_jump();
                        report.jumped = true;
                    }
                } else if input.is_down(Key::Down) && (self.ladder_in_body(grid) || self.ladder_below(grid)) {
                    self.start_climb();
                }
            }
            Motion::Dead => {}
        }
    }

    /// Displacement for this tick before collision.
    fn integrate(&mut self, tuning: &PlayerTuning) -> Vec2 {
        match self.motion {
            Motion::Standing => {
                self.speed = slow_down(self.speed, STOP_DECEL);
                Vec2::new(self.speed, 0.0)
            }
            Motion::Running(dir) => {
                self.speed = (self.speed + dir.sign() * RUN_ACCEL).clamp(-tuning.max_speed, tuning.max_speed);
                Vec2::new(self.speed, 0.0)
            }
            Motion::Jumping => {
                let y = jump_y(self.start_y, self.jump_count);
                self.jump_count += 1;
                Vec2::new(self.speed, y - self.position.y)
            }
            Motion::Climbing => self.climb,
            Motion::Dead => Vec2::ZERO,
        }
    }

    fn start_jump(&mut self) {
        self.motion = Motion::Jumping;
        self.start_y = self.position.y;
        self.jump_count = 0;
    }

    /// Join the jump arc just past its apex, without upward motion.
    fn begin_fall(&mut self) {
        self.motion = Motion::Jumping;
        self.start_y = self.position.y + 99.0;
        self.jump_count = APEX + 1;
    }

    fn start_climb(&mut self) {
        self.motion = Motion::Climbing;
        self.speed = 0.0;
        self.climb = Vec2::ZERO;
        self.jump_count = 0;
    }

    fn rest_on(&mut self, support: Support) {
        self.position.y = support.top - PLAYER_HEIGHT;
        self.riding = support.body;
    }

    fn land(&mut self, support: Support, input: &FrameInput, report: &mut StepReport) {
        self.rest_on(support);
        self.jump_count = 0;
        self.motion = if input.is_down(Key::Left) || input.is_down(Key::Right) {
            Motion::Running(self.facing)
        } else {
            Motion::Standing
        };
        report.landed = true;
    }

    fn settle_vertical(
        &mut self,
        input: &FrameInput,
        env: &Surroundings,
        prev_bottom: f32,
        dy: f32,
        report: &mut StepReport,
    ) {
        match self.motion {
            Motion::Jumping => {
                if self.jump_count >= APEX {
                    if let Some(support) = self.ground_contact(env, prev_bottom, false) {
                        self.land(support, input, report);
                    }
                }
            }
            Motion::Standing | Motion::Running(_) => match self.ground_contact(env, prev_bottom, false) {
                Some(support) => self.rest_on(support),
                None => self.begin_fall(),
            },
            Motion::Climbing => {
                let on_ladder = self.ladder_in_body(env.grid) || self.ladder_below(env.grid);
                if dy > 0.0 || !on_ladder {
                    if let Some(support) = self.ground_contact(env, prev_bottom, true) {
                        self.land(support, input, report);
                        return;
                    }
                }
                if !on_ladder {
                    self.begin_fall();
                }
            }
            Motion::Dead => {}
        }
    }

    // ══════════════════════════════════════════════════════════
    // Collision queries
    // ══════════════════════════════════════════════════════════

    /// Surface the feet rest on, if any. The cell under the
    /// horizontal center is probed, plus any body under it. One-way: the
    /// feet must have been at or above the surface last tick. Only the top
    /// rung of a ladder column can be stood on.
    fn ground_contact(&self, env: &Surroundings, prev_bottom: f32, skip_ladders: bool) -> Option<Support> {
        let r = self.rect();
        let cx = r.center().x;
        let (col, row) = env.grid.grid_position(cx, r.bottom());
        let mut best: Option<Support> = None;

        let collision = env.grid.get_collision(col, row);
        let top = row as f32 * TILE_HEIGHT;
        let ladder = collision == TileCollision::Ladder;
        let inner_rung = ladder && env.grid.get_collision(col, row - 1) == TileCollision::Ladder;
        if collision.is_ground()
            && !(skip_ladders && ladder)
            && !inner_rung
            && prev_bottom <= top + EPS
        {
            best = Some(Support { top, body: None });
        }

        for (i, b) in env.bodies.iter().enumerate() {
            if !b.collision.is_ground() || cx < b.rect.left() || cx >= b.rect.right() {
                continue;
            }
            let tol = 0.5 + b.carry.y.abs();
            let top = b.rect.top();
            if prev_bottom <= top + tol && r.bottom() >= top - tol && best.map_or(true, |s| top < s.top) {
                best = Some(Support { top, body: Some(i) });
            }
        }

        best
    }

    fn resolve_horizontal(&mut self, env: &Surroundings, dx: f32) {
        if dx == 0.0 {
            return;
        }
        let r = self.rect();
        let edge = if dx > 0.0 { r.right() - EPS } else { r.left() };
        let col = (edge / TILE_WIDTH).floor() as i32;
        let top_row = (r.top() / TILE_HEIGHT).floor() as i32;
        let bottom_row = ((r.bottom() - EPS) / TILE_HEIGHT).floor() as i32;

        let blocked = (top_row..=bottom_row).any(|row| env.grid.get_collision(col, row).is_solid());
        if blocked {
            self.position.x = if dx > 0.0 {
                col as f32 * TILE_WIDTH - PLAYER_WIDTH
            } else {
                (col + 1) as f32 * TILE_WIDTH
            };
            self.speed = 0.0;
        }

        let r = self.rect();
        for b in env.bodies.iter().filter(|b| b.collision.is_solid()) {
            if r.intersects(&b.rect) {
                self.position.x = if dx > 0.0 { b.rect.left() - PLAYER_WIDTH } else { b.rect.right() };
                self.speed = 0.0;
            }
        }
    }

    /// Bottom of whatever solid the head moved into.
    fn ceiling(&self, env: &Surroundings) -> Option<f32> {
        let r = self.rect();
        let row = (r.top() / TILE_HEIGHT).floor() as i32;
        let first = (r.left() / TILE_WIDTH).floor() as i32;
        let last = ((r.right() - EPS) / TILE_WIDTH).floor() as i32;
        if (first..=last).any(|col| env.grid.get_collision(col, row).is_solid()) {
            return Some((row + 1) as f32 * TILE_HEIGHT);
        }
        env.bodies
            .iter()
            .filter(|b| b.collision.is_solid() && r.intersects(&b.rect))
            .map(|b| b.rect.bottom())
            .reduce(f32::max)
    }

    fn center_collision(&self, grid: &TileGrid) -> TileCollision {
        let c = self.rect().center();
        let (col, row) = grid.grid_position(c.x, c.y);
        grid.get_collision(col, row)
    }

    fn ladder_in_body(&self, grid: &TileGrid) -> bool {
        let r = self.rect();
        let cx = r.center().x;
        [r.center().y, r.bottom() - EPS].iter().any(|&y| {
            let (col, row) = grid.grid_position(cx, y);
            grid.get_collision(col, row) == TileCollision::Ladder
        })
    }

    fn ladder_below(&self, grid: &TileGrid) -> bool {
        let r = self.rect();
        let (col, row) = grid.grid_position(r.center().x, r.bottom());
        grid.get_collision(col, row) == TileCollision::Ladder
    }

    fn touches_death(&self, grid: &TileGrid) -> bool {
        let r = self.rect();
        let first = (r.left() / TILE_WIDTH).floor() as i32;
        let last = ((r.right() - EPS) / TILE_WIDTH).floor() as i32;
        let top = (r.top() / TILE_HEIGHT).floor() as i32;
        let bottom = ((r.bottom() - EPS) / TILE_HEIGHT).floor() as i32;
        (top..=bottom).any(|row| (first..=last).any(|col| grid.get_collision(col, row) == TileCollision::Death))
    }

    /// Any ground within two rows under the feet.
    fn ground_near(&self, grid: &TileGrid) -> bool {
        let r = self.rect();
        let (col, row) = grid.grid_position(r.center().x, r.bottom());
        (row..=row + 1).any(|row| grid.get_collision(col, row).is_ground())
    }

    // ══════════════════════════════════════════════════════════
    // Animation
    // ══════════════════════════════════════════════════════════

    fn set_row(&mut self, row: AnimRow) {
        if self.animation.row != row {
            self.animation = Animation { row, frame: 0 };
            self.frame_count = 0;
        }
    }

    fn animate(&mut self, grid: &TileGrid, jump_band: i32) {
        match self.motion {
            Motion::Standing => self.loop_row(AnimRow::Idle, 4),
            Motion::Running(_) => self.loop_row(AnimRow::Run, 8),
            Motion::Climbing => {
                self.set_row(AnimRow::Climb);
                if self.climb != Vec2::ZERO {
                    self.frame_count += 1;
                }
                self.animation.frame = (self.frame_count / FRAME_DELAY) % 4;
            }
            Motion::Dead => {
                self.set_row(AnimRow::Dead);
                self.frame_count += 1;
                self.animation.frame = (self.frame_count / FRAME_DELAY).min(5);
            }
            Motion::Jumping if self.speed.abs() < SLOW_SPEED => {
                self.set_row(AnimRow::StandingJump);
                self.frame_count += 1;
                let jc = jump_band;
                let mut frame = self.frame_count / FRAME_DELAY;
                if jc < 2 {
                    frame %= 9;
                } else if jc <= 10 {
                    if frame > 3 {
                        self.frame_count = 2 * FRAME_DELAY;
                        frame = 2;
                    }
                } else if jc <= 18 {
                    if frame > 5 {
                        self.frame_count = 4 * FRAME_DELAY;
                        frame = 4;
                    }
                } else if self.ground_near(grid) {
                    frame %= 9;
                } else {
                    self.frame_count = 4 * FRAME_DELAY;
                    frame = 4;
                }
                self.animation.frame = frame;
            }
            Motion::Jumping => {
                self.set_row(AnimRow::RunningJump);
                self.frame_count += 1;
                let frame = if jump_band <= APEX {
                    (self.frame_count / FRAME_DELAY) / 2
                } else {
                    self.frame_count / FRAME_DELAY
                };
                self.animation.frame = frame % 8;
            }
        }
    }

    fn loop_row(&mut self, row: AnimRow, frames: u32) {
        self.set_row(row);
        self.frame_count += 1;
        self.animation.frame = (self.frame_count / FRAME_DELAY) % frames;
    }
}

fn slow_down(speed: f32, by: f32) -> f32 {
    if speed > by {
        speed - by
    } else if speed < -by {
        speed + by
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{InputTracker, KeySet};
    use crate::domain::grid::grid_from;

    const FLOOR_Y: f32 = 7.0 * TILE_HEIGHT - PLAYER_HEIGHT;

    fn flat() -> TileGrid {
        grid_from(&[
            "..........",
            "..........",
            "..........",
            "..........",
            "..........",
            "..........",
            "..........",
            "##########",
        ])
    }

    fn run(player: &mut Player, grid: &TileGrid, bodies: &[Body], keys: &[Key], ticks: usize) -> Vec<StepReport> {
        let mut tracker = InputTracker::new();
        let env = Surroundings { grid, bodies };
        (0..ticks)
            .map(|_| {
                let input = tracker.advance(KeySet::of(keys));
                player.update(&input, &env, &PlayerTuning::default())
            })
            .collect()
    }

    fn frames(player: &mut Player, grid: &TileGrid, keys: &[Key], ticks: u32) -> Vec<u32> {
        let mut tracker = InputTracker::new();
        let env = Surroundings { grid, bodies: &[] };
        (0..ticks)
            .map(|_| {
                let input = tracker.advance(KeySet::of(keys));
                player.update(&input, &env, &PlayerTuning::default());
                player.animation.frame
            })
            .collect()
    }

    fn wide() -> TileGrid {
        let mut rows = vec!["...................."; 7];
        rows.push("####################");
        grid_from(&rows)
    }

    #[test]
    fn idle_loops_four_frames() {
        let g = flat();
        let mut p = Player::spawn_at(2, 6);
        let seen = frames(&mut p, &g, &[], 20);
        let expected: Vec<u32> = (1..=20).map(|t| (t / FRAME_DELAY) % 4).collect();
        assert_eq!(seen, expected);
        assert_eq!(seen[15], 0);
        assert_eq!(p.animation.row, AnimRow::Idle);
    }

    #[test]
    fn run_cycles_eight_frames() {
        let g = wide();
        let mut p = Player::spawn_at(1, 6);
        let seen = frames(&mut p, &g, &[Key::Right], 40);
        let expected: Vec<u32> = (1..=40).map(|t| (t / FRAME_DELAY) % 8).collect();
        assert_eq!(seen, expected);
        assert_eq!(seen[30], 7);
        assert_eq!(seen[31], 0);
        assert_eq!(p.animation.row, AnimRow::Run);
    }

    #[test]
    fn running_jump_rises_at_half_rate() {
        let g = wide();
        let mut p = Player::spawn_at(1, 6);
        run(&mut p, &g, &[], &[Key::Right], 6);
        assert!(p.speed >= SLOW_SPEED);

        let seen = frames(&mut p, &g, &[Key::Right, Key::Up], 16);
        assert_eq!(p.animation.row, AnimRow::RunningJump);
        let expected: Vec<u32> = (1..=16u32)
            .map(|t| {
                let frame = t / FRAME_DELAY;
                // Arc position t - 1 this tick.
                if t - 1 <= APEX as u32 { frame / 2 } else { frame }
            })
            .collect();
        assert_eq!(seen, expected);
        assert_eq!(seen[7], 1);
        assert_eq!(seen[12], 3);
    }

    #[test]
    fn air_control_nudges_and_clamps() {
        let g = flat();
        let tuning = PlayerTuning { max_speed: 0.5, ..PlayerTuning::default() };
        let env = Surroundings { grid: &g, bodies: &[] };
        let mut tracker = InputTracker::new();
        let mut p = Player::spawn_at(4, 6);
        let mut speeds = vec![];
        for keys in [[Key::Up, Key::Right]; 5].iter().chain([[Key::Up, Key::Left]; 6].iter()) {
            let input = tracker.advance(KeySet::of(keys));
            p.update(&input, &env, &tuning);
            assert_eq!(p.motion, Motion::Jumping);
            speeds.push(p.speed);
        }
        let expected = [0.0, 0.2, 0.4, 0.5, 0.5, 0.3, 0.1, -0.1, -0.3, -0.5, -0.5];
        for (got, want) in speeds.iter().zip(expected) {
            assert!((got - want).abs() < 1e-5, "{speeds:?}");
        }
    }

    #[test]
    fn jump_frames_follow_the_arc_position_used() {
        let g = flat();
        let mut p = Player::spawn_at(2, 6);
        let seen = frames(&mut p, &g, &[Key::Up], 1);
        assert_eq!(seen, vec![0]);
        assert_eq!(p.animation.row, AnimRow::StandingJump);

        // Tick 19 steps the arc at 18, so the frame still runs freely.
        let seen = frames(&mut p, &g, &[], 19);
        assert_eq!(seen[17], 4);
        assert_eq!(p.frame_count, 20);
        assert_eq!(p.animation.frame, 5);
    }

    #[test]
    fn falling_through_a_ladder_skips_the_inner_rungs() {
        let g = grid_from(&[
            "......",
            "......",
            "...L..",
            "...L..",
            "...L..",
            "...L..",
            "######",
        ]);
        let mut top = Player::spawn_at(3, 1);
        run(&mut top, &g, &[], &[], 5);
        assert_eq!(top.motion, Motion::Standing);
        assert_eq!(top.position.y, 2.0 * TILE_HEIGHT - PLAYER_HEIGHT);

        let mut inside = Player::spawn_at(3, 3);
        run(&mut inside, &g, &[], &[], 30);
        assert_eq!(inside.motion, Motion::Standing);
        assert_eq!(inside.position.y, 6.0 * TILE_HEIGHT - PLAYER_HEIGHT);
    }

    #[test]
    fn arc_meets_terminal_fall_at_twenty() {
        let y0 = 300.0;
        assert_eq!(jump_y(y0, 0), y0);
        assert_eq!(jump_y(y0, APEX), y0 - 100.0);
        assert_eq!(jump_y(y0, 20), y0);
        assert_eq!(jump_y(y0, 21) - jump_y(y0, 20), 20.0);
        assert_eq!(jump_y(y0, 25) - jump_y(y0, 24), 20.0);
        // Last parabola step is within one pixel of the terminal slope.
        assert_eq!(jump_y(y0, 20) - jump_y(y0, 19), 19.0);
    }

    #[test]
    fn standing_on_floor_snaps_and_stays() {
        let g = flat();
        let mut p = Player::spawn_at(2, 6);
        assert_eq!(p.position.y, FLOOR_Y);
        run(&mut p, &g, &[], &[], 10);
        assert_eq!(p.position.y, FLOOR_Y);
        assert_eq!(p.motion, Motion::Standing);
        assert_eq!(p.animation.row, AnimRow::Idle);
    }

    #[test]
    fn jump_returns_to_floor() {
        let g = flat();
        let mut p = Player::spawn_at(2, 6);
        let first = run(&mut p, &g, &[], &[Key::Up], 1);
        assert!(first[0].jumped);
        assert_eq!(p.motion, Motion::Jumping);

        let mut highest = p.position.y;
        let mut landed_after = None;
        let mut tracker = InputTracker::new();
        let env = Surroundings { grid: &g, bodies: &[] };
        for tick in 0..40 {
            let input = tracker.advance(KeySet::EMPTY);
            let report = p.update(&input, &env, &PlayerTuning::default());
            highest = highest.min(p.position.y);
            if report.landed {
                landed_after = Some(tick);
                break;
            }
        }
        assert!(landed_after.is_some());
        assert_eq!(p.position.y, FLOOR_Y);
        assert_eq!(p.motion, Motion::Standing);
        assert_eq!(p.jump_count, 0);
        assert_eq!(highest, FLOOR_Y - 100.0);
    }

    #[test]
    fn releasing_run_keeps_facing() {
        let g = flat();
        let mut p = Player::spawn_at(5, 6);
        run(&mut p, &g, &[], &[Key::Left], 3);
        assert_eq!(p.motion, Motion::Running(Facing::Left));
        assert!(p.speed < 0.0);
        run(&mut p, &g, &[], &[], 1);
        assert_eq!(p.motion, Motion::Standing);
        assert_eq!(p.facing, Facing::Left);
        run(&mut p, &g, &[], &[], 10);
        assert_eq!(p.speed, 0.0);
    }

    #[test]
    fn walls_block_running() {
        let g = grid_from(&[
            "......",
            "....#.",
            "....#.",
            "######",
        ]);
        let mut p = Player::spawn_at(1, 2);
        run(&mut p, &g, &[], &[Key::Right], 30);
        assert_eq!(p.position.x, 4.0 * TILE_WIDTH - PLAYER_WIDTH);
        assert!(p.speed.abs() <= PlayerTuning::default().max_speed);
    }

    #[test]
    fn walking_off_a_ledge_falls() {
        let g = grid_from(&[
            "........",
            "........",
            "###.....",
            "........",
            "........",
            "........",
            "........",
            "########",
        ]);
        let mut p = Player::spawn_at(1, 1);
        let start_y = p.position.y;
        let mut fell = false;
        let mut tracker = InputTracker::new();
        let env = Surroundings { grid: &g, bodies: &[] };
        for _ in 0..30 {
            let input = tracker.advance(KeySet::of(&[Key::Right]));
            let before = p.position.y;
            p.update(&input, &env, &PlayerTuning::default());
            if p.motion == Motion::Jumping {
                fell = true;
                // Never rises when leaving a ledge.
                assert!(p.position.y >= before);
            }
        }
        assert!(fell);
        assert!(p.position.y > start_y);
    }

    #[test]
    fn falling_below_grid_kills() {
        let g = grid_from(&["....", "....", "...."]);
        let mut p = Player::spawn_at(1, 0);
        let reports = run(&mut p, &g, &[], &[], 40);
        assert!(reports.iter().any(|r| r.died));
        assert_eq!(p.motion, Motion::Dead);
        assert_eq!(reports.iter().filter(|r| r.died).count(), 1);
    }

    #[test]
    fn spikes_kill() {
        let g = grid_from(&[
            "......",
            "......",
            "...^..",
            "######",
        ]);
        let mut p = Player::spawn_at(1, 2);
        let reports = run(&mut p, &g, &[], &[Key::Right], 20);
        assert!(reports.iter().any(|r| r.died));
        assert!(!p.is_alive());
        assert_eq!(p.animation.row, AnimRow::Dead);
    }

    #[test]
    fn long_fall_pins_a_late_frame() {
        let rows: Vec<String> = (0..40).map(|_| "....".to_string()).collect();
        let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
        let g = grid_from(&rows);
        let mut p = Player::spawn_at(1, 0);
        run(&mut p, &g, &[], &[], 12);
        assert!(p.jump_count > 18);
        assert_eq!(p.animation, Animation { row: AnimRow::StandingJump, frame: 4 });
        run(&mut p, &g, &[], &[], 3);
        assert_eq!(p.animation.frame, 4);
    }

    #[test]
    fn ladder_climb() {
        let g = grid_from(&[
            "......",
            "..L...",
            "..L...",
            "..L...",
            "######",
        ]);
        let mut p = Player::spawn_at(2, 3);
        let y0 = p.position.y;
        run(&mut p, &g, &[], &[Key::Up], 3);
        assert_eq!(p.motion, Motion::Climbing);
        assert!(p.position.y < y0);
        assert_eq!(p.animation.row, AnimRow::Climb);
    }

    #[test]
    fn platform_carries_rider() {
        let g = grid_from(&["......", "......", "......", "......"]);
        let deck = Rect::new(40.0, 80.0, 40.0, 32.0);
        let mut p = Player::spawn_at(1, 0);
        p.position.y = deck.top() - PLAYER_HEIGHT;
        let carry = Vec2::new(3.0, 0.0);
        let still = [Body { rect: deck, collision: TileCollision::Platform, carry: Vec2::ZERO }];
        run(&mut p, &g, &still, &[], 1);
        assert_eq!(p.motion, Motion::Standing);
        assert_eq!(p.riding, Some(0));

        let x0 = p.position.x;
        let moved = [Body { rect: Rect::new(43.0, 80.0, 40.0, 32.0), collision: TileCollision::Platform, carry }];
        run(&mut p, &g, &moved, &[], 1);
        assert_eq!(p.position.x, x0 + 3.0);
        assert_eq!(p.position.y, deck.top() - PLAYER_HEIGHT);
    }

    #[test]
    fn water_slows_the_fall() {
        let dry = grid_from(&["....", "....", "....", "....", "....", "....", "....", "####"]);
        let wet = grid_from(&["....", "~~~~", "~~~~", "~~~~", "~~~~", "~~~~", "~~~~", "####"]);
        let mut a = Player::spawn_at(1, 0);
        let mut b = Player::spawn_at(1, 0);
        b.position.y += TILE_HEIGHT;
        a.position.y += TILE_HEIGHT;
        let ya = a.position.y;
        let reports = run(&mut b, &wet, &[], &[], 6);
        run(&mut a, &dry, &[], &[], 6);
        assert!(reports[0].splashed);
        assert!(b.in_water);
        assert!(b.position.y - ya < a.position.y - ya);
    }
}
