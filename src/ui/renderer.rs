/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Compose the level into a `Scene` (one glyph per tile, layered)
///   2. Build the next frame into `front` buffer (array of Cell)
///   3. Compare each cell with `back` buffer (previous frame)
///   4. Only emit terminal commands for cells that changed
///   5. All commands are batched with `queue!`, flushed once at the end
///   6. Swap front/back
///
/// Each tile is two terminal columns wide. Pixel positions (moving chains,
/// the player, laser beams) are snapped to the nearest tile.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::activation::{ActivatorKind, Responder};
use crate::domain::entity::Facing;
use crate::domain::geometry::Vec2;
use crate::domain::player::{AnimRow, Player};
use crate::domain::tile::{Fixture, Sprite, Tile, TileCollision, TILE_HEIGHT, TILE_WIDTH};
use crate::sim::level::Level;
use crate::sim::world::{Phase, WorldState};

const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };
const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: BASE_BG };

    /// Sentinel used to invalidate the back buffer: differs from any real cell.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        // Every cell gets an explicit background, never terminal-default
        let bg = if bg == Color::Reset { BASE_BG } else { bg };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Scene: the level as tile glyphs
// ══════════════════════════════════════════════════════════════

/// What one tile looks like: two characters and their colors.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Glyph {
    pub left: char,
    pub right: char,
    pub fg: Color,
    pub bg: Color,
}

impl Glyph {
    const EMPTY: Glyph = Glyph::new(' ', ' ', Color::White, Color::Reset);

    const fn new(left: char, right: char, fg: Color, bg: Color) -> Self {
        Glyph { left, right, fg, bg }
    }

    /// Same characters and color, keeping the background underneath.
    fn over(self, under: Glyph) -> Glyph {
        Glyph { bg: under.bg, ..self }
    }
}

pub struct Scene {
    width: usize,
    height: usize,
    glyphs: Vec<Glyph>,
}

impl Scene {
    /// Layers, bottom to top: tiles, activatables, activators, beams,
    /// moving chains, player.
    pub fn compose(level: &Level, player: &Player) -> Self {
        let (width, height) = (level.grid.width(), level.grid.height());
        let glyphs = level.grid.cells().map(|(_, _, tile)| tile_glyph(tile)).collect();
        let mut scene = Scene { width, height, glyphs };

        for (_, responder) in level.network.responders() {
            if let (Some((col, row)), Some(glyph)) = (responder.cell(), responder_glyph(responder)) {
                scene.overlay(col, row, glyph);
            }
        }

        let lit: Vec<Vec2> = level.network.activators().flat_map(|a| a.beam().iter().skip(1).copied()).collect();
        for activator in level.network.activators() {
            let lit = lit.contains(&activator.position());
            scene.overlay(activator.col, activator.row, activator_glyph(&activator.kind, activator.on, lit));
        }

        for activator in level.network.activators() {
            for pair in activator.beam().windows(2) {
                scene.draw_beam(pair[0], pair[1]);
            }
        }

        for member in level.chains.members() {
            let col = (member.position.x / TILE_WIDTH).round() as i32;
            let row = (member.position.y / TILE_HEIGHT).round() as i32;
            let glyph = match member.collision {
                TileCollision::Impassable => Glyph::new('▐', '▌', Color::Rgb { r: 200, g: 140, b: 70 }, Color::Rgb { r: 90, g: 55, b: 20 }),
                _ => Glyph::new('▀', '▀', Color::Rgb { r: 90, g: 220, b: 220 }, Color::Reset),
            };
            scene.overlay(col, row, glyph);
        }

        scene.draw_player(player);
        scene
    }

    pub fn width(&self) -> usize { self.width }
    pub fn height(&self) -> usize { self.height }

    /// Glyph at (col, row); blank outside the level.
    pub fn get(&self, col: i32, row: i32) -> Glyph {
        self.index(col, row).map_or(Glyph::EMPTY, |i| self.glyphs[i])
    }

    fn index(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || row < 0 || col as usize >= self.width || row as usize >= self.height {
            return None;
        }
        Some(row as usize * self.width + col as usize)
    }

    fn overlay(&mut self, col: i32, row: i32, glyph: Glyph) {
        if let Some(i) = self.index(col, row) {
            self.glyphs[i] = glyph.over(self.glyphs[i]);
        }
    }

    /// Mark the tiles strictly between two beam points.
    fn draw_beam(&mut self, from: Vec2, to: Vec2) {
        let (c0, r0) = tile_of(from);
        let (c1, r1) = tile_of(to);
        let (dc, dr) = (c1 - c0, r1 - r0);
        let (left, right) = match (dc, dr) {
            (_, 0) => ('─', '─'),
            (0, _) => ('│', ' '),
            _ => ('·', '·'),
        };
        let steps = dc.abs().max(dr.abs());
        for i in 1..steps {
            let t = i as f32 / steps as f32;
            let col = c0 + (dc as f32 * t).round() as i32;
            let row = r0 + (dr as f32 * t).round() as i32;
            self.overlay(col, row, Glyph::new(left, right, Color::Rgb { r: 255, g: 60, b: 60 }, Color::Reset));
        }
    }

    fn draw_player(&mut self, player: &Player) {
        let rect = player.rect();
        let col = (rect.center().x / TILE_WIDTH).floor() as i32;
        let top = (rect.top() / TILE_HEIGHT).floor() as i32;
        let bottom = ((rect.bottom() - 0.01) / TILE_HEIGHT).floor() as i32;
        let fg = Color::Rgb { r: 255, g: 230, b: 120 };
        let anim = player.animation;

        let head = match (anim.row, player.facing) {
            (AnimRow::Dead, _) => Glyph::new('x', 'x', Color::Rgb { r: 255, g: 80, b: 80 }, Color::Reset),
            (_, Facing::Left) => Glyph::new('<', ')', fg, Color::Reset),
            (_, Facing::Right) => Glyph::new('(', '>', fg, Color::Reset),
        };
        let body = match anim.row {
            AnimRow::Idle => Glyph::new('|', '|', fg, Color::Reset),
            AnimRow::Run if anim.frame % 2 == 0 => Glyph::new('/', '|', fg, Color::Reset),
            AnimRow::Run => Glyph::new('|', '\\', fg, Color::Reset),
            AnimRow::StandingJump | AnimRow::RunningJump => Glyph::new('\\', '/', fg, Color::Reset),
            AnimRow::Climb if anim.frame % 2 == 0 => Glyph::new(']', '[', fg, Color::Reset),
            AnimRow::Climb => Glyph::new('[', ']', fg, Color::Reset),
            AnimRow::Dead => Glyph::new('_', '_', Color::Rgb { r: 255, g: 80, b: 80 }, Color::Reset),
        };

        self.overlay(col, top, head);
        for row in top + 1..=bottom {
            self.overlay(col, row, body);
        }
    }
}

fn tile_of(p: Vec2) -> (i32, i32) {
    ((p.x / TILE_WIDTH).floor() as i32, (p.y / TILE_HEIGHT).floor() as i32)
}

fn tile_glyph(tile: &Tile) -> Glyph {
    let water_bg = Color::Rgb { r: 20, g: 60, b: 140 };
    match (tile.fixture, tile.visual) {
        (Some(Fixture::WaterSource), _) => Glyph::new('▲', '≈', Color::Rgb { r: 150, g: 210, b: 255 }, water_bg),
        (Some(Fixture::WaterDrain), _) => {
            let bg = if tile.flooded { water_bg } else { Color::Reset };
            Glyph::new('▼', '▼', Color::Rgb { r: 150, g: 210, b: 255 }, bg)
        }
        (None, Some(Sprite::BlockA(variant))) => {
            let shade = 70 + variant * 8;
            Glyph::new('█', '█', Color::Rgb { r: shade + 50, g: shade + 50, b: shade + 60 }, Color::Rgb { r: shade, g: shade, b: shade + 10 })
        }
        (None, Some(Sprite::BlockB(variant))) if tile.collision == TileCollision::Platform => {
            Glyph::new('▔', '▔', Color::Rgb { r: 180, g: 120 + variant * 20, b: 60 }, Color::Reset)
        }
        (None, Some(Sprite::BlockB(_))) => Glyph::new('░', '░', Color::Rgb { r: 60, g: 60, b: 80 }, Color::Reset),
        (None, Some(Sprite::Ladder)) => Glyph::new('╠', '╣', Color::Rgb { r: 100, g: 200, b: 255 }, Color::Reset),
        (None, Some(Sprite::Spikes)) => Glyph::new('▲', '▲', Color::Rgb { r: 220, g: 220, b: 220 }, Color::Reset),
        (None, Some(Sprite::Water)) => Glyph::new('≈', '≈', Color::Rgb { r: 120, g: 180, b: 255 }, water_bg),
        (None, None) => match tile.collision {
            TileCollision::Impassable => Glyph::new('█', '█', Color::Grey, Color::DarkGrey),
            TileCollision::Platform => Glyph::new('▔', '▔', Color::Rgb { r: 180, g: 120, b: 60 }, Color::Reset),
            TileCollision::Water => Glyph::new('≈', '≈', Color::Rgb { r: 120, g: 180, b: 255 }, water_bg),
            _ => Glyph::EMPTY,
        },
    }
}

/// Sources, drains and active ladders are already visible in the grid.
fn responder_glyph(responder: &Responder) -> Option<Glyph> {
    match responder {
        Responder::Light { on: true, .. } => Some(Glyph::new('☼', ' ', Color::Rgb { r: 255, g: 240, b: 120 }, Color::Reset)),
        Responder::Light { on: false, .. } => Some(Glyph::new('○', ' ', Color::DarkGrey, Color::Reset)),
        Responder::Spawner { on: true, .. } => Some(Glyph::new('⚑', ' ', Color::Rgb { r: 80, g: 255, b: 80 }, Color::Reset)),
        Responder::Spawner { on: false, .. } => Some(Glyph::new('⚐', ' ', Color::DarkGrey, Color::Reset)),
        Responder::Ladder { active: false, .. } => Some(Glyph::new('┆', '┆', Color::DarkGrey, Color::Reset)),
        _ => None,
    }
}

fn activator_glyph(kind: &ActivatorKind, on: bool, lit: bool) -> Glyph {
    let state = if on { Color::Rgb { r: 80, g: 255, b: 80 } } else { Color::Rgb { r: 255, g: 90, b: 90 } };
    match kind {
        ActivatorKind::Switch { rotary: false } => Glyph::new('[', if on { '/' } else { '\\' }, state, Color::Reset),
        ActivatorKind::Switch { rotary: true } => Glyph::new('↻', ' ', Color::Rgb { r: 100, g: 200, b: 255 }, Color::Reset),
        ActivatorKind::Exit { .. } => Glyph::new('[', ']', Color::Black, Color::Rgb { r: 255, g: 200, b: 50 }),
        ActivatorKind::Emitter { .. } => Glyph::new('◉', '>', Color::Rgb { r: 255, g: 60, b: 60 }, Color::Reset),
        ActivatorKind::Mirror { .. } => {
            let fg = if lit { Color::Rgb { r: 120, g: 255, b: 255 } } else { Color::DarkGrey };
            Glyph::new('◇', ' ', fg, Color::Reset)
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Renderer
// ══════════════════════════════════════════════════════════════

/// Terminal columns per tile.
const CELL_W: usize = 2;

/// Vertical offsets
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(self.writer, ResetColor, cursor::Show, terminal::LeaveAlternateScreen)?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, world: &mut WorldState) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(BASE_BG), Clear(ClearType::All))?;
        }

        let phase_changed = self.last_phase != Some(world.phase);
        if phase_changed {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(world.phase);
        }

        self.fit_camera(world);
        self.front.clear();

        match world.phase {
            Phase::Title => self.compose_title(world),
            Phase::GameComplete => self.compose_game_complete(world),
            Phase::LevelIntro | Phase::Playing | Phase::Dying | Phase::LevelComplete => self.compose_game(world),
        }

        if world.paused {
            self.compose_pause_overlay();
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    /// Size the viewport from the terminal, then track the player.
    fn fit_camera(&self, world: &mut WorldState) {
        let Some(level) = &world.level else { return };
        let (w, h) = (level.grid.width(), level.grid.height());
        let reserved_rows = MAP_ROW + 4; // HUD + gap + msg + help
        world.camera.view_w = (self.term_w / CELL_W).min(w);
        world.camera.view_h = self.term_h.saturating_sub(reserved_rows).max(1).min(h);

        let (col, row) = world.player_cell();
        match world.phase {
            Phase::Playing | Phase::Dying => world.camera.follow(col, row, w, h),
            Phase::LevelIntro => world.camera.center_on(col, row, w, h),
            _ => {}
        }
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        // Explicit base colors; ResetColor would fall back to the terminal default
        queue!(self.writer, SetForegroundColor(Color::White), SetBackgroundColor(BASE_BG))?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) { continue; }

                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_game(&mut self, w: &WorldState) {
        let Some(level) = &w.level else { return };
        let scene = Scene::compose(level, &w.player);
        let cam = &w.camera;

        // ── HUD row ──
        let spawn = level.network.active_spawn().map_or("-", |s| s.as_str());
        let hud = format!(
            " {}. {:<20}  Deaths:{:<4}  Spawn:{} ",
            w.current_level + 1, level.name, w.deaths, spawn,
        );
        self.front.fill_row(HUD_ROW, HUD_BG);
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);

        // ── Map (camera viewport) ──
        for vy in 0..cam.view_h {
            let row = MAP_ROW + vy;
            if row >= self.front.height { break; }
            for vx in 0..cam.view_w {
                let col = vx * CELL_W;
                if col + 1 >= self.front.width { break; }
                let g = scene.get(cam.x + vx as i32, cam.y + vy as i32);
                self.front.set(col, row, Cell::new(g.left, g.fg, g.bg));
                self.front.set(col + 1, row, Cell::new(g.right, g.fg, g.bg));
            }
        }

        if w.phase == Phase::LevelIntro {
            let banner = format!("  {}  ", level.name);
            let x = (cam.view_w * CELL_W).saturating_sub(banner.chars().count()) / 2;
            let y = MAP_ROW + cam.view_h / 2;
            self.front.put_str(x, y, &banner, Color::Black, MSG_BG);
        }

        // ── Message bar ──
        let msg_row = MAP_ROW + cam.view_h + 1;
        if msg_row < self.front.height && !w.message.is_empty() {
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_str(0, msg_row, &format!(" ◈ {} ", w.message), Color::Black, MSG_BG);
        }

        // ── Help bar ──
        let help_row = MAP_ROW + cam.view_h + 3;
        if help_row < self.front.height {
            let help = " ←→ Run  ↑/Space Jump/Climb  E Interact  R Respawn  Tab Spawn  P Pause  Esc Title";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
        }
    }

    fn compose_title(&mut self, w: &WorldState) {
        let title = [
            r"  ___  _              ___                _ ",
            r" | _ \| | __ _  _  _ |   \  ___  __ _  __| |",
            r" |  _/| |/ _` || || || |) |/ -_)/ _` |/ _` |",
            r" |_|  |_|\__,_| \_, ||___/ \___|\__,_|\__,_|",
            r"                |__/                        ",
        ];
        let amber = Color::Rgb { r: 255, g: 200, b: 50 };
        for (i, line) in title.iter().enumerate() {
            self.front.put_str(2, 2 + i, line, amber, Color::Reset);
        }

        let menu_base = 9;
        self.front.put_str(8, menu_base, "ENTER   Start", Color::Rgb { r: 80, g: 255, b: 80 }, Color::Reset);
        self.front.put_str(8, menu_base + 1, "  Q     Quit", Color::White, Color::Reset);

        self.front.put_str(8, menu_base + 3, "Story", amber, Color::Reset);
        for (i, name) in w.story.names().enumerate() {
            let line = format!("  {:>2}. {}", i + 1, name);
            self.front.put_str(8, menu_base + 4 + i, &line, Color::White, Color::Reset);
        }

        let help_base = menu_base + 5 + w.story.len();
        let help = [
            "Controls",
            "  ←→ / AD      Run           ↑ / W / Space  Jump, climb up",
            "  ↓ / S        Climb down    E / X          Switches, exits",
            "  R  Respawn   Tab  Next spawn point   P  Pause   Esc  Title",
        ];
        for (i, line) in help.iter().enumerate() {
            let color = if i == 0 { amber } else { Color::White };
            self.front.put_str(8, help_base + i, line, color, Color::Reset);
        }

        if !w.message.is_empty() {
            let msg_row = self.front.height.saturating_sub(1);
            if msg_row > help_base + help.len() {
                self.front.fill_row(msg_row, MSG_BG);
                self.front.put_str(0, msg_row, &format!(" ◈ {} ", w.message), Color::Black, MSG_BG);
            }
        }
    }

    fn compose_game_complete(&mut self, w: &WorldState) {
        let box_art = [
            "╔══════════════════════════════╗",
            "║   ★  THE LIGHTS ARE ON  ★    ║",
            "╚══════════════════════════════╝",
        ];
        let amber = Color::Rgb { r: 255, g: 220, b: 50 };
        for (i, l) in box_art.iter().enumerate() {
            self.front.put_str(4, 4 + i, l, amber, Color::Reset);
        }
        let levels = format!("◈ {} levels cleared", w.story.len());
        let deaths = format!("◈ Deaths: {}", w.deaths);
        self.front.put_str(6, 9, &levels, Color::White, Color::Reset);
        self.front.put_str(6, 10, &deaths, Color::White, Color::Reset);
        self.front.put_str(6, 12, "▸ ENTER / ESC: Back to Title", Color::Rgb { r: 80, g: 255, b: 80 }, Color::Reset);
    }

    fn compose_pause_overlay(&mut self) {
        let dim = Color::Rgb { r: 40, g: 40, b: 40 };
        let box_w = 30_usize.min(self.front.width);
        let box_h = 7_usize.min(self.front.height);
        let box_x = self.front.width.saturating_sub(box_w) / 2;
        let box_y = self.front.height.saturating_sub(box_h) / 2;

        for y in box_y..box_y + box_h {
            for x in box_x..box_x + box_w {
                self.front.set(x, y, Cell::new(' ', Color::White, dim));
            }
        }
        let hdr = Color::Rgb { r: 255, g: 220, b: 50 };
        let key_c = Color::Rgb { r: 100, g: 200, b: 255 };
        self.front.put_str(box_x + 10, box_y + 1, "PAUSED", hdr, dim);
        self.front.put_str(box_x + 3, box_y + 3, "P    Resume", key_c, dim);
        self.front.put_str(box_x + 3, box_y + 4, "R    Respawn", key_c, dim);
        self.front.put_str(box_x + 3, box_y + 5, "Esc  Back to Title", key_c, dim);
    }
}
