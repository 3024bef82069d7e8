/// Moving tiles organized as leader/follower chains.
///
/// ## Arena
///
/// Every moving tile is a `ChainMember` stored in one `ChainArena`, indexed
/// by position. A member's `leader` is an index into the same arena; the
/// leader's leader is itself. Members are created row-major, so a chain's
/// leader always has the lowest index and is updated before its followers.
///
/// ## Protocol (per tick, in arena order)
///
///   - Leader: count its wait timer down. While waiting it holds still.
///     Otherwise it probes ahead; a static hit reverses with `MAX_WAIT`,
///     a hit on another chain reverses with no wait. With a clear path it
///     commits a frame displacement and moves.
///   - Follower: only while its leader is not waiting. Copies the leader's
///     velocity, moves by the same displacement, then probes at its own
///     position and reports any hit to the leader.
///
/// Follower reports are applied after every member has moved, at most one
/// reversal per leader per tick, so the chain stays rigid.
///
/// What a chain does with its displacement is a `MovementBehavior`:
/// `Sliding` oscillates along an angle, `Door` seeks open/closed targets.

use std::f32::consts::{FRAC_PI_4, PI, TAU};

use super::geometry::{Rect, Vec2};
use super::grid::TileGrid;
use super::tile::{TileCollision, TILE_HEIGHT, TILE_WIDTH};

/// Longest pause after bouncing off static geometry (seconds).
pub const MAX_WAIT: f32 = 0.2;
/// Door members closer than this to their target snap onto it (pixels).
pub const CLAMP_DISTANCE: f32 = 2.0;

#[derive(Clone, Copy, Debug)]
pub struct ChainMember {
    pub position: Vec2,
    /// Where the member was built. Doors return here when closed.
    pub home: Vec2,
    pub leader: usize,
    pub chain: usize,
    /// Heading in radians, wrapped to `[0, 2π)`.
    pub angle: f32,
    pub speed: f32,
    pub frame_velocity: Vec2,
    pub wait_time_s: f32,
    pub collision: TileCollision,
    pub moving: bool,
}

impl ChainMember {
    pub fn rect(&self) -> Rect {
        Rect::at(self.position, TILE_WIDTH, TILE_HEIGHT)
    }

    /// Turn around and pause for `wait` seconds.
    pub fn reverse_direction(&mut self, wait: f32) {
        self.angle = (self.angle + PI).rem_euclid(TAU);
        self.frame_velocity = Vec2::ZERO;
        self.wait_time_s = wait.clamp(0.0, MAX_WAIT);
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Hit {
    Static,
    Chain,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChainKind {
    Sliding,
    Door,
}

/// Per-chain movement policy.
pub trait MovementBehavior: std::fmt::Debug {
    fn kind(&self) -> ChainKind;

    /// Displacement for `member` this tick. `leader` is `None` when the
    /// member leads its own chain.
    fn compute_frame_displacement(
        &self,
        member: &mut ChainMember,
        leader: Option<&ChainMember>,
        elapsed: f32,
    ) -> Vec2;

    /// Leader's response to a collision found by any member.
    fn on_collision(&self, leader: &mut ChainMember, hit: Hit);

    /// Called after the displacement has been applied.
    fn settle(&self, _member: &mut ChainMember, _leader: Option<&ChainMember>) {}

    /// Whether members look for collisions this tick.
    fn probes(&self) -> bool;

    fn is_active(&self) -> bool;

    /// Returns true if the state changed.
    fn set_active(&mut self, active: bool) -> bool;
}

// ── Sliding ──

/// Oscillates along one angle at constant speed. Inactive = paused.
#[derive(Debug)]
pub struct Sliding {
    running: bool,
}

impl Sliding {
    pub fn new() -> Self {
        Sliding { running: true }
    }
}

impl MovementBehavior for Sliding {
    fn kind(&self) -> ChainKind {
        ChainKind::Sliding
    }

    fn compute_frame_displacement(
        &self,
        member: &mut ChainMember,
        leader: Option<&ChainMember>,
        elapsed: f32,
    ) -> Vec2 {
        match leader {
            Some(lead) => {
                member.angle = lead.angle;
                member.speed = lead.speed;
                lead.frame_velocity
            }
            None if self.running => Vec2::from_angle(member.angle) * member.speed * elapsed,
            None => Vec2::ZERO,
        }
    }

    fn on_collision(&self, leader: &mut ChainMember, hit: Hit) {
        match hit {
            Hit::Static => leader.reverse_direction(MAX_WAIT),
            Hit::Chain => leader.reverse_direction(0.0),
        }
    }

    fn probes(&self) -> bool {
        self.running
    }

    fn is_active(&self) -> bool {
        self.running
    }

    fn set_active(&mut self, active: bool) -> bool {
        let changed = self.running != active;
        self.running = active;
        changed
    }
}

// ── Door ──

/// Followers slide into the leader's cell when open and back home when closed.
#[derive(Debug)]
pub struct Door {
    open: bool,
}

impl Door {
    pub fn new() -> Self {
        Door { open: false }
    }

    fn target(&self, member: &ChainMember, leader: Option<&ChainMember>) -> Vec2 {
        match leader {
            Some(lead) if self.open => lead.position,
            _ => member.home,
        }
    }
}

impl MovementBehavior for Door {
    fn kind(&self) -> ChainKind {
        ChainKind::Door
    }

    fn compute_frame_displacement(
        &self,
        member: &mut ChainMember,
        leader: Option<&ChainMember>,
        elapsed: f32,
    ) -> Vec2 {
        if !member.moving {
            return Vec2::ZERO;
        }
        let delta = self.target(member, leader) - member.position;
        let dist = delta.length();
        let step = member.speed * elapsed;
        if dist <= CLAMP_DISTANCE || step >= dist {
            member.moving = false;
            return delta;
        }
        delta.normalized() * step
    }

    fn on_collision(&self, _leader: &mut ChainMember, _hit: Hit) {}

    fn settle(&self, member: &mut ChainMember, leader: Option<&ChainMember>) {
        if !member.moving {
            member.position = self.target(member, leader);
        }
    }

    fn probes(&self) -> bool {
        false
    }

    fn is_active(&self) -> bool {
        self.open
    }

    fn set_active(&mut self, active: bool) -> bool {
        let changed = self.open != active;
        self.open = active;
        changed
    }
}

// ══════════════════════════════════════════════════════════════
// Arena
// ══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct Chain {
    pub id: String,
    pub behavior: Box<dyn MovementBehavior>,
    pub members: Vec<usize>,
}

#[derive(Debug, Default)]
pub struct ChainArena {
    members: Vec<ChainMember>,
    chains: Vec<Chain>,
}

impl ChainArena {
    pub fn new() -> Self {
        ChainArena::default()
    }

    pub fn add_chain(&mut self, id: &str, behavior: Box<dyn MovementBehavior>) -> usize {
        self.chains.push(Chain { id: id.to_string(), behavior, members: vec![] });
        self.chains.len() - 1
    }

    /// Add a member at a grid cell. The chain's first member becomes its leader.
    pub fn add_member(
        &mut self,
        chain: usize,
        col: i32,
        row: i32,
        angle: f32,
        speed: f32,
        collision: TileCollision,
    ) -> usize {
        let index = self.members.len();
        let leader = self.chains[chain].members.first().copied().unwrap_or(index);
        let home = TileGrid::cell_origin(col, row);
        self.members.push(ChainMember {
            position: home,
            home,
            leader,
            chain,
            angle: angle.rem_euclid(TAU),
            speed,
            frame_velocity: Vec2::ZERO,
            wait_time_s: 0.0,
            collision,
            moving: false,
        });
        self.chains[chain].members.push(index);
        index
    }

    pub fn members(&self) -> &[ChainMember] {
        &self.members
    }

    pub fn member(&self, index: usize) -> &ChainMember {
        &self.members[index]
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn chain_kind(&self, chain: usize) -> Option<ChainKind> {
        self.chains.get(chain).map(|c| c.behavior.kind())
    }

    pub fn is_active(&self, chain: usize) -> bool {
        self.chains.get(chain).map_or(false, |c| c.behavior.is_active())
    }

    /// Set a chain's state. Members start moving only if it changed.
    pub fn set_active(&mut self, chain: usize, active: bool) -> bool {
        let Some(c) = self.chains.get_mut(chain) else { return false };
        if !c.behavior.set_active(active) {
            return false;
        }
        for &i in &c.members {
            self.members[i].moving = true;
        }
        true
    }

    pub fn toggle(&mut self, chain: usize) -> bool {
        let active = self.is_active(chain);
        self.set_active(chain, !active)
    }

    /// Advance every chain by one tick.
    pub fn update(&mut self, grid: &TileGrid, elapsed: f32) {
        let mut reversed = vec![false; self.members.len()];
        let mut reports: Vec<(usize, Hit)> = Vec::new();

        for i in 0..self.members.len() {
            let leader = self.members[i].leader;
            let behavior = &self.chains[self.members[i].chain].behavior;

            if leader == i {
                let m = &mut self.members[i];
                m.wait_time_s = (m.wait_time_s - elapsed).max(0.0);
                if m.wait_time_s > 0.0 {
                    m.frame_velocity = Vec2::ZERO;
                    continue;
                }
                if behavior.probes() {
                    if let Some(hit) = probe(&self.members, grid, i) {
                        behavior.on_collision(&mut self.members[i], hit);
                        reversed[i] = true;
                        continue;
                    }
                }
                let m = &mut self.members[i];
                let fv = behavior.compute_frame_displacement(m, None, elapsed);
                m.frame_velocity = fv;
                m.position += fv;
                behavior.settle(m, None);
            } else {
                let lead = self.members[leader];
                let m = &mut self.members[i];
                if lead.wait_time_s > 0.0 {
                    m.frame_velocity = Vec2::ZERO;
                    continue;
                }
                let fv = behavior.compute_frame_displacement(m, Some(&lead), elapsed);
                m.frame_velocity = fv;
                m.position += fv;
                behavior.settle(m, Some(&lead));
                if behavior.probes() {
                    if let Some(hit) = probe(&self.members, grid, i) {
                        reports.push((leader, hit));
                    }
                }
            }
        }

        for (leader, hit) in reports {
            if reversed[leader] {
                continue;
            }
            reversed[leader] = true;
            let chain = self.members[leader].chain;
            self.chains[chain].behavior.on_collision(&mut self.members[leader], hit);
        }
    }
}

/// Look for a collision ahead of member `i`: the cell along its heading and
/// the two cells 45° either side, then any overlapping member of another
/// chain that lies ahead.
fn probe(members: &[ChainMember], grid: &TileGrid, i: usize) -> Option<Hit> {
    let m = &members[i];
    let rect = m.rect();
    let center = rect.center();
    let (col, row) = grid.grid_position(center.x, center.y);

    for offset in [0.0, -FRAC_PI_4, FRAC_PI_4] {
        let dir = m.angle + offset;
        let c = col + dir.cos().round() as i32;
        let r = row + dir.sin().round() as i32;
        if grid.get_collision(c, r).stops_chain() && rect.intersects(&grid.bounds(c, r)) {
            return Some(Hit::Static);
        }
    }

    let heading = Vec2::from_angle(m.angle);
    let blocked = members.iter().any(|other| {
        other.chain != m.chain
            && other.rect().intersects(&rect)
            && (other.rect().center() - center).dot(heading) > 0.0
    });
    if blocked {
        Some(Hit::Chain)
    } else {
        None
    }
}
