/// Activation network: activators fire, activatables respond.
///
/// ## Activators
///
/// A closed set of kinds, each with its own trigger condition:
///   - `Switch` / rotary switch: player touching it + new Interact press → toggle
///   - `Exit`: player touching it + new Interact press → leave the level
///   - `Emitter`: always on; walks its mirror chain every tick, lighting it
///   - `Mirror`: lit or dark; switches its bound activatables when that changes
///
/// Every activator is polled every tick in id order. Edge detection comes
/// from `FrameInput::is_new_press`, so a held key fires once.
///
/// ## Bindings
///
/// `add_bind(actor, target)` is resolved once, here, into a `Route`:
///   - Emitter → Mirror: aim the beam
///   - Mirror → Mirror: add a downstream target (round-robin)
///   - Mirror → anything else: sync with the mirror's lit state
///   - Switch / Exit → anything: toggle on fire, optionally delayed
///
/// Unknown ids are dropped with a warning; gameplay is unaffected.
///
/// ## Effects
///
/// Responders that only touch their own state do so directly. Anything that
/// reaches outside the network (grid tiles, moving chains) comes back to the
/// caller as an `Effect`.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::entity::{FrameInput, Key};
use super::geometry::{Rect, Vec2};
use super::grid::TileGrid;
use super::tile::{TILE_HEIGHT, TILE_WIDTH};
use super::water::{WaterDrain, WaterSource};

pub type TileId = String;

// ══════════════════════════════════════════════════════════════
// Activatables
// ══════════════════════════════════════════════════════════════

/// Single-method state-toggle contract.
pub trait Activatable {
    fn is_active(&self) -> bool;
    fn set_state(&mut self, active: bool) -> Option<Effect>;
    fn change_state(&mut self) -> Option<Effect>;
}

/// Work a responder hands back to whoever owns the grid and chains.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    SetLadder { col: i32, row: i32, active: bool },
    SetChain { chain: usize, active: bool },
    /// Handled inside the network.
    ClaimSpawn,
    /// Handled inside the network.
    Reroute { mirror: TileId, previous: TileId },
}

#[derive(Clone, Debug)]
pub enum Responder {
    Light { col: i32, row: i32, on: bool },
    /// Turns itself on, never off. Only `update_spawn` turns one off.
    Spawner { col: i32, row: i32, on: bool },
    Ladder { col: i32, row: i32, active: bool },
    Source(WaterSource),
    Drain(WaterDrain),
    Chain { chain: usize, active: bool },
}

impl Responder {
    pub fn cell(&self) -> Option<(i32, i32)> {
        match self {
            Responder::Light { col, row, .. }
            | Responder::Spawner { col, row, .. }
            | Responder::Ladder { col, row, .. } => Some((*col, *row)),
            Responder::Source(s) => Some((s.col, s.row)),
            Responder::Drain(d) => Some((d.col, d.row)),
            Responder::Chain { .. } => None,
        }
    }

    fn set_spawn_state(&mut self, active: bool) {
        if let Responder::Spawner { on, .. } = self {
            *on = active;
        }
    }
}

impl Activatable for Responder {
    fn is_active(&self) -> bool {
        match self {
            Responder::Light { on, .. } | Responder::Spawner { on, .. } => *on,
            Responder::Ladder { active, .. } | Responder::Chain { active, .. } => *active,
            Responder::Source(s) => s.is_pending(),
            Responder::Drain(d) => d.is_pending(),
        }
    }

    fn set_state(&mut self, active: bool) -> Option<Effect> {
        match self {
            Responder::Light { on, .. } => {
                *on = active;
                None
            }
            Responder::Spawner { on, .. } => {
                if *on || !active {
                    return None;
                }
                *on = true;
                Some(Effect::ClaimSpawn)
            }
            Responder::Ladder { col, row, active: current } => {
                if *current == active {
                    return None;
                }
                *current = active;
                Some(Effect::SetLadder { col: *col, row: *row, active })
            }
            Responder::Source(s) => {
                if active {
                    s.increase_water_level();
                }
                None
            }
            Responder::Drain(d) => {
                if active {
                    d.decrease_water_level();
                }
                None
            }
            Responder::Chain { chain, active: current } => {
                if *current == active {
                    return None;
                }
                *current = active;
                Some(Effect::SetChain { chain: *chain, active })
            }
        }
    }

    /// Sources and drains schedule on every call; everything else toggles.
    fn change_state(&mut self) -> Option<Effect> {
        let next = matches!(self, Responder::Source(_) | Responder::Drain(_)) || !self.is_active();
        self.set_state(next)
    }
}

// ══════════════════════════════════════════════════════════════
// Activators
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub struct Binding {
    pub target: TileId,
    pub delay_ms: u32,
}

#[derive(Clone, Debug)]
pub enum ActivatorKind {
    Switch { rotary: bool },
    /// `None` means the next level in the story.
    Exit { target: Option<usize> },
    Emitter { next: Option<TileId>, beam: Vec<Vec2> },
    Mirror { targets: Vec<TileId>, next: usize },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Route {
    Toggle,
    Aim,
    Reflect,
    Sync,
}

/// Bind-time dispatch table.
pub fn route(actor: &ActivatorKind, target_is_mirror: bool) -> Option<Route> {
    match (actor, target_is_mirror) {
        (ActivatorKind::Emitter { .. }, true) => Some(Route::Aim),
        (ActivatorKind::Emitter { .. }, false) => None,
        (ActivatorKind::Mirror { .. }, true) => Some(Route::Reflect),
        (ActivatorKind::Mirror { .. }, false) => Some(Route::Sync),
        (ActivatorKind::Switch { .. } | ActivatorKind::Exit { .. }, _) => Some(Route::Toggle),
    }
}

#[derive(Clone, Debug)]
pub struct Activator {
    pub id: TileId,
    pub col: i32,
    pub row: i32,
    pub on: bool,
    pub kind: ActivatorKind,
    pub bound: Vec<Binding>,
}

/// What an activator asks the network to do after polling.
enum Trigger {
    Toggle(Vec<Binding>),
    Exit(Option<usize>),
    Beam,
    Sync,
}

impl Activator {
    pub fn new(id: &str, col: i32, row: i32, kind: ActivatorKind) -> Self {
        let on = matches!(kind, ActivatorKind::Emitter { .. });
        Activator { id: id.to_string(), col, row, on, kind, bound: vec![] }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.col as f32 * TILE_WIDTH, self.row as f32 * TILE_HEIGHT, TILE_WIDTH, TILE_HEIGHT)
    }

    /// Beam vertex for emitters and mirrors.
    pub fn position(&self) -> Vec2 {
        self.bounds().center()
    }

    pub fn is_mirror(&self) -> bool {
        matches!(self.kind, ActivatorKind::Mirror { .. })
    }

    /// A mirror's current downstream target.
    pub fn current_target(&self) -> Option<&TileId> {
        match &self.kind {
            ActivatorKind::Mirror { targets, next } => targets.get(*next),
            _ => None,
        }
    }

    pub fn beam(&self) -> &[Vec2] {
        match &self.kind {
            ActivatorKind::Emitter { beam, .. } => beam,
            _ => &[],
        }
    }

    fn poll(&mut self, player: &Rect, input: &FrameInput) -> Option<Trigger> {
        let touching = player.intersects(&self.bounds());
        match &self.kind {
            ActivatorKind::Switch { .. } => {
                if touching && input.is_new_press(Key::Interact) {
                    self.on = !self.on;
                    Some(Trigger::Toggle(self.bound.clone()))
                } else {
                    None
                }
            }
            ActivatorKind::Exit { target } => {
                if touching && input.is_new_press(Key::Interact) {
                    Some(Trigger::Exit(*target))
                } else {
                    None
                }
            }
            ActivatorKind::Emitter { .. } => Some(Trigger::Beam),
            ActivatorKind::Mirror { .. } => Some(Trigger::Sync),
        }
    }
}

impl Activatable for Activator {
    /// Mirrors always report active. Other activators report `on`.
    fn is_active(&self) -> bool {
        self.is_mirror() || self.on
    }

    /// Mirrors ignore direct state; others just latch `on`.
    fn set_state(&mut self, active: bool) -> Option<Effect> {
        if !self.is_mirror() {
            self.on = active;
        }
        None
    }

    /// Mirrors rotate to their next target. Others ignore the call.
    fn change_state(&mut self) -> Option<Effect> {
        let mirror = self.id.clone();
        match &mut self.kind {
            ActivatorKind::Mirror { targets, next } if !targets.is_empty() => {
                let previous = targets[*next].clone();
                *next = (*next + 1) % targets.len();
                Some(Effect::Reroute { mirror, previous })
            }
            _ => None,
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Network
// ══════════════════════════════════════════════════════════════

/// Things worth telling the outside world about.
#[derive(Clone, Debug, PartialEq)]
pub enum Signal {
    SwitchToggled { id: TileId, on: bool },
    ExitReached { target: Option<usize> },
    MirrorLit { id: TileId },
    MirrorDark { id: TileId },
    SpawnClaimed { id: TileId },
}

#[derive(Clone, Debug)]
struct Pending {
    target: TileId,
    remaining_s: f32,
}

#[derive(Debug, Default)]
pub struct ActivationNetwork {
    activators: BTreeMap<TileId, Activator>,
    responders: BTreeMap<TileId, Responder>,
    pending: Vec<Pending>,
    spawners: Vec<TileId>,
    active_spawn: Option<TileId>,
    /// Lit state each mirror last pushed to its bound responders.
    synced: BTreeMap<TileId, bool>,
}

impl ActivationNetwork {
    pub fn new() -> Self {
        ActivationNetwork::default()
    }

    // ── Construction ──

    pub fn contains(&self, id: &str) -> bool {
        self.activators.contains_key(id) || self.responders.contains_key(id)
    }

    pub fn add_activator(&mut self, activator: Activator) {
        self.activators.insert(activator.id.clone(), activator);
    }

    pub fn add_responder(&mut self, id: &str, responder: Responder) {
        if matches!(responder, Responder::Spawner { .. }) {
            self.spawners.push(id.to_string());
        }
        self.responders.insert(id.to_string(), responder);
    }

    /// Bind `target` to `actor`. Returns false when the binding was dropped.
    pub fn add_bind(&mut self, actor: &str, target: &str, delay_ms: u32) -> bool {
        let target_is_mirror = self.activators.get(target).map_or(false, |a| a.is_mirror());
        if !target_is_mirror && !self.responders.contains_key(target) {
            warn!(actor, target, "binding target not found, dropped");
            return false;
        }
        let Some(a) = self.activators.get_mut(actor) else {
            warn!(actor, target, "binding actor not found, dropped");
            return false;
        };
        let Some(r) = route(&a.kind, target_is_mirror) else {
            warn!(actor, target, "no route between these kinds, dropped");
            return false;
        };
        match (r, &mut a.kind) {
            (Route::Aim, ActivatorKind::Emitter { next, .. }) => *next = Some(target.to_string()),
            (Route::Reflect, ActivatorKind::Mirror { targets, .. }) => targets.push(target.to_string()),
            _ => a.bound.push(Binding { target: target.to_string(), delay_ms }),
        }
        debug!(actor, target, route = ?r, delay_ms, "bound");
        true
    }

    // ── Queries ──

    pub fn activators(&self) -> impl Iterator<Item = &Activator> {
        self.activators.values()
    }

    pub fn activator(&self, id: &str) -> Option<&Activator> {
        self.activators.get(id)
    }

    pub fn responders(&self) -> impl Iterator<Item = (&TileId, &Responder)> {
        self.responders.iter()
    }

    pub fn responder(&self, id: &str) -> Option<&Responder> {
        self.responders.get(id)
    }

    pub fn spawners(&self) -> &[TileId] {
        &self.spawners
    }

    pub fn active_spawn(&self) -> Option<&TileId> {
        self.active_spawn.as_ref()
    }

    pub fn has_exit(&self) -> bool {
        self.activators.values().any(|a| matches!(a.kind, ActivatorKind::Exit { .. }))
    }

    // ── Outward activation surface ──

    /// Force an id on (level start-up). Returns any outward effect.
    pub fn activate(&mut self, id: &str, signals: &mut Vec<Signal>) -> Option<Effect> {
        if let Some(r) = self.responders.get_mut(id) {
            let effect = r.set_state(true);
            return self.absorb(id, effect, signals);
        }
        if let Some(a) = self.activators.get_mut(id) {
            return a.set_state(true);
        }
        warn!(id, "activate: no such id");
        None
    }

    /// Make `id` the respawn point, turning the previous one off.
    pub fn update_spawn(&mut self, id: &str, signals: &mut Vec<Signal>) {
        if !matches!(self.responders.get(id), Some(Responder::Spawner { .. })) {
            warn!(id, "update_spawn: not a spawner");
            return;
        }
        if let Some(prev) = self.active_spawn.take() {
            if let Some(r) = self.responders.get_mut(&prev) {
                r.set_spawn_state(false);
            }
        }
        if let Some(r) = self.responders.get_mut(id) {
            r.set_spawn_state(true);
        }
        self.active_spawn = Some(id.to_string());
        signals.push(Signal::SpawnClaimed { id: id.to_string() });
    }

    /// Call `change_state` on a responder or mirror by id.
    pub fn change_state(&mut self, id: &str, signals: &mut Vec<Signal>) -> Option<Effect> {
        if let Some(r) = self.responders.get_mut(id) {
            let effect = r.change_state();
            return self.absorb(id, effect, signals);
        }
        if let Some(a) = self.activators.get_mut(id) {
            let effect = a.change_state();
            return self.absorb(id, effect, signals);
        }
        warn!(id, "change_state: no such id");
        None
    }

    /// Handle effects that stay inside the network; pass the rest on.
    fn absorb(&mut self, id: &str, effect: Option<Effect>, signals: &mut Vec<Signal>) -> Option<Effect> {
        match effect {
            Some(Effect::ClaimSpawn) => {
                self.update_spawn(id, signals);
                None
            }
            Some(Effect::Reroute { mirror, previous }) => {
                self.untrigger(&previous, signals);
                let lit = self.activators.get(&mirror).map_or(false, |m| m.on);
                if lit {
                    if let Some(next) = self.activators.get(&mirror).and_then(|m| m.current_target()).cloned() {
                        self.trigger(&next, signals);
                    }
                }
                None
            }
            other => other,
        }
    }

    // ── Per-tick poll ──

    /// Fire due delayed bindings, then poll every activator in id order.
    pub fn poll(
        &mut self,
        player: &Rect,
        input: &FrameInput,
        elapsed: f32,
        signals: &mut Vec<Signal>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();

        for p in &mut self.pending {
            p.remaining_s -= elapsed;
        }
        let (due, waiting): (Vec<Pending>, Vec<Pending>) =
            std::mem::take(&mut self.pending).into_iter().partition(|p| p.remaining_s <= 0.0);
        self.pending = waiting;
        for p in due {
            effects.extend(self.change_state(&p.target, signals));
        }

        let ids: Vec<TileId> = self.activators.keys().cloned().collect();
        for id in ids {
            let Some(a) = self.activators.get_mut(&id) else { continue };
            match a.poll(player, input) {
                Some(Trigger::Toggle(bound)) => {
                    signals.push(Signal::SwitchToggled { id: id.clone(), on: a.on });
                    for b in bound {
                        if b.delay_ms == 0 {
                            effects.extend(self.change_state(&b.target, signals));
                        } else {
                            self.pending.push(Pending {
                                target: b.target,
                                remaining_s: b.delay_ms as f32 / 1000.0,
                            });
                        }
                    }
                }
                Some(Trigger::Exit(target)) => signals.push(Signal::ExitReached { target }),
                Some(Trigger::Beam) => self.emit(&id, signals),
                Some(Trigger::Sync) => self.sync_mirror(&id, &mut effects, signals),
                None => {}
            }
        }
        effects
    }

    /// Walk an emitter's mirror chain, record the beam and light each mirror in order.
    fn emit(&mut self, emitter: &str, signals: &mut Vec<Signal>) {
        let Some(e) = self.activators.get(emitter) else { return };
        let mut beam = vec![e.position()];
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        let mut cur = match &e.kind {
            ActivatorKind::Emitter { next, .. } => next.clone(),
            _ => None,
        };
        while let Some(id) = cur {
            if !seen.insert(id.clone()) {
                break;
            }
            let Some(m) = self.activators.get(&id).filter(|m| m.is_mirror()) else { break };
            beam.push(m.position());
            cur = m.current_target().cloned();
            order.push(id);
        }

        for id in &order {
            self.trigger(id, signals);
        }
        if let Some(ActivatorKind::Emitter { beam: stored, .. }) =
            self.activators.get_mut(emitter).map(|e| &mut e.kind)
        {
            *stored = beam;
        }
    }

    /// Light a mirror and everything downstream of it.
    pub fn trigger(&mut self, id: &str, signals: &mut Vec<Signal>) {
        self.cascade(id, true, signals);
    }

    /// Darken a mirror and everything downstream of it.
    pub fn untrigger(&mut self, id: &str, signals: &mut Vec<Signal>) {
        self.cascade(id, false, signals);
    }

    fn cascade(&mut self, start: &str, lit: bool, signals: &mut Vec<Signal>) {
        let mut seen = BTreeSet::new();
        let mut cur = Some(start.to_string());
        while let Some(id) = cur {
            if !seen.insert(id.clone()) {
                break;
            }
            let Some(m) = self.activators.get_mut(&id).filter(|m| m.is_mirror()) else { break };
            if m.on != lit {
                m.on = lit;
                signals.push(if lit {
                    Signal::MirrorLit { id: id.clone() }
                } else {
                    Signal::MirrorDark { id: id.clone() }
                });
            }
            cur = m.current_target().cloned();
        }
    }

    /// Push a mirror's lit state to its bound responders when it changes.
    /// Mirrors start dark, so nothing is sent until the first lighting.
    fn sync_mirror(&mut self, id: &str, effects: &mut Vec<Effect>, signals: &mut Vec<Signal>) {
        let Some(m) = self.activators.get(id) else { return };
        let lit = m.on;
        if self.synced.get(id).copied().unwrap_or(false) == lit {
            return;
        }
        let bound: Vec<TileId> = m.bound.iter().map(|b| b.target.clone()).collect();
        self.synced.insert(id.to_string(), lit);
        for target in bound {
            let Some(r) = self.responders.get_mut(&target) else { continue };
            let effect = r.set_state(lit);
            effects.extend(self.absorb(&target, effect, signals));
        }
    }

    // ── Water ──

    /// Run scheduled fills and drains. Returns (flooded, drained) tile counts.
    pub fn update_water(&mut self, grid: &mut TileGrid) -> (usize, usize) {
        let mut flooded = 0;
        let mut drained = 0;
        for r in self.responders.values_mut() {
            match r {
                Responder::Source(s) => flooded += s.update(grid),
                Responder::Drain(d) => drained += d.update(grid),
                _ => {}
            }
        }
        (flooded, drained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{InputTracker, KeySet};
    use crate::domain::grid::grid_from;
    use crate::domain::tile::TileCollision;

    fn player_at(col: i32, row: i32) -> Rect {
        Rect::new(col as f32 * TILE_WIDTH + 6.0, row as f32 * TILE_HEIGHT - 16.0, 28.0, 48.0)
    }

    fn switch_and_light() -> ActivationNetwork {
        let mut net = ActivationNetwork::new();
        net.add_activator(Activator::new("S1", 2, 2, ActivatorKind::Switch { rotary: false }));
        net.add_responder("I1", Responder::Light { col: 5, row: 2, on: false });
        assert!(net.add_bind("S1", "I1", 0));
        net
    }

    fn light_on(net: &ActivationNetwork, id: &str) -> bool {
        net.responder(id).map_or(false, |r| r.is_active())
    }

    #[test]
    fn held_interact_toggles_once() {
        let mut net = switch_and_light();
        let mut tracker = InputTracker::new();
        let held = KeySet::of(&[Key::Interact]);
        let mut signals = vec![];
        for _ in 0..4 {
            let input = tracker.advance(held);
            net.poll(&player_at(2, 2), &input, 0.04, &mut signals);
        }
        let toggles = signals.iter().filter(|s| matches!(s, Signal::SwitchToggled { .. })).count();
        assert_eq!(toggles, 1);
        assert!(light_on(&net, "I1"));
        assert!(net.activator("S1").map_or(false, |s| s.on));
    }

    #[test]
    fn switch_needs_contact() {
        let mut net = switch_and_light();
        let mut tracker = InputTracker::new();
        let input = tracker.advance(KeySet::of(&[Key::Interact]));
        let mut signals = vec![];
        net.poll(&player_at(8, 2), &input, 0.04, &mut signals);
        assert!(signals.is_empty());
        assert!(!light_on(&net, "I1"));
    }

    #[test]
    fn delayed_binding_fires_later() {
        let mut net = ActivationNetwork::new();
        net.add_activator(Activator::new("S1", 2, 2, ActivatorKind::Switch { rotary: false }));
        net.add_responder("I1", Responder::Light { col: 5, row: 2, on: false });
        net.add_bind("S1", "I1", 100);

        let mut tracker = InputTracker::new();
        let mut signals = vec![];
        let press = tracker.advance(KeySet::of(&[Key::Interact]));
        net.poll(&player_at(2, 2), &press, 0.04, &mut signals);
        assert!(!light_on(&net, "I1"));

        let idle = tracker.advance(KeySet::EMPTY);
        net.poll(&player_at(2, 2), &idle, 0.04, &mut signals);
        net.poll(&player_at(2, 2), &idle, 0.04, &mut signals);
        assert!(!light_on(&net, "I1"));
        net.poll(&player_at(2, 2), &idle, 0.04, &mut signals);
        assert!(light_on(&net, "I1"));
    }

    #[test]
    fn unresolved_bindings_are_dropped() {
        let mut net = switch_and_light();
        assert!(!net.add_bind("S1", "NOPE", 0));
        assert!(!net.add_bind("NOPE", "I1", 0));
        assert_eq!(net.activator("S1").map(|a| a.bound.len()), Some(1));
    }

    fn laser() -> ActivationNetwork {
        let mut net = ActivationNetwork::new();
        net.add_activator(Activator::new("Z1", 0, 0, ActivatorKind::Emitter { next: None, beam: vec![] }));
        net.add_activator(Activator::new("MA", 4, 0, ActivatorKind::Mirror { targets: vec![], next: 0 }));
        net.add_activator(Activator::new("MB", 4, 5, ActivatorKind::Mirror { targets: vec![], next: 0 }));
        net.add_activator(Activator::new("MC", 9, 0, ActivatorKind::Mirror { targets: vec![], next: 0 }));
        assert!(net.add_bind("Z1", "MA", 0));
        assert!(net.add_bind("MA", "MB", 0));
        assert!(net.add_bind("MA", "MC", 0));
        net
    }

    #[test]
    fn emitter_beam_and_trigger_order() {
        let mut net = laser();
        let mut signals = vec![];
        net.poll(&player_at(20, 20), &FrameInput::default(), 0.04, &mut signals);

        let pos = |id: &str| net.activator(id).map(|a| a.position()).unwrap_or_default();
        let beam = net.activator("Z1").map(|a| a.beam().to_vec()).unwrap_or_default();
        assert_eq!(beam, vec![pos("Z1"), pos("MA"), pos("MB")]);

        let lit: Vec<&Signal> = signals.iter().filter(|s| matches!(s, Signal::MirrorLit { .. })).collect();
        assert_eq!(lit, vec![
            &Signal::MirrorLit { id: "MA".into() },
            &Signal::MirrorLit { id: "MB".into() },
        ]);

        // Steady state: no repeat signals.
        signals.clear();
        net.poll(&player_at(20, 20), &FrameInput::default(), 0.04, &mut signals);
        assert!(signals.is_empty());
    }

    #[test]
    fn rotating_mirror_moves_the_beam() {
        let mut net = laser();
        net.add_activator(Activator::new("T1", 1, 3, ActivatorKind::Switch { rotary: true }));
        assert!(net.add_bind("T1", "MA", 0));

        let mut signals = vec![];
        let mut tracker = InputTracker::new();
        let idle = tracker.advance(KeySet::EMPTY);
        net.poll(&player_at(20, 20), &idle, 0.04, &mut signals);
        assert!(net.activator("MB").map_or(false, |m| m.on));

        signals.clear();
        let press = tracker.advance(KeySet::of(&[Key::Interact]));
        net.poll(&player_at(1, 3), &press, 0.04, &mut signals);
        assert!(signals.contains(&Signal::MirrorDark { id: "MB".into() }));
        assert!(signals.contains(&Signal::MirrorLit { id: "MC".into() }));
        assert!(!net.activator("MB").map_or(true, |m| m.on));

        let pos = |id: &str| net.activator(id).map(|a| a.position()).unwrap_or_default();
        let beam = net.activator("Z1").map(|a| a.beam().to_vec()).unwrap_or_default();
        assert_eq!(beam.last().copied(), Some(pos("MC")));
    }

    #[test]
    fn lit_mirror_syncs_bound_responders() {
        let mut net = laser();
        net.add_responder("D1", Responder::Chain { chain: 0, active: false });
        assert!(net.add_bind("MB", "D1", 0));

        let mut signals = vec![];
        let idle = FrameInput::default();
        // "MB" polls before "Z1", so the sync lags the beam by one tick.
        assert!(net.poll(&player_at(20, 20), &idle, 0.04, &mut signals).is_empty());
        let effects = net.poll(&player_at(20, 20), &idle, 0.04, &mut signals);
        assert_eq!(effects, vec![Effect::SetChain { chain: 0, active: true }]);
        assert!(net.poll(&player_at(20, 20), &idle, 0.04, &mut signals).is_empty());
    }

    #[test]
    fn steady_beam_raises_water_once() {
        let mut grid = grid_from(&[
            "#...#",
            "#...#",
            "#...#",
            "#...#",
            "#.W.#",
            "#####",
        ]);
        let mut net = ActivationNetwork::new();
        net.add_activator(Activator::new("Z1", 0, 0, ActivatorKind::Emitter { next: None, beam: vec![] }));
        net.add_activator(Activator::new("MA", 4, 0, ActivatorKind::Mirror { targets: vec![], next: 0 }));
        net.add_responder("W1", Responder::Source(WaterSource::new(2, 4, 1)));
        assert!(net.add_bind("Z1", "MA", 0));
        assert!(net.add_bind("MA", "W1", 0));

        let mut signals = vec![];
        let flooded: Vec<usize> = (0..6)
            .map(|_| {
                net.poll(&player_at(20, 20), &FrameInput::default(), 0.04, &mut signals);
                net.update_water(&mut grid).0
            })
            .collect();
        // Seed fill, then a single rise when the mirror lights.
        assert_eq!(flooded, vec![2, 3, 0, 0, 0, 0]);
        assert_eq!(grid.get_collision(1, 3), TileCollision::Water);
        assert_eq!(grid.get_collision(1, 2), TileCollision::Passable);
    }

    #[test]
    fn mirror_switches_responders_off_when_it_goes_dark() {
        let mut net = laser();
        net.add_activator(Activator::new("T1", 1, 3, ActivatorKind::Switch { rotary: true }));
        net.add_responder("I1", Responder::Light { col: 6, row: 5, on: false });
        assert!(net.add_bind("T1", "MA", 0));
        assert!(net.add_bind("MB", "I1", 0));

        let mut signals = vec![];
        let mut tracker = InputTracker::new();
        for _ in 0..2 {
            let idle = tracker.advance(KeySet::EMPTY);
            net.poll(&player_at(20, 20), &idle, 0.04, &mut signals);
        }
        assert!(light_on(&net, "I1"));

        // Rotating MA to MC darkens MB; its light follows on MB's next poll.
        let press = tracker.advance(KeySet::of(&[Key::Interact]));
        net.poll(&player_at(1, 3), &press, 0.04, &mut signals);
        let idle = tracker.advance(KeySet::EMPTY);
        net.poll(&player_at(20, 20), &idle, 0.04, &mut signals);
        assert!(!light_on(&net, "I1"));
    }

    #[test]
    fn mirror_cycle_terminates() {
        let mut net = laser();
        assert!(net.add_bind("MB", "MA", 0));
        let mut signals = vec![];
        net.poll(&player_at(20, 20), &FrameInput::default(), 0.04, &mut signals);
        let beam = net.activator("Z1").map(|a| a.beam().len()).unwrap_or(0);
        assert_eq!(beam, 3);
    }

    #[test]
    fn spawner_only_turns_on() {
        let mut net = ActivationNetwork::new();
        net.add_responder("P1", Responder::Spawner { col: 1, row: 1, on: false });
        net.add_responder("P2", Responder::Spawner { col: 8, row: 1, on: false });
        let mut signals = vec![];

        net.change_state("P1", &mut signals);
        assert_eq!(net.active_spawn().map(String::as_str), Some("P1"));
        net.change_state("P1", &mut signals);
        assert!(light_on(&net, "P1"));

        net.change_state("P2", &mut signals);
        assert_eq!(net.active_spawn().map(String::as_str), Some("P2"));
        assert!(!light_on(&net, "P1"));
        assert!(light_on(&net, "P2"));
        assert_eq!(net.spawners(), &["P1".to_string(), "P2".to_string()]);
    }

    #[test]
    fn ladder_and_chain_effects_leave_the_network() {
        let mut net = ActivationNetwork::new();
        net.add_responder("l1", Responder::Ladder { col: 3, row: 4, active: false });
        net.add_responder("H1", Responder::Chain { chain: 2, active: true });
        let mut signals = vec![];
        assert_eq!(
            net.change_state("l1", &mut signals),
            Some(Effect::SetLadder { col: 3, row: 4, active: true })
        );
        assert_eq!(
            net.change_state("H1", &mut signals),
            Some(Effect::SetChain { chain: 2, active: false })
        );
        assert_eq!(net.activate("H1", &mut signals), Some(Effect::SetChain { chain: 2, active: true }));
        assert_eq!(net.activate("H1", &mut signals), None);
    }

    #[test]
    fn routes_are_fixed_at_bind_time() {
        let emitter = ActivatorKind::Emitter { next: None, beam: vec![] };
        let mirror = ActivatorKind::Mirror { targets: vec![], next: 0 };
        let switch = ActivatorKind::Switch { rotary: false };
        assert_eq!(route(&emitter, true), Some(Route::Aim));
        assert_eq!(route(&emitter, false), None);
        assert_eq!(route(&mirror, true), Some(Route::Reflect));
        assert_eq!(route(&mirror, false), Some(Route::Sync));
        assert_eq!(route(&switch, true), Some(Route::Toggle));
    }
}
