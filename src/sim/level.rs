/// A playable level: the tile grid plus everything living on it.
///
/// ## Tick order
///
///   1. Activators poll the player and fire (`ActivationNetwork::poll`)
///   2. Grid tiles update (water sources and drains)
///   3. Moving chains update against the grid and each other
///
/// Player physics runs after this, in `step`, against the bodies produced
/// by step 3. An activator that opens a door in step 1 is seen by the door
/// in step 3 of the same tick.

use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::activation::{Activator, ActivationNetwork, Effect, Responder, Signal, TileId};
use crate::domain::entity::FrameInput;
use crate::domain::geometry::{Rect, Vec2};
use crate::domain::grid::TileGrid;
use crate::domain::moveable::{ChainArena, ChainKind, Door, MovementBehavior, Sliding};
use crate::domain::player::Body;
use crate::domain::tile::{Sprite, Tile, TileCollision};

use super::error::LevelError;

/// Tiles changed by water this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WaterChange {
    pub flooded: usize,
    pub drained: usize,
}

#[derive(Debug)]
pub struct Level {
    pub name: String,
    pub grid: TileGrid,
    pub network: ActivationNetwork,
    pub chains: ChainArena,
    chain_ids: BTreeMap<TileId, usize>,
    bodies: Vec<Body>,
}

impl Level {
    pub fn new(name: &str, width: usize, height: usize) -> Self {
        Level {
            name: name.to_string(),
            grid: TileGrid::new(width, height),
            network: ActivationNetwork::new(),
            chains: ChainArena::new(),
            chain_ids: BTreeMap::new(),
            bodies: vec![],
        }
    }

    // ══════════════════════════════════════════════════════════
    // Construction surface
    // ══════════════════════════════════════════════════════════

    pub fn add_tile(&mut self, col: i32, row: i32, tile: Tile) {
        self.grid.set_tile(col, row, tile);
    }

    pub fn add_activator(&mut self, activator: Activator) -> Result<(), LevelError> {
        self.check_unique(&activator.id, activator.col, activator.row)?;
        self.network.add_activator(activator);
        Ok(())
    }

    pub fn add_activatable(&mut self, id: &str, col: i32, row: i32, responder: Responder) -> Result<(), LevelError> {
        self.check_unique(id, col, row)?;
        self.network.add_responder(id, responder);
        Ok(())
    }

    fn check_unique(&self, id: &str, col: i32, row: i32) -> Result<(), LevelError> {
        if self.network.contains(id) {
            return Err(LevelError::DuplicateId { id: id.to_string(), col, row });
        }
        Ok(())
    }

    /// Add a moving tile. Tiles sharing an id form one chain, led by the first.
    pub fn add_moveable(
        &mut self,
        id: &str,
        col: i32,
        row: i32,
        kind: ChainKind,
        angle: f32,
        speed: f32,
    ) -> Result<usize, LevelError> {
        let chain = match self.chain_ids.get(id) {
            Some(&chain) => chain,
            None => {
                self.check_unique(id, col, row)?;
                let behavior: Box<dyn MovementBehavior> = match kind {
                    ChainKind::Sliding => Box::new(Sliding::new()),
                    ChainKind::Door => Box::new(Door::new()),
                };
                let active = behavior.is_active();
                let chain = self.chains.add_chain(id, behavior);
                self.chain_ids.insert(id.to_string(), chain);
                self.network.add_responder(id, Responder::Chain { chain, active });
                chain
            }
        };
        let collision = match kind {
            ChainKind::Sliding => TileCollision::Platform,
            ChainKind::Door => TileCollision::Impassable,
        };
        self.chains.add_member(chain, col, row, angle, speed, collision);
        Ok(chain)
    }

    pub fn add_bind(&mut self, actor: &str, target: &str, delay_ms: u32) -> bool {
        self.network.add_bind(actor, target, delay_ms)
    }

    // ══════════════════════════════════════════════════════════
    // Activation surface
    // ══════════════════════════════════════════════════════════

    pub fn activate(&mut self, id: &str, signals: &mut Vec<Signal>) {
        if let Some(effect) = self.network.activate(id, signals) {
            self.apply(effect);
        }
    }

    pub fn change_state(&mut self, id: &str, signals: &mut Vec<Signal>) {
        if let Some(effect) = self.network.change_state(id, signals) {
            self.apply(effect);
        }
    }

    pub fn update_spawn(&mut self, id: &str, signals: &mut Vec<Signal>) {
        self.network.update_spawn(id, signals);
    }

    /// Cell of the active spawner.
    pub fn spawn_cell(&self) -> Option<(i32, i32)> {
        let id = self.network.active_spawn()?;
        self.network.responder(id).and_then(Responder::cell)
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::SetLadder { col, row, active } => {
                let Some(tile) = self.grid.tile_mut(col, row) else { return };
                if active {
                    tile.collision = TileCollision::Ladder;
                    tile.visual = Some(Sprite::Ladder);
                } else if tile.flooded {
                    // Water stays where it was when the ladder went in
                    tile.flood();
                } else {
                    *tile = Tile::passable();
                }
            }
            Effect::SetChain { chain, active } => {
                self.chains.set_active(chain, active);
            }
            Effect::ClaimSpawn | Effect::Reroute { .. } => {
                debug!(?effect, "network-internal effect reached the level");
            }
        }
    }

    // ══════════════════════════════════════════════════════════
    // Tick
    // ══════════════════════════════════════════════════════════

    pub fn update(&mut self, player: &Rect, input: &FrameInput, elapsed: f32, signals: &mut Vec<Signal>) -> WaterChange {
        for effect in self.network.poll(player, input, elapsed, signals) {
            self.apply(effect);
        }

        let (flooded, drained) = self.network.update_water(&mut self.grid);

        let before: Vec<Vec2> = self.chains.members().iter().map(|m| m.position).collect();
        self.chains.update(&self.grid, elapsed);
        self.bodies = self
            .chains
            .members()
            .iter()
            .zip(before)
            .map(|(m, was)| Body { rect: m.rect(), collision: m.collision, carry: m.position - was })
            .collect();

        WaterChange { flooded, drained }
    }

    /// Chain members as the player sees them after the last update.
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }
}
