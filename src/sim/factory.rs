/// LevelFactory: level description → playable `Level`.
///
/// ## Tile legend (first character of each token)
///   '.' = Empty                  '#' = Solid block (random variant)
///   '~' '-' = Platform           ':' = Background block (passable)
///   'L' = Ladder                 'l' = Switchable ladder (starts off)
///   '^' = Spikes                 'P' = Spawn point
///   'I' = Light                  'S' 'B' = Switch     'T' = Rotary switch
///   'X' = Exit (`X3` → level 3)  'Z' = Laser emitter  'M' = Mirror
///   'W' = Water source           'E' = Water drain
///   'H' = Sliding block →        'V' = Sliding block ↓
///   'D' = Door
///
/// The whole token is the id. Moving tiles sharing an id form one chain; a
/// bare `H`/`V`/`D` joins the same bare token to its left, else above.
/// Other bare tokens get a position-based id.
///
/// Unknown characters build an empty tile. Bindings that name unknown ids
/// are dropped with a warning. A level without a spawn point or an exit is
/// rejected.

use std::collections::BTreeMap;
use std::f32::consts::FRAC_PI_2;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::TuningConfig;
use crate::domain::activation::{Activator, ActivatorKind, Responder, Signal};
use crate::domain::moveable::ChainKind;
use crate::domain::tile::{Fixture, Sprite, Tile, TileCollision};
use crate::domain::water::{WaterDrain, WaterSource};

use super::error::LevelError;
use super::level::Level;
use super::loader::LevelDescription;

/// Constant so every build of a level looks the same.
const VARIETY_SEED: u64 = 354668;
const BLOCK_A_VARIANTS: u8 = 7;
const BLOCK_B_VARIANTS: u8 = 2;

pub struct LevelFactory {
    tuning: TuningConfig,
    rng: StdRng,
}

impl LevelFactory {
    pub fn new(tuning: &TuningConfig) -> Self {
        LevelFactory { tuning: tuning.clone(), rng: StdRng::seed_from_u64(VARIETY_SEED) }
    }

    pub fn create_level(&mut self, desc: &LevelDescription) -> Result<Level, LevelError> {
        if desc.height() == 0 || desc.width() == 0 {
            return Err(LevelError::EmptyGrid);
        }
        self.rng = StdRng::seed_from_u64(VARIETY_SEED);

        let mut level = Level::new(&desc.name, desc.width(), desc.height());
        self.build(desc, &mut level)?;

        if level.network.spawners().is_empty() {
            return Err(LevelError::MissingSpawn);
        }
        if !level.network.has_exit() {
            return Err(LevelError::MissingExit);
        }

        let mut signals = Vec::new();
        bind(desc, &mut level, &mut signals);

        if level.network.active_spawn().is_none() {
            if let Some(first) = level.network.spawners().first().cloned() {
                level.update_spawn(&first, &mut signals);
            }
        }

        info!(
            name = %desc.name,
            width = desc.width(),
            height = desc.height(),
            chains = level.chains.chains().len(),
            "level built"
        );
        Ok(level)
    }

    // ══════════════════════════════════════════════════════════
    // Phase 1: tiles and components
    // ══════════════════════════════════════════════════════════

    fn build(&mut self, desc: &LevelDescription, level: &mut Level) -> Result<(), LevelError> {
        // Bare moving-tile tokens → the chain id they joined.
        let mut bare_chains: BTreeMap<(i32, i32), String> = BTreeMap::new();

        for (row, tokens) in desc.rows.iter().enumerate() {
            for (col, token) in tokens.iter().enumerate() {
                let (col, row) = (col as i32, row as i32);
                let Some(kind) = token.chars().next() else { continue };
                let id = if token.chars().count() > 1 {
                    token.clone()
                } else if matches!(kind, 'H' | 'V' | 'D') {
                    let joined = [(col - 1, row), (col, row - 1)]
                        .iter()
                        .filter(|cell| desc_token(desc, **cell) == Some(token.as_str()))
                        .find_map(|cell| bare_chains.get(cell).cloned());
                    let id = joined.unwrap_or_else(|| format!("{kind}@{col},{row}"));
                    bare_chains.insert((col, row), id.clone());
                    id
                } else {
                    format!("{kind}@{col},{row}")
                };

                let tile = self.create_tile(kind);
                level.add_tile(col, row, tile);
                self.create_component(kind, token, &id, col, row, level)?;
            }
        }
        Ok(())
    }

    fn create_tile(&mut self, kind: char) -> Tile {
        match kind {
            '#' => Tile::new(Some(Sprite::BlockA(self.rng.gen_range(0..BLOCK_A_VARIANTS))), TileCollision::Impassable),
            '~' | '-' => Tile::new(Some(Sprite::BlockB(self.rng.gen_range(0..BLOCK_B_VARIANTS))), TileCollision::Platform),
            ':' => Tile::new(Some(Sprite::BlockB(self.rng.gen_range(0..BLOCK_B_VARIANTS))), TileCollision::Passable),
            'L' => Tile::new(Some(Sprite::Ladder), TileCollision::Ladder),
            '^' => Tile::new(Some(Sprite::Spikes), TileCollision::Death),
            'W' => Tile::fixture(Fixture::WaterSource),
            'E' => Tile::fixture(Fixture::WaterDrain),
            '.' | 'l' | 'P' | 'I' | 'S' | 'B' | 'T' | 'X' | 'Z' | 'M' | 'H' | 'V' | 'D' => Tile::passable(),
            other => {
                debug!(kind = %other, "unknown tile kind, left empty");
                Tile::passable()
            }
        }
    }

    fn create_component(
        &self,
        kind: char,
        token: &str,
        id: &str,
        col: i32,
        row: i32,
        level: &mut Level,
    ) -> Result<(), LevelError> {
        let activator = |k: ActivatorKind| Activator::new(id, col, row, k);
        match kind {
            'S' | 'B' => level.add_activator(activator(ActivatorKind::Switch { rotary: false })),
            'T' => level.add_activator(activator(ActivatorKind::Switch { rotary: true })),
            'X' => {
                let target = token[1..].parse::<usize>().ok();
                level.add_activator(activator(ActivatorKind::Exit { target }))
            }
            'Z' => level.add_activator(activator(ActivatorKind::Emitter { next: None, beam: vec![] })),
            'M' => level.add_activator(activator(ActivatorKind::Mirror { targets: vec![], next: 0 })),
            'P' => level.add_activatable(id, col, row, Responder::Spawner { col, row, on: false }),
            'I' => level.add_activatable(id, col, row, Responder::Light { col, row, on: false }),
            'l' => level.add_activatable(id, col, row, Responder::Ladder { col, row, active: false }),
            'W' => {
                let source = WaterSource::new(col, row, self.tuning.initial_water_level);
                level.add_activatable(id, col, row, Responder::Source(source))
            }
            'E' => level.add_activatable(id, col, row, Responder::Drain(WaterDrain::new(col, row))),
            'H' => level
                .add_moveable(id, col, row, ChainKind::Sliding, 0.0, self.tuning.sliding_speed)
                .map(|_| ()),
            'V' => level
                .add_moveable(id, col, row, ChainKind::Sliding, FRAC_PI_2, self.tuning.sliding_speed)
                .map(|_| ()),
            'D' => level
                .add_moveable(id, col, row, ChainKind::Door, 0.0, self.tuning.door_speed)
                .map(|_| ()),
            _ => Ok(()),
        }
    }
}

fn desc_token(desc: &LevelDescription, (col, row): (i32, i32)) -> Option<&str> {
    if col < 0 || row < 0 {
        return None;
    }
    desc.rows.get(row as usize)?.get(col as usize).map(String::as_str)
}

// ══════════════════════════════════════════════════════════════
// Phase 2: bindings
// ══════════════════════════════════════════════════════════════

fn bind(desc: &LevelDescription, level: &mut Level, signals: &mut Vec<Signal>) {
    for line in &desc.bindings {
        if line.is_activation() {
            for id in &line.targets {
                level.activate(id, signals);
            }
        } else {
            for target in &line.targets {
                level.add_bind(&line.actor, target, line.delay_ms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::domain::activation::Activatable;
    use crate::domain::tile::TILE_HEIGHT;
    use crate::sim::loader::{parse_level, Story};

    fn build(text: &str) -> Result<Level, LevelError> {
        let desc = parse_level("test", text)?;
        LevelFactory::new(&GameConfig::default().tuning).create_level(&desc)
    }

    #[test]
    fn builds_every_embedded_level() {
        let story = Story::embedded();
        let mut factory = LevelFactory::new(&GameConfig::default().tuning);
        for i in 0..story.len() {
            let level = factory.create_level(&story.description(i).unwrap()).unwrap();
            assert!(level.spawn_cell().is_some());
        }
    }

    #[test]
    fn first_spawner_is_claimed() {
        let level = build("P1,.,P2,X\n#,#,#,#\nEND\n").unwrap();
        assert_eq!(level.spawn_cell(), Some((0, 0)));
        assert_eq!(level.network.spawners().len(), 2);
    }

    #[test]
    fn active_line_picks_the_spawn() {
        let level = build("P1,.,P2,X,I1\n#,#,#,#,#\nEND\nACTIVE, 0, P2, I1\n").unwrap();
        assert_eq!(level.spawn_cell(), Some((2, 0)));
        assert!(level.network.responder("I1").map_or(false, |r| r.is_active()));
    }

    #[test]
    fn missing_spawn_or_exit_is_an_error() {
        assert!(matches!(build(".,X\nEND\n"), Err(LevelError::MissingSpawn)));
        assert!(matches!(build("P,.\nEND\n"), Err(LevelError::MissingExit)));
    }

    #[test]
    fn duplicate_id_is_an_error() {
        let err = build("P1,S1,S1,X\nEND\n").unwrap_err();
        assert!(matches!(err, LevelError::DuplicateId { col: 2, row: 0, .. }));
    }

    #[test]
    fn bare_tokens_get_distinct_ids() {
        let level = build("P,P,X,X\nEND\n").unwrap();
        assert_eq!(level.network.spawners().len(), 2);
        assert_eq!(level.network.activators().count(), 2);
    }

    #[test]
    fn unresolved_binding_is_dropped() {
        let level = build("P1,S1,X\nEND\nS1, 0, NOPE\nNOPE, 0, S1\n").unwrap();
        assert!(level.network.activator("S1").map_or(false, |s| s.bound.is_empty()));
    }

    #[test]
    fn chains_form_by_id_and_adjacency() {
        let level = build("P,H1,.,H1,H,H,.,H\nX,V,.,.,.,.,.,.\n.,V,.,.,.,.,.,.\nEND\n").unwrap();
        let chains = level.chains.chains();
        // H1 (two members), bare H run, lone bare H, V column.
        assert_eq!(chains.len(), 4);
        let sizes: Vec<usize> = chains.iter().map(|c| c.members.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1, 2]);
        let v = &chains[3];
        let leader = level.chains.member(v.members[0]);
        assert_eq!(leader.leader, v.members[0]);
        assert_eq!(level.chains.member(v.members[1]).leader, v.members[0]);
        assert!((leader.angle - FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn doors_are_solid_and_closed() {
        let level = build("P,D1,X\n.,D1,.\nEND\n").unwrap();
        assert_eq!(level.chains.chain_kind(0), Some(ChainKind::Door));
        assert!(!level.chains.is_active(0));
        assert!(level.chains.members().iter().all(|m| m.collision == TileCollision::Impassable));
        assert_eq!(level.chains.member(1).home.y, TILE_HEIGHT);
    }

    #[test]
    fn exits_carry_their_target() {
        let level = build("P,X3,X\nEND\n").unwrap();
        let targets: Vec<Option<usize>> = level
            .network
            .activators()
            .filter_map(|a| match a.kind {
                ActivatorKind::Exit { target } => Some(target),
                _ => None,
            })
            .collect();
        assert!(targets.contains(&Some(3)));
        assert!(targets.contains(&None));
    }

    #[test]
    fn variety_is_reproducible() {
        let text = "#,#,#,#,#,#\n~,~,:,:,#,#\nP,.,.,.,.,X\nEND\n";
        let a = build(text).unwrap();
        let b = build(text).unwrap();
        let visuals = |l: &Level| l.grid.cells().map(|(_, _, t)| t.visual).collect::<Vec<_>>();
        assert_eq!(visuals(&a), visuals(&b));
        assert_eq!(a.grid.get_collision(2, 1), TileCollision::Passable);
        assert_eq!(a.grid.get_collision(0, 1), TileCollision::Platform);
    }

    #[test]
    fn water_fixtures_are_placed() {
        let level = build("P,W1,E1,X\n#,#,#,#\nEND\n").unwrap();
        assert_eq!(level.grid.tile(1, 0).fixture, Some(Fixture::WaterSource));
        assert_eq!(level.grid.get_collision(2, 0), TileCollision::Passable);
        assert!(matches!(level.network.responder("W1"), Some(Responder::Source(_))));
    }
}
