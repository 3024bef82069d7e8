/// The step function: advances the world by one tick.
///
/// Processing order while playing:
///   1. Level update (activators, water, moving chains)
///   2. Player physics against the grid and the chain bodies
///   3. Exit / death transitions
///
/// A dead player keeps the level running; activators just stop seeing input.

use tracing::{info, warn};

use crate::domain::entity::{FrameInput, KeySet};
use crate::domain::player::Surroundings;
use super::event::GameEvent;
use super::world::{Phase, WorldState};

/// Ticks the level title is shown before play starts.
pub const INTRO_TICKS: u32 = 25;
/// Ticks of death animation before the automatic respawn.
pub const RESPAWN_TICKS: u32 = 30;
/// Ticks between taking an exit and loading the next level.
pub const OUTRO_TICKS: u32 = 25;

// ══════════════════════════════════════════════════════════════
// Main entry point
// ══════════════════════════════════════════════════════════════

pub fn step(world: &mut WorldState, held: KeySet) -> Vec<GameEvent> {
    let mut events: Vec<GameEvent> = Vec::new();
    if world.paused { return events; }
    world.tick += 1;

    if world.message_timer > 0 {
        world.message_timer -= 1;
        if world.message_timer == 0 { world.message.clear(); }
    }

    match world.phase {
        Phase::LevelIntro => {
            world.anim_tick += 1;
            if world.anim_tick >= INTRO_TICKS {
                world.phase = Phase::Playing;
                world.tracker.reset();
            }
        }
        Phase::Playing | Phase::Dying => simulate(world, held, &mut events),
        Phase::LevelComplete => {
            world.anim_tick += 1;
            if world.anim_tick >= OUTRO_TICKS {
                advance_level(world);
            }
        }
        Phase::Title | Phase::GameComplete => {}
    }

    events
}

// ══════════════════════════════════════════════════════════════
// Simulation
// ══════════════════════════════════════════════════════════════

fn simulate(world: &mut WorldState, held: KeySet, events: &mut Vec<GameEvent>) {
    let input = if world.phase == Phase::Playing {
        world.tracker.advance(held)
    } else {
        FrameInput::default()
    };
    let Some(level) = world.level.as_mut() else { return };

    let mut signals = vec![];
    let water = level.update(&world.player.rect(), &input, world.elapsed, &mut signals);
    if water.flooded > 0 { events.push(GameEvent::WaterRose { tiles: water.flooded }); }
    if water.drained > 0 { events.push(GameEvent::WaterDrained { tiles: water.drained }); }

    let env = Surroundings { grid: &level.grid, bodies: level.bodies() };
    let report = world.player.update(&input, &env, &world.tuning);

    if report.jumped { events.push(GameEvent::PlayerJumped); }
    if report.landed { events.push(GameEvent::PlayerLanded); }
    if report.splashed { events.push(GameEvent::PlayerSplashed); }

    let mut exit = None;
    for signal in signals {
        let event = GameEvent::from(signal);
        if let GameEvent::ExitReached { target } = event {
            exit = Some(target);
        }
        events.push(event);
    }

    if report.died {
        player_die(world, events);
    } else if world.phase == Phase::Dying && world.player.dead_ticks() >= RESPAWN_TICKS {
        respawn(world, events);
    } else if let Some(target) = exit.filter(|_| world.player.is_alive()) {
        complete_level(world, target, events);
    }
}

fn player_die(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    world.phase = Phase::Dying;
    world.deaths += 1;
    let (col, row) = world.player_cell();
    info!(col, row, deaths = world.deaths, "player died");
    events.push(GameEvent::PlayerDied);
}

fn complete_level(world: &mut WorldState, target: Option<usize>, events: &mut Vec<GameEvent>) {
    let next = target.unwrap_or(world.current_level + 1);
    info!(level = world.current_level, next, "level complete");
    world.next_level = Some(next);
    world.phase = Phase::LevelComplete;
    world.anim_tick = 0;
    world.set_message(&format!("{} complete!", world.level_name()), OUTRO_TICKS);
    events.push(GameEvent::LevelCompleted);
}

fn advance_level(world: &mut WorldState) {
    let next = world.next_level.unwrap_or(world.current_level + 1);
    if next >= world.story.len() {
        info!(deaths = world.deaths, "story complete");
        world.phase = Phase::GameComplete;
        world.set_message("The End", 0);
        return;
    }
    start_level(world, next);
}

// ══════════════════════════════════════════════════════════════
// Commands
// ══════════════════════════════════════════════════════════════

/// Load story level `index`. A level that fails to build sends the game
/// back to the title with the error shown.
pub fn start_level(world: &mut WorldState, index: usize) {
    if let Err(e) = world.load_level(index) {
        warn!(index, error = %e, "level failed to load");
        world.phase = Phase::Title;
        world.set_message(&format!("Level {} failed: {e}", index + 1), 120);
    }
}

/// Restart at the active spawner. Allowed any time during play.
pub fn respawn(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    if !matches!(world.phase, Phase::Playing | Phase::Dying) { return; }
    world.place_player();
    world.phase = Phase::Playing;
    let (col, row) = world.player_cell();
    info!(col, row, "player respawned");
    events.push(GameEvent::PlayerRespawned);
}

/// Move the active spawn to the next spawner in creation order and
/// respawn there.
pub fn cycle_spawn(world: &mut WorldState, events: &mut Vec<GameEvent>) {
    if !matches!(world.phase, Phase::Playing | Phase::Dying) { return; }
    let Some(level) = world.level.as_mut() else { return };
    let spawners = level.network.spawners();
    if spawners.is_empty() { return; }

    let current = level
        .network
        .active_spawn()
        .and_then(|active| spawners.iter().position(|s| s == active));
    let next = current.map_or(0, |i| (i + 1) % spawners.len());
    let id = spawners[next].clone();

    let mut signals = vec![];
    level.update_spawn(&id, &mut signals);
    events.extend(signals.into_iter().map(GameEvent::from));
    respawn(world, events);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::domain::activation::ActivatorKind;
    use crate::domain::entity::Key;
    use crate::domain::player::Player;
    use crate::sim::loader::Story;

    fn playing(index: usize) -> WorldState {
        let mut world = WorldState::new(Story::embedded(), &GameConfig::default());
        world.load_level(index).unwrap();
        for _ in 0..INTRO_TICKS {
            step(&mut world, KeySet::EMPTY);
        }
        assert_eq!(world.phase, Phase::Playing);
        world
    }

    fn exit_cell(world: &WorldState) -> (i32, i32) {
        let level = world.level.as_ref().unwrap();
        let exit = level
            .network
            .activators()
            .find(|a| matches!(a.kind, ActivatorKind::Exit { .. }))
            .unwrap();
        (exit.col, exit.row)
    }

    fn take_exit(world: &mut WorldState) -> Vec<GameEvent> {
        let (col, row) = exit_cell(world);
        world.player = Player::spawn_at(col, row);
        step(world, KeySet::of(&[Key::Interact]))
    }

    fn spawn(world: &WorldState) -> (i32, i32) {
        world.level.as_ref().and_then(|l| l.spawn_cell()).unwrap()
    }

    #[test]
    fn nothing_happens_on_the_title() {
        let mut world = WorldState::new(Story::embedded(), &GameConfig::default());
        assert!(step(&mut world, KeySet::of(&[Key::Right])).is_empty());
        assert_eq!(world.phase, Phase::Title);
    }

    #[test]
    fn paused_world_does_not_advance() {
        let mut world = playing(0);
        world.paused = true;
        let before = world.player.position;
        let tick = world.tick;
        step(&mut world, KeySet::of(&[Key::Right]));
        assert_eq!(world.tick, tick);
        assert_eq!(world.player.position, before);
    }

    #[test]
    fn spikes_kill_and_the_player_respawns() {
        let mut world = playing(0);
        let died = (0..200).any(|_| step(&mut world, KeySet::of(&[Key::Right])).contains(&GameEvent::PlayerDied));
        assert!(died);
        assert_eq!(world.phase, Phase::Dying);
        assert_eq!(world.deaths, 1);

        let respawned = (0..RESPAWN_TICKS + 5).any(|_| step(&mut world, KeySet::EMPTY).contains(&GameEvent::PlayerRespawned));
        assert!(respawned);
        assert_eq!(world.phase, Phase::Playing);
        assert!(world.player.is_alive());
        assert_eq!(world.player_cell(), spawn(&world));
    }

    #[test]
    fn exit_leads_to_the_next_level() {
        let mut world = playing(0);
        let events = take_exit(&mut world);
        assert!(events.contains(&GameEvent::ExitReached { target: None }));
        assert!(events.contains(&GameEvent::LevelCompleted));
        assert_eq!(world.phase, Phase::LevelComplete);

        for _ in 0..OUTRO_TICKS {
            step(&mut world, KeySet::EMPTY);
        }
        assert_eq!(world.current_level, 1);
        assert_eq!(world.phase, Phase::LevelIntro);
        assert_eq!(world.level_name(), "Rising Tide");
    }

    #[test]
    fn numbered_exit_jumps_to_its_level() {
        let mut world = playing(1);
        let events = take_exit(&mut world);
        assert!(events.contains(&GameEvent::ExitReached { target: Some(2) }));
        assert_eq!(world.next_level, Some(2));
    }

    #[test]
    fn last_exit_completes_the_story() {
        let mut world = playing(2);
        take_exit(&mut world);
        for _ in 0..OUTRO_TICKS {
            step(&mut world, KeySet::EMPTY);
        }
        assert_eq!(world.phase, Phase::GameComplete);
    }

    #[test]
    fn respawn_key_restarts_at_the_spawner() {
        let mut world = playing(0);
        for _ in 0..5 {
            step(&mut world, KeySet::of(&[Key::Right]));
        }
        assert_ne!(world.player.position, Player::spawn_at(spawn(&world).0, spawn(&world).1).position);
        let mut events = vec![];
        respawn(&mut world, &mut events);
        assert_eq!(events, vec![GameEvent::PlayerRespawned]);
        assert_eq!(world.player_cell(), spawn(&world));
    }

    #[test]
    fn cycle_spawn_walks_the_spawners_in_order() {
        let mut world = playing(2);
        let spawners = world.level.as_ref().unwrap().network.spawners().to_vec();
        assert_eq!(spawners.len(), 2);
        let first = spawn(&world);

        let mut events = vec![];
        cycle_spawn(&mut world, &mut events);
        assert!(events.contains(&GameEvent::SpawnChanged { id: spawners[1].clone() }));
        assert!(events.contains(&GameEvent::PlayerRespawned));
        assert_ne!(spawn(&world), first);
        assert_eq!(world.player_cell(), spawn(&world));

        cycle_spawn(&mut world, &mut events);
        assert_eq!(spawn(&world), first);
    }

    #[test]
    fn failed_load_returns_to_the_title() {
        let mut world = WorldState::new(Story::embedded(), &GameConfig::default());
        start_level(&mut world, 7);
        assert_eq!(world.phase, Phase::Title);
        assert!(world.message.contains("failed"));
    }
}
