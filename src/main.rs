/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::fs::File;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::info;
use tracing_subscriber::EnvFilter;

use config::GameConfig;
use domain::entity::KeySet;
use sim::event::GameEvent;
use sim::loader::Story;
use sim::step;
use sim::world::{Phase, WorldState};
use ui::gamepad::GamepadState;
use ui::input::{Command, InputState};
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

fn main() {
    let config = GameConfig::load();
    init_logging(&config);
    info!(tick_rate_ms = config.timing.tick_rate_ms, "starting");

    let story = Story::discover(config.story.as_deref());
    let mut world = WorldState::new(story, &config);

    let mut renderer = Renderer::new();
    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let sound = SoundEngine::new();

    let result = game_loop(&mut world, &mut renderer, sound.as_ref(), &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }

    info!(deaths = world.deaths, "exiting");
    println!();
    println!("Thanks for playing PlayDead!");
    println!("Deaths: {}", world.deaths);
}

/// The terminal belongs to the game, so logs go to a file.
/// `RUST_LOG` overrides the configured filter.
fn init_logging(config: &GameConfig) {
    let file = match File::create(&config.log.file) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {e}", config.log.file.display());
            return;
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    if let Err(e) = installed {
        eprintln!("Warning: logging disabled: {e}");
    }
}

fn game_loop(
    world: &mut WorldState,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut gp = GamepadState::new();
    gp.load_button_config(&config.gamepad);
    let tick_rate = Duration::from_millis(config.timing.tick_rate_ms);
    let mut last_tick = Instant::now();

    // Keys seen since the last tick, so a tap between ticks still counts
    let mut latched = KeySet::EMPTY;

    loop {
        kb.drain_events();
        gp.update();

        if kb.ctrl_c_pressed() {
            break;
        }

        let mut events: Vec<GameEvent> = Vec::new();
        let mut commands = kb.commands();
        commands.extend(gp.commands());
        if handle_commands(world, &commands, &mut events) {
            break;
        }

        latched = latched.union(kb.held_keys()).union(gp.held_keys());

        if last_tick.elapsed() >= tick_rate {
            events.extend(step::step(world, latched));
            latched = KeySet::EMPTY;
            last_tick = Instant::now();
        }

        if let Some(sfx) = sound {
            sfx.play_events(&events);
        }

        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

fn return_to_title(world: &mut WorldState) {
    world.level = None;
    world.paused = false;
    world.phase = Phase::Title;
    world.message.clear();
    world.message_timer = 0;
}

/// Apply one-shot commands. Returns true to quit.
fn handle_commands(world: &mut WorldState, commands: &[Command], events: &mut Vec<GameEvent>) -> bool {
    let in_game = matches!(
        world.phase,
        Phase::LevelIntro | Phase::Playing | Phase::Dying | Phase::LevelComplete
    );

    for &command in commands {
        match (world.phase, command) {
            (_, Command::Quit) | (Phase::Title, Command::Back) => return true,
            (Phase::Title, Command::Confirm) => step::start_level(world, 0),
            (Phase::GameComplete, Command::Confirm | Command::Back) => return_to_title(world),
            (_, Command::Back) if in_game => {
                info!(level = world.current_level, "back to title");
                return_to_title(world);
            }
            (_, Command::Pause | Command::Confirm) if in_game => {
                world.paused = !world.paused;
            }
            (_, Command::Respawn) => {
                world.paused = false;
                step::respawn(world, events);
            }
            (_, Command::CycleSpawn) if !world.paused => step::cycle_spawn(world, events),
            _ => {}
        }
    }
    false
}
