/// Keyboard input tracker.
///
/// Tracks which keys are currently held down, enabling:
///   - Running and climbing while a key is held
///   - Edge-triggered commands (respawn, pause) on the initial press
///
/// Held game keys are handed to the simulation as a `KeySet`; the
/// simulation does its own new-press detection per tick.
///
/// Uses crossterm's keyboard enhancement for Release events when available.
/// Falls back to timeout-based release detection on terminals that don't support it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::domain::entity::{Key, KeySet};

/// After this duration without a Press/Repeat event, consider the key released.
/// Only used when the terminal doesn't report Release events.
const HOLD_TIMEOUT: Duration = Duration::from_millis(160);

/// One-shot actions outside the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Confirm,
    Back,
    Pause,
    Respawn,
    CycleSpawn,
    Quit,
}

/// Game key for a terminal key code.
pub fn key_for(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => Some(Key::Left),
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => Some(Key::Right),
        KeyCode::Up | KeyCode::Char('w') | KeyCode::Char('W') | KeyCode::Char(' ') => Some(Key::Up),
        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => Some(Key::Down),
        KeyCode::Char('e') | KeyCode::Char('E') | KeyCode::Char('x') | KeyCode::Char('X') => Some(Key::Interact),
        _ => None,
    }
}

pub fn command_for(code: KeyCode) -> Option<Command> {
    match code {
        KeyCode::Enter => Some(Command::Confirm),
        KeyCode::Esc => Some(Command::Back),
        KeyCode::Char('p') | KeyCode::Char('P') => Some(Command::Pause),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(Command::Respawn),
        KeyCode::Tab => Some(Command::CycleSpawn),
        KeyCode::Char('q') | KeyCode::Char('Q') => Some(Command::Quit),
        _ => None,
    }
}

pub struct InputState {
    /// Timestamp of last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the last drain.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during drain, for Ctrl+C.
    raw_events: Vec<KeyEvent>,

    /// Whether to honor Release events. Only true when keyboard
    /// enhancement is confirmed working.
    pub honor_release: bool,
}

impl InputState {
    pub fn new() -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            honor_release: false,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call this once per frame, before the simulation tick.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.record(key, Instant::now());
            }
        }

        let now = Instant::now();
        self.last_active.retain(|_, t| now.duration_since(*t) < HOLD_TIMEOUT);
    }

    fn record(&mut self, key: KeyEvent, at: Instant) {
        self.raw_events.push(key);
        match key.kind {
            KeyEventKind::Release if self.honor_release => {
                self.last_active.remove(&key.code);
            }
            // Without enhancement, releases are inferred from the timeout
            KeyEventKind::Release => {}
            _ => {
                let was_held = self.is_held(key.code);
                self.last_active.insert(key.code, at);
                if !was_held {
                    self.fresh_presses.push(key.code);
                }
            }
        }
    }

    pub fn is_held(&self, code: KeyCode) -> bool {
        self.last_active
            .get(&code)
            .map(|t| t.elapsed() < HOLD_TIMEOUT)
            .unwrap_or(false)
    }

    /// Game keys held right now.
    pub fn held_keys(&self) -> KeySet {
        let mut keys = KeySet::EMPTY;
        for code in self.last_active.keys() {
            if let Some(key) = key_for(*code).filter(|_| self.is_held(*code)) {
                keys.insert(key);
            }
        }
        keys
    }

    /// Commands whose key was freshly pressed this frame, in press order.
    pub fn commands(&self) -> Vec<Command> {
        self.fresh_presses.iter().filter_map(|c| command_for(*c)).collect()
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }
}
