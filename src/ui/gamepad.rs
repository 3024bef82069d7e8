/// Gamepad input tracker using gilrs.
///
/// Button mapping is loaded from config.toml via `load_button_config()`.
/// Default mapping:
///   D-pad / Left Stick    →  Run / Climb
///   A / D-pad Up          →  Jump
///   X / B                 →  Interact (switches, exits)
///   Y                     →  Respawn
///   Start                 →  Confirm / Pause
///   Select                →  Back

#[cfg(feature = "gamepad")]
use gilrs::{Axis, Button, EventType, Gilrs};
#[cfg(feature = "gamepad")]
use tracing::debug;

use crate::config::GamepadConfig;
use crate::domain::entity::{Key, KeySet};

use super::input::Command;

#[cfg_attr(not(feature = "gamepad"), allow(dead_code))]
const STICK_DEADZONE: f32 = 0.25;

const BUTTON_COUNT: usize = 14;

/// Logical button identifiers (one per physical button).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Btn {
    A,       // South
    B,       // East
    X,       // West
    Y,       // North
    L1,
    R1,
    L2,
    R2,
    Start,
    Select,
    DPadUp,
    DPadDown,
    DPadLeft,
    DPadRight,
}

impl Btn {
    fn from_name(s: &str) -> Option<Btn> {
        match s.to_uppercase().as_str() {
            "A" | "SOUTH"  => Some(Btn::A),
            "B" | "EAST"   => Some(Btn::B),
            "X" | "WEST"   => Some(Btn::X),
            "Y" | "NORTH"  => Some(Btn::Y),
            "L1" | "LB" | "LEFTTRIGGER"  => Some(Btn::L1),
            "R1" | "RB" | "RIGHTTRIGGER" => Some(Btn::R1),
            "L2" | "LT" | "LEFTTRIGGER2"  => Some(Btn::L2),
            "R2" | "RT" | "RIGHTTRIGGER2" => Some(Btn::R2),
            "START" => Some(Btn::Start),
            "SELECT" | "BACK" => Some(Btn::Select),
            "DPADUP" | "UP" => Some(Btn::DPadUp),
            "DPADDOWN" | "DOWN" => Some(Btn::DPadDown),
            "DPADLEFT" | "LEFT" => Some(Btn::DPadLeft),
            "DPADRIGHT" | "RIGHT" => Some(Btn::DPadRight),
            _ => None,
        }
    }

    #[cfg(feature = "gamepad")]
    fn from_gilrs(btn: Button) -> Option<Btn> {
        match btn {
            Button::South     => Some(Btn::A),
            Button::East      => Some(Btn::B),
            Button::West      => Some(Btn::X),
            Button::North     => Some(Btn::Y),
            Button::LeftTrigger  => Some(Btn::L1),
            Button::RightTrigger => Some(Btn::R1),
            Button::LeftTrigger2  => Some(Btn::L2),
            Button::RightTrigger2 => Some(Btn::R2),
            Button::Start     => Some(Btn::Start),
            Button::Select    => Some(Btn::Select),
            Button::DPadUp    => Some(Btn::DPadUp),
            Button::DPadDown  => Some(Btn::DPadDown),
            Button::DPadLeft  => Some(Btn::DPadLeft),
            Button::DPadRight => Some(Btn::DPadRight),
            _ => None,
        }
    }
}

/// Per-button state: held (continuous) and just_pressed (edge).
#[derive(Clone, Copy, Debug, Default)]
struct BtnState {
    held: bool,
    just_pressed: bool,
}

/// Action-to-button mapping (loaded from config).
struct ActionMap {
    jump: Vec<Btn>,
    interact: Vec<Btn>,
    confirm: Vec<Btn>,
    cancel: Vec<Btn>,
    respawn: Vec<Btn>,
}

impl Default for ActionMap {
    fn default() -> Self {
        ActionMap {
            jump:     vec![Btn::A, Btn::DPadUp],
            interact: vec![Btn::X, Btn::B],
            confirm:  vec![Btn::Start],
            cancel:   vec![Btn::Select],
            respawn:  vec![Btn::Y],
        }
    }
}

pub struct GamepadState {
    #[cfg(feature = "gamepad")]
    gilrs: Option<Gilrs>,

    buttons: [BtnState; BUTTON_COUNT],

    // Left stick, as a digital direction
    stick_x: f32,
    stick_y: f32,

    action_map: ActionMap,
}

impl GamepadState {
    pub fn new() -> Self {
        #[cfg(feature = "gamepad")]
        let gilrs_opt = match Gilrs::new() {
            Ok(g) => {
                debug!(pads = g.gamepads().count(), "gamepad backend ready");
                Some(g)
            }
            Err(e) => {
                debug!(error = %e, "gamepad backend unavailable");
                None
            }
        };

        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: gilrs_opt,
            buttons: [BtnState::default(); BUTTON_COUNT],
            stick_x: 0.0,
            stick_y: 0.0,
            action_map: ActionMap::default(),
        }
    }

    /// Load button mapping from config. Lists with no known button keep the default.
    pub fn load_button_config(&mut self, cfg: &GamepadConfig) {
        fn apply(slot: &mut Vec<Btn>, names: &[String]) {
            let parsed: Vec<Btn> = names.iter().filter_map(|s| Btn::from_name(s)).collect();
            if !parsed.is_empty() { *slot = parsed; }
        }
        let map = &mut self.action_map;
        apply(&mut map.jump, &cfg.jump);
        apply(&mut map.interact, &cfg.interact);
        apply(&mut map.confirm, &cfg.confirm);
        apply(&mut map.cancel, &cfg.cancel);
        apply(&mut map.respawn, &cfg.respawn);
    }

    pub fn update(&mut self) {
        for b in &mut self.buttons { b.just_pressed = false; }

        #[cfg(feature = "gamepad")]
        self.poll_gilrs();
    }

    #[cfg(feature = "gamepad")]
    fn poll_gilrs(&mut self) {
        let gilrs = match &mut self.gilrs {
            Some(g) => g,
            None => return,
        };

        let events: Vec<_> = std::iter::from_fn(|| gilrs.next_event()).collect();

        for event in events {
            match event.event {
                EventType::ButtonPressed(btn, _) => {
                    if let Some(btn) = Btn::from_gilrs(btn) { self.set(btn, true); }
                }
                EventType::ButtonReleased(btn, _) => {
                    if let Some(btn) = Btn::from_gilrs(btn) { self.set(btn, false); }
                }
                EventType::AxisChanged(axis, value, _) => match axis {
                    Axis::LeftStickX => self.stick_x = value,
                    Axis::LeftStickY => self.stick_y = value,
                    _ => {}
                },
                EventType::Connected => debug!(id = ?event.id, "gamepad connected"),
                EventType::Disconnected => {
                    debug!(id = ?event.id, "gamepad disconnected");
                    self.release_all();
                }
                _ => {}
            }
        }
    }

    fn set(&mut self, btn: Btn, held: bool) {
        let state = &mut self.buttons[btn as usize];
        if held && !state.held { state.just_pressed = true; }
        state.held = held;
    }

    fn held(&self, btn: Btn) -> bool {
        self.buttons[btn as usize].held
    }

    fn any_held(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.held(b))
    }

    fn any_just_pressed(&self, btns: &[Btn]) -> bool {
        btns.iter().any(|&b| self.buttons[b as usize].just_pressed)
    }

    // ── Queries ──

    /// Game keys held on the pad, merged by the caller with the keyboard's.
    pub fn held_keys(&self) -> KeySet {
        let mut keys = KeySet::EMPTY;
        if self.held(Btn::DPadLeft) || self.stick_x < -STICK_DEADZONE { keys.insert(Key::Left); }
        if self.held(Btn::DPadRight) || self.stick_x > STICK_DEADZONE { keys.insert(Key::Right); }
        if self.held(Btn::DPadDown) || self.stick_y < -STICK_DEADZONE { keys.insert(Key::Down); }
        if self.any_held(&self.action_map.jump) || self.stick_y > STICK_DEADZONE { keys.insert(Key::Up); }
        if self.any_held(&self.action_map.interact) { keys.insert(Key::Interact); }
        keys
    }

    pub fn commands(&self) -> Vec<Command> {
        let map = &self.action_map;
        let mut commands = vec![];
        if self.any_just_pressed(&map.confirm) { commands.push(Command::Confirm); }
        if self.any_just_pressed(&map.cancel) { commands.push(Command::Back); }
        if self.any_just_pressed(&map.respawn) { commands.push(Command::Respawn); }
        commands
    }

    fn release_all(&mut self) {
        for b in &mut self.buttons { *b = BtnState::default(); }
        self.stick_x = 0.0;
        self.stick_y = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad() -> GamepadState {
        GamepadState {
            #[cfg(feature = "gamepad")]
            gilrs: None,
            buttons: [BtnState::default(); BUTTON_COUNT],
            stick_x: 0.0,
            stick_y: 0.0,
            action_map: ActionMap::default(),
        }
    }

    #[test]
    fn names_parse_case_insensitively() {
        assert_eq!(Btn::from_name("a"), Some(Btn::A));
        assert_eq!(Btn::from_name("DPadUp"), Some(Btn::DPadUp));
        assert_eq!(Btn::from_name("back"), Some(Btn::Select));
        assert_eq!(Btn::from_name("Turbo"), None);
    }

    #[test]
    fn default_map_drives_game_keys() {
        let mut pad = pad();
        pad.set(Btn::A, true);
        pad.set(Btn::X, true);
        pad.stick_x = -0.9;
        let keys = pad.held_keys();
        assert!(keys.contains(Key::Up));
        assert!(keys.contains(Key::Interact));
        assert!(keys.contains(Key::Left));
        assert!(!keys.contains(Key::Right));
    }

    #[test]
    fn commands_fire_on_the_press_only() {
        let mut pad = pad();
        pad.set(Btn::Y, true);
        assert_eq!(pad.commands(), vec![Command::Respawn]);
        pad.update();
        assert!(pad.commands().is_empty());
    }

    #[test]
    fn config_overrides_and_ignores_unknown_names() {
        let mut pad = pad();
        pad.load_button_config(&GamepadConfig {
            jump: vec!["B".into()],
            interact: vec!["Nope".into()],
            confirm: vec![],
            cancel: vec![],
            respawn: vec![],
        });
        pad.set(Btn::B, true);
        assert!(pad.held_keys().contains(Key::Up));
        pad.set(Btn::X, true);
        assert!(pad.held_keys().contains(Key::Interact));
    }
}
