/// Events emitted during a simulation step.
/// The presentation layer consumes these for sound and status messages.

use crate::domain::activation::Signal;

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    SwitchToggled { id: String, on: bool },
    ExitReached { target: Option<usize> },
    MirrorLit { id: String },
    MirrorDark { id: String },
    WaterRose { tiles: usize },
    WaterDrained { tiles: usize },
    SpawnChanged { id: String },
    PlayerJumped,
    PlayerLanded,
    PlayerSplashed,
    PlayerDied,
    PlayerRespawned,
    LevelCompleted,
}

impl From<Signal> for GameEvent {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::SwitchToggled { id, on } => GameEvent::SwitchToggled { id, on },
            Signal::ExitReached { target } => GameEvent::ExitReached { target },
            Signal::MirrorLit { id } => GameEvent::MirrorLit { id },
            Signal::MirrorDark { id } => GameEvent::MirrorDark { id },
            Signal::SpawnClaimed { id } => GameEvent::SpawnChanged { id },
        }
    }
}
