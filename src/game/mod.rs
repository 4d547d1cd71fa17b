//! The game-mode state machine and the per-mode rules.
//!
//! The per-game types in `lighting`, `gambling` and `toggle` are pure state:
//! they never touch hardware. The engine maps their outcomes onto the
//! actuators, the display and the audio cues.

pub mod engine;
pub mod gambling;
pub mod lighting;
pub mod toggle;

pub use self::engine::{EngineSettings, GameEngine, GameMode};

use thiserror::Error;

/// Which game a menu selection refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameKind {
    Lighting,
    Gambling,
    Toggle,
}

/// Player inputs, delivered by the external UI collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Select(GameKind),
    Start,
    Restart,
    ReturnToMenu,
    BetUp,
    BetDown,
    MultiplierNext,
    MultiplierPrev,
    Quit,
}

/// Logical failures. These never interrupt the tick loop: they are logged,
/// surfaced as a transient notice where the player caused them, and leave
/// the game state untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("switch channel {0} is outside the cabinet's switch range")]
    UnknownSwitchChannel(u8),

    #[error("not enough points to bet: {points} points, {bet} bet")]
    InsufficientPoints { points: i32, bet: i32 },
}

/// Lifecycle of the timed games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RoundPhase {
    #[default]
    Ready,
    Running,
    Finished,
}
