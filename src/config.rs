use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::hw::{LED_COUNT, SWITCH_COUNT};

/// Configuration failures are fatal at startup: nothing claims a pin until
/// the whole pin map has validated.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Pin-to-role binding, BCM numbering.
#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct PinConfig {
    pub display_clk: u8,
    pub display_dio: u8,
    pub leds: Vec<u8>,
    pub switches: Vec<u8>,
    pub servo: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        // BCM translation of the cabinet's board-numbered wiring loom.
        Self {
            display_clk: 13,
            display_dio: 19,
            leds: vec![21, 20, 16, 24, 12, 7, 8, 25],
            switches: vec![2, 3, 4, 17, 27, 22, 10, 9],
            servo: 6,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct EngineConfig {
    /// Game loop cadence.
    pub tick_hz: u32,
    /// Length of the timed games, in seconds.
    pub game_duration_secs: f32,
    /// Debounce window for the microswitches, in milliseconds.
    pub debounce_ms: u64,
    /// How long a transient notice stays in the snapshot, in seconds.
    pub notice_secs: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            game_duration_secs: 30.0,
            debounce_ms: 150,
            notice_secs: 1.5,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct DisplayConfig {
    /// Display brightness, 0..=7.
    pub brightness: u8,
    /// Minimum settle interval between line transitions, in microseconds.
    pub settle_micros: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            brightness: 7,
            settle_micros: 1,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct ServoConfig {
    /// Blocking settle time after a servo command, in milliseconds.
    pub settle_ms: u64,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self { settle_ms: 500 }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub pins: PinConfig,
    pub engine: EngineConfig,
    pub display: DisplayConfig,
    pub servo: ServoConfig,
}

impl Config {
    /// Loads the configuration from `path`, falling back to the built-in
    /// defaults when no file exists there.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
            info!("Loaded configuration from {}", path.display());
            config
        } else {
            info!(
                "No config file at {}, using built-in defaults",
                path.display()
            );
            Config::default()
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pins.leds.len() != LED_COUNT {
            return Err(ConfigError::Invalid(format!(
                "expected {LED_COUNT} LED pins, got {}",
                self.pins.leds.len()
            )));
        }
        if self.pins.switches.len() != SWITCH_COUNT {
            return Err(ConfigError::Invalid(format!(
                "expected {SWITCH_COUNT} switch pins, got {}",
                self.pins.switches.len()
            )));
        }

        let mut seen = HashSet::new();
        let all = self
            .pins
            .leds
            .iter()
            .chain(self.pins.switches.iter())
            .chain([
                &self.pins.display_clk,
                &self.pins.display_dio,
                &self.pins.servo,
            ]);
        for &pin in all {
            if !seen.insert(pin) {
                return Err(ConfigError::Invalid(format!(
                    "pin {pin} is bound to more than one role"
                )));
            }
        }

        if self.display.brightness > 7 {
            return Err(ConfigError::Invalid(format!(
                "display brightness {} out of range 0..=7",
                self.display.brightness
            )));
        }
        if self.engine.tick_hz == 0 {
            return Err(ConfigError::Invalid("tick_hz must be at least 1".into()));
        }
        if self.engine.game_duration_secs <= 0.0 {
            return Err(ConfigError::Invalid(
                "game_duration_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}
