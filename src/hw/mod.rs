//! Hardware layer: pin claiming, line seams and the cabinet device drivers.
//!
//! Every hardware-owning component receives its pins at construction from
//! the [`PinBroker`]; there is no ambient pin registry. A pin claimed twice
//! is a startup error, not a runtime surprise.

pub mod actuators;
pub mod display;
pub mod lines;
pub mod switches;

use std::collections::HashMap;

use rppal::gpio::{Gpio, InputPin, IoPin, Mode, OutputPin, Pin};
use tracing::debug;

use self::lines::SoftPwmServo;

/// Number of LEDs on the playfield.
pub const LED_COUNT: usize = 8;
/// Number of microswitches on the playfield.
pub const SWITCH_COUNT: usize = 8;

/// Hardware-adjacent failures. All of these are fatal at init: the component
/// that needs the pin cannot start, and nothing downstream may assume the
/// actuator state is reliable.
#[derive(Debug, thiserror::Error)]
pub enum HwError {
    #[error("pin {pin} requested for {role} is already claimed by {owner}")]
    PinConflict {
        pin: u8,
        role: String,
        owner: String,
    },

    #[error("pin {pin} for {role} is unavailable: {source}")]
    PinUnavailable {
        pin: u8,
        role: String,
        #[source]
        source: rppal::gpio::Error,
    },

    #[error("GPIO subsystem initialization failed: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("PWM setup for {role} failed: {source}")]
    Pwm {
        role: String,
        #[source]
        source: rppal::gpio::Error,
    },

    #[error("failed to register edge interrupt for switch {channel}: {source}")]
    Interrupt {
        channel: u8,
        #[source]
        source: rppal::gpio::Error,
    },
}

/// Claims pins by role and hands them out exactly once.
pub struct PinBroker {
    gpio: Gpio,
    claimed: HashMap<u8, String>,
}

impl PinBroker {
    pub fn new() -> Result<Self, HwError> {
        let gpio = Gpio::new()?;
        Ok(Self {
            gpio,
            claimed: HashMap::new(),
        })
    }

    fn get(&mut self, role: &str, pin: u8) -> Result<Pin, HwError> {
        if let Some(owner) = self.claimed.get(&pin) {
            return Err(HwError::PinConflict {
                pin,
                role: role.to_string(),
                owner: owner.clone(),
            });
        }
        let claimed = self.gpio.get(pin).map_err(|source| HwError::PinUnavailable {
            pin,
            role: role.to_string(),
            source,
        })?;
        self.claimed.insert(pin, role.to_string());
        debug!("claimed GPIO{pin} as {role}");
        Ok(claimed)
    }

    /// Output pin, driven low initially.
    pub fn claim_output(&mut self, role: &str, pin: u8) -> Result<OutputPin, HwError> {
        Ok(self.get(role, pin)?.into_output_low())
    }

    /// Input pin with the internal pull-up enabled.
    pub fn claim_input_pullup(&mut self, role: &str, pin: u8) -> Result<InputPin, HwError> {
        Ok(self.get(role, pin)?.into_input_pullup())
    }

    /// Mode-switchable pin for a shared bus wire, starting as output-high
    /// (the idle level of the display data line).
    pub fn claim_bus(&mut self, role: &str, pin: u8) -> Result<IoPin, HwError> {
        let mut io = self.get(role, pin)?.into_io(Mode::Output);
        io.set_high();
        Ok(io)
    }

    /// Servo line: software PWM at 50 Hz on a plain output pin.
    pub fn claim_servo(&mut self, role: &str, pin: u8) -> Result<SoftPwmServo, HwError> {
        Ok(SoftPwmServo::new(self.claim_output(role, pin)?))
    }
}
