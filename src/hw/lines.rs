//! Trait seams over the GPIO lines.
//!
//! The drivers are generic over these traits so they can run against
//! in-memory pins in tests; production code plugs in the rppal types.

use rppal::gpio::{Bias, IoPin, Mode, OutputPin};

use super::HwError;

/// Servo PWM carrier frequency.
pub const SERVO_PWM_HZ: f64 = 50.0;

/// A plain push-pull output.
pub trait OutputLine {
    fn set_high(&mut self);
    fn set_low(&mut self);

    fn write(&mut self, on: bool) {
        if on {
            self.set_high();
        } else {
            self.set_low();
        }
    }
}

impl OutputLine for OutputPin {
    fn set_high(&mut self) {
        OutputPin::set_high(self);
    }

    fn set_low(&mut self) {
        OutputPin::set_low(self);
    }
}

impl OutputLine for IoPin {
    fn set_high(&mut self) {
        IoPin::set_high(self);
    }

    fn set_low(&mut self) {
        IoPin::set_low(self);
    }
}

/// The display data wire: an output that can be released to an input with
/// pull-up so the device can drive its acknowledgment pulse, then reclaimed.
pub trait DataLine: OutputLine {
    /// Reconfigure as input (pull-up); the device may now drive the wire.
    fn release(&mut self);

    /// Reconfigure as output, driven high (the bus idle level).
    fn reclaim(&mut self);

    /// Sample the wire while released.
    fn is_low(&self) -> bool;
}

impl DataLine for IoPin {
    fn release(&mut self) {
        self.set_mode(Mode::Input);
        self.set_bias(Bias::PullUp);
    }

    fn reclaim(&mut self) {
        self.set_mode(Mode::Output);
        IoPin::set_high(self);
    }

    fn is_low(&self) -> bool {
        IoPin::is_low(self)
    }
}

/// A servo signal line. Duty cycle is expressed in percent of the 50 Hz
/// period, the unit the position formula is written in.
pub trait ServoLine {
    fn set_duty_percent(&mut self, percent: f64) -> Result<(), HwError>;

    /// Stop driving the control signal entirely.
    fn stop(&mut self) -> Result<(), HwError>;
}

/// Software PWM on a plain output pin. The cabinet's servo sits on a
/// non-hardware-PWM pin, so the kernel-timed soft PWM is the faithful wiring.
pub struct SoftPwmServo {
    pin: OutputPin,
}

impl SoftPwmServo {
    pub fn new(pin: OutputPin) -> Self {
        Self { pin }
    }
}

impl ServoLine for SoftPwmServo {
    fn set_duty_percent(&mut self, percent: f64) -> Result<(), HwError> {
        self.pin
            .set_pwm_frequency(SERVO_PWM_HZ, percent / 100.0)
            .map_err(|source| HwError::Pwm {
                role: "servo".to_string(),
                source,
            })
    }

    fn stop(&mut self) -> Result<(), HwError> {
        self.pin.clear_pwm().map_err(|source| HwError::Pwm {
            role: "servo".to_string(),
            source,
        })
    }
}
