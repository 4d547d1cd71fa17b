//! The cabinet's actuators: the LED bank and the ball-gate servo.

use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::lines::{OutputLine, ServoLine};
use super::{HwError, LED_COUNT};

pub struct ActuatorBank<L: OutputLine, S: ServoLine> {
    leds: [L; LED_COUNT],
    led_states: [bool; LED_COUNT],
    servo: S,
    /// How long the servo needs to physically reach a commanded position.
    servo_settle: Duration,
}

impl<L: OutputLine, S: ServoLine> ActuatorBank<L, S> {
    /// Takes ownership of the claimed lines; all LEDs start dark.
    pub fn new(leds: [L; LED_COUNT], servo: S, servo_settle: Duration) -> Self {
        let mut bank = Self {
            leds,
            led_states: [false; LED_COUNT],
            servo,
            servo_settle,
        };
        for led in bank.leds.iter_mut() {
            led.set_low();
        }
        bank
    }

    /// Direct write, idempotent. An index outside the bank is discarded
    /// with a diagnostic.
    pub fn set_led(&mut self, index: usize, on: bool) {
        let Some(led) = self.leds.get_mut(index) else {
            warn!(index, "ignoring LED index outside the bank");
            return;
        };
        led.write(on);
        self.led_states[index] = on;
    }

    /// Refreshes the whole bank from a desired-state array, touching only
    /// the lines that changed.
    pub fn apply(&mut self, desired: &[bool; LED_COUNT]) {
        for (index, &on) in desired.iter().enumerate() {
            if self.led_states[index] != on {
                self.set_led(index, on);
            }
        }
    }

    pub fn all_off(&mut self) {
        self.apply(&[false; LED_COUNT]);
    }

    pub fn leds(&self) -> [bool; LED_COUNT] {
        self.led_states
    }

    /// Moves the servo and blocks until the mechanical settle deadline has
    /// passed. The stall is intentional: the game loop owns the servo and
    /// commands must be sequenced, which `&mut self` enforces.
    pub fn set_servo_angle(&mut self, degrees: u32) -> Result<(), HwError> {
        let degrees = degrees.min(180);
        let duty_percent = 2.0 + f64::from(degrees) / 18.0;
        debug!(degrees, duty_percent, "servo command");
        self.servo.set_duty_percent(duty_percent)?;
        thread::sleep(self.servo_settle);
        Ok(())
    }

    /// Drives every actuator to its shutdown state: LEDs dark, servo signal
    /// stopped. Safe to call more than once.
    pub fn safe_state(&mut self) {
        self.all_off();
        if let Err(e) = self.servo.stop() {
            warn!("failed to stop servo PWM: {e}");
        }
    }
}

impl<L: OutputLine, S: ServoLine> Drop for ActuatorBank<L, S> {
    fn drop(&mut self) {
        // Guaranteed release: whatever path tears the bank down, the
        // hardware ends dark and quiet before the pins go back.
        self.safe_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::lines::mock::{MockLed, MockServo};
    use std::cell::Cell;
    use std::rc::Rc;

    fn bank() -> (
        ActuatorBank<MockLed, MockServo>,
        Vec<Rc<Cell<bool>>>,
        Rc<std::cell::RefCell<Vec<f64>>>,
        Rc<Cell<bool>>,
    ) {
        let mut levels = Vec::new();
        let leds: [MockLed; LED_COUNT] = std::array::from_fn(|_| {
            let (led, level) = MockLed::new();
            levels.push(level);
            led
        });
        let (servo, duties, stopped) = MockServo::new();
        let bank = ActuatorBank::new(leds, servo, Duration::ZERO);
        (bank, levels, duties, stopped)
    }

    #[test]
    fn set_led_drives_the_line_and_tracks_state() {
        let (mut bank, levels, _, _) = bank();
        bank.set_led(3, true);
        assert!(levels[3].get());
        assert!(bank.leds()[3]);

        bank.set_led(3, false);
        assert!(!levels[3].get());
        assert!(!bank.leds()[3]);
    }

    #[test]
    fn out_of_range_index_is_discarded() {
        let (mut bank, levels, _, _) = bank();
        bank.set_led(11, true);
        assert!(levels.iter().all(|level| !level.get()));
    }

    #[test]
    fn apply_refreshes_the_whole_bank() {
        let (mut bank, levels, _, _) = bank();
        let mut desired = [false; LED_COUNT];
        desired[0] = true;
        desired[5] = true;
        bank.apply(&desired);
        assert!(levels[0].get());
        assert!(levels[5].get());
        assert!(!levels[1].get());

        bank.all_off();
        assert!(levels.iter().all(|level| !level.get()));
    }

    #[test]
    fn servo_duty_follows_the_position_formula() {
        let (mut bank, _, duties, _) = bank();
        bank.set_servo_angle(0).unwrap();
        bank.set_servo_angle(90).unwrap();
        bank.set_servo_angle(180).unwrap();
        // 2 + angle/18 percent: 0 deg -> 2%, 90 deg -> 7%, 180 deg -> 12%.
        assert_eq!(*duties.borrow(), vec![2.0, 7.0, 12.0]);
    }

    #[test]
    fn servo_angle_is_clamped() {
        let (mut bank, _, duties, _) = bank();
        bank.set_servo_angle(270).unwrap();
        assert_eq!(*duties.borrow(), vec![12.0]);
    }

    #[test]
    fn safe_state_darkens_leds_and_stops_the_servo() {
        let (mut bank, levels, _, stopped) = bank();
        bank.set_led(2, true);
        bank.safe_state();
        assert!(levels.iter().all(|level| !level.get()));
        assert!(stopped.get());
    }

    #[test]
    fn drop_forces_the_safe_state() {
        let (mut bank, levels, _, stopped) = bank();
        bank.set_led(6, true);
        drop(bank);
        assert!(levels.iter().all(|level| !level.get()));
        assert!(stopped.get());
    }
}
