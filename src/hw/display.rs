//! Bit-banged driver for the four-digit seven-segment display.
//!
//! The display speaks a two-wire serial protocol (clock + data): framed
//! transactions bracketed by start/stop conditions, bytes shifted out LSB
//! first, each byte answered by an acknowledgment pulse from the device.
//! The ack is best effort — a silent device corrupts nothing, so a missed
//! pulse is logged and the transaction carries on.

use std::thread;
use std::time::Duration;

use tracing::debug;

use super::lines::{DataLine, OutputLine};

/// Data command: write display registers with auto-increment addressing.
const CMD_DATA_AUTO: u8 = 0x40;
/// Address command: start writing at digit register 0.
const CMD_ADDR_BASE: u8 = 0xC0;
/// Display control: panel on, OR-ed with a 3-bit brightness level.
const CMD_DISPLAY_ON: u8 = 0x88;

pub const MAX_BRIGHTNESS: u8 = 0x07;
pub const DISPLAY_DIGITS: usize = 4;
/// Largest value the four digits can show.
pub const MAX_VALUE: u32 = 9_999;

/// Segment patterns for the decimal digits, segments ordered a..g
/// (bit 0 = segment a).
const SEGMENTS: [u8; 10] = [
    0x3f, 0x06, 0x5b, 0x4f, 0x66, 0x6d, 0x7d, 0x07, 0x7f, 0x6f,
];
const BLANK: u8 = 0x00;

fn segment_for(digit: u8) -> u8 {
    // Anything outside 0..=9 renders as a blank cell.
    SEGMENTS.get(digit as usize).copied().unwrap_or(BLANK)
}

pub struct SegmentDriver<C, D> {
    clk: C,
    dio: D,
    /// Minimum interval between line transitions, covering the device's
    /// setup/hold requirements.
    settle: Duration,
    brightness: u8,
}

impl<C: OutputLine, D: DataLine> SegmentDriver<C, D> {
    /// Takes exclusive ownership of the two bus lines and blanks the display
    /// to a known state.
    pub fn new(clk: C, dio: D, settle: Duration, brightness: u8) -> Self {
        let mut driver = Self {
            clk,
            dio,
            settle,
            brightness: brightness.min(MAX_BRIGHTNESS),
        };
        driver.clear();
        driver
    }

    pub fn clear(&mut self) {
        self.display_number(0);
    }

    /// Clamps `value` to the displayable range and writes it as four
    /// zero-padded decimal digits, as three framed transactions:
    /// addressing mode, digit data, display control.
    pub fn display_number(&mut self, value: u32) {
        let value = value.min(MAX_VALUE);
        let digits: [u8; DISPLAY_DIGITS] = [
            (value / 1000 % 10) as u8,
            (value / 100 % 10) as u8,
            (value / 10 % 10) as u8,
            (value % 10) as u8,
        ];

        self.start();
        let mut acked = self.write_byte(CMD_DATA_AUTO);
        self.stop();

        self.start();
        acked &= self.write_byte(CMD_ADDR_BASE);
        for digit in digits {
            acked &= self.write_byte(segment_for(digit));
        }
        self.stop();

        self.start();
        acked &= self.write_byte(CMD_DISPLAY_ON | self.brightness);
        self.stop();

        if !acked {
            debug!(value, "display transaction finished without acknowledgment");
        }
    }

    fn pause(&self) {
        thread::sleep(self.settle);
    }

    /// Start condition: data falls while the clock is high.
    fn start(&mut self) {
        self.dio.set_high();
        self.clk.set_high();
        self.pause();
        self.dio.set_low();
        self.pause();
    }

    /// Stop condition: data rises while the clock is high.
    fn stop(&mut self) {
        self.clk.set_low();
        self.pause();
        self.dio.set_low();
        self.pause();
        self.clk.set_high();
        self.pause();
        self.dio.set_high();
        self.pause();
    }

    /// Shifts one byte out LSB first, then samples the device's ack pulse.
    /// Returns whether the ack was observed.
    fn write_byte(&mut self, byte: u8) -> bool {
        for bit in 0..8 {
            self.clk.set_low();
            self.pause();
            self.dio.write((byte >> bit) & 0x01 != 0);
            self.pause();
            self.clk.set_high();
            self.pause();
        }

        // Ack window: hand the wire to the device for one clock pulse.
        self.clk.set_low();
        self.pause();
        self.dio.release();
        self.pause();
        self.clk.set_high();
        let acked = self.dio.is_low();
        self.pause();
        self.clk.set_low();
        self.pause();
        self.dio.reclaim();
        self.pause();
        acked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::lines::mock::{Ev, Log, MockClk, MockDio};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn driver_with_log(ack: bool, brightness: u8) -> (SegmentDriver<MockClk, MockDio>, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let clk = MockClk { log: log.clone() };
        let dio = MockDio {
            log: log.clone(),
            ack,
        };
        let driver = SegmentDriver::new(clk, dio, Duration::ZERO, brightness);
        // Drop the transitions from the constructor's blanking write.
        log.borrow_mut().clear();
        (driver, log)
    }

    /// Replays the recorded transitions the way the device sees them:
    /// start = data falling while clock high, stop = data rising while clock
    /// high, bits latched on the clock's rising edge, ack windows skipped.
    fn decode_frames(log: &[Ev]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let mut clk = false;
        let mut dio = false;
        let mut released = false;
        let mut in_frame = false;
        let mut bits: Vec<bool> = Vec::new();
        let mut bytes: Vec<u8> = Vec::new();

        for ev in log {
            match *ev {
                Ev::Dio(level) => {
                    if clk && in_frame && !level {
                        // Repeated start inside a frame is not used by this
                        // driver; data edges while clock high end/begin frames.
                        unreachable!("data fell while clock high inside a frame");
                    }
                    if clk && !in_frame && !level {
                        in_frame = true;
                        bits.clear();
                        bytes.clear();
                    } else if clk && in_frame && level {
                        frames.push(bytes.clone());
                        in_frame = false;
                    }
                    dio = level;
                }
                Ev::Clk(level) => {
                    let rising = level && !clk;
                    clk = level;
                    if rising && in_frame && !released {
                        bits.push(dio);
                        if bits.len() == 8 {
                            let mut byte = 0u8;
                            for (i, &bit) in bits.iter().enumerate() {
                                if bit {
                                    byte |= 1 << i;
                                }
                            }
                            bytes.push(byte);
                            bits.clear();
                        }
                    }
                }
                Ev::Release => released = true,
                Ev::Reclaim => {
                    released = false;
                    dio = true;
                }
            }
        }
        frames
    }

    #[test]
    fn display_number_issues_three_framed_transactions() {
        let (mut driver, log) = driver_with_log(true, 7);
        driver.display_number(942);

        let frames = decode_frames(&log.borrow());
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], vec![0x40]);
        // 0942 -> patterns for 0, 9, 4, 2 after the base address command.
        assert_eq!(frames[1], vec![0xC0, 0x3f, 0x6f, 0x66, 0x5b]);
        assert_eq!(frames[2], vec![0x88 | 0x07]);
    }

    #[test]
    fn small_value_is_zero_padded() {
        let (mut driver, log) = driver_with_log(true, 7);
        driver.display_number(7);

        let frames = decode_frames(&log.borrow());
        assert_eq!(frames[1], vec![0xC0, 0x3f, 0x3f, 0x3f, 0x07]);
    }

    #[test]
    fn out_of_range_value_is_clamped() {
        let (mut driver, log) = driver_with_log(true, 7);
        driver.display_number(123_456);

        let frames = decode_frames(&log.borrow());
        assert_eq!(frames[1], vec![0xC0, 0x6f, 0x6f, 0x6f, 0x6f]);
    }

    #[test]
    fn missing_ack_does_not_abort_the_transaction() {
        let (mut driver, log) = driver_with_log(false, 7);
        driver.display_number(8);

        let frames = decode_frames(&log.borrow());
        assert_eq!(frames.len(), 3, "all frames written despite silent device");
        assert_eq!(frames[1], vec![0xC0, 0x3f, 0x3f, 0x3f, 0x7f]);
    }

    #[test]
    fn brightness_is_clamped_to_max() {
        let (mut driver, log) = driver_with_log(true, 9);
        driver.display_number(0);

        let frames = decode_frames(&log.borrow());
        assert_eq!(frames[2], vec![0x88 | MAX_BRIGHTNESS]);
    }

    #[test]
    fn every_digit_has_its_segment_pattern() {
        let expected = [0x3f, 0x06, 0x5b, 0x4f, 0x66, 0x6d, 0x7d, 0x07, 0x7f, 0x6f];
        for digit in 0..10u8 {
            assert_eq!(segment_for(digit), expected[digit as usize]);
        }
        assert_eq!(segment_for(12), BLANK);
    }
}
