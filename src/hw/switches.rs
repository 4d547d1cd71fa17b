//! Debounced microswitch inputs.
//!
//! Eight pull-up inputs; a press is a falling edge. Edge detection runs on
//! the GPIO interrupt threads, and those callbacks do exactly two things:
//! debounce and enqueue. All state mutation happens on the game loop, which
//! drains the queue once per tick — the bounded channel is the only
//! structure shared between the two sides.

use chrono::{DateTime, Local};
use rppal::gpio::{InputPin, Trigger};
use statum::{machine, state};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::HwError;

/// Capacity of the switch event queue. A full queue drops new presses
/// rather than blocking the interrupt thread.
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// A debounced press on one switch channel.
#[derive(Debug, Clone)]
pub struct SwitchEvent {
    pub channel: u8,
    pub timestamp: DateTime<Local>,
}

/// Suppresses contact bounce: after an accepted edge, further edges on the
/// same channel are ignored until the window has elapsed — at most one
/// event per switch per window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_accepted: Option<DateTime<Local>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: None,
        }
    }

    /// Returns true when the edge at `at` counts as a distinct press.
    pub fn accept(&mut self, at: DateTime<Local>) -> bool {
        if let Some(previous) = self.last_accepted {
            // A clock step backwards reads as zero elapsed and suppresses.
            let elapsed = (at - previous).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.window {
                return false;
            }
        }
        self.last_accepted = Some(at);
        true
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum BankState {
    Disarmed,
    Armed,
}

/// The bank of switch inputs. Created disarmed (pins claimed, quiet), then
/// armed once the rest of the cabinet is ready to consume events.
#[machine]
pub struct SwitchBank<S: BankState> {
    pins: Vec<InputPin>,
    debounce: Duration,
    event_tx: mpsc::Sender<SwitchEvent>,
}

impl SwitchBank<Disarmed> {
    pub fn create(
        pins: Vec<InputPin>,
        debounce: Duration,
        event_tx: mpsc::Sender<SwitchEvent>,
    ) -> Self {
        debug!("creating switch bank with {} channels", pins.len());
        Self::new(pins, debounce, event_tx)
    }

    /// Registers a falling-edge interrupt per channel and transitions to
    /// Armed. Each callback owns its channel's debouncer and a queue
    /// handle; nothing else crosses the thread boundary.
    pub fn arm(mut self) -> Result<SwitchBank<Armed>, HwError> {
        let debounce = self.debounce;
        for (channel, pin) in self.pins.iter_mut().enumerate() {
            let channel = channel as u8;
            let mut debouncer = Debouncer::new(debounce);
            let tx = self.event_tx.clone();
            pin.set_async_interrupt(Trigger::FallingEdge, None, move |_event| {
                let now = Local::now();
                if !debouncer.accept(now) {
                    return;
                }
                let event = SwitchEvent {
                    channel,
                    timestamp: now,
                };
                if let Err(e) = tx.try_send(event) {
                    warn!(channel, "switch event dropped: {e}");
                }
            })
            .map_err(|source| HwError::Interrupt { channel, source })?;
        }
        info!(
            "switch bank armed: {} channels, {:?} debounce",
            self.pins.len(),
            debounce
        );
        Ok(self.transition())
    }
}

impl SwitchBank<Armed> {
    pub fn channels(&self) -> usize {
        self.pins.len()
    }
}

/// Drains every event currently queued, in arrival order. Never blocks;
/// each event comes out exactly once.
pub fn drain(rx: &mut mpsc::Receiver<SwitchEvent>) -> Vec<SwitchEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(mpsc::error::TryRecvError::Empty) => break,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                debug!("switch event channel closed");
                break;
            }
        }
    }
    events
}
