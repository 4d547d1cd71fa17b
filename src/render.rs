//! Renderer and audio boundaries.
//!
//! Pixel rendering and audio playback belong to external collaborators.
//! This module defines the read-only snapshot and cue types they receive,
//! the one-way consumer tasks, and the tracing-backed stand-ins the binary
//! wires up by default.

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::hw::LED_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeTag {
    #[default]
    MainMenu,
    Lighting,
    Gambling,
    Toggle,
}

/// One frame of game state, published once per tick. Read-only for the
/// consumer; nothing flows back.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub mode: ModeTag,
    pub score_or_points: i32,
    pub bet: i32,
    pub multiplier: i32,
    pub led_states: [bool; LED_COUNT],
    pub target_leds: Vec<u8>,
    pub round_active: bool,
    pub game_over: bool,
    pub time_remaining: f32,
    /// Transient player-facing message (rejected bet and the like).
    pub notice: Option<String>,
}

/// Sound effect cues, fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    Hit,
    Score,
    Jackpot,
}

pub trait Renderer: Send + 'static {
    fn render(&mut self, snapshot: &Snapshot);
}

pub trait AudioOutput: Send + 'static {
    fn play(&mut self, cue: Cue);
    fn start_background_loop(&mut self);
    fn stop(&mut self);
}

/// Feeds snapshots to the renderer until shutdown.
pub async fn run_renderer<R: Renderer>(
    mut renderer: R,
    mut snapshots: watch::Receiver<Snapshot>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                renderer.render(&snapshot);
            }
        }
    }
    debug!("renderer task finished");
}

/// Feeds audio cues to the output until shutdown.
pub async fn run_audio<A: AudioOutput>(
    mut audio: A,
    mut cues: mpsc::Receiver<Cue>,
    cancel: CancellationToken,
) {
    audio.start_background_loop();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            cue = cues.recv() => {
                match cue {
                    Some(cue) => audio.play(cue),
                    None => break,
                }
            }
        }
    }
    audio.stop();
    debug!("audio task finished");
}

/// Default renderer: logs state changes. Ignores the ticking clock so a
/// running timer does not flood the log.
#[derive(Default)]
pub struct LogRenderer {
    last: Option<Snapshot>,
}

impl Renderer for LogRenderer {
    fn render(&mut self, snapshot: &Snapshot) {
        let changed = self.last.as_ref().map_or(true, |prev| {
            prev.mode != snapshot.mode
                || prev.score_or_points != snapshot.score_or_points
                || prev.bet != snapshot.bet
                || prev.multiplier != snapshot.multiplier
                || prev.led_states != snapshot.led_states
                || prev.round_active != snapshot.round_active
                || prev.game_over != snapshot.game_over
                || prev.notice != snapshot.notice
        });
        if changed {
            info!(
                mode = ?snapshot.mode,
                value = snapshot.score_or_points,
                bet = snapshot.bet,
                multiplier = snapshot.multiplier,
                leds = ?snapshot.led_states,
                targets = ?snapshot.target_leds,
                round_active = snapshot.round_active,
                game_over = snapshot.game_over,
                time = snapshot.time_remaining,
                "frame"
            );
            if let Some(notice) = &snapshot.notice {
                info!("{notice}");
            }
        }
        self.last = Some(snapshot.clone());
    }
}

/// Default audio output: logs the cues.
#[derive(Default)]
pub struct LogAudio;

impl AudioOutput for LogAudio {
    fn play(&mut self, cue: Cue) {
        debug!(?cue, "audio cue");
    }

    fn start_background_loop(&mut self) {
        info!("background audio loop started");
    }

    fn stop(&mut self) {
        info!("audio stopped");
    }
}
