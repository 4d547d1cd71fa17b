//! The game engine: a fixed-cadence, single-threaded consumer that owns the
//! cabinet hardware and the mode state machine.
//!
//! Everything that mutates game state happens here, on one thread: control
//! actions and switch events are drained from their queues at the top of
//! each tick, timers advance by wall-clock delta, and the actuators are
//! refreshed from the active mode's desired state. The only intentional
//! stall is the servo settle, which blocks the tick for its configured
//! duration — nothing else is processed while the gate is moving.

use rand::rngs::StdRng;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::hw::actuators::ActuatorBank;
use crate::hw::display::SegmentDriver;
use crate::hw::lines::{DataLine, OutputLine, ServoLine};
use crate::hw::switches::{self, SwitchEvent};
use crate::hw::{LED_COUNT, SWITCH_COUNT};
use crate::render::{Cue, ModeTag, Snapshot};

use super::gambling::{GamblePhase, GamblingGame};
use super::lighting::LightingGame;
use super::toggle::ToggleGame;
use super::{ControlAction, GameError, GameKind, RoundPhase};

/// Servo rest position: menu, end of game, resolved round.
pub const SERVO_REST_DEG: u32 = 90;
/// Servo position while a game or round is running.
pub const SERVO_PLAY_DEG: u32 = 0;

#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Game loop cadence.
    pub tick_hz: u32,
    /// Length of the timed games, in seconds.
    pub game_duration: f32,
    /// How long a transient notice stays visible, in seconds.
    pub notice_duration: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            game_duration: 30.0,
            notice_duration: 1.5,
        }
    }
}

/// Exactly one mode is active; each game variant carries its own state and
/// is rebuilt from defaults on entry.
#[derive(Debug)]
pub enum GameMode {
    MainMenu,
    Lighting(LightingGame),
    Gambling(GamblingGame),
    Toggle(ToggleGame),
}

enum TimerEffect {
    ShowRemaining(u32),
    End(i32),
}

pub struct GameEngine<C, D, L, S>
where
    C: OutputLine,
    D: DataLine,
    L: OutputLine,
    S: ServoLine,
{
    display: SegmentDriver<C, D>,
    actuators: ActuatorBank<L, S>,
    events: mpsc::Receiver<SwitchEvent>,
    actions: mpsc::Receiver<ControlAction>,
    snapshot_tx: watch::Sender<Snapshot>,
    cue_tx: mpsc::Sender<Cue>,
    settings: EngineSettings,
    mode: GameMode,
    rng: StdRng,
    /// Transient player-facing message and its remaining lifetime.
    notice: Option<(String, f32)>,
    /// Last value written to the display, to skip redundant transactions.
    shown: Option<u32>,
    stop_requested: bool,
}

impl<C, D, L, S> GameEngine<C, D, L, S>
where
    C: OutputLine,
    D: DataLine,
    L: OutputLine,
    S: ServoLine,
{
    pub fn new(
        display: SegmentDriver<C, D>,
        actuators: ActuatorBank<L, S>,
        events: mpsc::Receiver<SwitchEvent>,
        actions: mpsc::Receiver<ControlAction>,
        snapshot_tx: watch::Sender<Snapshot>,
        cue_tx: mpsc::Sender<Cue>,
        settings: EngineSettings,
        rng: StdRng,
    ) -> Self {
        Self {
            display,
            actuators,
            events,
            actions,
            snapshot_tx,
            cue_tx,
            settings,
            mode: GameMode::MainMenu,
            rng,
            notice: None,
            // The driver blanks to 0 on construction.
            shown: Some(0),
            stop_requested: false,
        }
    }

    /// Runs the game loop until cancellation or a quit action, then drives
    /// the actuators to their safe state. Cancels the token on the way out
    /// so a quit from the cabinet also shuts the process down.
    pub fn run(mut self, cancel: CancellationToken) {
        let frame = Duration::from_secs_f64(1.0 / f64::from(self.settings.tick_hz.max(1)));
        info!("game loop starting at {} Hz", self.settings.tick_hz);

        let mut last = Instant::now();
        while !cancel.is_cancelled() && !self.stop_requested {
            let now = Instant::now();
            let dt = (now - last).as_secs_f32();
            last = now;

            self.tick(dt);

            // Sleep whatever remains of the frame. A servo settle may have
            // eaten several frames already; dt absorbs the overrun.
            let spent = last.elapsed();
            if spent < frame {
                std::thread::sleep(frame - spent);
            }
        }

        info!("game loop stopping");
        self.actuators.safe_state();
        self.display.clear();
        cancel.cancel();
    }

    fn tick(&mut self, dt: f32) {
        while let Ok(action) = self.actions.try_recv() {
            self.handle_action(action);
        }

        for event in switches::drain(&mut self.events) {
            self.handle_switch(event);
        }

        self.advance_timers(dt);

        let desired = self.mode_leds();
        self.actuators.apply(&desired);

        self.expire_notice(dt);
        self.publish_snapshot();
    }

    fn handle_action(&mut self, action: ControlAction) {
        debug!(?action, "control action");
        match action {
            ControlAction::Select(kind) => self.enter_game(kind),
            ControlAction::Start => self.start_pressed(),
            ControlAction::Restart => self.restart_pressed(),
            ControlAction::ReturnToMenu => self.return_to_menu(),
            ControlAction::BetUp
            | ControlAction::BetDown
            | ControlAction::MultiplierNext
            | ControlAction::MultiplierPrev => self.adjust_bet(action),
            ControlAction::Quit => {
                info!("quit requested");
                self.stop_requested = true;
            }
        }
    }

    /// Menu selections only apply from the menu; in-game they are ignored,
    /// matching the cabinet's key handling.
    fn enter_game(&mut self, kind: GameKind) {
        if !matches!(self.mode, GameMode::MainMenu) {
            return;
        }
        match kind {
            GameKind::Lighting => {
                self.mode = GameMode::Lighting(LightingGame::new(self.settings.game_duration));
                self.show(0);
            }
            GameKind::Gambling => {
                let game = GamblingGame::new();
                let points = game.points;
                self.mode = GameMode::Gambling(game);
                self.show(to_display(points));
            }
            GameKind::Toggle => {
                self.mode = GameMode::Toggle(ToggleGame::new(self.settings.game_duration));
                self.show(0);
            }
        }
        info!(?kind, "entered game");
    }

    fn return_to_menu(&mut self) {
        if matches!(self.mode, GameMode::MainMenu) {
            return;
        }
        self.mode = GameMode::MainMenu;
        self.show(0);
        self.move_servo(SERVO_REST_DEG);
        info!("returned to main menu");
    }

    fn start_pressed(&mut self) {
        match &mut self.mode {
            GameMode::MainMenu => {}
            GameMode::Lighting(game) => {
                if game.phase() == RoundPhase::Running {
                    return;
                }
                game.start();
                self.show(0);
                self.move_servo(SERVO_PLAY_DEG);
                info!("lighting game started");
            }
            GameMode::Toggle(game) => {
                if game.phase() == RoundPhase::Running {
                    return;
                }
                game.start();
                self.show(0);
                self.move_servo(SERVO_PLAY_DEG);
                info!("toggle game started");
            }
            GameMode::Gambling(game) => match game.start_round(&mut self.rng) {
                Ok(true) => {
                    let points = game.points;
                    debug!(targets = ?game.targets(), points, "gambling round started");
                    self.move_servo(SERVO_PLAY_DEG);
                    self.show(to_display(points));
                }
                Ok(false) => debug!("round start ignored in current phase"),
                Err(err) => {
                    warn!("{err}");
                    self.set_notice(err.to_string());
                }
            },
        }
    }

    /// Restart re-initializes the current game without leaving the mode.
    /// For the timed games that is the same as starting over, even mid-run.
    fn restart_pressed(&mut self) {
        match &mut self.mode {
            GameMode::MainMenu => {}
            GameMode::Lighting(game) => {
                game.start();
                self.show(0);
                self.move_servo(SERVO_PLAY_DEG);
                info!("lighting game restarted");
            }
            GameMode::Toggle(game) => {
                game.start();
                self.show(0);
                self.move_servo(SERVO_PLAY_DEG);
                info!("toggle game restarted");
            }
            GameMode::Gambling(game) => {
                *game = GamblingGame::new();
                let points = game.points;
                self.show(to_display(points));
                self.move_servo(SERVO_REST_DEG);
                info!("gambling game restarted");
            }
        }
    }

    fn adjust_bet(&mut self, action: ControlAction) {
        if let GameMode::Gambling(game) = &mut self.mode {
            match action {
                ControlAction::BetUp => game.raise_bet(),
                ControlAction::BetDown => game.lower_bet(),
                ControlAction::MultiplierNext => game.cycle_multiplier_next(),
                ControlAction::MultiplierPrev => game.cycle_multiplier_prev(),
                _ => {}
            }
            debug!(
                bet = game.bet,
                multiplier = game.multiplier.value(),
                "bet adjusted"
            );
        }
    }

    fn handle_switch(&mut self, event: SwitchEvent) {
        let channel = event.channel;
        if channel as usize >= SWITCH_COUNT {
            warn!("{}", GameError::UnknownSwitchChannel(channel));
            return;
        }
        debug!(
            channel,
            at = %event.timestamp.format("%H:%M:%S%.3f"),
            "switch pressed"
        );
        self.send_cue(Cue::Hit);

        match &mut self.mode {
            GameMode::MainMenu => {}
            GameMode::Lighting(game) => {
                let scored = game.on_press(channel as usize);
                if scored {
                    self.send_cue(Cue::Score);
                }
            }
            GameMode::Toggle(game) => {
                if let Some(now_on) = game.on_press(channel as usize) {
                    debug!(channel, now_on, score = game.score, "field toggled");
                    self.send_cue(Cue::Score);
                }
            }
            GameMode::Gambling(game) => {
                let Some(outcome) = game.resolve_press(channel) else {
                    return;
                };
                let points = game.points;
                if outcome.hit {
                    info!(payout = outcome.payout, points, "jackpot");
                    self.send_cue(Cue::Jackpot);
                } else {
                    info!(points, "miss, stake lost");
                }
                self.move_servo(SERVO_REST_DEG);
                self.show(to_display(points));
                if outcome.busted {
                    info!("points exhausted, gambling game over");
                }
            }
        }
    }

    fn advance_timers(&mut self, dt: f32) {
        let effect = match &mut self.mode {
            GameMode::Lighting(game) if game.phase() == RoundPhase::Running => {
                if game.advance(dt) {
                    Some(TimerEffect::End(game.score))
                } else {
                    Some(TimerEffect::ShowRemaining(tenths(game.remaining())))
                }
            }
            GameMode::Toggle(game) if game.phase() == RoundPhase::Running => {
                if game.advance(dt) {
                    Some(TimerEffect::End(game.score))
                } else {
                    Some(TimerEffect::ShowRemaining(tenths(game.remaining())))
                }
            }
            _ => None,
        };

        match effect {
            Some(TimerEffect::ShowRemaining(value)) => self.show(value),
            Some(TimerEffect::End(score)) => {
                info!(score, "time up");
                self.move_servo(SERVO_REST_DEG);
                self.show(to_display(score));
            }
            None => {}
        }
    }

    fn mode_leds(&self) -> [bool; LED_COUNT] {
        match &self.mode {
            GameMode::MainMenu => [false; LED_COUNT],
            GameMode::Lighting(game) => *game.leds(),
            GameMode::Toggle(game) => *game.leds(),
            GameMode::Gambling(game) => game.leds(),
        }
    }

    fn show(&mut self, value: u32) {
        let value = value.min(crate::hw::display::MAX_VALUE);
        if self.shown == Some(value) {
            return;
        }
        self.display.display_number(value);
        self.shown = Some(value);
    }

    fn move_servo(&mut self, degrees: u32) {
        // A runtime servo failure is logged and survived; the game goes on.
        if let Err(e) = self.actuators.set_servo_angle(degrees) {
            warn!("servo command failed: {e}");
        }
    }

    fn send_cue(&self, cue: Cue) {
        // Fire and forget: a saturated audio queue drops the cue.
        if let Err(e) = self.cue_tx.try_send(cue) {
            debug!("audio cue dropped: {e}");
        }
    }

    fn set_notice(&mut self, message: String) {
        self.notice = Some((message, self.settings.notice_duration));
    }

    fn expire_notice(&mut self, dt: f32) {
        if let Some((_, remaining)) = &mut self.notice {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.notice = None;
            }
        }
    }

    fn publish_snapshot(&self) {
        // Send fails only when every renderer is gone; rendering is
        // fire-and-forget, so that is not an engine concern.
        let _ = self.snapshot_tx.send(self.snapshot());
    }

    fn snapshot(&self) -> Snapshot {
        let notice = self.notice.as_ref().map(|(message, _)| message.clone());
        match &self.mode {
            GameMode::MainMenu => Snapshot {
                mode: ModeTag::MainMenu,
                notice,
                ..Snapshot::default()
            },
            GameMode::Lighting(game) => Snapshot {
                mode: ModeTag::Lighting,
                score_or_points: game.score,
                led_states: *game.leds(),
                round_active: game.phase() == RoundPhase::Running,
                game_over: game.phase() == RoundPhase::Finished,
                time_remaining: game.remaining(),
                notice,
                ..Snapshot::default()
            },
            GameMode::Toggle(game) => Snapshot {
                mode: ModeTag::Toggle,
                score_or_points: game.score,
                led_states: *game.leds(),
                round_active: game.phase() == RoundPhase::Running,
                game_over: game.phase() == RoundPhase::Finished,
                time_remaining: game.remaining(),
                notice,
                ..Snapshot::default()
            },
            GameMode::Gambling(game) => Snapshot {
                mode: ModeTag::Gambling,
                score_or_points: game.points,
                bet: game.bet,
                multiplier: game.multiplier.value(),
                led_states: game.leds(),
                target_leds: game.targets().to_vec(),
                round_active: game.phase() == GamblePhase::RoundActive,
                game_over: game.phase() == GamblePhase::GameOver,
                notice,
                ..Snapshot::default()
            },
        }
    }
}

fn to_display(value: i32) -> u32 {
    value.max(0) as u32
}

/// Remaining time in tenths of a second, the display's timer resolution.
fn tenths(seconds: f32) -> u32 {
    (seconds * 10.0) as u32
}
