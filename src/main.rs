pub mod config;
pub mod game;
pub mod hw;
pub mod render;

use std::path::PathBuf;
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::Config;
use game::engine::{EngineSettings, GameEngine, SERVO_REST_DEG};
use game::{ControlAction, GameKind};
use hw::actuators::ActuatorBank;
use hw::display::SegmentDriver;
use hw::switches::{self, SwitchBank};
use hw::PinBroker;
use render::{run_audio, run_renderer, LogAudio, LogRenderer, Snapshot};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("pinrig.toml"));
    let config = Config::load_or_default(&config_path)?;

    info!("Claiming cabinet pins");
    let mut broker = PinBroker::new()?;
    let clk = broker.claim_output("display_clk", config.pins.display_clk)?;
    let dio = broker.claim_bus("display_dio", config.pins.display_dio)?;

    let mut led_pins = Vec::with_capacity(hw::LED_COUNT);
    for (i, &pin) in config.pins.leds.iter().enumerate() {
        led_pins.push(broker.claim_output(&format!("led{i}"), pin)?);
    }
    let mut switch_pins = Vec::with_capacity(hw::SWITCH_COUNT);
    for (i, &pin) in config.pins.switches.iter().enumerate() {
        switch_pins.push(broker.claim_input_pullup(&format!("switch{i}"), pin)?);
    }
    let servo = broker.claim_servo("servo", config.pins.servo)?;

    let display = SegmentDriver::new(
        clk,
        dio,
        Duration::from_micros(config.display.settle_micros),
        config.display.brightness,
    );
    let leds: [_; hw::LED_COUNT] = led_pins
        .try_into()
        .map_err(|_| eyre!("expected exactly {} LED pins", hw::LED_COUNT))?;
    let mut actuators =
        ActuatorBank::new(leds, servo, Duration::from_millis(config.servo.settle_ms));
    // Rest position before the first frame; blocks for one settle.
    actuators.set_servo_angle(SERVO_REST_DEG)?;

    let (event_tx, event_rx) = mpsc::channel(switches::EVENT_QUEUE_DEPTH);
    let bank = SwitchBank::create(
        switch_pins,
        Duration::from_millis(config.engine.debounce_ms),
        event_tx,
    );
    // Keep the armed bank alive for the whole run; dropping it would tear
    // down the edge interrupts.
    let armed_bank = bank.arm()?;
    info!("{} switches armed", armed_bank.channels());

    let (action_tx, action_rx) = mpsc::channel(64);
    let (cue_tx, cue_rx) = mpsc::channel(64);
    let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::default());

    let cancel = CancellationToken::new();

    let engine = GameEngine::new(
        display,
        actuators,
        event_rx,
        action_rx,
        snapshot_tx,
        cue_tx,
        EngineSettings {
            tick_hz: config.engine.tick_hz,
            game_duration: config.engine.game_duration_secs,
            notice_duration: config.engine.notice_secs,
        },
        StdRng::from_entropy(),
    );

    info!("Starting game loop");
    let loop_cancel = cancel.clone();
    let engine_thread = std::thread::Builder::new()
        .name("game-loop".into())
        .spawn(move || engine.run(loop_cancel))?;

    tokio::spawn(run_renderer(
        LogRenderer::default(),
        snapshot_rx,
        cancel.clone(),
    ));
    tokio::spawn(run_audio(LogAudio::default(), cue_rx, cancel.clone()));
    tokio::spawn(read_controls(action_tx, cancel.clone()));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("SIGINT received, shutting down");
            cancel.cancel();
        }
        _ = cancel.cancelled() => {}
    }

    // The engine drives the actuators to their safe state on its way out.
    if engine_thread.join().is_err() {
        error!("game loop thread panicked");
    }
    drop(armed_bank);
    info!("Shutdown complete");
    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
    Ok(())
}

/// Stdin stand-in for the cabinet's control panel: one command per line,
/// mirroring the original key bindings. The real UI collaborator feeds the
/// same channel.
async fn read_controls(actions: mpsc::Sender<ControlAction>, cancel: CancellationToken) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let Some(action) = parse_control(input) else {
                    warn!("unrecognized control input: {input:?}");
                    continue;
                };
                if actions.send(action).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn parse_control(input: &str) -> Option<ControlAction> {
    match input {
        "1" => Some(ControlAction::Select(GameKind::Lighting)),
        "2" => Some(ControlAction::Select(GameKind::Gambling)),
        "3" => Some(ControlAction::Select(GameKind::Toggle)),
        "s" | "start" | "space" => Some(ControlAction::Start),
        "r" | "restart" => Some(ControlAction::Restart),
        "m" | "menu" => Some(ControlAction::ReturnToMenu),
        "+" | "up" => Some(ControlAction::BetUp),
        "-" | "down" => Some(ControlAction::BetDown),
        ">" | "right" => Some(ControlAction::MultiplierNext),
        "<" | "left" => Some(ControlAction::MultiplierPrev),
        "q" | "quit" => Some(ControlAction::Quit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_bindings_match_the_panel() {
        assert_eq!(
            parse_control("2"),
            Some(ControlAction::Select(GameKind::Gambling))
        );
        assert_eq!(parse_control("s"), Some(ControlAction::Start));
        assert_eq!(parse_control("up"), Some(ControlAction::BetUp));
        assert_eq!(parse_control("<"), Some(ControlAction::MultiplierPrev));
        assert_eq!(parse_control("q"), Some(ControlAction::Quit));
        assert_eq!(parse_control("bogus"), None);
    }
}
