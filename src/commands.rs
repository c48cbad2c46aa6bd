//! CLI Command Handlers
//!
//! Implements all CLI commands by calling the appropriate backend services.
//! Each handler takes CLI args and Output, returns ExitCode.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, warn};

use crate::catalog::ChannelCatalog;
use crate::cli::{
    ChannelsCmd, ExitCode, Output, PlayCmd, ResolvedSource, ResolveCmd, SimulateCmd,
};
use crate::config::Config;
use crate::models::{Channel, ConnectionMode, PlaybackStatus, SessionView, SurfaceId};
use crate::stream::engine::{EngineEvent, ScriptedEngine, ScriptedOutcome};
use crate::stream::{resolve_source, DriverExit, PlaybackController, PlayerDriver, PlayerType};

/// Surface used by headless commands
const CLI_SURFACE: &str = "cli";

/// Load the config from `--config` or the default location
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Ok(Config::load()),
    }
}

/// Look up a channel, mapping failures to exit codes
fn find_channel(
    config: &Config,
    id: &str,
    output: &Output,
) -> std::result::Result<Channel, ExitCode> {
    if let Err(e) = crate::cli::validate_channel_id(id) {
        return Err(output.error(e, ExitCode::InvalidArgs));
    }
    config
        .catalog()
        .get_channel(id)
        .ok_or_else(|| output.error(format!("Channel not found: {}", id), ExitCode::ChannelNotFound))
}

// =============================================================================
// Channels Command
// =============================================================================

pub fn channels_cmd(cmd: ChannelsCmd, config: &Config, output: &Output) -> ExitCode {
    let catalog = config.catalog();
    let mut channels = match &cmd.category {
        Some(category) => catalog.in_category(category),
        None => catalog.channels(),
    };
    if cmd.playable {
        channels.retain(Channel::is_playable);
    }

    if !output.json {
        for ch in &channels {
            let marker = if ch.is_playable() { " " } else { "-" };
            println!("{} {:<16} {}", marker, ch.id, ch);
        }
        return ExitCode::Success;
    }

    if let Err(e) = output.print(&channels) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

// =============================================================================
// Resolve Command
// =============================================================================

pub fn resolve_cmd(cmd: ResolveCmd, config: &Config, output: &Output) -> ExitCode {
    let channel = match find_channel(config, &cmd.channel_id, output) {
        Ok(channel) => channel,
        Err(code) => return code,
    };
    let Some(source) = channel.source() else {
        return output.error(
            format!("Channel has no source address: {}", channel.id),
            ExitCode::NotPlayable,
        );
    };

    let mode = if cmd.proxy {
        ConnectionMode::Proxy
    } else {
        ConnectionMode::Direct
    };
    let url = resolve_source(source, mode, &config.proxy_rule());

    if !output.json {
        println!("{}", url);
        return ExitCode::Success;
    }

    let resolved = ResolvedSource {
        channel_id: channel.id,
        mode: mode.to_string(),
        url,
    };
    if let Err(e) = output.print(&resolved) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

// =============================================================================
// Play Command
// =============================================================================

pub async fn play_cmd(cmd: PlayCmd, config: &Config, output: &Output) -> ExitCode {
    let channel = match find_channel(config, &cmd.channel_id, output) {
        Ok(channel) => channel,
        Err(code) => return code,
    };
    if !channel.is_playable() {
        return output.error(
            format!("Channel has no source address: {}", channel.id),
            ExitCode::NotPlayable,
        );
    }

    let player_type = match cmd.player {
        Some(choice) => PlayerType::from(choice),
        None => match config.player.parse::<PlayerType>() {
            Ok(player) => player,
            Err(e) => return output.error(e.to_string(), ExitCode::InvalidArgs),
        },
    };

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let engine = config
        .local_player(player_type, events_tx)
        .with_startup_grace(Duration::from_secs(cmd.grace));
    if !engine.is_available().await {
        return output.error(
            format!("Player '{}' not found. Install it first.", engine.program().display()),
            ExitCode::PlayerNotFound,
        );
    }

    let controller = PlaybackController::new(
        engine,
        SurfaceId::new(CLI_SURFACE),
        config.proxy_rule(),
        config.controller_options(),
    );
    let (handle, mut task) = PlayerDriver::spawn(controller, events_rx);
    let mut views = handle.subscribe();

    output.info(format!("Playing {} in {}", channel, player_type));
    if handle.switch_channel(Some(channel)).is_err() {
        return output.error("Player stopped unexpectedly", ExitCode::Error);
    }

    let mut failed = false;
    let exit = loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    // Driver is gone, collect its exit
                    break (&mut task).await;
                }
                let view = views.borrow_and_update().clone();
                report_view(&view, output);
                if view.status == PlaybackStatus::Errored {
                    failed = true;
                    let _ = handle.unmount();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                let _ = handle.unmount();
            }
            exit = &mut task => break exit,
        }
    };

    match exit {
        _ if failed => output.error("Source unreachable (direct and proxy)", ExitCode::PlaybackFailed),
        Ok(DriverExit::Ended) | Ok(DriverExit::Unmounted) => ExitCode::Success,
        Ok(DriverExit::EngineClosed) => output.error("Player engine closed", ExitCode::Error),
        Err(e) => output.error(format!("Player task failed: {}", e), ExitCode::Error),
    }
}

fn report_view(view: &SessionView, output: &Output) {
    if output.json {
        if let Err(e) = output.print_line(view) {
            warn!("Could not print state: {}", e);
        }
    } else {
        output.info(view);
    }
}

// =============================================================================
// Simulate Command
// =============================================================================

/// Scripted failures for a simulation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationPlan {
    pub fail_direct: bool,
    pub fail_proxy: bool,
    pub retry: bool,
}

/// Run the controller against a scripted engine on a virtual clock
///
/// Returns every distinct session view, in order.
pub fn run_simulation(channel: &Channel, config: &Config, plan: SimulationPlan) -> Vec<SessionView> {
    let source = channel.source().unwrap_or_default().to_string();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = ScriptedEngine::new(tx, move |url| {
        let direct = url == source;
        if (direct && plan.fail_direct) || (!direct && plan.fail_proxy) {
            ScriptedOutcome::Fail(format!("{} unreachable", if direct { "origin" } else { "relay" }))
        } else {
            ScriptedOutcome::Play
        }
    });

    let mut controller = PlaybackController::new(
        engine,
        SurfaceId::new(CLI_SURFACE),
        config.proxy_rule(),
        config.controller_options(),
    );
    let mut now = Instant::now();
    let mut trace = Vec::new();

    controller.switch_channel(Some(channel), now);
    record(&mut trace, controller.view());
    settle(&mut controller, &mut rx, &mut now, &mut trace);

    if plan.retry && controller.retry(now) {
        record(&mut trace, controller.view());
        settle(&mut controller, &mut rx, &mut now, &mut trace);
    }

    trace
}

/// Deliver queued events and fire due timers until nothing is left
fn settle(
    controller: &mut PlaybackController<ScriptedEngine>,
    events: &mut UnboundedReceiver<EngineEvent>,
    now: &mut Instant,
    trace: &mut Vec<SessionView>,
) {
    loop {
        while let Ok(event) = events.try_recv() {
            controller.handle_event(event, *now);
            record(trace, controller.view());
        }
        let Some(deadline) = controller.next_deadline() else {
            break;
        };
        *now = deadline.max(*now);
        controller.poll_timers(*now);
        record(trace, controller.view());
    }
}

fn record(trace: &mut Vec<SessionView>, view: SessionView) {
    if trace.last() != Some(&view) {
        trace.push(view);
    }
}

pub fn simulate_cmd(cmd: SimulateCmd, config: &Config, output: &Output) -> ExitCode {
    let channel = match find_channel(config, &cmd.channel_id, output) {
        Ok(channel) => channel,
        Err(code) => return code,
    };

    let mut config = config.clone();
    if let Some(delay) = cmd.delay_ms {
        config.reroute_delay_ms = delay;
    }

    let plan = SimulationPlan {
        fail_direct: cmd.fail_direct,
        fail_proxy: cmd.fail_proxy,
        retry: cmd.retry,
    };
    let trace = run_simulation(&channel, &config, plan);

    if output.json {
        if let Err(e) = output.print(&trace) {
            return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
        }
    } else {
        for view in &trace {
            println!("{}", view);
        }
    }

    match trace.last() {
        Some(view) if view.placeholder => ExitCode::NotPlayable,
        Some(view) if view.status == PlaybackStatus::Errored => ExitCode::PlaybackFailed,
        _ => ExitCode::Success,
    }
}
