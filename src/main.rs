//! RelayTV - live TV player with automatic direct/proxy failover
//!
//! # Usage
//!
//! ```bash
//! # Launch interactive TUI
//! relaytv
//!
//! # CLI mode (for automation)
//! relaytv channels --playable
//! relaytv play bbc-news --player vlc
//! relaytv simulate bbc-news --fail-direct --json
//! ```

use std::fs::File;
use std::io::{stdout, Stdout};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing_subscriber::EnvFilter;

use relaytv::app::{App, AppAction, AppState, VOLUME_STEP};
use relaytv::cli::{Cli, Command, ExitCode, Output};
use relaytv::commands;
use relaytv::stream::engine::EngineEvent;
use relaytv::stream::{EventDisposition, LocalPlayerEngine, PlaybackController, PlayerType};
use relaytv::ui::{browser, player, Theme};
use relaytv::{Config, SessionView, SurfaceId};

/// Terminal type alias for convenience
type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Controller type used by the TUI
type TuiController = PlaybackController<LocalPlayerEngine>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    if cli.is_cli_mode() {
        let exit_code = run_cli(cli).await;
        std::process::exit(exit_code.into());
    } else {
        let config = commands::load_config(cli.config.as_deref())?;
        run_tui(config).await
    }
}

/// Log to stderr in CLI mode, to a file while the TUI owns the terminal
fn init_logging(cli: &Cli) -> Result<()> {
    let default = if cli.verbose { "relaytv=debug" } else { "relaytv=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if cli.is_cli_mode() {
        builder.with_writer(std::io::stderr).init();
    } else {
        let path = std::env::temp_dir().join("relaytv.log");
        let file = File::create(&path)
            .with_context(|| format!("Could not open log file {}", path.display()))?;
        builder.with_ansi(false).with_writer(Mutex::new(file)).init();
    }
    Ok(())
}

/// Run CLI command and return exit code
async fn run_cli(cli: Cli) -> ExitCode {
    let output = Output::new(&cli);
    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::InvalidArgs),
    };

    match cli.command {
        Some(Command::Channels(cmd)) => commands::channels_cmd(cmd, &config, &output),

        Some(Command::Resolve(cmd)) => commands::resolve_cmd(cmd, &config, &output),

        Some(Command::Play(cmd)) => commands::play_cmd(cmd, &config, &output).await,

        Some(Command::Simulate(cmd)) => commands::simulate_cmd(cmd, &config, &output),

        // Handled by the is_cli_mode check
        None => ExitCode::Success,
    }
}

// =============================================================================
// TUI Mode
// =============================================================================

/// Initialize the terminal for TUI mode
fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal to normal state
fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run interactive TUI
async fn run_tui(config: Config) -> Result<()> {
    let player_type = config.player.parse::<PlayerType>().unwrap_or_default();
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut controller = PlaybackController::new(
        config.local_player(player_type, events_tx),
        SurfaceId::new("tui"),
        config.proxy_rule(),
        config.controller_options(),
    );
    let mut app = App::new(config.channels.clone());

    let mut terminal = init_terminal()?;
    let result = run_event_loop(&mut terminal, &mut app, &mut controller, &mut events_rx).await;

    // Player goes away with the UI
    controller.unmount();
    restore_terminal(&mut terminal)?;

    result
}

/// Main event loop - keys, engine events and timers, one at a time
async fn run_event_loop(
    terminal: &mut Tui,
    app: &mut App,
    controller: &mut TuiController,
    events: &mut UnboundedReceiver<EngineEvent>,
) -> Result<()> {
    const TICK_RATE: Duration = Duration::from_millis(100);

    while app.running {
        let view = controller.view();
        terminal.draw(|frame| render_ui(frame, app, &view))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                // Only handle key press events (ignore releases on Windows)
                if key.kind == KeyEventKind::Press {
                    let action = app.handle_key(key);
                    apply_action(action, controller, &view);
                }
            }
        }

        let now = Instant::now();
        while let Ok(event) = events.try_recv() {
            if controller.handle_event(event, now) == EventDisposition::Ended {
                app.set_notice("Player window closed");
            }
        }
        controller.poll_timers(now);

        // Let the player watchers run
        tokio::task::yield_now().await;
    }

    Ok(())
}

/// Forward a user action to the controller
fn apply_action(action: AppAction, controller: &mut TuiController, view: &SessionView) {
    let now = Instant::now();
    match action {
        AppAction::Play(channel) => controller.switch_channel(Some(&channel), now),
        AppAction::Stop => controller.switch_channel(None, now),
        AppAction::Retry => {
            controller.retry(now);
        }
        AppAction::TogglePlay => {
            controller.toggle_play();
        }
        AppAction::VolumeUp => controller.set_volume(view.volume.saturating_add(VOLUME_STEP)),
        AppAction::VolumeDown => controller.set_volume(view.volume.saturating_sub(VOLUME_STEP)),
        AppAction::ToggleMute => controller.toggle_mute(),
        AppAction::Quit | AppAction::None => {}
    }
}

// =============================================================================
// UI Rendering
// =============================================================================

/// Main render function - dispatches to view-specific renderers
fn render_ui(frame: &mut Frame, app: &mut App, view: &SessionView) {
    let area = frame.area();

    frame.render_widget(Clear, area);
    frame.render_widget(Block::default().style(Style::default().bg(Theme::BACKGROUND)), area);

    // Main layout: header, content, status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_header(frame, chunks[0]);
    render_content(frame, chunks[1], app, view);
    render_status_bar(frame, chunks[2], app);
}

/// Render the header logo
fn render_header(frame: &mut Frame, area: Rect) {
    let logo = Paragraph::new(Theme::logo())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Theme::frame()),
        );
    frame.render_widget(logo, area);
}

/// Channel list, plus the player panel while something is playing
fn render_content(frame: &mut Frame, area: Rect, app: &mut App, view: &SessionView) {
    match app.state {
        AppState::Browse => browser::render_channels(frame, area, app),
        AppState::Playing => {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
                .split(area);
            browser::render_channels(frame, columns[0], app);
            player::render_player(frame, columns[1], app.playing_channel(), view);
        }
    }
}

/// Keybinding hints, or the current notice
fn render_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let line = match &app.notice {
        Some(notice) => Line::styled(format!(" {}", notice), Theme::status_bar()),
        None => {
            let hints: &[(&str, &str)] = match app.state {
                AppState::Browse => &[("↑↓", "select"), ("enter", "play"), ("q", "quit")],
                AppState::Playing => &[
                    ("space", "pause"),
                    ("←→", "zap"),
                    ("r", "retry"),
                    ("+/-", "volume"),
                    ("m", "mute"),
                    ("esc", "stop"),
                ],
            };
            let mut spans = Vec::new();
            for (key, desc) in hints {
                spans.push(Span::styled(format!(" {}", key), Theme::hotkey()));
                spans.push(Span::styled(format!(" {} ", desc), Theme::hotkey_label()));
            }
            Line::from(spans)
        }
    };

    frame.render_widget(Paragraph::new(line).style(Theme::status_bar()), area);
}
