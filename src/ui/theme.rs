//! RelayTV colors
//!
//! Each color stands for something the viewer needs to read quickly:
//! whether a channel is on air, which transport carries it, and whether
//! playback is healthy, stalled or failed.

use ratatui::text::{Line, Span};
use ratatui::style::{Color, Modifier, Style};

use crate::models::{ConnectionMode, PlaybackStatus};

pub struct Theme;

impl Theme {
    pub const BACKGROUND: Color = Color::Rgb(0x0a, 0x0a, 0x0f);
    /// Status bar and other raised panels
    pub const PANEL: Color = Color::Rgb(0x14, 0x14, 0x1e);
    pub const FRAME: Color = Color::Rgb(0x00, 0x80, 0x78);
    pub const TEXT: Color = Color::Rgb(0xe0, 0xe0, 0xe0);
    /// Off-air channels, hints and secondary details
    pub const OFF_AIR: Color = Color::Rgb(0x40, 0x40, 0x50);
    pub const HOTKEY: Color = Color::Rgb(0xff, 0xff, 0x00);

    /// Stream reached straight from its origin
    pub const DIRECT: Color = Color::Rgb(0x00, 0xff, 0xf2);
    /// Stream carried by the relay
    pub const RELAY: Color = Color::Rgb(0xff, 0x00, 0xff);

    pub const LIVE: Color = Color::Rgb(0x00, 0xff, 0x00);
    pub const STALLED: Color = Color::Rgb(0xff, 0xaa, 0x00);
    pub const FAULT: Color = Color::Rgb(0xff, 0x00, 0x40);

    pub fn text() -> Style {
        Style::default().fg(Self::TEXT).bg(Self::BACKGROUND)
    }

    pub fn muted() -> Style {
        Style::default().fg(Self::OFF_AIR)
    }

    pub fn fault() -> Style {
        Style::default().fg(Self::FAULT).add_modifier(Modifier::BOLD)
    }

    pub fn title() -> Style {
        Style::default().fg(Self::DIRECT).add_modifier(Modifier::BOLD)
    }

    pub fn frame() -> Style {
        Style::default().fg(Self::FRAME)
    }

    pub fn hotkey() -> Style {
        Style::default().fg(Self::HOTKEY)
    }

    pub fn hotkey_label() -> Style {
        Style::default().fg(Self::OFF_AIR)
    }

    pub fn status_bar() -> Style {
        Style::default().fg(Self::TEXT).bg(Self::PANEL)
    }

    /// Channel name in the browser
    pub fn channel(selected: bool, on_air: bool) -> Style {
        match (selected, on_air) {
            (true, _) => Style::default()
                .fg(Self::BACKGROUND)
                .bg(Self::DIRECT)
                .add_modifier(Modifier::BOLD),
            (false, true) => Style::default().fg(Self::TEXT),
            (false, false) => Self::muted(),
        }
    }

    pub fn status(status: PlaybackStatus) -> Style {
        let fg = match status {
            PlaybackStatus::Idle => Self::OFF_AIR,
            PlaybackStatus::Loading => Self::DIRECT,
            PlaybackStatus::Playing => Self::LIVE,
            PlaybackStatus::Stalled => Self::STALLED,
            PlaybackStatus::Errored => Self::FAULT,
        };
        Style::default().fg(fg).add_modifier(Modifier::BOLD)
    }

    /// Transport badge; the relay is drawn bold so a reroute stands out
    pub fn transport(mode: ConnectionMode) -> Style {
        match mode {
            ConnectionMode::Direct => Style::default().fg(Self::DIRECT),
            ConnectionMode::Proxy => Style::default()
                .fg(Self::RELAY)
                .add_modifier(Modifier::BOLD),
        }
    }

    /// Header wordmark, "RELAY" in the direct color and "TV" in the relay color
    pub fn logo() -> Line<'static> {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        Line::from(vec![
            Span::styled("RELAY", bold.fg(Self::DIRECT)),
            Span::styled("TV", bold.fg(Self::RELAY)),
        ])
    }
}

/// WCAG contrast ratio of two RGB colors, from 1 to 21
///
/// Returns `None` for palette or named terminal colors, whose actual value
/// depends on the terminal.
pub fn contrast_ratio(fg: Color, bg: Color) -> Option<f64> {
    let (a, b) = (luminance(fg)?, luminance(bg)?);
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    Some((hi + 0.05) / (lo + 0.05))
}

fn luminance(color: Color) -> Option<f64> {
    let Color::Rgb(r, g, b) = color else {
        return None;
    };
    let linear = |c: u8| {
        let c = f64::from(c) / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    Some(0.2126 * linear(r) + 0.7152 * linear(g) + 0.0722 * linear(b))
}
