//! Now Playing panel
//!
//! Shows the channel, playback status, the transport in use and, once
//! both transports failed, the error with a retry hint.

use ratatui::{
    prelude::*,
    widgets::{Block, BorderType, Borders, Paragraph, Wrap},
};

use crate::models::{Channel, PlaybackStatus, SessionView};
use crate::ui::Theme;

/// Status line: state, transport badge, volume
pub fn status_line(view: &SessionView) -> Line<'static> {
    let mut spans = vec![Span::styled(view.status.to_string(), Theme::status(view.status))];

    if view.status != PlaybackStatus::Idle {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("[{}]", view.connection_mode.label()),
            Theme::transport(view.connection_mode),
        ));
    }
    if view.paused && view.status == PlaybackStatus::Playing {
        spans.push(Span::styled("  ⏸ paused", Theme::hotkey_label()));
    }

    let volume = if view.muted {
        "  🔇 muted".to_string()
    } else {
        format!("  vol {}%", view.volume)
    };
    spans.push(Span::styled(volume, Theme::muted()));

    Line::from(spans)
}

/// Message under the status line, if any
pub fn detail_line(view: &SessionView) -> Option<Line<'static>> {
    if view.placeholder {
        return Some(Line::styled(
            "This channel is not broadcasting right now.",
            Theme::muted(),
        ));
    }
    if view.can_retry() {
        let error = view.last_error.clone().unwrap_or_else(|| "playback failed".into());
        return Some(Line::from(vec![
            Span::styled(error, Theme::fault()),
            Span::raw("  "),
            Span::styled("r", Theme::hotkey()),
            Span::styled(" retry", Theme::hotkey_label()),
        ]));
    }
    view.last_error
        .as_ref()
        .map(|msg| Line::styled(format!("{}...", msg), Theme::status(view.status)))
}

/// Render the now playing panel
pub fn render_player(frame: &mut Frame, area: Rect, channel: Option<&Channel>, view: &SessionView) {
    let title = channel
        .map(|c| format!(" {} ", c.name))
        .unwrap_or_else(|| " Player ".to_string());

    let mut lines = vec![Line::raw(""), status_line(view)];
    if let Some(detail) = detail_line(view) {
        lines.push(Line::raw(""));
        lines.push(detail);
    }
    if let Some(ch) = channel {
        if !ch.provider.is_empty() {
            lines.push(Line::raw(""));
            lines.push(Line::styled(ch.provider.clone(), Theme::muted()));
        }
    }

    let panel = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .style(Theme::text())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::frame())
                .border_type(BorderType::Rounded)
                .title(Span::styled(title, Theme::title())),
        );

    frame.render_widget(panel, area);
}
