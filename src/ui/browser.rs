//! Channel browser view
//!
//! Channel list with keyboard selection. Channels without a source are
//! listed but dimmed.

use ratatui::{
    prelude::*,
    widgets::{Block, BorderType, Borders, List, ListItem, Paragraph},
};

use crate::app::App;
use crate::models::Channel;
use crate::ui::Theme;

/// Render the channel list
pub fn render_channels(frame: &mut Frame, area: Rect, app: &mut App) {
    let visible_height = area.height.saturating_sub(2) as usize;
    app.list.scroll_into_view(visible_height);

    if app.channels.is_empty() {
        render_empty(frame, area);
        return;
    }

    let items: Vec<ListItem> = app
        .channels
        .iter()
        .enumerate()
        .skip(app.list.offset)
        .take(visible_height)
        .map(|(i, ch)| render_item(ch, i == app.list.selected, app.playing == Some(i)))
        .collect();

    let title = format!(" Channels ({}/{}) ", app.list.selected + 1, app.channels.len());
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::frame())
                .border_type(BorderType::Rounded)
                .title(Span::styled(title, Theme::title())),
        )
        .style(Theme::text());

    frame.render_widget(list, area);
}

/// One line: marker, name, category, provider
fn render_item(channel: &Channel, selected: bool, playing: bool) -> ListItem<'static> {
    let marker = match (selected, playing) {
        (_, true) => "▶ ",
        (true, false) => "▸ ",
        _ => "  ",
    };

    let mut spans = vec![
        Span::styled(marker.to_string(), Theme::hotkey()),
        Span::styled(channel.name.clone(), Theme::channel(selected, channel.is_playable())),
    ];
    if !channel.category.is_empty() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!("[{}]", channel.category), Theme::hotkey_label()));
    }
    if !channel.provider.is_empty() {
        spans.push(Span::styled(format!(" {}", channel.provider), Theme::muted()));
    }
    if !channel.is_playable() {
        spans.push(Span::styled(" (off air)", Theme::muted()));
    }

    ListItem::new(Line::from(spans))
}

fn render_empty(frame: &mut Frame, area: Rect) {
    let empty = Paragraph::new("No channels. Add [[channels]] to the config file.")
        .style(Theme::muted())
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::frame())
                .border_type(BorderType::Rounded)
                .title(Span::styled(" Channels ", Theme::title())),
        );

    frame.render_widget(empty, area);
}
