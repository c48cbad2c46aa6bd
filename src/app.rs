//! App state and core application logic
//!
//! Manages screen navigation and turns key presses into player actions.
//! The app never touches the engine; it only says what the user asked for.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::models::Channel;

/// Volume change per key press
pub const VOLUME_STEP: u8 = 5;

// =============================================================================
// App State Enum
// =============================================================================

/// Application state enum representing current screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    /// Channel list
    #[default]
    Browse,
    /// Now playing panel
    Playing,
}

// =============================================================================
// Actions
// =============================================================================

/// What the main loop should do after a key press
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    None,
    /// Make this channel the active one
    Play(Channel),
    /// Leave the player, releasing the stream
    Stop,
    Retry,
    TogglePlay,
    VolumeUp,
    VolumeDown,
    ToggleMute,
    Quit,
}

// =============================================================================
// Selection State
// =============================================================================

/// Selection state for list views
#[derive(Debug, Clone, Default)]
pub struct ListState {
    /// Currently selected index
    pub selected: usize,
    /// Scroll offset for viewport
    pub offset: usize,
    /// Total number of items
    pub len: usize,
}

impl ListState {
    pub fn new(len: usize) -> Self {
        Self {
            selected: 0,
            offset: 0,
            len,
        }
    }

    /// Move selection up
    pub fn up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            if self.selected < self.offset {
                self.offset = self.selected;
            }
        }
    }

    /// Move selection down
    pub fn down(&mut self) {
        if self.len > 0 && self.selected < self.len - 1 {
            self.selected += 1;
        }
    }

    /// Move selection up by a page
    pub fn page_up(&mut self, page_size: usize) {
        self.selected = self.selected.saturating_sub(page_size);
        if self.selected < self.offset {
            self.offset = self.selected;
        }
    }

    /// Move selection down by a page
    pub fn page_down(&mut self, page_size: usize) {
        if self.len > 0 {
            self.selected = (self.selected + page_size).min(self.len - 1);
        }
    }

    /// Jump to first item
    pub fn first(&mut self) {
        self.selected = 0;
        self.offset = 0;
    }

    /// Jump to last item
    pub fn last(&mut self) {
        if self.len > 0 {
            self.selected = self.len - 1;
        }
    }

    /// Update offset to keep selected item visible
    pub fn scroll_into_view(&mut self, visible_height: usize) {
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if visible_height > 0 && self.selected >= self.offset + visible_height {
            self.offset = self.selected - visible_height + 1;
        }
    }
}

// =============================================================================
// Main Application State
// =============================================================================

/// Main application state
#[derive(Debug)]
pub struct App {
    /// Current screen
    pub state: AppState,
    /// Whether the app is running
    pub running: bool,
    /// Catalog channels, in display order
    pub channels: Vec<Channel>,
    /// Channel list selection
    pub list: ListState,
    /// Index of the channel loaded in the player
    pub playing: Option<usize>,
    /// Transient message shown in the status bar
    pub notice: Option<String>,
}

impl App {
    /// Create a new App over a channel list
    pub fn new(channels: Vec<Channel>) -> Self {
        Self {
            state: AppState::Browse,
            running: true,
            list: ListState::new(channels.len()),
            channels,
            playing: None,
            notice: None,
        }
    }

    /// Quit the application
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Set the status bar message
    pub fn set_notice(&mut self, msg: impl Into<String>) {
        self.notice = Some(msg.into());
    }

    /// Currently highlighted channel
    pub fn selected_channel(&self) -> Option<&Channel> {
        self.channels.get(self.list.selected)
    }

    /// Channel loaded in the player
    pub fn playing_channel(&self) -> Option<&Channel> {
        self.playing.and_then(|i| self.channels.get(i))
    }

    /// Open the player on channel `index`
    fn play_index(&mut self, index: usize) -> AppAction {
        match self.channels.get(index) {
            Some(channel) => {
                let channel = channel.clone();
                self.playing = Some(index);
                self.list.selected = index;
                self.state = AppState::Playing;
                AppAction::Play(channel)
            }
            None => AppAction::None,
        }
    }

    /// Zap to the next (or previous) channel, wrapping around
    fn zap(&mut self, forward: bool) -> AppAction {
        let len = self.channels.len();
        let Some(current) = self.playing else {
            return AppAction::None;
        };
        if len == 0 {
            return AppAction::None;
        }
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        self.play_index(next)
    }

    // -------------------------------------------------------------------------
    // Keyboard Event Handling
    // -------------------------------------------------------------------------

    /// Handle keyboard event, returning what the player should do
    pub fn handle_key(&mut self, key: KeyEvent) -> AppAction {
        self.notice = None;

        // Global quit shortcut
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.quit();
            return AppAction::Quit;
        }

        match self.state {
            AppState::Browse => self.handle_browse_key(key),
            AppState::Playing => self.handle_playing_key(key),
        }
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Char('q') => {
                self.quit();
                AppAction::Quit
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.list.up();
                AppAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.list.down();
                AppAction::None
            }
            KeyCode::PageUp => {
                self.list.page_up(10);
                AppAction::None
            }
            KeyCode::PageDown => {
                self.list.page_down(10);
                AppAction::None
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.list.first();
                AppAction::None
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.list.last();
                AppAction::None
            }
            KeyCode::Enter => self.play_index(self.list.selected),
            _ => AppAction::None,
        }
    }

    fn handle_playing_key(&mut self, key: KeyEvent) -> AppAction {
        match key.code {
            KeyCode::Char('q') => {
                self.quit();
                AppAction::Quit
            }
            KeyCode::Esc | KeyCode::Backspace => {
                self.state = AppState::Browse;
                self.playing = None;
                AppAction::Stop
            }
            KeyCode::Char(' ') => AppAction::TogglePlay,
            KeyCode::Char('r') => AppAction::Retry,
            KeyCode::Char('m') => AppAction::ToggleMute,
            KeyCode::Char('+') | KeyCode::Char('=') => AppAction::VolumeUp,
            KeyCode::Char('-') => AppAction::VolumeDown,
            KeyCode::Right | KeyCode::Char('n') => self.zap(true),
            KeyCode::Left | KeyCode::Char('p') => self.zap(false),
            _ => AppAction::None,
        }
    }
}
