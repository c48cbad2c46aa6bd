//! Terminal UI components
//!
//! Built with ratatui. Keyboard-first navigation throughout.

pub mod theme;
pub mod browser;
pub mod player;

pub use theme::Theme;
