//! RelayTV - live TV player with automatic direct/proxy failover
//!
//! Plays IPTV channels, and when a stream cannot be reached directly,
//! transparently reroutes it through a proxy relay once before giving up.
//!
//! # Modules
//!
//! - `models` - Channels, connection modes, playback status
//! - `catalog` - Channel lookup
//! - `config` - Config file and player tunables
//! - `stream` - Transport selection, engines and the playback controller
//! - `cli` / `commands` - Scriptable command line
//! - `ui` - TUI components
//! - `app` - Application state and navigation

pub mod models;
pub mod catalog;
pub mod config;
pub mod stream;
pub mod cli;
pub mod commands;
pub mod ui;
pub mod app;

// Re-export commonly used types
pub use models::{Channel, ConnectionMode, EngineId, PlaybackStatus, SessionView, SurfaceId};

pub use catalog::{ChannelCatalog, StaticCatalog};
pub use config::Config;
pub use stream::{PlaybackController, ProxyRule};
pub use app::{App, AppState};
