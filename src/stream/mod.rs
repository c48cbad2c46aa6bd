//! Streaming infrastructure
//!
//! - Transport: direct vs. proxy address selection
//! - Engine: media engine contract and a scripted engine for dry runs
//! - Controller: session lifecycle, failover and playback state
//! - Driver: async event loop around the controller
//! - Player: VLC/mpv backed engine

pub mod transport;
pub mod engine;
pub mod controller;
pub mod driver;
pub mod player;

pub use controller::{ControllerOptions, EventDisposition, PlaybackController};
pub use driver::{DriverExit, PlayerCommand, PlayerDriver, PlayerHandle};
pub use engine::{EngineEvent, EngineEventKind, EngineHandle, MediaEngine, ScriptedEngine};
pub use player::{LocalPlayerEngine, PlayerType};
pub use transport::{resolve_source, ProxyRule};
