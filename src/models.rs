//! Data structures and types for RelayTV
//!
//! Contains the shared models used across the application organized by domain:
//! - **Catalog**: channels as handed over by the catalog
//! - **Transport**: connection modes used to reach a stream
//! - **Playback**: session status and the observable session view

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Catalog Models
// =============================================================================

/// A live TV channel
///
/// Owned by the catalog; the player only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub provider: String,
    /// Playable source address. Channels without one are placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
}

impl Channel {
    /// Create a playable channel with just an id, a name and a source
    pub fn new(id: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            logo: None,
            category: String::new(),
            provider: String::new(),
            stream_url: Some(url.into()),
        }
    }

    /// Create a channel without a source address
    pub fn placeholder(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            logo: None,
            category: String::new(),
            provider: String::new(),
            stream_url: None,
        }
    }

    /// Source address, if the channel has a non-blank one
    pub fn source(&self) -> Option<&str> {
        self.stream_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Whether this channel can be handed to a media engine
    pub fn is_playable(&self) -> bool {
        self.source().is_some()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.category.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} [{}]", self.name, self.category)
        }
    }
}

// =============================================================================
// Transport Models
// =============================================================================

/// How the stream is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    /// Original source address, untouched
    #[default]
    Direct,
    /// Source address rewritten through the proxy endpoint
    Proxy,
}

impl ConnectionMode {
    /// Label shown next to the player
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionMode::Direct => "DIRECT",
            ConnectionMode::Proxy => "SECURE PROXY",
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMode::Direct => write!(f, "direct"),
            ConnectionMode::Proxy => write!(f, "proxy"),
        }
    }
}

// =============================================================================
// Playback Models
// =============================================================================

/// Playback status surfaced to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// No session, or a non-playable channel
    #[default]
    Idle,
    /// Engine is opening the stream (or rerouting)
    Loading,
    /// Frames are being rendered
    Playing,
    /// Buffer ran dry, waiting for data
    Stalled,
    /// Both transports failed; waiting for a manual retry
    Errored,
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackStatus::Idle => write!(f, "Idle"),
            PlaybackStatus::Loading => write!(f, "Loading..."),
            PlaybackStatus::Playing => write!(f, "▶ Playing"),
            PlaybackStatus::Stalled => write!(f, "Buffering..."),
            PlaybackStatus::Errored => write!(f, "Error"),
        }
    }
}

/// Identity of one constructed engine instance
///
/// Every `create` yields a fresh id, so callbacks can be matched against the
/// instance that is currently owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineId(Uuid);

impl EngineId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EngineId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough for logs
        let s = self.0.simple().to_string();
        write!(f, "{}", &s[..8])
    }
}

/// Rendering surface an engine draws into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub String);

impl SurfaceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only snapshot of a playback session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SessionView {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub status: PlaybackStatus,
    pub connection_mode: ConnectionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub retry_generation: u64,
    /// Active channel has no source address
    pub placeholder: bool,
    pub paused: bool,
    pub volume: u8,
    pub muted: bool,
}

impl SessionView {
    /// Whether the retry affordance should be offered
    pub fn can_retry(&self) -> bool {
        self.status == PlaybackStatus::Errored
    }
}

impl fmt::Display for SessionView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channel = self.channel_id.as_deref().unwrap_or("-");
        write!(f, "{} {} ({})", channel, self.status, self.connection_mode)?;
        if let Some(err) = &self.last_error {
            write!(f, " - {}", err)?;
        }
        Ok(())
    }
}
