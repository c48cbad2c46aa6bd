//! Configuration management for RelayTV
//!
//! Handles config file loading and player tunables.
//! Config is stored at ~/.config/relaytv/config.toml

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::catalog::StaticCatalog;
use crate::models::Channel;
use crate::stream::controller::ControllerOptions;
use crate::stream::engine::EngineEvent;
use crate::stream::player::{LocalPlayerEngine, PlayerType};
use crate::stream::transport::{ProxyRule, DEFAULT_PROXY_TEMPLATE};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Proxy endpoint; `{url}` is replaced by the encoded source address
    pub proxy_template: String,
    /// Delay before rerouting a failed direct stream through the proxy
    pub reroute_delay_ms: u64,
    /// Start playback without waiting for the user
    pub autoplay: bool,
    /// Initial volume (0-100)
    pub volume: u8,
    /// Local player for the `play` command ("mpv" or "vlc")
    pub player: String,
    /// Player binary to run instead of the one found on `PATH`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_path: Option<PathBuf>,
    /// Channel catalog
    pub channels: Vec<Channel>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            proxy_template: DEFAULT_PROXY_TEMPLATE.to_string(),
            reroute_delay_ms: 1000,
            autoplay: true,
            volume: 80,
            player: "mpv".to_string(),
            player_path: None,
            channels: Vec::new(),
        }
    }
}

impl Config {
    /// Get config file path (~/.config/relaytv/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("relaytv").join("config.toml"))
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        match Self::path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                warn!("Ignoring unreadable config: {:#}", e);
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    /// Load config from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Proxy rewrite rule for the transport selector
    pub fn proxy_rule(&self) -> ProxyRule {
        ProxyRule::new(self.proxy_template.clone())
    }

    /// Controller tunables
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            reroute_delay: Duration::from_millis(self.reroute_delay_ms),
            autoplay: self.autoplay,
            volume: self.volume.min(100),
        }
    }

    /// Local player engine for `player_type`, honoring `player_path`
    pub fn local_player(
        &self,
        player_type: PlayerType,
        events: UnboundedSender<EngineEvent>,
    ) -> LocalPlayerEngine {
        let engine = LocalPlayerEngine::new(player_type, events);
        match &self.player_path {
            Some(path) => engine.with_program(path),
            None => engine,
        }
    }

    /// Channel catalog from the config
    pub fn catalog(&self) -> StaticCatalog {
        StaticCatalog::new(self.channels.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.reroute_delay_ms, 1000);
        assert!(config.autoplay);
        assert!(config.channels.is_empty());
        assert!(config.proxy_template.contains("{url}"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            reroute_delay_ms = 250

            [[channels]]
            id = "c1"
            name = "Channel One"
            stream_url = "https://ok.example/live.m3u8"
            "#,
        )
        .unwrap();

        assert_eq!(config.reroute_delay_ms, 250);
        assert_eq!(config.volume, 80);
        assert!(config.player_path.is_none());
        assert_eq!(config.channels.len(), 1);
        assert!(config.channels[0].is_playable());
        assert_eq!(
            config.controller_options().reroute_delay,
            Duration::from_millis(250)
        );
    }

    #[test]
    fn test_written_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.player = "vlc".into();
        config.channels.push(Channel::placeholder("p", "Placeholder"));
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.player, "vlc");
        assert_eq!(loaded.channels, config.channels);
    }

    #[test]
    fn test_player_path_overrides_program() {
        let config: Config = toml::from_str(r#"player_path = "/opt/mpv/bin/mpv""#).unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let engine = config.local_player(PlayerType::Mpv, tx);
        assert_eq!(engine.program(), PathBuf::from("/opt/mpv/bin/mpv"));
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        let err = Config::load_from(Path::new("/nonexistent/relaytv.toml")).unwrap_err();
        assert!(err.to_string().contains("Could not read"));
    }
}
