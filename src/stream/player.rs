//! Local Player - VLC/mpv backed media engine
//!
//! Runs the stream in an external VLC or mpv process. One process is one
//! engine instance: spawning creates it, killing disposes it, and the
//! process exiting is reported back as an engine event.
//!
//! Must be used from inside a tokio runtime.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::models::{EngineId, SurfaceId};
use crate::stream::engine::{
    EngineError, EngineEvent, EngineEventKind, EngineHandle, MediaEngine,
};

/// Supported local players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerType {
    /// mpv media player (default, supports runtime control)
    #[default]
    Mpv,
    /// VLC media player
    Vlc,
}

impl PlayerType {
    /// Get the command name for this player
    pub fn command(&self) -> &'static str {
        match self {
            PlayerType::Vlc => {
                // On macOS, VLC is an app bundle
                #[cfg(target_os = "macos")]
                if std::path::Path::new("/Applications/VLC.app").exists() {
                    return "/Applications/VLC.app/Contents/MacOS/VLC";
                }
                "vlc"
            }
            PlayerType::Mpv => "mpv",
        }
    }

    /// Get a display name for this player
    pub fn display_name(&self) -> &'static str {
        match self {
            PlayerType::Vlc => "VLC",
            PlayerType::Mpv => "mpv",
        }
    }

    /// Build the launch arguments for a stream
    pub fn args(&self, url: &str, autoplay: bool, volume: u8, ipc: Option<&PathBuf>) -> Vec<String> {
        let mut args = vec![url.to_string()];
        match self {
            PlayerType::Vlc => {
                args.push("--no-video-title-show".into());
                if !autoplay {
                    args.push("--start-paused".into());
                }
            }
            PlayerType::Mpv => {
                args.push("--force-window=immediate".into());
                args.push(format!("--volume={}", volume.min(100)));
                if !autoplay {
                    args.push("--pause".into());
                }
                if let Some(path) = ipc {
                    args.push(format!("--input-ipc-server={}", path.display()));
                }
            }
        }
        args
    }
}

impl std::fmt::Display for PlayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for PlayerType {
    type Err = PlayerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mpv" => Ok(PlayerType::Mpv),
            "vlc" => Ok(PlayerType::Vlc),
            other => Err(PlayerError::NotFound(other.to_string())),
        }
    }
}

/// Errors from local player operations
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Player '{0}' not found. Install it first.")]
    NotFound(String),
    #[error("Failed to start player: {0}")]
    StartFailed(#[from] std::io::Error),
}

impl From<PlayerError> for EngineError {
    fn from(e: PlayerError) -> Self {
        EngineError::Open(e.to_string())
    }
}

/// One running player process
struct LocalInstance {
    surface: SurfaceId,
    /// Dropping this stops the watcher, which kills the process
    cancel: Option<oneshot::Sender<()>>,
    ipc: Option<PathBuf>,
    /// Whether the process is unpaused
    playing: bool,
}

/// Media engine backed by an external player process
pub struct LocalPlayerEngine {
    player_type: PlayerType,
    /// Binary to run instead of the player's usual command
    program: Option<PathBuf>,
    events: UnboundedSender<EngineEvent>,
    /// How long a process must survive before it counts as playing
    startup_grace: Duration,
    volume: u8,
    instances: HashMap<EngineId, LocalInstance>,
}

impl LocalPlayerEngine {
    pub fn new(player_type: PlayerType, events: UnboundedSender<EngineEvent>) -> Self {
        Self {
            player_type,
            program: None,
            events,
            startup_grace: Duration::from_secs(3),
            volume: 100,
            instances: HashMap::new(),
        }
    }

    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    /// Run `program` instead of looking the player up on `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Get the player type
    pub fn player_type(&self) -> PlayerType {
        self.player_type
    }

    /// The binary that gets launched
    pub fn program(&self) -> PathBuf {
        self.program
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.player_type.command()))
    }

    /// Check if the player is available on the system
    pub async fn is_available(&self) -> bool {
        let cmd = self.program();

        // Explicit path, or the macOS app bundle
        if cmd.components().count() > 1 {
            return cmd.exists();
        }

        Command::new("which")
            .arg(cmd)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn ipc_path(&self, id: EngineId) -> Option<PathBuf> {
        if cfg!(unix) && self.player_type == PlayerType::Mpv {
            Some(std::env::temp_dir().join(format!("relaytv-{}.sock", id)))
        } else {
            None
        }
    }

    fn spawn(&self, url: &str, autoplay: bool, ipc: Option<&PathBuf>) -> Result<Child, PlayerError> {
        let program = self.program();
        let mut cmd = Command::new(&program);
        cmd.args(self.player_type.args(url, autoplay, self.volume, ipc))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlayerError::NotFound(program.display().to_string())
            } else {
                PlayerError::StartFailed(e)
            }
        })
    }

    /// Start a process for load `generation` of `id` and watch it
    fn launch(
        &self,
        id: EngineId,
        generation: u64,
        url: &str,
        autoplay: bool,
        ipc: Option<&PathBuf>,
    ) -> Result<oneshot::Sender<()>, EngineError> {
        let child = self.spawn(url, autoplay, ipc)?;
        debug!(engine = %id, player = %self.player_type, "Player process started");

        let (cancel, cancelled) = oneshot::channel();
        tokio::spawn(watch_process(
            child,
            id,
            generation,
            self.player_type,
            self.events.clone(),
            self.startup_grace,
            cancelled,
        ));
        Ok(cancel)
    }

    fn is_playing(&self, handle: &EngineHandle) -> Result<bool, EngineError> {
        self.instances
            .get(&handle.id())
            .map(|i| i.playing)
            .ok_or(EngineError::UnknownHandle(handle.id()))
    }

    fn set_playing(&mut self, handle: &EngineHandle, playing: bool) {
        if let Some(instance) = self.instances.get_mut(&handle.id()) {
            instance.playing = playing;
        }
    }

    /// Send a command over mpv's JSON IPC socket
    fn ipc_command(&self, handle: &EngineHandle, command: serde_json::Value) -> Result<(), EngineError> {
        let instance = self
            .instances
            .get(&handle.id())
            .ok_or(EngineError::UnknownHandle(handle.id()))?;
        let Some(path) = instance.ipc.as_ref() else {
            return Err(EngineError::Unsupported("runtime control needs mpv"));
        };
        send_ipc(path, &command)
    }
}

#[cfg(unix)]
fn send_ipc(path: &PathBuf, command: &serde_json::Value) -> Result<(), EngineError> {
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    let line = format!("{{\"command\":{}}}\n", command);
    UnixStream::connect(path)
        .and_then(|mut stream| stream.write_all(line.as_bytes()))
        .map_err(|e| EngineError::Open(format!("mpv ipc: {}", e)))
}

#[cfg(not(unix))]
fn send_ipc(_path: &PathBuf, _command: &serde_json::Value) -> Result<(), EngineError> {
    Err(EngineError::Unsupported("runtime control needs a unix socket"))
}

/// Report the life of one player process as engine events
async fn watch_process(
    mut child: Child,
    id: EngineId,
    generation: u64,
    player: PlayerType,
    events: UnboundedSender<EngineEvent>,
    grace: Duration,
    mut cancelled: oneshot::Receiver<()>,
) {
    let send = |kind| {
        let _ = events.send(EngineEvent::new(id, generation, kind));
    };
    send(EngineEventKind::BufferingStart);

    tokio::select! {
        _ = &mut cancelled => return stop(child, id).await,
        status = child.wait() => return send(exit_event(player, status)),
        _ = tokio::time::sleep(grace) => send(EngineEventKind::PlayableFrame),
    }

    tokio::select! {
        _ = &mut cancelled => stop(child, id).await,
        status = child.wait() => send(exit_event(player, status)),
    }
}

/// Kill a released process and reap it
async fn stop(mut child: Child, id: EngineId) {
    if let Err(e) = child.kill().await {
        debug!(engine = %id, "Player process already gone: {}", e);
    }
}

fn exit_event(player: PlayerType, status: std::io::Result<ExitStatus>) -> EngineEventKind {
    let kind = match status {
        Ok(s) if s.success() => EngineEventKind::Ended,
        Ok(s) => EngineEventKind::FatalError(format!("{} exited with {}", player, s)),
        Err(e) => EngineEventKind::FatalError(format!("{} lost: {}", player, e)),
    };
    debug!(?kind, "Player process exited");
    kind
}

impl MediaEngine for LocalPlayerEngine {
    fn create(
        &mut self,
        surface: &SurfaceId,
        url: &str,
        autoplay: bool,
        generation: u64,
    ) -> Result<EngineHandle, EngineError> {
        if self.instances.values().any(|i| &i.surface == surface) {
            return Err(EngineError::SurfaceBusy(surface.clone()));
        }

        let handle = EngineHandle::new();
        let ipc = self.ipc_path(handle.id());
        let cancel = self.launch(handle.id(), generation, url, autoplay, ipc.as_ref())?;
        self.instances.insert(
            handle.id(),
            LocalInstance {
                surface: surface.clone(),
                cancel: Some(cancel),
                ipc,
                playing: autoplay,
            },
        );
        Ok(handle)
    }

    fn set_source(
        &mut self,
        handle: &EngineHandle,
        url: &str,
        generation: u64,
    ) -> Result<(), EngineError> {
        let instance = self
            .instances
            .get_mut(&handle.id())
            .ok_or(EngineError::UnknownHandle(handle.id()))?;

        // A process plays one address; reloading means restarting it.
        // The previous process is released before the next one starts.
        drop(instance.cancel.take());
        instance.playing = false;
        let ipc = instance.ipc.clone();

        let cancel = self.launch(handle.id(), generation, url, true, ipc.as_ref())?;
        if let Some(instance) = self.instances.get_mut(&handle.id()) {
            instance.cancel = Some(cancel);
            instance.playing = true;
        }
        Ok(())
    }

    fn play(&mut self, handle: &EngineHandle) -> Result<(), EngineError> {
        if self.is_playing(handle)? {
            return Ok(());
        }
        self.ipc_command(handle, serde_json::json!(["set_property", "pause", false]))?;
        self.set_playing(handle, true);
        Ok(())
    }

    fn pause(&mut self, handle: &EngineHandle) -> Result<(), EngineError> {
        self.ipc_command(handle, serde_json::json!(["set_property", "pause", true]))?;
        self.set_playing(handle, false);
        Ok(())
    }

    fn set_volume(&mut self, handle: &EngineHandle, volume: u8) -> Result<(), EngineError> {
        self.volume = volume.min(100);
        match self.ipc_command(handle, serde_json::json!(["set_property", "volume", self.volume])) {
            // Not reachable at runtime; applied on next launch instead
            Err(EngineError::Unsupported(_)) => Ok(()),
            other => other,
        }
    }

    fn dispose(&mut self, handle: EngineHandle) {
        if let Some(instance) = self.instances.remove(&handle.id()) {
            drop(instance.cancel);
            if let Some(path) = instance.ipc {
                if let Err(e) = std::fs::remove_file(&path) {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %path.display(), "Could not remove ipc socket: {}", e);
                    }
                }
            }
            debug!(engine = %handle.id(), "Player process released");
        }
    }
}
