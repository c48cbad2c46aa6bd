//! Playback controller
//!
//! Owns the single media session of a mounted player:
//! - builds and tears down engine instances (one per surface, never two)
//! - escalates from direct to proxy transport once per session on failure
//! - tracks loading / playing / stalled / errored for the UI
//!
//! The controller never blocks. The host feeds it engine events, user
//! commands and the current time, serially, and fires [`PlaybackController::poll_timers`]
//! when [`PlaybackController::next_deadline`] is reached.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::models::{Channel, ConnectionMode, EngineId, PlaybackStatus, SessionView, SurfaceId};
use crate::stream::engine::{EngineEvent, EngineEventKind, EngineHandle, MediaEngine};
use crate::stream::transport::{resolve_source, ProxyRule};

/// Shown while the stream is being moved to the proxy
pub const REROUTING: &str = "rerouting";

/// Shown once both transports failed
pub const SOURCE_UNREACHABLE: &str = "source unreachable";

/// Tunables for the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerOptions {
    /// Debounce between a direct failure and the switch to proxy
    pub reroute_delay: Duration,
    /// Start playing as soon as an engine is created
    pub autoplay: bool,
    /// Initial volume, 0..=100
    pub volume: u8,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            reroute_delay: Duration::from_secs(1),
            autoplay: true,
            volume: 80,
        }
    }
}

/// What happened to an engine event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    /// Event changed the session
    Applied,
    /// Event came from the current engine but needs no action
    Ignored,
    /// Event came from an engine that is no longer owned
    Stale,
    /// Current engine finished or was closed externally
    Ended,
}

/// Direct-to-proxy switch waiting for its debounce to elapse
#[derive(Debug, Clone, Copy)]
struct Escalation {
    /// Engine that failed; `None` when construction itself failed
    origin: Option<EngineId>,
    /// Load generation that failed
    generation: u64,
    due: Instant,
}

#[derive(Debug)]
struct Session {
    channel_id: String,
    /// `None` for channels without a source address
    source: Option<String>,
    mode: ConnectionMode,
    status: PlaybackStatus,
    last_error: Option<String>,
    engine: Option<EngineHandle>,
    /// Generation the engine's current load was started with
    generation: u64,
    escalation: Option<Escalation>,
}

impl Session {
    fn new(channel: &Channel) -> Self {
        Self {
            channel_id: channel.id.clone(),
            source: channel.source().map(str::to_string),
            mode: ConnectionMode::Direct,
            status: PlaybackStatus::Idle,
            last_error: None,
            engine: None,
            generation: 0,
            escalation: None,
        }
    }

    fn engine_id(&self) -> Option<EngineId> {
        self.engine.as_ref().map(EngineHandle::id)
    }

    /// Whether an event belongs to the load currently in progress
    fn owns(&self, origin: EngineId, generation: u64) -> bool {
        self.engine_id() == Some(origin) && self.generation == generation
    }
}

/// Adaptive playback controller for one rendering surface
pub struct PlaybackController<E: MediaEngine> {
    engine: E,
    surface: SurfaceId,
    proxy: ProxyRule,
    options: ControllerOptions,
    session: Option<Session>,
    retry_generation: u64,
    paused: bool,
    volume: u8,
    muted: bool,
}

impl<E: MediaEngine> PlaybackController<E> {
    pub fn new(engine: E, surface: SurfaceId, proxy: ProxyRule, options: ControllerOptions) -> Self {
        let volume = options.volume.min(100);
        Self {
            engine,
            surface,
            proxy,
            paused: !options.autoplay,
            options,
            session: None,
            retry_generation: 0,
            volume,
            muted: false,
        }
    }

    /// The engine this controller drives
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Id of the engine instance currently owned
    pub fn current_engine(&self) -> Option<EngineId> {
        self.session.as_ref().and_then(Session::engine_id)
    }

    /// Observable snapshot for the UI
    pub fn view(&self) -> SessionView {
        let mut view = SessionView {
            retry_generation: self.retry_generation,
            paused: self.paused,
            volume: self.volume,
            muted: self.muted,
            ..Default::default()
        };
        if let Some(session) = &self.session {
            view.channel_id = Some(session.channel_id.clone());
            view.status = session.status;
            view.connection_mode = session.mode;
            view.last_error = session.last_error.clone();
            view.placeholder = session.source.is_none();
        }
        view
    }

    /// Next instant at which [`Self::poll_timers`] has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.session
            .as_ref()
            .and_then(|s| s.escalation)
            .map(|e| e.due)
    }

    // -------------------------------------------------------------------------
    // Session lifecycle
    // -------------------------------------------------------------------------

    /// Make `channel` the active one (mount or channel change)
    ///
    /// The previous engine is always disposed before a new one is built.
    /// `None` or a channel without a source leaves the player idle.
    pub fn switch_channel(&mut self, channel: Option<&Channel>, now: Instant) {
        self.teardown();

        let Some(channel) = channel else {
            debug!("No channel selected");
            return;
        };

        self.paused = !self.options.autoplay;
        let mut session = Session::new(channel);
        if session.source.is_none() {
            info!(channel = %channel.id, "Channel has no source, showing placeholder");
            self.session = Some(session);
            return;
        }

        info!(channel = %channel.id, "Starting session");
        session.status = PlaybackStatus::Loading;
        self.session = Some(session);
        self.start_engine(now);
    }

    /// Release everything (player unmounted)
    pub fn unmount(&mut self) {
        self.teardown();
    }

    /// Dispose the owned engine and drop the session with its pending timer
    fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            if let Some(handle) = session.engine {
                debug!(engine = %handle.id(), channel = %session.channel_id, "Disposing engine");
                self.engine.dispose(handle);
            }
        }
    }

    /// Build an engine for the session's current transport
    fn start_engine(&mut self, now: Instant) {
        let volume = self.effective_volume();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(source) = session.source.as_deref() else {
            return;
        };

        let url = resolve_source(source, session.mode, &self.proxy);
        let generation = self.retry_generation;
        debug!(mode = %session.mode, %url, generation, "Creating engine");

        session.generation = generation;
        match self.engine.create(&self.surface, &url, !self.paused, generation) {
            Ok(handle) => {
                if let Err(e) = self.engine.set_volume(&handle, volume) {
                    warn!(engine = %handle.id(), "Could not apply volume: {}", e);
                }
                session.engine = Some(handle);
            }
            Err(e) => {
                warn!(mode = %session.mode, "Engine creation failed: {}", e);
                self.fail(None, generation, &e.to_string(), now);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Engine events
    // -------------------------------------------------------------------------

    /// Apply an engine event to the current session
    ///
    /// Events from anything but the load in progress on the currently
    /// owned instance are dropped.
    pub fn handle_event(&mut self, event: EngineEvent, now: Instant) -> EventDisposition {
        let Some(session) = self.session.as_mut() else {
            debug!(origin = %event.origin, "Discarding event, no session");
            return EventDisposition::Stale;
        };
        if !session.owns(event.origin, event.generation) {
            debug!(
                origin = %event.origin,
                generation = event.generation,
                kind = ?event.kind,
                "Discarding stale event"
            );
            return EventDisposition::Stale;
        }

        let rerouting = session.escalation.is_some();
        match event.kind {
            EngineEventKind::BufferingStart => match session.status {
                PlaybackStatus::Playing => {
                    session.status = PlaybackStatus::Stalled;
                    EventDisposition::Applied
                }
                _ => EventDisposition::Ignored,
            },
            EngineEventKind::PlayableFrame => match session.status {
                PlaybackStatus::Loading | PlaybackStatus::Stalled if !rerouting => {
                    info!(channel = %session.channel_id, mode = %session.mode, "Playing");
                    session.status = PlaybackStatus::Playing;
                    session.last_error = None;
                    EventDisposition::Applied
                }
                _ => EventDisposition::Ignored,
            },
            EngineEventKind::BufferExhausted => match session.status {
                PlaybackStatus::Playing => {
                    debug!(channel = %session.channel_id, "Buffer exhausted");
                    session.status = PlaybackStatus::Stalled;
                    EventDisposition::Applied
                }
                _ => EventDisposition::Ignored,
            },
            EngineEventKind::FatalError(reason) => {
                if session.status == PlaybackStatus::Errored || rerouting {
                    return EventDisposition::Ignored;
                }
                self.fail(Some(event.origin), event.generation, &reason, now);
                EventDisposition::Applied
            }
            EngineEventKind::Ended => {
                info!(channel = %session.channel_id, "Engine ended");
                EventDisposition::Ended
            }
        }
    }

    /// Failure of the current attempt: escalate once, then give up
    fn fail(&mut self, origin: Option<EngineId>, generation: u64, reason: &str, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match session.mode {
            ConnectionMode::Direct => {
                info!(
                    channel = %session.channel_id,
                    delay_ms = self.options.reroute_delay.as_millis() as u64,
                    "Direct playback failed ({}), rerouting through proxy",
                    reason
                );
                session.mode = ConnectionMode::Proxy;
                session.status = PlaybackStatus::Loading;
                session.last_error = Some(REROUTING.to_string());
                session.escalation = Some(Escalation {
                    origin,
                    generation,
                    due: now + self.options.reroute_delay,
                });
            }
            ConnectionMode::Proxy => {
                warn!(channel = %session.channel_id, "Proxy playback failed: {}", reason);
                session.status = PlaybackStatus::Errored;
                session.last_error = Some(SOURCE_UNREACHABLE.to_string());
            }
        }
    }

    /// Fire the escalation timer if it is due; returns whether it fired
    pub fn poll_timers(&mut self, now: Instant) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(escalation) = session.escalation else {
            return false;
        };
        if now < escalation.due {
            return false;
        }
        session.escalation = None;

        if session.engine_id() != escalation.origin || session.generation != escalation.generation {
            debug!("Escalation belongs to a replaced load, skipping");
            return false;
        }

        if let Some(old) = session.engine.take() {
            debug!(engine = %old.id(), "Replacing engine for proxy transport");
            self.engine.dispose(old);
        }
        self.start_engine(now);
        true
    }

    // -------------------------------------------------------------------------
    // User commands
    // -------------------------------------------------------------------------

    /// Manual retry: back to direct, reload the current engine
    ///
    /// Returns `false` when there is nothing playable to retry.
    pub fn retry(&mut self, now: Instant) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let Some(source) = session.source.clone() else {
            return false;
        };

        self.retry_generation += 1;
        info!(
            channel = %session.channel_id,
            generation = self.retry_generation,
            "Retrying"
        );
        session.mode = ConnectionMode::Direct;
        session.status = PlaybackStatus::Loading;
        session.last_error = None;
        session.escalation = None;

        let Some(handle) = session.engine.clone() else {
            self.start_engine(now);
            return true;
        };

        // Callbacks still queued from the previous load go stale here
        let generation = self.retry_generation;
        session.generation = generation;
        let url = resolve_source(&source, ConnectionMode::Direct, &self.proxy);
        let reloaded = self
            .engine
            .set_source(&handle, &url, generation)
            .and_then(|_| self.engine.play(&handle));
        match reloaded {
            Ok(()) => self.paused = false,
            Err(e) => {
                warn!(engine = %handle.id(), "Reload failed: {}", e);
                self.fail(Some(handle.id()), generation, &e.to_string(), now);
            }
        }
        true
    }

    /// Flip between playing and paused on the current engine
    ///
    /// No-op without an engine.
    pub fn toggle_play(&mut self) -> bool {
        let Some(handle) = self.session.as_ref().and_then(|s| s.engine.as_ref()) else {
            return false;
        };

        let result = if self.paused {
            self.engine.play(handle)
        } else {
            self.engine.pause(handle)
        };
        match result {
            Ok(()) => {
                self.paused = !self.paused;
                true
            }
            Err(e) => {
                warn!(engine = %handle.id(), "Play/pause failed: {}", e);
                false
            }
        }
    }

    /// Set volume (clamped to 100); also unmutes
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        self.muted = false;
        self.apply_volume();
    }

    /// Mute or restore the previous volume
    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        self.apply_volume();
    }

    fn effective_volume(&self) -> u8 {
        if self.muted {
            0
        } else {
            self.volume
        }
    }

    fn apply_volume(&mut self) {
        let volume = self.effective_volume();
        if let Some(handle) = self.session.as_ref().and_then(|s| s.engine.as_ref()) {
            if let Err(e) = self.engine.set_volume(handle, volume) {
                warn!(engine = %handle.id(), "Could not apply volume: {}", e);
            }
        }
    }
}

impl<E: MediaEngine> Drop for PlaybackController<E> {
    fn drop(&mut self) {
        self.teardown();
    }
}
