//! Media engine boundary
//!
//! The engine decodes and renders the stream. It is a black box to the
//! player: the controller drives it through [`MediaEngine`] and receives
//! [`EngineEvent`]s tagged with the instance that produced them.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::models::{EngineId, SurfaceId};

/// Handle to one constructed engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineHandle {
    id: EngineId,
}

impl EngineHandle {
    pub fn new() -> Self {
        Self { id: EngineId::new() }
    }

    pub fn id(&self) -> EngineId {
        self.id
    }
}

impl Default for EngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// What an engine reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEventKind {
    /// Engine is waiting for data
    BufferingStart,
    /// A frame can be rendered
    PlayableFrame,
    /// Buffer ran out mid-playback
    BufferExhausted,
    /// Unrecoverable decode or network failure
    FatalError(String),
    /// Stream finished or the engine was closed from the outside
    Ended,
}

/// Event delivered to the controller
///
/// An instance can load several addresses over its life, so the event
/// carries both the instance and the generation of the load it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    /// Instance the event originated from
    pub origin: EngineId,
    /// Generation passed to the `create` or `set_source` that started the load
    pub generation: u64,
    pub kind: EngineEventKind,
}

impl EngineEvent {
    pub fn new(origin: EngineId, generation: u64, kind: EngineEventKind) -> Self {
        Self {
            origin,
            generation,
            kind,
        }
    }
}

/// Errors from engine operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("Surface '{0}' is already in use")]
    SurfaceBusy(SurfaceId),
    #[error("Engine instance {0} does not exist")]
    UnknownHandle(EngineId),
    #[error("Failed to open stream: {0}")]
    Open(String),
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
}

/// Media engine contract
///
/// Implementations deliver events asynchronously, never from inside these
/// calls.
pub trait MediaEngine {
    /// Construct an instance bound to `surface` and start loading `url`
    ///
    /// Events of this load are stamped with `generation`.
    fn create(
        &mut self,
        surface: &SurfaceId,
        url: &str,
        autoplay: bool,
        generation: u64,
    ) -> Result<EngineHandle, EngineError>;

    /// Reload an existing instance with a new address
    ///
    /// Events of the new load are stamped with `generation`; the previous
    /// load is abandoned.
    fn set_source(
        &mut self,
        handle: &EngineHandle,
        url: &str,
        generation: u64,
    ) -> Result<(), EngineError>;

    fn play(&mut self, handle: &EngineHandle) -> Result<(), EngineError>;

    fn pause(&mut self, handle: &EngineHandle) -> Result<(), EngineError>;

    /// Volume in 0..=100
    fn set_volume(&mut self, handle: &EngineHandle, volume: u8) -> Result<(), EngineError>;

    /// Release the instance and its surface. Never fails.
    fn dispose(&mut self, handle: EngineHandle);
}

// =============================================================================
// Scripted Engine
// =============================================================================

/// Outcome of loading an address in a [`ScriptedEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedOutcome {
    /// Buffer, then play
    Play,
    /// Buffer, then report a fatal error
    Fail(String),
    /// Refuse to construct the instance at all
    Unavailable(String),
}

/// Engine call, as recorded by [`ScriptedEngine`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Create {
        id: EngineId,
        surface: SurfaceId,
        url: String,
        autoplay: bool,
    },
    SetSource { id: EngineId, url: String },
    Play(EngineId),
    Pause(EngineId),
    SetVolume(EngineId, u8),
    Dispose(EngineId),
}

#[derive(Debug)]
struct ScriptedInstance {
    surface: SurfaceId,
    url: String,
    playing: bool,
    volume: u8,
}

type Script = Box<dyn FnMut(&str) -> ScriptedOutcome + Send>;

/// Deterministic in-process engine
///
/// Decides the fate of every load through a script and queues the
/// resulting events on a channel, like a real engine would from its own
/// I/O. Keeps a journal of every call for dry runs and inspection.
pub struct ScriptedEngine {
    events: UnboundedSender<EngineEvent>,
    script: Script,
    instances: HashMap<EngineId, ScriptedInstance>,
    surfaces: HashMap<SurfaceId, EngineId>,
    calls: Vec<EngineCall>,
}

impl ScriptedEngine {
    /// Engine that decides each load with `script`
    pub fn new(
        events: UnboundedSender<EngineEvent>,
        script: impl FnMut(&str) -> ScriptedOutcome + Send + 'static,
    ) -> Self {
        Self {
            events,
            script: Box::new(script),
            instances: HashMap::new(),
            surfaces: HashMap::new(),
            calls: Vec::new(),
        }
    }

    /// Engine on which every load succeeds
    pub fn always_play(events: UnboundedSender<EngineEvent>) -> Self {
        Self::new(events, |_| ScriptedOutcome::Play)
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    /// Number of live instances
    pub fn live_instances(&self) -> usize {
        self.instances.len()
    }

    /// Whether the instance exists and is playing
    pub fn is_playing(&self, id: EngineId) -> Option<bool> {
        self.instances.get(&id).map(|i| i.playing)
    }

    /// Address the instance was last loaded with
    pub fn current_url(&self, id: EngineId) -> Option<&str> {
        self.instances.get(&id).map(|i| i.url.as_str())
    }

    /// Volume of the instance
    pub fn volume(&self, id: EngineId) -> Option<u8> {
        self.instances.get(&id).map(|i| i.volume)
    }

    /// Queue the events of one load on instance `id`
    fn schedule_load(&mut self, id: EngineId, generation: u64, outcome: ScriptedOutcome) {
        // Receiver gone means nobody listens anymore
        let _ = self.events.send(EngineEvent::new(
            id,
            generation,
            EngineEventKind::BufferingStart,
        ));
        let kind = match outcome {
            ScriptedOutcome::Play => EngineEventKind::PlayableFrame,
            ScriptedOutcome::Fail(reason) | ScriptedOutcome::Unavailable(reason) => {
                EngineEventKind::FatalError(reason)
            }
        };
        let _ = self.events.send(EngineEvent::new(id, generation, kind));
    }

    fn instance_mut(&mut self, handle: &EngineHandle) -> Result<&mut ScriptedInstance, EngineError> {
        self.instances
            .get_mut(&handle.id())
            .ok_or(EngineError::UnknownHandle(handle.id()))
    }
}

impl MediaEngine for ScriptedEngine {
    fn create(
        &mut self,
        surface: &SurfaceId,
        url: &str,
        autoplay: bool,
        generation: u64,
    ) -> Result<EngineHandle, EngineError> {
        if self.surfaces.contains_key(surface) {
            return Err(EngineError::SurfaceBusy(surface.clone()));
        }

        let outcome = (self.script)(url);
        if let ScriptedOutcome::Unavailable(reason) = outcome {
            return Err(EngineError::Open(reason));
        }

        let handle = EngineHandle::new();
        self.calls.push(EngineCall::Create {
            id: handle.id(),
            surface: surface.clone(),
            url: url.to_string(),
            autoplay,
        });
        self.surfaces.insert(surface.clone(), handle.id());
        self.instances.insert(
            handle.id(),
            ScriptedInstance {
                surface: surface.clone(),
                url: url.to_string(),
                playing: autoplay,
                volume: 100,
            },
        );
        self.schedule_load(handle.id(), generation, outcome);
        Ok(handle)
    }

    fn set_source(
        &mut self,
        handle: &EngineHandle,
        url: &str,
        generation: u64,
    ) -> Result<(), EngineError> {
        self.instance_mut(handle)?.url = url.to_string();
        self.calls.push(EngineCall::SetSource {
            id: handle.id(),
            url: url.to_string(),
        });
        let outcome = (self.script)(url);
        self.schedule_load(handle.id(), generation, outcome);
        Ok(())
    }

    fn play(&mut self, handle: &EngineHandle) -> Result<(), EngineError> {
        self.instance_mut(handle)?.playing = true;
        self.calls.push(EngineCall::Play(handle.id()));
        Ok(())
    }

    fn pause(&mut self, handle: &EngineHandle) -> Result<(), EngineError> {
        self.instance_mut(handle)?.playing = false;
        self.calls.push(EngineCall::Pause(handle.id()));
        Ok(())
    }

    fn set_volume(&mut self, handle: &EngineHandle, volume: u8) -> Result<(), EngineError> {
        self.instance_mut(handle)?.volume = volume.min(100);
        self.calls.push(EngineCall::SetVolume(handle.id(), volume.min(100)));
        Ok(())
    }

    fn dispose(&mut self, handle: EngineHandle) {
        if let Some(instance) = self.instances.remove(&handle.id()) {
            self.surfaces.remove(&instance.surface);
            self.calls.push(EngineCall::Dispose(handle.id()));
        }
    }
}
