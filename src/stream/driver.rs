//! Async player driver
//!
//! Runs a [`PlaybackController`] on a single task. User commands, engine
//! events and the reroute timer are all funnelled through one `select!`
//! loop, so the controller only ever sees one thing at a time.

use std::time::Instant;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::models::{Channel, SessionView};
use crate::stream::controller::{EventDisposition, PlaybackController};
use crate::stream::engine::{EngineEvent, MediaEngine};

/// Commands accepted by the driver
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    SwitchChannel(Option<Channel>),
    Retry,
    TogglePlay,
    SetVolume(u8),
    ToggleMute,
    Unmount,
}

/// Why the driver stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    /// Unmount requested, or every handle dropped
    Unmounted,
    /// The current engine finished playing
    Ended,
    /// The engine event channel closed
    EngineClosed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("Player has stopped")]
    Stopped,
}

/// Cloneable handle used to talk to a running driver
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<PlayerCommand>,
    view: watch::Receiver<SessionView>,
}

impl PlayerHandle {
    pub fn send(&self, command: PlayerCommand) -> Result<(), DriverError> {
        self.commands.send(command).map_err(|_| DriverError::Stopped)
    }

    pub fn switch_channel(&self, channel: Option<Channel>) -> Result<(), DriverError> {
        self.send(PlayerCommand::SwitchChannel(channel))
    }

    pub fn retry(&self) -> Result<(), DriverError> {
        self.send(PlayerCommand::Retry)
    }

    pub fn toggle_play(&self) -> Result<(), DriverError> {
        self.send(PlayerCommand::TogglePlay)
    }

    pub fn set_volume(&self, volume: u8) -> Result<(), DriverError> {
        self.send(PlayerCommand::SetVolume(volume))
    }

    pub fn unmount(&self) -> Result<(), DriverError> {
        self.send(PlayerCommand::Unmount)
    }

    /// Latest published session view
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    /// Receiver notified on every view change
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }
}

/// Single-task event loop around a controller
pub struct PlayerDriver<E: MediaEngine> {
    controller: PlaybackController<E>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    commands: mpsc::UnboundedReceiver<PlayerCommand>,
    view: watch::Sender<SessionView>,
}

impl<E: MediaEngine + Send + 'static> PlayerDriver<E> {
    /// Start the loop on a new task
    ///
    /// `events` must be the receiving end of the channel the engine
    /// reports into.
    pub fn spawn(
        controller: PlaybackController<E>,
        events: mpsc::UnboundedReceiver<EngineEvent>,
    ) -> (PlayerHandle, JoinHandle<DriverExit>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(controller.view());

        let driver = Self {
            controller,
            events,
            commands: cmd_rx,
            view: view_tx,
        };
        let task = tokio::spawn(driver.run());

        (
            PlayerHandle {
                commands: cmd_tx,
                view: view_rx,
            },
            task,
        )
    }

    async fn run(mut self) -> DriverExit {
        let exit = loop {
            let deadline = self.controller.next_deadline();
            let sleep = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now).into());

            tokio::select! {
                command = self.commands.recv() => match command {
                    None | Some(PlayerCommand::Unmount) => break DriverExit::Unmounted,
                    Some(command) => self.apply(command),
                },
                event = self.events.recv() => match event {
                    None => break DriverExit::EngineClosed,
                    Some(event) => {
                        if self.controller.handle_event(event, Instant::now()) == EventDisposition::Ended {
                            break DriverExit::Ended;
                        }
                    }
                },
                _ = sleep, if deadline.is_some() => {
                    self.controller.poll_timers(Instant::now());
                }
            }
            self.publish();
        };

        info!(?exit, "Player driver stopping");
        self.controller.unmount();
        self.publish();
        exit
    }

    fn apply(&mut self, command: PlayerCommand) {
        debug!(?command, "Player command");
        let now = Instant::now();
        match command {
            PlayerCommand::SwitchChannel(channel) => {
                self.controller.switch_channel(channel.as_ref(), now)
            }
            PlayerCommand::Retry => {
                self.controller.retry(now);
            }
            PlayerCommand::TogglePlay => {
                self.controller.toggle_play();
            }
            PlayerCommand::SetVolume(volume) => self.controller.set_volume(volume),
            PlayerCommand::ToggleMute => self.controller.toggle_mute(),
            PlayerCommand::Unmount => self.controller.unmount(),
        }
    }

    fn publish(&self) {
        let next = self.controller.view();
        self.view.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
