//! # Playback Engine
//!
//! Actor wrapper around [`PlaybackDriver`].
//!
//! Host commands, producer deliveries and audio output notifications all
//! arrive on one unbounded queue and are applied strictly one at a time by a
//! single task. No operation ever observes another half-applied.
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{EngineBridges, PlaybackConfig, PlaybackEngine};
//!
//! let (engine, handle) = PlaybackEngine::new(PlaybackConfig::default(), bridges)?;
//! engine.spawn();
//!
//! let generation = handle.init(12, 95.0, 1.0).await?;
//! handle.deliver(ChunkDelivery::tagged(generation, chunks));
//! handle.seek(30.0).await?;
//! ```

use crate::cache::CacheStats;
use crate::config::PlaybackConfig;
use crate::driver::{EngineBridges, PlaybackDriver};
use crate::error::{PlaybackError, Result};
use crate::state::DriverState;
use bridge_traits::{ChunkDelivery, MediaEvent, MediaListener, PlaybackState, SessionGeneration};
use bytes::Bytes;
use core_runtime::events::EventBus;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

type Reply<T> = oneshot::Sender<Result<T>>;

/// Host-facing commands. Each carries the channel its outcome is sent back on.
#[derive(Debug)]
pub enum Command {
    Init {
        total_chunks: usize,
        estimated_duration: f64,
        speed: f32,
        reply: Reply<SessionGeneration>,
    },
    AddChunks {
        delivery: ChunkDelivery,
        reply: Reply<usize>,
    },
    Play(Reply<()>),
    Pause(Reply<()>),
    Resume(Reply<()>),
    Stop(Reply<()>),
    Seek {
        target: f64,
        reply: Reply<()>,
    },
    SetSpeed {
        speed: f32,
        reply: Reply<()>,
    },
    PlaySingle {
        data: Bytes,
        speed: f32,
        reply: Reply<SessionGeneration>,
    },
    GetState(Reply<PlaybackState>),
    Status(Reply<EngineStatus>),
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Init { .. } => "init",
            Command::AddChunks { .. } => "add_chunks",
            Command::Play(_) => "play",
            Command::Pause(_) => "pause",
            Command::Resume(_) => "resume",
            Command::Stop(_) => "stop",
            Command::Seek { .. } => "seek",
            Command::SetSpeed { .. } => "set_speed",
            Command::PlaySingle { .. } => "play_single",
            Command::GetState(_) => "get_state",
            Command::Status(_) => "status",
        }
    }
}

/// Everything the engine task processes.
#[derive(Debug)]
pub enum Operation {
    Command(Command),
    /// Producer answer; outcome is only logged.
    Deliver(ChunkDelivery),
    Media(MediaEvent),
    Shutdown(oneshot::Sender<()>),
}

/// Diagnostics snapshot of the engine internals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub state: DriverState,
    pub generation: SessionGeneration,
    pub current_chunk: Option<usize>,
    pub queued: Vec<usize>,
    pub measured_durations: usize,
    pub cache: CacheStats,
}

/// The engine task. Consumed by [`run`](Self::run) or [`spawn`](Self::spawn).
pub struct PlaybackEngine {
    driver: PlaybackDriver,
    receiver: mpsc::UnboundedReceiver<Operation>,
}

impl PlaybackEngine {
    /// Build the engine and the handle used to talk to it.
    ///
    /// The audio output listener only holds a weak reference to the queue,
    /// so the task ends once every [`EngineHandle`] is dropped.
    pub fn new(config: PlaybackConfig, bridges: EngineBridges) -> Result<(Self, EngineHandle)> {
        config.validate()?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let weak = sender.downgrade();
        let listener: MediaListener = Arc::new(move |event: MediaEvent| {
            if let Some(sender) = weak.upgrade() {
                let _ = sender.send(Operation::Media(event));
            }
        });

        let driver = PlaybackDriver::new(config, bridges, listener);
        Ok((Self { driver, receiver }, EngineHandle { sender }))
    }

    /// Publish [`PlaybackEvent`](core_runtime::events::PlaybackEvent)s on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.driver.set_event_bus(bus);
        self
    }

    /// Process operations until shutdown or until every handle is gone.
    pub async fn run(mut self) {
        info!("Playback engine started");

        while let Some(operation) = self.receiver.recv().await {
            match operation {
                Operation::Command(command) => self.handle_command(command).await,
                Operation::Deliver(delivery) => {
                    if let Err(err) = self.driver.add_chunks(delivery).await {
                        log_failure("deliver", &err);
                    }
                }
                Operation::Media(event) => {
                    if let Err(err) = self.driver.handle_media_event(event).await {
                        log_failure("media_event", &err);
                    }
                }
                Operation::Shutdown(ack) => {
                    self.driver.shutdown();
                    let _ = ack.send(());
                    info!("Playback engine shut down");
                    return;
                }
            }
        }

        self.driver.shutdown();
        info!("Playback engine stopped, all handles dropped");
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn handle_command(&mut self, command: Command) {
        let name = command.name();
        debug!(command = name, "Handling command");

        match command {
            Command::Init {
                total_chunks,
                estimated_duration,
                speed,
                reply,
            } => {
                let result = self.driver.init(total_chunks, estimated_duration, speed);
                respond(name, reply, result);
            }
            Command::AddChunks { delivery, reply } => {
                let result = self.driver.add_chunks(delivery).await;
                respond(name, reply, result);
            }
            Command::Play(reply) => {
                let result = self.driver.play().await;
                respond(name, reply, result);
            }
            Command::Pause(reply) => {
                let result = self.driver.pause();
                respond(name, reply, result);
            }
            Command::Resume(reply) => {
                let result = self.driver.resume().await;
                respond(name, reply, result);
            }
            Command::Stop(reply) => {
                self.driver.stop();
                respond(name, reply, Ok(()));
            }
            Command::Seek { target, reply } => {
                let result = self.driver.seek(target).await;
                respond(name, reply, result);
            }
            Command::SetSpeed { speed, reply } => {
                let result = self.driver.set_speed(speed);
                respond(name, reply, result);
            }
            Command::PlaySingle { data, speed, reply } => {
                let result = self.driver.play_single(data, speed).await;
                respond(name, reply, result);
            }
            Command::GetState(reply) => {
                respond(name, reply, Ok(self.driver.snapshot()));
            }
            Command::Status(reply) => {
                respond(name, reply, Ok(self.status()));
            }
        }
    }

    fn status(&self) -> EngineStatus {
        let session = self.driver.session();
        EngineStatus {
            state: self.driver.state(),
            generation: session.generation,
            current_chunk: session.current_chunk,
            queued: session.queue.indices(),
            measured_durations: session.durations.measured_count(),
            cache: self.driver.cache_stats(),
        }
    }
}

fn respond<T>(command: &'static str, reply: Reply<T>, result: Result<T>) {
    if let Err(err) = &result {
        log_failure(command, err);
    }
    if reply.send(result).is_err() {
        debug!(command, "Caller went away before the reply");
    }
}

fn log_failure(operation: &'static str, err: &PlaybackError) {
    if err.is_stale() {
        debug!(operation, error = %err, "Ignored stale input");
    } else {
        warn!(operation, error = %err, "Playback operation failed");
    }
}

/// Cloneable front door to a running [`PlaybackEngine`].
///
/// Every method except [`deliver`](Self::deliver) waits for the engine to
/// apply the operation. Once the engine is gone they fail with
/// [`PlaybackError::EngineClosed`].
#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: mpsc::UnboundedSender<Operation>,
}

impl EngineHandle {
    /// Start a new session of `total_chunks` chunks.
    pub async fn init(
        &self,
        total_chunks: usize,
        estimated_duration: f64,
        speed: f32,
    ) -> Result<SessionGeneration> {
        self.request(|reply| Command::Init {
            total_chunks,
            estimated_duration,
            speed,
            reply,
        })
        .await
    }

    /// Deliver chunks and wait for them to be applied.
    pub async fn add_chunks(&self, delivery: ChunkDelivery) -> Result<usize> {
        self.request(|reply| Command::AddChunks { delivery, reply })
            .await
    }

    /// Deliver chunks without waiting. Intended for producers.
    pub fn deliver(&self, delivery: ChunkDelivery) -> Result<()> {
        self.send(Operation::Deliver(delivery))
    }

    pub async fn play(&self) -> Result<()> {
        self.request(Command::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(Command::Resume).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    /// Seek to `target` seconds of narration time.
    pub async fn seek(&self, target: f64) -> Result<()> {
        self.request(|reply| Command::Seek { target, reply }).await
    }

    pub async fn set_speed(&self, speed: f32) -> Result<()> {
        self.request(|reply| Command::SetSpeed { speed, reply })
            .await
    }

    /// Play one complete audio blob as its own session.
    pub async fn play_single(&self, data: impl Into<Bytes>, speed: f32) -> Result<SessionGeneration> {
        let data = data.into();
        self.request(|reply| Command::PlaySingle { data, speed, reply })
            .await
    }

    pub async fn get_state(&self) -> Result<PlaybackState> {
        self.request(Command::GetState).await
    }

    pub async fn status(&self) -> Result<EngineStatus> {
        self.request(Command::Status).await
    }

    /// Stop the engine task after releasing the active handle. Operations
    /// queued behind the shutdown are dropped.
    pub async fn shutdown(&self) -> Result<()> {
        let (ack, done) = oneshot::channel();
        self.send(Operation::Shutdown(ack))?;
        done.await.map_err(|_| PlaybackError::EngineClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn send(&self, operation: Operation) -> Result<()> {
        self.sender
            .send(operation)
            .map_err(|_| PlaybackError::EngineClosed)
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.send(Operation::Command(command(reply)))?;
        response.await.map_err(|_| PlaybackError::EngineClosed)?
    }
}
