//! # Event Bus System
//!
//! Typed, broadcast-based observation of the playback core using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: [`PlaybackEvent`] (engine lifecycle) and
//!   [`ProducerEvent`] (synthesis side) wrapped in [`CoreEvent`]
//! - **EventBus**: cloneable broadcast sender
//! - **EventStream**: receiver wrapper with an optional filter
//!
//! The event bus is purely observational. Playback state still flows to the UI
//! through the `StateTransport` bridge; nothing in the engine depends on an
//! event being received.
//!
//! ```text
//! ┌─────────────┐    emit     ┌───────────┐   subscribe   ┌────────────┐
//! │   Engine    ├────────────>│ EventBus  ├──────────────>│ Subscriber │
//! └─────────────┘             │ (broadcast│               └────────────┘
//! ┌─────────────┐    emit     │  channel) │   subscribe   ┌────────────┐
//! │  Producer   ├────────────>│           ├──────────────>│ Subscriber │
//! └─────────────┘             └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//! use bridge_traits::SessionGeneration;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(32);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Completed {
//!     generation: SessionGeneration::new(1),
//! }))
//! .ok();
//!
//! assert!(matches!(rx.recv().await, Ok(CoreEvent::Playback(_))));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; keep reading.
//! - **`RecvError::Closed`**: every sender was dropped; the core shut down.

use bridge_traits::SessionGeneration;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playback(PlaybackEvent),
    Producer(ProducerEvent),
}

impl CoreEvent {
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Producer(e) => e.description(),
        }
    }

    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Producer(ProducerEvent::SynthesisFailed { .. }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Buffering { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::SessionStarted { .. })
            | CoreEvent::Playback(PlaybackEvent::Completed { .. })
            | CoreEvent::Playback(PlaybackEvent::Stopped { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// Session the event belongs to, when it is tied to one.
    pub fn generation(&self) -> Option<SessionGeneration> {
        match self {
            CoreEvent::Playback(e) => e.generation(),
            CoreEvent::Producer(e) => Some(e.generation()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Engine lifecycle notifications. Times are seconds of global narration time
/// unless named `offset` (chunk-local).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// `init` created a new session.
    SessionStarted {
        generation: SessionGeneration,
        total_chunks: usize,
        estimated_duration: f64,
    },
    /// A chunk was loaded and handed to the audio output.
    ChunkStarted {
        generation: SessionGeneration,
        chunk_index: usize,
        elapsed_before: f64,
    },
    /// A chunk played to its end.
    ChunkCompleted {
        generation: SessionGeneration,
        chunk_index: usize,
        duration: f64,
    },
    /// A seek was resolved to a chunk position.
    SeekRequested {
        generation: SessionGeneration,
        target: f64,
        chunk_index: usize,
        offset: f64,
        cached: bool,
    },
    /// A pending seek offset was applied after metadata arrived.
    SeekApplied {
        generation: SessionGeneration,
        chunk_index: usize,
        offset: f64,
    },
    /// Playback wants the next chunk but nothing is queued.
    Buffering {
        generation: SessionGeneration,
        next_index: Option<usize>,
    },
    /// A request window was sent to the producer.
    ChunksRequested {
        generation: SessionGeneration,
        start_index: usize,
        count: usize,
        seek: bool,
    },
    Paused {
        generation: SessionGeneration,
        progress: f64,
    },
    Resumed {
        generation: SessionGeneration,
        progress: f64,
    },
    SpeedChanged {
        generation: SessionGeneration,
        speed: f32,
    },
    /// The last chunk ended.
    Completed { generation: SessionGeneration },
    /// `stop` discarded the session.
    Stopped { generation: SessionGeneration },
    Error {
        generation: Option<SessionGeneration>,
        chunk_index: Option<usize>,
        message: String,
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::SessionStarted { .. } => "Playback session started",
            PlaybackEvent::ChunkStarted { .. } => "Chunk started",
            PlaybackEvent::ChunkCompleted { .. } => "Chunk completed",
            PlaybackEvent::SeekRequested { .. } => "Seek requested",
            PlaybackEvent::SeekApplied { .. } => "Seek applied",
            PlaybackEvent::Buffering { .. } => "Waiting for chunks",
            PlaybackEvent::ChunksRequested { .. } => "Chunks requested",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::SpeedChanged { .. } => "Playback speed changed",
            PlaybackEvent::Completed { .. } => "Narration completed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }

    pub fn generation(&self) -> Option<SessionGeneration> {
        match self {
            PlaybackEvent::SessionStarted { generation, .. }
            | PlaybackEvent::ChunkStarted { generation, .. }
            | PlaybackEvent::ChunkCompleted { generation, .. }
            | PlaybackEvent::SeekRequested { generation, .. }
            | PlaybackEvent::SeekApplied { generation, .. }
            | PlaybackEvent::Buffering { generation, .. }
            | PlaybackEvent::ChunksRequested { generation, .. }
            | PlaybackEvent::Paused { generation, .. }
            | PlaybackEvent::Resumed { generation, .. }
            | PlaybackEvent::SpeedChanged { generation, .. }
            | PlaybackEvent::Completed { generation }
            | PlaybackEvent::Stopped { generation } => Some(*generation),
            PlaybackEvent::Error { generation, .. } => *generation,
        }
    }
}

// ============================================================================
// Producer Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum ProducerEvent {
    ChunkSynthesized {
        generation: SessionGeneration,
        chunk_index: usize,
        bytes: usize,
    },
    SynthesisFailed {
        generation: SessionGeneration,
        chunk_index: usize,
        message: String,
    },
    /// A request was not served (already in flight, stale, or out of range).
    RequestSkipped {
        generation: SessionGeneration,
        start_index: usize,
        reason: String,
    },
}

impl ProducerEvent {
    fn description(&self) -> &str {
        match self {
            ProducerEvent::ChunkSynthesized { .. } => "Chunk synthesized",
            ProducerEvent::SynthesisFailed { .. } => "Chunk synthesis failed",
            ProducerEvent::RequestSkipped { .. } => "Chunk request skipped",
        }
    }

    pub fn generation(&self) -> SessionGeneration {
        match self {
            ProducerEvent::ChunkSynthesized { generation, .. }
            | ProducerEvent::SynthesisFailed { generation, .. }
            | ProducerEvent::RequestSkipped { generation, .. } => *generation,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel. Cloning is cheap and every clone publishes to
/// the same subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Returns the number of subscribers that received it,
    /// or an error when there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver with an optional predicate; non-matching events are skipped.
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Only events tied to `generation`.
    pub fn for_generation(self, generation: SessionGeneration) -> Self {
        self.filter(move |event| event.generation() == Some(generation))
    }

    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
