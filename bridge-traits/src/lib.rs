//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host.
//!
//! ## Overview
//!
//! This crate defines the contract between the narration playback core and the
//! host context it runs in. The engine never decodes audio, synthesizes speech,
//! or talks to a UI directly; every one of those capabilities is reached
//! through a trait defined here.
//!
//! ## Traits
//!
//! ### Playback
//! - [`AudioOutput`](playback::AudioOutput) - Platform decode/play primitive (one handle per chunk)
//!
//! ### Chunk supply & state egress
//! - [`ChunkProducer`](chunk::ChunkProducer) - Fire-and-forget chunk fetch requests
//! - [`StateTransport`](transport::StateTransport) - Best-effort playback state publishing
//!
//! ### Utilities
//! - [`LoggerSink`](logger::LoggerSink) - Forward structured logs to host logging
//!
//! ## Delivery Contract
//!
//! Both outbound channels (`ChunkProducer::request_chunks` and
//! `StateTransport::publish`) are one-way and at-most-once. A request may never
//! be answered and a published snapshot may never be observed. Implementations
//! return an error when a message could not be handed off, but the engine
//! treats those errors as informational only.
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert their native errors and keep messages
//! actionable (e.g. "autoplay blocked", "listener gone").
//!
//! ## Thread Safety
//!
//! On native targets every bridge trait requires `Send + Sync` (see
//! [`platform`]). On `wasm32` those bounds are relaxed because browser objects
//! are single-threaded.

pub mod chunk;
pub mod error;
pub mod logger;
pub mod platform;
pub mod playback;
pub mod transport;

pub use error::BridgeError;

// Re-export commonly used types
pub use chunk::{Chunk, ChunkDelivery, ChunkProducer, ChunkRequest, RequestPriority, SessionGeneration};
pub use playback::{
    AudioOutput, MediaEvent, MediaEventKind, MediaHandleId, MediaListener, MediaSource,
    PlaybackState,
};
pub use logger::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use transport::{NullTransport, StateTransport};
