//! # Chunked Playback Module
//!
//! Gapless-enough playback of a narration that is synthesized as a sequence
//! of independently encoded audio chunks.
//!
//! ## Overview
//!
//! This module handles:
//! - Ordering out-of-order deliveries into a play queue
//! - Read-ahead requests to the chunk producer (watermark and in-chunk trigger)
//! - Per-chunk duration bookkeeping with estimated placeholders
//! - Global-time seeking, served from the session cache when possible
//! - Session generations so late deliveries from an old session are dropped
//!
//! The engine never decodes audio. Each chunk is handed to the host's
//! [`AudioOutput`](bridge_traits::AudioOutput) and progress comes back as
//! [`MediaEvent`](bridge_traits::MediaEvent)s.

pub mod cache;
pub mod config;
pub mod driver;
pub mod duration;
pub mod engine;
pub mod error;
pub mod prefetch;
pub mod queue;
pub mod seek;
pub mod session;
pub mod state;

pub use cache::{CacheStats, ChunkCache};
pub use config::PlaybackConfig;
pub use driver::{EngineBridges, PlaybackDriver};
pub use duration::DurationTable;
pub use engine::{Command, EngineHandle, EngineStatus, Operation, PlaybackEngine};
pub use error::{PlaybackError, Result};
pub use prefetch::{PrefetchController, PrefetchPlan};
pub use queue::ChunkQueue;
pub use seek::{clamp_target, SeekResolver, SeekTarget};
pub use session::{PendingSeek, Session};
pub use state::{DriverState, StateReporter};
