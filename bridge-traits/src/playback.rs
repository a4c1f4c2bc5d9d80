//! Playback bridge traits and supporting types.
//!
//! The engine delegates decoding and audio output to a platform primitive (an
//! `HTMLAudioElement` in a browser, a native sink on desktop). Each loaded
//! chunk gets its own [`MediaHandleId`]; asynchronous notifications about that
//! handle come back through the [`MediaListener`] supplied at load time.

use crate::{
    error::Result,
    platform::{PlatformCallback, PlatformSendSync},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque identifier for one loaded decode/play handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaHandleId(u64);

impl MediaHandleId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MediaHandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media-{}", self.0)
    }
}

/// Encoded audio handed to [`AudioOutput::load`].
#[derive(Debug, Clone)]
pub struct MediaSource {
    pub data: Bytes,
    /// MIME type of `data` (e.g. `audio/mpeg`).
    pub mime_type: String,
    /// Initial playback rate (1.0 = normal speed).
    pub playback_rate: f32,
}

impl MediaSource {
    pub fn new(data: Bytes, mime_type: impl Into<String>, playback_rate: f32) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            playback_rate,
        }
    }
}

/// Notification emitted by the platform for a loaded handle.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaEvent {
    pub handle: MediaHandleId,
    pub kind: MediaEventKind,
}

impl MediaEvent {
    pub fn new(handle: MediaHandleId, kind: MediaEventKind) -> Self {
        Self { handle, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaEventKind {
    /// Duration is known; seeking within the handle is now possible.
    MetadataLoaded { duration: f64 },
    /// Periodic position report, in seconds from the start of the chunk.
    TimeUpdate { position: f64 },
    /// The handle played to its end.
    Ended,
    /// The platform failed to decode or play the handle.
    Error { message: String },
}

/// Callback through which a platform reports [`MediaEvent`]s.
///
/// Invocations must not block; the engine only posts the event onto its own
/// operation queue.
pub type MediaListener = Arc<PlatformCallback<MediaEvent>>;

/// Platform decode/play primitive.
///
/// Exactly one handle is active at a time from the engine's point of view; the
/// engine always releases the previous handle before loading the next one.
/// Positions and durations are in seconds of chunk-local media time.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait AudioOutput: PlatformSendSync {
    /// Begin decoding `source`. `listener` receives metadata, time-update,
    /// ended and error notifications for the returned handle.
    fn load(&self, source: MediaSource, listener: MediaListener) -> Result<MediaHandleId>;

    /// Start or continue playback. May be rejected by platform policy.
    async fn play(&self, handle: MediaHandleId) -> Result<()>;

    /// Pause playback, keeping the handle and its position.
    fn pause(&self, handle: MediaHandleId) -> Result<()>;

    /// Move to `position` seconds within the handle.
    fn seek(&self, handle: MediaHandleId, position: f64) -> Result<()>;

    /// Change playback rate without reloading.
    fn set_playback_rate(&self, handle: MediaHandleId, rate: f32) -> Result<()>;

    /// Current position within the handle, if the handle is known.
    fn position(&self, handle: MediaHandleId) -> Option<f64>;

    /// Decoded duration of the handle, once metadata is available.
    fn duration(&self, handle: MediaHandleId) -> Option<f64>;

    /// Detach and free every resource tied to the handle. Idempotent.
    fn release(&self, handle: MediaHandleId);
}

/// Externally visible playback snapshot.
///
/// Each snapshot is self-contained; consumers never need a previous one to
/// interpret it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    /// Global elapsed seconds across all chunks.
    pub progress: f64,
    /// Best estimate of the total duration in seconds.
    pub duration: f64,
    /// Chunk currently loaded, `None` when nothing is.
    pub current_chunk_index: Option<usize>,
    pub total_chunks: usize,
    pub is_buffering: bool,
}

impl PlaybackState {
    /// The snapshot reported when no session exists.
    pub fn stopped() -> Self {
        Self::default()
    }

    /// Fraction of the total duration already played, in `0.0..=1.0`.
    pub fn fraction_played(&self) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (self.progress / self.duration).clamp(0.0, 1.0)
    }
}
