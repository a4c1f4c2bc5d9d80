//! Chunk supply types and the producer bridge.
//!
//! A narration is split into `total_chunks` independently synthesized audio
//! blobs. The engine asks a [`ChunkProducer`] for windows of indices and the
//! producer answers, eventually and possibly never, with a [`ChunkDelivery`].

use crate::{error::Result, platform::PlatformSendSync};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// One unit of encoded audio, identified by its position in the full sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position of this chunk in the narration.
    pub index: usize,
    /// Encoded audio bytes (opaque to the engine).
    pub data: Bytes,
}

impl Chunk {
    /// Create a new chunk.
    pub fn new(index: usize, data: impl Into<Bytes>) -> Self {
        Self {
            index,
            data: data.into(),
        }
    }

    /// Size of the encoded payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the chunk carries no audio bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Identifier of one playback session.
///
/// Every `init` and `stop` advances the generation. Requests are tagged with
/// the generation that issued them so late answers can be recognised and
/// dropped.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionGeneration(u64);

impl SessionGeneration {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The generation that supersedes this one.
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Why a window of chunks is being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestPriority {
    /// Ordinary read-ahead issued by the prefetch controller.
    Prefetch,
    /// Out-of-sequence request for a seek target. Producers should serve it
    /// even if an ordinary batch is already being generated.
    Seek,
}

/// Fire-and-forget request for a contiguous window of chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRequest {
    /// Session that issued the request; echo it back in the delivery.
    pub generation: SessionGeneration,
    /// First index wanted.
    pub start_index: usize,
    /// Number of consecutive indices wanted (always > 0).
    pub count: usize,
    pub priority: RequestPriority,
    /// Global target time, for seek requests.
    pub seek_time: Option<f64>,
}

impl ChunkRequest {
    /// Read-ahead request for `count` chunks starting at `start_index`.
    pub fn prefetch(generation: SessionGeneration, start_index: usize, count: usize) -> Self {
        Self {
            generation,
            start_index,
            count: count.max(1),
            priority: RequestPriority::Prefetch,
            seek_time: None,
        }
    }

    /// Priority request for the single chunk that contains a seek target.
    pub fn seek(generation: SessionGeneration, chunk_index: usize, seek_time: f64) -> Self {
        Self {
            generation,
            start_index: chunk_index,
            count: 1,
            priority: RequestPriority::Seek,
            seek_time: Some(seek_time),
        }
    }

    pub fn is_seek(&self) -> bool {
        self.priority == RequestPriority::Seek
    }

    /// Requested indices, clipped to `total_chunks`.
    pub fn indices(&self, total_chunks: usize) -> Range<usize> {
        let start = self.start_index.min(total_chunks);
        let end = self.start_index.saturating_add(self.count).min(total_chunks);
        start..end
    }
}

/// Answer to one or more [`ChunkRequest`]s. Chunks may be in any order and
/// cover any subset of what was asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkDelivery {
    /// Session the chunks belong to. `None` means "the current session".
    pub generation: Option<SessionGeneration>,
    pub chunks: Vec<Chunk>,
}

impl ChunkDelivery {
    /// Delivery bound to a specific session.
    pub fn tagged(generation: SessionGeneration, chunks: Vec<Chunk>) -> Self {
        Self {
            generation: Some(generation),
            chunks,
        }
    }

    /// Delivery applied to whatever session is current when it is processed.
    pub fn untagged(chunks: Vec<Chunk>) -> Self {
        Self {
            generation: None,
            chunks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Producer collaborator: turns requests into (eventual) deliveries.
///
/// `request_chunks` must not block. An `Err` only means the request could not
/// be handed off; the engine logs it and carries on.
pub trait ChunkProducer: PlatformSendSync {
    fn request_chunks(&self, request: ChunkRequest) -> Result<()>;
}
