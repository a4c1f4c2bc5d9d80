//! Per-session engine state.

use crate::cache::ChunkCache;
use crate::duration::DurationTable;
use crate::queue::ChunkQueue;
use bridge_traits::SessionGeneration;

/// A seek whose target chunk has not started playing yet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingSeek {
    /// Global target time in seconds.
    pub target: f64,
    /// Chunk the target resolved to.
    pub chunk_index: usize,
}

/// Everything that lives exactly as long as one `init` .. `stop` span.
///
/// Replacing the session is the only way state is discarded, so a new `init`
/// or a `stop` can never leave stale queue or cache entries behind.
#[derive(Debug)]
pub struct Session {
    pub generation: SessionGeneration,
    pub total_chunks: usize,
    pub speed: f32,
    pub durations: DurationTable,
    pub cache: ChunkCache,
    pub queue: ChunkQueue,
    pub pending_seek: Option<PendingSeek>,
    /// Chunk most recently started, `None` before the first and after the last.
    pub current_chunk: Option<usize>,
    /// Global time at which `current_chunk` begins.
    pub elapsed_before: f64,
    /// Last known chunk-local position, used when no handle can be asked.
    pub chunk_position: f64,
}

impl Session {
    pub fn new(
        generation: SessionGeneration,
        total_chunks: usize,
        estimated_duration: f64,
        speed: f32,
    ) -> Self {
        Self {
            generation,
            total_chunks,
            speed,
            durations: DurationTable::new(total_chunks, estimated_duration),
            cache: ChunkCache::new(),
            queue: ChunkQueue::new(),
            pending_seek: None,
            current_chunk: None,
            elapsed_before: 0.0,
            chunk_position: 0.0,
        }
    }

    /// Session with no chunks, as left behind by `stop`.
    pub fn empty(generation: SessionGeneration, speed: f32) -> Self {
        Self::new(generation, 0, 0.0, speed)
    }

    pub fn accepts(&self, index: usize) -> bool {
        index < self.total_chunks
    }

    /// Whether chunks after the current one still have to be played.
    pub fn has_more_after_current(&self) -> bool {
        match self.current_chunk {
            Some(index) => index + 1 < self.total_chunks,
            None => self.total_chunks > 0,
        }
    }
}
