//! Ready-to-play chunk queue.

use bridge_traits::Chunk;
use std::collections::VecDeque;

/// Chunks delivered but not yet started, always ascending by index.
///
/// Deliveries may arrive out of order; insertion keeps the order normalized.
/// The queue itself does not reject duplicate indices; the driver only
/// enqueues indices that are ahead of the play cursor and not already queued.
#[derive(Debug, Default)]
pub struct ChunkQueue {
    chunks: VecDeque<Chunk>,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one chunk at its sorted position (after equal indices).
    pub fn enqueue(&mut self, chunk: Chunk) {
        let position = self.chunks.partition_point(|queued| queued.index <= chunk.index);
        self.chunks.insert(position, chunk);
    }

    pub fn enqueue_all(&mut self, chunks: impl IntoIterator<Item = Chunk>) {
        for chunk in chunks {
            self.enqueue(chunk);
        }
    }

    /// Remove and return the lowest-index chunk.
    pub fn dequeue_next(&mut self) -> Option<Chunk> {
        self.chunks.pop_front()
    }

    pub fn peek(&self) -> Option<&Chunk> {
        self.chunks.front()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.chunks.iter().any(|chunk| chunk.index == index)
    }

    /// Drop every chunk with an index below `index`. Returns how many were
    /// dropped.
    pub fn discard_below(&mut self, index: usize) -> usize {
        let keep_from = self.chunks.partition_point(|chunk| chunk.index < index);
        self.chunks.drain(..keep_from).count()
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Queued indices, front first.
    pub fn indices(&self) -> Vec<usize> {
        self.chunks.iter().map(|chunk| chunk.index).collect()
    }
}
