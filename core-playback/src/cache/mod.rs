//! # Chunk Cache Module
//!
//! In-memory store of every chunk delivered during a session, keyed by index.
//!
//! ## Overview
//!
//! - First write wins: re-delivered chunks never replace stored bytes
//! - No eviction while a session is active (sessions hold tens of chunks)
//! - Cleared only when the session is torn down (`stop` or a new `init`)
//!
//! Seeking back into already-played material is served from here without a
//! round trip to the producer.

pub mod stats;

pub use stats::CacheStats;

use bytes::Bytes;
use std::collections::HashMap;

/// Index to bytes store for one playback session.
#[derive(Debug, Default)]
pub struct ChunkCache {
    entries: HashMap<usize, Bytes>,
    total_bytes: u64,
    hits: u64,
    misses: u64,
    duplicate_inserts: u64,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `index` unless something is already there.
    /// Returns `true` if the chunk was stored.
    pub fn insert(&mut self, index: usize, data: Bytes) -> bool {
        if self.entries.contains_key(&index) {
            self.duplicate_inserts += 1;
            return false;
        }

        self.total_bytes += data.len() as u64;
        self.entries.insert(index, data);
        true
    }

    /// Look up a chunk, counting the hit or miss.
    pub fn get(&mut self, index: usize) -> Option<Bytes> {
        match self.entries.get(&index) {
            Some(data) => {
                self.hits += 1;
                Some(data.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached indices in ascending order.
    pub fn indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.entries.keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Drop every chunk and reset the counters.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            total_bytes: self.total_bytes,
            hits: self.hits,
            misses: self.misses,
            duplicate_inserts: self.duplicate_inserts,
        }
    }
}
