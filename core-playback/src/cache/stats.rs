//! Cache statistics and monitoring

use serde::{Deserialize, Serialize};

/// Snapshot of the in-session chunk cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of chunks held
    pub entries: usize,

    /// Total encoded bytes held
    pub total_bytes: u64,

    /// Lookups that found the chunk
    pub hits: u64,

    /// Lookups that did not
    pub misses: u64,

    /// Inserts ignored because the index was already present
    pub duplicate_inserts: u64,
}

impl CacheStats {
    /// Fraction of lookups served from the cache, in `0.0..=1.0`.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            return 0.0;
        }

        self.hits as f64 / lookups as f64
    }

    /// Returns average bytes per chunk.
    pub fn average_chunk_size(&self) -> u64 {
        if self.entries == 0 {
            0
        } else {
            self.total_bytes / self.entries as u64
        }
    }

    /// Format the byte total as a human-readable string.
    pub fn size_string(&self) -> String {
        format_bytes(self.total_bytes)
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert_eq!(stats.hit_rate(), 0.75);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_average_chunk_size() {
        let stats = CacheStats {
            entries: 4,
            total_bytes: 4096,
            ..Default::default()
        };
        assert_eq!(stats.average_chunk_size(), 1024);
        assert_eq!(CacheStats::default().average_chunk_size(), 0);
    }

    #[test]
    fn test_size_string() {
        let mut stats = CacheStats {
            total_bytes: 512,
            ..Default::default()
        };
        assert_eq!(stats.size_string(), "512 B");
        stats.total_bytes = 1536;
        assert_eq!(stats.size_string(), "1.5 KB");
        stats.total_bytes = 3 * 1024 * 1024;
        assert_eq!(stats.size_string(), "3.0 MB");
    }
}
