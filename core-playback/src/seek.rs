//! Global time to chunk position resolution.

use crate::duration::DurationTable;

/// A position expressed as chunk plus chunk-local offset in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekTarget {
    pub chunk_index: usize,
    pub offset: f64,
}

impl SeekTarget {
    pub fn new(chunk_index: usize, offset: f64) -> Self {
        Self {
            chunk_index,
            offset,
        }
    }
}

/// Clamp a requested global time into `[0, total]`. NaN maps to 0.
pub fn clamp_target(target: f64, total: f64) -> f64 {
    if target.is_nan() || target <= 0.0 {
        return 0.0;
    }
    let total = if total.is_finite() { total.max(0.0) } else { 0.0 };
    target.min(total)
}

/// Linear-scan resolver over a [`DurationTable`].
///
/// Durations are refined lazily as chunks decode and the table is short, so
/// the scan is re-run on every seek rather than maintaining a prefix index.
pub struct SeekResolver<'a> {
    durations: &'a DurationTable,
}

impl<'a> SeekResolver<'a> {
    pub fn new(durations: &'a DurationTable) -> Self {
        Self { durations }
    }

    /// Map `target` seconds to the chunk containing it.
    ///
    /// Returns the first chunk whose end lies strictly after `target`, with
    /// the remainder as offset. Targets at or beyond the end resolve to the
    /// last chunk at its full duration. `None` only for an empty table.
    pub fn resolve(&self, target: f64) -> Option<SeekTarget> {
        let len = self.durations.len();
        if len == 0 {
            return None;
        }

        if target.is_nan() || target <= 0.0 {
            return Some(SeekTarget::new(0, 0.0));
        }

        let mut accumulated = 0.0;
        for index in 0..len {
            let duration = self.durations.duration_of(index);
            if accumulated + duration > target {
                return Some(SeekTarget::new(index, target - accumulated));
            }
            accumulated += duration;
        }

        let last = len - 1;
        Some(SeekTarget::new(last, self.durations.duration_of(last)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured_table() -> DurationTable {
        let mut table = DurationTable::new(5, 50.0);
        table.record(0, 9.0);
        table.record(1, 11.0);
        table
    }

    #[test]
    fn test_empty_table_is_not_resolved() {
        let table = DurationTable::new(0, 0.0);
        assert_eq!(SeekResolver::new(&table).resolve(3.0), None);
    }

    #[test]
    fn test_resolve_inside_measured_chunk() {
        let table = measured_table();
        let target = SeekResolver::new(&table).resolve(15.0).unwrap();
        assert_eq!(target, SeekTarget::new(1, 6.0));
    }

    #[test]
    fn test_resolve_into_estimated_region() {
        let table = measured_table();
        let resolver = SeekResolver::new(&table);

        // 9 + 11 + 10 + 10 = 40 is the start of chunk 4
        assert_eq!(resolver.resolve(40.0).unwrap(), SeekTarget::new(4, 0.0));
        assert_eq!(resolver.resolve(39.5).unwrap(), SeekTarget::new(3, 9.5));
        assert_eq!(resolver.resolve(25.0).unwrap(), SeekTarget::new(2, 5.0));
    }

    #[test]
    fn test_chunk_boundaries_resolve_to_chunk_start() {
        let mut table = DurationTable::new(4, 40.0);
        for (i, d) in [9.0, 11.5, 10.25, 8.0].into_iter().enumerate() {
            table.record(i, d);
        }
        let resolver = SeekResolver::new(&table);

        for i in 0..table.len() {
            let target = resolver.resolve(table.elapsed_before(i)).unwrap();
            assert_eq!(target, SeekTarget::new(i, 0.0));
        }
    }

    #[test]
    fn test_past_end_clamps_to_last_chunk() {
        let table = measured_table();
        let resolver = SeekResolver::new(&table);
        assert_eq!(resolver.resolve(50.0).unwrap(), SeekTarget::new(4, 10.0));
        assert_eq!(resolver.resolve(1e9).unwrap(), SeekTarget::new(4, 10.0));
    }

    #[test]
    fn test_negative_and_nan_targets() {
        let table = measured_table();
        let resolver = SeekResolver::new(&table);
        assert_eq!(resolver.resolve(-4.0).unwrap(), SeekTarget::new(0, 0.0));
        assert_eq!(resolver.resolve(f64::NAN).unwrap(), SeekTarget::new(0, 0.0));
    }

    #[test]
    fn test_zero_estimate_skips_unknown_chunks() {
        let mut table = DurationTable::new(3, 0.0);
        table.record(0, 5.0);
        let resolver = SeekResolver::new(&table);
        // Chunks 1 and 2 have no duration at all; everything past 5s is the end
        assert_eq!(resolver.resolve(2.0).unwrap(), SeekTarget::new(0, 2.0));
        assert_eq!(resolver.resolve(7.0).unwrap(), SeekTarget::new(2, 0.0));
    }

    #[test]
    fn test_clamp_target() {
        assert_eq!(clamp_target(-1.0, 50.0), 0.0);
        assert_eq!(clamp_target(f64::NAN, 50.0), 0.0);
        assert_eq!(clamp_target(75.0, 50.0), 50.0);
        assert_eq!(clamp_target(20.0, 50.0), 20.0);
        assert_eq!(clamp_target(20.0, f64::NAN), 0.0);
    }
}
