//! Per-chunk duration bookkeeping.
//!
//! Every slot starts unknown and is filled exactly once, the first time the
//! chunk's decoded duration is reported. Unknown slots fall back to a uniform
//! estimate derived from the narration's estimated total length.

/// Measured-or-estimated duration of every chunk in a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DurationTable {
    measured: Vec<Option<f64>>,
    estimate: f64,
}

impl DurationTable {
    /// Table for `total_chunks` chunks with an estimated total of
    /// `estimated_total` seconds.
    pub fn new(total_chunks: usize, estimated_total: f64) -> Self {
        let estimate = if total_chunks > 0 && estimated_total.is_finite() && estimated_total > 0.0 {
            estimated_total / total_chunks as f64
        } else {
            0.0
        };

        Self {
            measured: vec![None; total_chunks],
            estimate,
        }
    }

    pub fn len(&self) -> usize {
        self.measured.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measured.is_empty()
    }

    /// Placeholder used for every chunk not yet measured.
    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    /// Measured duration of `index`, if it has been decoded.
    pub fn measured(&self, index: usize) -> Option<f64> {
        self.measured.get(index).copied().flatten()
    }

    pub fn measured_count(&self) -> usize {
        self.measured.iter().filter(|slot| slot.is_some()).count()
    }

    /// Measured duration if known, else the estimate. Zero outside the table.
    pub fn duration_of(&self, index: usize) -> f64 {
        match self.measured.get(index) {
            Some(Some(measured)) => *measured,
            Some(None) => self.estimate,
            None => 0.0,
        }
    }

    /// Sum of [`duration_of`](Self::duration_of) over `0..index`.
    ///
    /// Summed front to back so it agrees exactly with the accumulation done
    /// by seek resolution.
    pub fn elapsed_before(&self, index: usize) -> f64 {
        let mut elapsed = 0.0;
        for i in 0..index.min(self.len()) {
            elapsed += self.duration_of(i);
        }
        elapsed
    }

    /// Best estimate of the whole narration's length.
    pub fn total(&self) -> f64 {
        self.elapsed_before(self.len())
    }

    /// Record the decoded duration of `index`.
    ///
    /// Only the first valid measurement for a slot is kept. Returns `true`
    /// when the slot was filled by this call.
    pub fn record(&mut self, index: usize, duration: f64) -> bool {
        if !duration.is_finite() || duration <= 0.0 {
            return false;
        }

        match self.measured.get_mut(index) {
            Some(slot @ None) => {
                *slot = Some(duration);
                true
            }
            _ => false,
        }
    }
}
