//! Read-ahead planning.
//!
//! The controller is stateless: it looks at the queue depth and the active
//! chunk and answers "what should be requested now, if anything". It does not
//! remember what it already asked for, so repeated triggers before a delivery
//! produce repeated requests. Deliveries are idempotent thanks to the cache,
//! only producer work is duplicated.

use crate::config::PlaybackConfig;

/// A window of chunk indices to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchPlan {
    pub start_index: usize,
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct PrefetchController {
    low_watermark: usize,
    fetch_window: usize,
    progress_ratio: f64,
}

impl PrefetchController {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            low_watermark: config.low_watermark,
            fetch_window: config.fetch_window,
            progress_ratio: config.progress_prefetch_ratio,
        }
    }

    /// Watermark check. `current` is `None` before the first chunk starts
    /// (treated as one before chunk 0).
    pub fn plan(
        &self,
        current: Option<usize>,
        queue_len: usize,
        total_chunks: usize,
    ) -> Option<PrefetchPlan> {
        if queue_len >= self.low_watermark {
            return None;
        }
        self.window(current, queue_len, total_chunks)
    }

    /// In-chunk trigger: once `position` passes the configured fraction of
    /// `duration`, ask for the next window regardless of queue depth.
    pub fn plan_on_progress(
        &self,
        current: Option<usize>,
        queue_len: usize,
        total_chunks: usize,
        position: f64,
        duration: f64,
    ) -> Option<PrefetchPlan> {
        if !(duration.is_finite() && duration > 0.0) || position <= duration * self.progress_ratio {
            return None;
        }
        self.window(current, queue_len, total_chunks)
    }

    fn window(
        &self,
        current: Option<usize>,
        queue_len: usize,
        total_chunks: usize,
    ) -> Option<PrefetchPlan> {
        // Position of the active chunk, counting "nothing yet" as -1
        let played_through = current.map_or(0, |index| index + 1);
        if played_through >= total_chunks {
            return None;
        }

        let start_index = played_through + queue_len;
        if start_index >= total_chunks {
            return None;
        }

        Some(PrefetchPlan {
            start_index,
            count: self.fetch_window,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> PrefetchController {
        PrefetchController::new(&PlaybackConfig::default())
    }

    #[test]
    fn test_triggers_below_watermark() {
        let plan = controller().plan(Some(0), 0, 5).unwrap();
        assert_eq!(
            plan,
            PrefetchPlan {
                start_index: 1,
                count: 2
            }
        );

        let plan = controller().plan(Some(0), 1, 5).unwrap();
        assert_eq!(plan.start_index, 2);
    }

    #[test]
    fn test_quiet_at_watermark() {
        assert_eq!(controller().plan(Some(0), 2, 5), None);
    }

    #[test]
    fn test_quiet_on_last_chunk() {
        assert_eq!(controller().plan(Some(4), 0, 5), None);
        assert_eq!(controller().plan(Some(3), 1, 5), None);
    }

    #[test]
    fn test_before_first_chunk() {
        let plan = controller().plan(None, 0, 5).unwrap();
        assert_eq!(plan.start_index, 0);
        assert_eq!(controller().plan(None, 0, 0), None);
    }

    #[test]
    fn test_progress_trigger_ignores_watermark() {
        let c = controller();
        assert_eq!(c.plan_on_progress(Some(1), 3, 10, 6.0, 10.0), None);

        let plan = c.plan_on_progress(Some(1), 3, 10, 7.5, 10.0).unwrap();
        assert_eq!(plan.start_index, 5);

        assert_eq!(c.plan_on_progress(Some(1), 0, 10, 7.5, f64::NAN), None);
        assert_eq!(c.plan_on_progress(Some(9), 0, 10, 9.9, 10.0), None);
    }
}
