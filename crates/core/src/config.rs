//! Engine tuning knobs that are not part of any per-job document.

/// Default number of failed-metric names cited in a gate reason.
pub const DEFAULT_REASON_METRIC_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Max metric names enumerated in a reason string; the rest are counted.
    pub reason_metric_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reason_metric_limit: DEFAULT_REASON_METRIC_LIMIT,
        }
    }
}
