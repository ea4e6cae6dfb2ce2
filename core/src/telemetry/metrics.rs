use std::sync::Mutex;

/// Counts frames that made it into a capture and frames that were dropped.
pub struct MetricsRecorder {
    inner: Mutex<Metrics>,
}

struct Metrics {
    accepted: usize,
    discarded: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Metrics {
                accepted: 0,
                discarded: 0,
            }),
        }
    }

    pub fn record_accepted(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.accepted += 1;
        }
    }

    pub fn record_discarded(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.discarded += 1;
        }
    }

    /// Returns `(accepted, discarded)`.
    pub fn snapshot(&self) -> (usize, usize) {
        if let Ok(metrics) = self.inner.lock() {
            (metrics.accepted, metrics.discarded)
        } else {
            (0, 0)
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_counts_both_outcomes() {
        let metrics = MetricsRecorder::new();
        metrics.record_accepted();
        metrics.record_accepted();
        metrics.record_discarded();
        assert_eq!(metrics.snapshot(), (2, 1));
    }
}
