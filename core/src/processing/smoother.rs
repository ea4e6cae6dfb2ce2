use crate::telemetry::log::LogManager;

/// Scan steps allowed per bin before the smoother gives up.
///
/// Every replacement lifts a bin to a strictly larger float, so the scan
/// always ends; jittery carrier tops can still need thousands of steps per
/// bin to settle. The cap only bounds run time.
pub const MAX_STEPS_PER_BIN: usize = 1 << 20;

/// What a smoothing pass did to the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmoothingReport {
    pub replacements: usize,
    pub steps: usize,
    /// The step budget ran out before the scan reached the end.
    pub exhausted: bool,
}

/// Local-minima suppressor for averaged curves.
#[derive(Debug, Clone, Copy)]
pub struct Smoother {
    steps_per_bin: usize,
}

impl Default for Smoother {
    fn default() -> Self {
        Self {
            steps_per_bin: MAX_STEPS_PER_BIN,
        }
    }
}

impl Smoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_step_factor(steps_per_bin: usize) -> Self {
        Self {
            steps_per_bin: steps_per_bin.max(1),
        }
    }

    /// Fills dips that sit above `threshold` with the mean of their
    /// neighbours, in place.
    ///
    /// After a replacement the cursor steps back one bin, since the raised
    /// value can turn its left neighbour into a new dip. The end bins are
    /// never touched and NaN bins never qualify.
    pub fn suppress_minima(&self, curve: &mut [f64], threshold: f64) -> SmoothingReport {
        let mut report = SmoothingReport::default();
        if curve.len() < 3 {
            return report;
        }

        let budget = self.steps_per_bin.saturating_mul(curve.len());
        let last = curve.len() - 1;
        let mut i = 1;

        while i < last {
            if report.steps >= budget {
                report.exhausted = true;
                LogManager::new("smoother").warn(&format!(
                    "step budget of {} exhausted at bin {}, curve left partially smoothed",
                    budget, i
                ));
                break;
            }
            report.steps += 1;

            if is_qualifying_minimum(curve, i, threshold) {
                curve[i] = (curve[i - 1] + curve[i + 1]) / 2.0;
                report.replacements += 1;
                i = (i - 1).max(1);
            } else {
                i += 1;
            }
        }

        report
    }
}

/// [`Smoother::suppress_minima`] with the default step budget.
pub fn suppress_minima(curve: &mut [f64], threshold: f64) -> SmoothingReport {
    Smoother::default().suppress_minima(curve, threshold)
}

/// True when `curve[i]` is a dip the smoother would fill.
pub(crate) fn is_qualifying_minimum(curve: &[f64], i: usize, threshold: f64) -> bool {
    i > 0
        && i + 1 < curve.len()
        && curve[i] < curve[i - 1]
        && curve[i] < curve[i + 1]
        && curve[i] > threshold
}
