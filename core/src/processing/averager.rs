use ndarray::{s, Axis};

use crate::capture::Capture;
use crate::math::stats::StatsHelper;
use crate::prelude::{AnalysisError, AnalysisResult};
use crate::telemetry::log::LogManager;

/// Averages the first `sweep_count` sweeps bin by bin, keeping only readings
/// strictly above `threshold`.
///
/// A `sweep_count` of zero, or one larger than the capture, averages every
/// sweep. Bins where no reading clears the threshold come out as NaN.
pub fn average(capture: &Capture, sweep_count: usize, threshold: f64) -> AnalysisResult<Vec<f64>> {
    if capture.is_empty() {
        return Err(AnalysisError::InvalidInput(
            "capture holds no sweeps to average".into(),
        ));
    }

    let selected = if sweep_count == 0 || sweep_count > capture.sweep_count() {
        capture.sweep_count()
    } else {
        sweep_count
    };

    let powers = capture.powers();
    let prefix = powers.slice(s![..selected, ..]);
    let curve: Vec<f64> = prefix
        .axis_iter(Axis(1))
        .map(|bin| StatsHelper::nan_mean(bin.iter().map(|&v| if v > threshold { v } else { f64::NAN })))
        .collect();

    let silent = curve.iter().filter(|v| v.is_nan()).count();
    LogManager::new("averager").record(&format!(
        "averaged {} sweeps over {} bins, {} bins below {:.1} dBm",
        selected,
        curve.len(),
        silent,
        threshold
    ));

    Ok(curve)
}
