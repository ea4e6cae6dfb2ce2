use serde::{Deserialize, Serialize};

use crate::capture::{CarrierSet, Capture};
use crate::math::stats::StatsHelper;
use crate::prelude::{AnalysisError, AnalysisResult, CarrierDetector, Detection};
use crate::processing::averager::average;
use crate::processing::smoother::Smoother;
use crate::telemetry::log::LogManager;

/// Indices of local maxima, strictly above both neighbours.
///
/// A flat top counts once, at its middle bin (the lower middle for an even
/// run). The first and last bins are never maxima.
pub fn local_maxima(curve: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if curve.len() < 3 {
        return peaks;
    }

    let i_max = curve.len() - 1;
    let mut i = 1;
    while i < i_max {
        if curve[i - 1] < curve[i] {
            let mut ahead = i + 1;
            while ahead < i_max && curve[ahead] == curve[i] {
                ahead += 1;
            }
            if curve[ahead] < curve[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Threshold-gated carrier peaks on an averaged curve.
///
/// The curve is smoothed on a private copy, everything at or below
/// `threshold` is masked to negative infinity, and the remaining local
/// maxima are reported in ascending frequency order with their count.
pub fn find_peaks(
    frequencies: &[f64],
    curve: &[f64],
    threshold: f64,
) -> AnalysisResult<(CarrierSet, usize)> {
    if frequencies.len() != curve.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "{} frequencies for {} curve values",
            frequencies.len(),
            curve.len()
        )));
    }
    if StatsHelper::all_nan(curve) {
        return Err(AnalysisError::Undefined(
            "curve holds no defined values".into(),
        ));
    }

    let mut working = curve.to_vec();
    let report = Smoother::default().suppress_minima(&mut working, threshold);
    let masked: Vec<f64> = working
        .iter()
        .map(|&v| if v > threshold { v } else { f64::NEG_INFINITY })
        .collect();

    let peaks: Vec<f64> = local_maxima(&masked)
        .into_iter()
        .filter(|&i| masked[i] >= threshold)
        .map(|i| frequencies[i])
        .collect();
    let count = peaks.len();

    LogManager::new("peaks").record(&format!(
        "{} peaks above {:.1} dBm after {} dip replacements",
        count, threshold, report.replacements
    ));

    Ok((CarrierSet::new(peaks), count))
}

/// Averages the capture with a noise threshold and picks peaks on the
/// result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdDetector {
    /// Leading sweeps to average, 0 for all.
    pub sweep_count: usize,
    pub averaging_threshold: f64,
    pub peak_threshold: f64,
}

impl Default for ThresholdDetector {
    fn default() -> Self {
        Self::with_averaging_threshold(-40.0)
    }
}

impl ThresholdDetector {
    /// Peak threshold set to half the averaging threshold.
    pub fn with_averaging_threshold(averaging_threshold: f64) -> Self {
        Self {
            sweep_count: 0,
            averaging_threshold,
            peak_threshold: averaging_threshold / 2.0,
        }
    }
}

impl CarrierDetector for ThresholdDetector {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn detect(&self, capture: &Capture) -> AnalysisResult<Detection> {
        let curve = average(capture, self.sweep_count, self.averaging_threshold)?;
        let (carriers, _) = find_peaks(capture.frequencies(), &curve, self.peak_threshold)?;
        Ok(Detection { curve, carriers })
    }
}
