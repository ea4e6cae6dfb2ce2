use ndarray::Axis;
use serde::{Deserialize, Serialize};

use crate::capture::{CarrierSet, Capture};
use crate::math::stats::StatsHelper;
use crate::prelude::{AnalysisError, AnalysisResult, CarrierDetector, Detection};
use crate::processing::peaks::local_maxima;
use crate::telemetry::log::LogManager;

/// Carrier detector that favours dominant carriers over their sidelobes.
///
/// Every sweep is scaled to [0, 1] across its bins and raised to a high
/// power before averaging, so only bins that are regularly the strongest in
/// their sweep survive. Peaks must reach the curve's mean and be at least
/// `len / separation_divisor` bins apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmphasisDetector {
    pub exponent: i32,
    pub separation_divisor: usize,
}

impl Default for EmphasisDetector {
    fn default() -> Self {
        Self {
            exponent: 16,
            separation_divisor: 20,
        }
    }
}

impl EmphasisDetector {
    /// Per-bin mean of the scaled and emphasized sweeps.
    pub fn emphasized_curve(&self, capture: &Capture) -> AnalysisResult<Vec<f64>> {
        if capture.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "capture holds no sweeps to emphasize".into(),
            ));
        }

        let mut scaled = capture.powers().to_owned();
        for mut sweep in scaled.axis_iter_mut(Axis(0)) {
            let Some((low, high)) = StatsHelper::nan_min_max(sweep.iter().copied()) else {
                continue;
            };
            let range = if high > low { high - low } else { 1.0 };
            sweep.mapv_inplace(|v| ((v - low) / range).powi(self.exponent));
        }

        Ok(scaled
            .axis_iter(Axis(1))
            .map(|bin| StatsHelper::nan_mean(bin.iter().copied()))
            .collect())
    }

    pub fn min_separation(&self, bins: usize) -> usize {
        (bins / self.separation_divisor.max(1)).max(1)
    }
}

impl CarrierDetector for EmphasisDetector {
    fn name(&self) -> &'static str {
        "emphasis"
    }

    fn detect(&self, capture: &Capture) -> AnalysisResult<Detection> {
        let curve = self.emphasized_curve(capture)?;
        if StatsHelper::all_nan(&curve) {
            return Err(AnalysisError::Undefined(
                "emphasized curve holds no defined values".into(),
            ));
        }

        let height = StatsHelper::nan_mean(curve.iter().copied());
        let candidates: Vec<usize> = local_maxima(&curve)
            .into_iter()
            .filter(|&i| curve[i] >= height)
            .collect();
        let separation = self.min_separation(curve.len());
        let kept = select_by_distance(&candidates, &curve, separation);

        LogManager::new("emphasis").record(&format!(
            "{} of {} candidate peaks kept (height {:.4}, separation {} bins)",
            kept.len(),
            candidates.len(),
            height,
            separation
        ));

        let frequencies = capture.frequencies();
        let carriers = CarrierSet::new(kept.into_iter().map(|i| frequencies[i]).collect());
        Ok(Detection { curve, carriers })
    }
}

/// Keeps the tallest peaks first and drops any peak closer than `distance`
/// bins to one already kept. `peaks` must be ascending; so is the result.
pub fn select_by_distance(peaks: &[usize], curve: &[f64], distance: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| curve[peaks[b]].total_cmp(&curve[peaks[a]]));

    let mut keep = vec![true; peaks.len()];
    for &j in &order {
        if !keep[j] {
            continue;
        }
        for (k, other) in peaks.iter().enumerate() {
            if k != j && keep[k] && peaks[j].abs_diff(*other) < distance {
                keep[k] = false;
            }
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter(|(_, kept)| *kept)
        .map(|(&peak, _)| peak)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrequencyAxis;

    fn hopping_capture() -> Capture {
        let bins = 60;
        let carriers = [10usize, 30, 50];
        let axis = FrequencyAxis::linspace(865e6, 870e6, bins).unwrap();
        let sweeps = (0..30)
            .map(|n| {
                let active = carriers[(n / 5) % carriers.len()];
                (0..bins)
                    .map(|i| match i.abs_diff(active) {
                        0 => -30.0,
                        1 => -50.0,
                        _ => -90.0,
                    })
                    .collect()
            })
            .collect();
        Capture::from_sweeps(axis, sweeps).unwrap()
    }

    #[test]
    fn emphasized_curve_is_within_unit_range() {
        let curve = EmphasisDetector::default()
            .emphasized_curve(&hopping_capture())
            .unwrap();
        assert_eq!(curve.len(), 60);
        assert!(curve.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((curve[10] - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(curve[0], 0.0);
    }

    #[test]
    fn flat_sweep_scales_to_zero() {
        let axis = FrequencyAxis::linspace(1.0, 3.0, 3).unwrap();
        let capture = Capture::from_sweeps(axis, vec![vec![-70.0; 3]]).unwrap();
        let curve = EmphasisDetector::default().emphasized_curve(&capture).unwrap();
        assert_eq!(curve, vec![0.0; 3]);
    }

    #[test]
    fn detects_dominant_carriers() {
        let capture = hopping_capture();
        let detection = EmphasisDetector::default().detect(&capture).unwrap();
        let freqs = capture.frequencies();
        assert_eq!(
            detection.carriers.frequencies(),
            &[freqs[10], freqs[30], freqs[50]]
        );
    }

    #[test]
    fn distance_selection_keeps_taller_neighbour() {
        let curve = [0.0, 0.5, 0.0, 0.9, 0.0, 0.0, 0.0, 0.4, 0.0];
        assert_eq!(select_by_distance(&[1, 3, 7], &curve, 3), vec![3, 7]);
        assert_eq!(select_by_distance(&[1, 3, 7], &curve, 1), vec![1, 3, 7]);
    }

    #[test]
    fn separation_never_drops_below_one_bin() {
        let detector = EmphasisDetector::default();
        assert_eq!(detector.min_separation(10), 1);
        assert_eq!(detector.min_separation(200), 10);
    }
}
