//! Evenly spaced carrier grid fitting.
//!
//! The fit minimizes a power-weighted squared distance between every bin and
//! its nearest grid carrier. Start frequency is found per spacing by a coarse
//! scan of the search window followed by a bounded Brent refinement, and the
//! spacing itself by a ternary search. The ternary search treats cost versus
//! spacing as unimodal, which holds only approximately: near multiples of
//! the true spacing the cost has shallow local dips, so a badly chosen
//! spacing range can converge on one of those instead.

use serde::{Deserialize, Serialize};

use crate::capture::CarrierGrid;
use crate::math::optimize::{minimize_bounded, ternary_search};
use crate::prelude::{AnalysisError, AnalysisResult};
use crate::telemetry::log::LogManager;

const MIN_SCAN_SAMPLES: usize = 16;
const MAX_SCAN_SAMPLES: usize = 512;
const SCAN_SAMPLES_PER_SPACING: f64 = 4.0;

/// Frequency range the first carrier is searched in. Bins above `high` are
/// left out of the fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchWindow {
    pub low: f64,
    pub high: f64,
}

impl SearchWindow {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }
}

/// Fitted grid with the cost it reached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridFit {
    pub grid: CarrierGrid,
    pub cost: f64,
}

/// Weighted squared distance of every defined bin to its nearest carrier,
/// with distances normalized by the highest frequency in `frequencies`.
pub fn grid_cost(grid: &CarrierGrid, frequencies: &[f64], weights: &[f64]) -> f64 {
    let max_frequency = frequencies.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    weighted_cost(grid, frequencies, weights, max_frequency)
}

fn weighted_cost(grid: &CarrierGrid, frequencies: &[f64], weights: &[f64], norm: f64) -> f64 {
    frequencies
        .iter()
        .zip(weights)
        .filter(|(_, weight)| !weight.is_nan())
        .map(|(&freq, &weight)| {
            let distance = (freq - nearest_carrier(grid, freq)) / norm;
            distance * distance * weight
        })
        .sum()
}

/// Grid carrier closest to `frequency`.
pub fn nearest_carrier(grid: &CarrierGrid, frequency: f64) -> f64 {
    if grid.count <= 1 || grid.spacing <= 0.0 {
        return grid.start;
    }
    let last = (grid.count - 1) as f64;
    let index = ((frequency - grid.start) / grid.spacing).round().clamp(0.0, last);
    grid.start + index * grid.spacing
}

/// Two-level optimizer for `{start, spacing}` of an evenly spaced grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridFitter {
    /// Upper end of the spacing search (Hz); the lower end is 0.
    pub max_spacing: f64,
    /// Width at which the spacing search stops (Hz).
    pub tolerance: f64,
    /// Absolute tolerance of the start refinement (Hz).
    pub start_tolerance: f64,
    /// Cost evaluations allowed per start refinement.
    pub max_evaluations: usize,
}

impl Default for GridFitter {
    fn default() -> Self {
        Self {
            max_spacing: 10_000_000.0,
            tolerance: 1e-6,
            start_tolerance: 1e-5,
            max_evaluations: 500,
        }
    }
}

struct FitProblem<'a> {
    frequencies: Vec<f64>,
    weights: Vec<f64>,
    norm: f64,
    count: usize,
    window: SearchWindow,
    fitter: &'a GridFitter,
}

impl FitProblem<'_> {
    fn cost(&self, start: f64, spacing: f64) -> f64 {
        let grid = CarrierGrid::new(start, spacing, self.count);
        weighted_cost(&grid, &self.frequencies, &self.weights, self.norm)
    }

    /// Best start for a fixed spacing. Works in offsets from the window's
    /// low edge to keep the refinement tolerance absolute.
    fn optimize_start(&self, spacing: f64) -> (f64, f64) {
        let width = self.window.width();
        let samples = if spacing > 0.0 {
            (SCAN_SAMPLES_PER_SPACING * width / spacing).ceil() as usize
        } else {
            MAX_SCAN_SAMPLES
        }
        .clamp(MIN_SCAN_SAMPLES, MAX_SCAN_SAMPLES);
        let step = width / samples as f64;

        let (best_index, best_cost) = (0..=samples)
            .map(|j| (j, self.cost(self.window.low + j as f64 * step, spacing)))
            .fold((0, f64::INFINITY), |best, candidate| {
                if candidate.1 < best.1 {
                    candidate
                } else {
                    best
                }
            });

        let lower = best_index.saturating_sub(1) as f64 * step;
        let upper = ((best_index + 1) as f64 * step).min(width);
        let refined = minimize_bounded(
            |offset| self.cost(self.window.low + offset, spacing),
            lower,
            upper,
            self.fitter.start_tolerance,
            self.fitter.max_evaluations,
        );

        if refined.value <= best_cost {
            (self.window.low + refined.x, refined.value)
        } else {
            (self.window.low + best_index as f64 * step, best_cost)
        }
    }
}

impl GridFitter {
    /// Fits `carrier_count` evenly spaced carriers to `weights` sampled at
    /// `frequencies`. NaN weights are skipped.
    pub fn fit(
        &self,
        frequencies: &[f64],
        weights: &[f64],
        carrier_count: usize,
        window: SearchWindow,
    ) -> AnalysisResult<GridFit> {
        if carrier_count == 0 {
            return Err(AnalysisError::InvalidInput(
                "carrier count must be positive".into(),
            ));
        }
        if !(window.low < window.high) {
            return Err(AnalysisError::InvalidInput(format!(
                "degenerate search window [{}, {}]",
                window.low, window.high
            )));
        }
        if frequencies.len() != weights.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "{} frequencies for {} weights",
                frequencies.len(),
                weights.len()
            )));
        }
        if !(self.max_spacing > 0.0) || !(self.tolerance > 0.0) {
            return Err(AnalysisError::InvalidInput(
                "spacing range and tolerance must be positive".into(),
            ));
        }

        let (kept_frequencies, kept_weights): (Vec<f64>, Vec<f64>) = frequencies
            .iter()
            .zip(weights)
            .filter(|&(&freq, &weight)| freq <= window.high && !weight.is_nan())
            .map(|(&freq, &weight)| (freq, weight))
            .unzip();
        let norm = kept_frequencies
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if kept_frequencies.is_empty() || norm == 0.0 {
            return Err(AnalysisError::Undefined(
                "no weighted bins inside the search window".into(),
            ));
        }

        let problem = FitProblem {
            frequencies: kept_frequencies,
            weights: kept_weights,
            norm,
            count: carrier_count,
            window,
            fitter: self,
        };

        let spacing = ternary_search(
            |spacing| problem.optimize_start(spacing).1,
            0.0,
            self.max_spacing,
            self.tolerance,
        );
        let (start, cost) = problem.optimize_start(spacing);
        let grid = CarrierGrid::new(start, spacing, carrier_count);

        LogManager::new("grid").record(&format!(
            "fitted {} carriers: start {:.1} Hz, spacing {:.1} Hz, cost {:.3e}",
            carrier_count, start, spacing, cost
        ));

        Ok(GridFit { grid, cost })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_START: f64 = 865_275_000.0;
    const KNOWN_STOP: f64 = 869_575_000.0;

    fn known_spacing() -> f64 {
        (KNOWN_STOP - KNOWN_START) / 12.0
    }

    /// Bins every quarter spacing; only the grid carriers carry power.
    fn known_grid_curve() -> (Vec<f64>, Vec<f64>) {
        let step = known_spacing() / 4.0;
        (0..49)
            .map(|j| {
                let freq = KNOWN_START + j as f64 * step;
                let weight = if j % 4 == 0 { 1.0 } else { 0.0 };
                (freq, weight)
            })
            .unzip()
    }

    #[test]
    fn nearest_carrier_clamps_to_grid_ends() {
        let grid = CarrierGrid::new(100.0, 10.0, 3);
        assert_eq!(nearest_carrier(&grid, 50.0), 100.0);
        assert_eq!(nearest_carrier(&grid, 114.0), 110.0);
        assert_eq!(nearest_carrier(&grid, 500.0), 120.0);
        assert_eq!(nearest_carrier(&CarrierGrid::new(7.0, 0.0, 4), 500.0), 7.0);
    }

    #[test]
    fn cost_is_zero_on_exact_grid_and_skips_nan() {
        let (frequencies, mut weights) = known_grid_curve();
        weights[1] = f64::NAN;
        let grid = CarrierGrid::new(KNOWN_START, known_spacing(), 13);
        assert!(grid_cost(&grid, &frequencies, &weights) < 1e-20);

        let shifted = CarrierGrid::new(KNOWN_START + 50_000.0, known_spacing(), 13);
        assert!(grid_cost(&shifted, &frequencies, &weights) > 0.0);
    }

    #[test]
    fn fit_recovers_known_layout() {
        let (frequencies, weights) = known_grid_curve();
        let fit = GridFitter::default()
            .fit(
                &frequencies,
                &weights,
                13,
                SearchWindow::new(865_000_000.0, 870_000_000.0),
            )
            .unwrap();

        assert_eq!(fit.grid.count, 13);
        assert!(
            (fit.grid.spacing - known_spacing()).abs() < 1e-3,
            "spacing {}",
            fit.grid.spacing
        );
        assert!(
            (fit.grid.start - KNOWN_START).abs() < 1e-2,
            "start {}",
            fit.grid.start
        );
        assert!(fit.cost < 1e-18, "cost {}", fit.cost);
    }

    #[test]
    fn zero_carriers_is_rejected() {
        let (frequencies, weights) = known_grid_curve();
        let err = GridFitter::default()
            .fit(&frequencies, &weights, 0, SearchWindow::new(865e6, 870e6))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn degenerate_window_is_rejected() {
        let (frequencies, weights) = known_grid_curve();
        let err = GridFitter::default()
            .fit(&frequencies, &weights, 13, SearchWindow::new(870e6, 870e6))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput(_)));
    }

    #[test]
    fn window_without_bins_is_undefined() {
        let err = GridFitter::default()
            .fit(&[900e6, 901e6], &[1.0, 1.0], 2, SearchWindow::new(865e6, 870e6))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Undefined(_)));
    }
}
