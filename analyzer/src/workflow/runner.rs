use crate::workflow::config::{DetectorKind, WorkflowConfig};
use anyhow::Context;
use fhsscore::processing::{estimate_hop_duration, GridFit};
use fhsscore::{AnalysisError, Capture, CarrierSet, HopTrace};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub detector: &'static str,
    pub frequencies: Vec<f64>,
    pub curve: Vec<f64>,
    pub carriers: CarrierSet,
    pub grid: Option<GridFit>,
    pub hop: Option<HopTrace>,
    /// Hop duration in seconds, when the sweep period is known.
    pub hop_duration_secs: Option<f64>,
    pub reference_distance: Option<f64>,
    pub notes: Vec<String>,
}

impl WorkflowResult {
    pub fn detection_count(&self) -> usize {
        self.carriers.len()
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "detector={} carriers={} bins={}",
            self.detector,
            self.carriers.len(),
            self.frequencies.len()
        )];
        if let Some(fit) = &self.grid {
            lines.push(format!(
                "grid start={:.1} Hz spacing={:.1} Hz count={} cost={:.3e}",
                fit.grid.start, fit.grid.spacing, fit.grid.count, fit.cost
            ));
        }
        match &self.hop {
            Some(trace) => lines.push(format!(
                "hop_events={} hop_duration={:.3} sweeps{}",
                trace.hop_events,
                trace.hop_duration,
                self.hop_duration_secs
                    .map(|secs| format!(" ({:.3} ms)", secs * 1000.0))
                    .unwrap_or_default()
            )),
            None => lines.push("hop_duration=unable to estimate".to_string()),
        }
        if let Some(distance) = self.reference_distance {
            lines.push(format!("reference_distance={:.1} Hz", distance));
        }
        lines.extend(self.notes.iter().map(|note| format!("note: {}", note)));
        lines.join("\n")
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self, capture: &Capture) -> anyhow::Result<WorkflowResult> {
        let detector = self.config.detector();
        let detection = detector
            .detect(capture)
            .with_context(|| format!("running {} carrier detection", detector.name()))?;
        let mut notes = Vec::new();

        let grid = match self.config.to_grid_search() {
            Some((fitter, window)) => {
                let weights = match self.config.detector {
                    DetectorKind::Emphasis => detection.curve.clone(),
                    DetectorKind::Threshold => self
                        .config
                        .to_emphasis_detector()
                        .emphasized_curve(capture)
                        .context("computing grid weights")?,
                };
                let fit = fitter
                    .fit(capture.frequencies(), &weights, detection.count(), window)
                    .context("fitting carrier grid")?;
                Some(fit)
            }
            None => None,
        };

        let hop = match estimate_hop_duration(capture, self.config.hop_threshold) {
            Ok(trace) => Some(trace),
            Err(AnalysisError::Undefined(reason)) => {
                notes.push(format!("unable to estimate hop duration: {}", reason));
                None
            }
            Err(err) => return Err(err).context("estimating hop duration"),
        };
        let hop_duration_secs = hop
            .as_ref()
            .zip(self.config.sweep_period_secs())
            .map(|(trace, period)| trace.hop_duration_secs(period));

        let reference_distance = match self.config.reference_grid()? {
            Some(reference) => {
                let estimate = grid
                    .as_ref()
                    .map(|fit| fit.grid.to_carrier_set())
                    .unwrap_or_else(|| detection.carriers.clone());
                match estimate.distance_to(&reference.to_carrier_set()) {
                    Ok(distance) => Some(distance),
                    Err(AnalysisError::InvalidInput(reason)) => {
                        notes.push(format!("reference not scored: {}", reason));
                        None
                    }
                    Err(err) => return Err(err).context("scoring against reference"),
                }
            }
            None => None,
        };

        Ok(WorkflowResult {
            detector: detector.name(),
            frequencies: capture.frequencies().to_vec(),
            curve: detection.curve,
            carriers: detection.carriers,
            grid,
            hop,
            hop_duration_secs,
            reference_distance,
            notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{build_capture, GeneratorConfig};
    use crate::workflow::config::{GridConfig, ReferenceLayout};
    use fhsscore::FrequencyAxis;

    #[test]
    fn runner_recovers_synthetic_layout() {
        let generator = GeneratorConfig::default();
        let capture = build_capture(&generator).unwrap();
        let cfg = WorkflowConfig {
            grid: Some(GridConfig {
                window_low: generator.start_freq,
                window_high: generator.stop_freq,
                max_spacing: 1_000_000.0,
                tolerance: 1e-3,
            }),
            reference: Some(ReferenceLayout {
                low: generator.carrier_start,
                high: generator.carrier_start
                    + generator.carrier_spacing * (generator.carriers - 1) as f64,
                count: generator.carriers,
            }),
            sweep_period_ms: Some(10.0),
            ..WorkflowConfig::default()
        };

        let result = Runner::new(cfg).execute(&capture).unwrap();
        assert_eq!(result.detection_count(), generator.carriers);
        assert_eq!(result.curve.len(), generator.points);

        let fit = result.grid.unwrap();
        assert_eq!(fit.grid.count, generator.carriers);
        assert!(
            (fit.grid.spacing - generator.carrier_spacing).abs() < 5_000.0,
            "spacing {}",
            fit.grid.spacing
        );
        assert!(result.reference_distance.unwrap() < 5_000.0);

        let trace = result.hop.unwrap();
        assert_eq!(trace.mean_dwell_sweeps(), Some(generator.dwell_sweeps as f64));
        assert!(result.hop_duration_secs.unwrap() > 0.0);
        assert!(result.notes.is_empty());
    }

    #[test]
    fn steady_carrier_reports_unknown_hop_duration() {
        let axis = FrequencyAxis::linspace(1.0, 5.0, 5).unwrap();
        let sweeps = vec![vec![-90.0, -10.0, -90.0, -90.0, -90.0]; 8];
        let capture = Capture::from_sweeps(axis, sweeps).unwrap();

        let result = Runner::new(WorkflowConfig::default())
            .execute(&capture)
            .unwrap();
        assert_eq!(result.detection_count(), 1);
        assert!(result.hop.is_none());
        assert!(result.notes[0].starts_with("unable to estimate"));
        assert!(result.summary().contains("unable to estimate"));
    }

    #[test]
    fn mismatched_reference_is_noted_not_fatal() {
        let axis = FrequencyAxis::linspace(1.0, 5.0, 5).unwrap();
        let sweeps = vec![
            vec![-90.0, -10.0, -90.0, -90.0, -90.0],
            vec![-90.0, -90.0, -90.0, -10.0, -90.0],
        ];
        let capture = Capture::from_sweeps(axis, sweeps).unwrap();
        let cfg = WorkflowConfig {
            reference: Some(ReferenceLayout {
                low: 1.0,
                high: 5.0,
                count: 3,
            }),
            ..WorkflowConfig::default()
        };

        let result = Runner::new(cfg).execute(&capture).unwrap();
        assert_eq!(result.detection_count(), 2);
        assert!(result.reference_distance.is_none());
        assert!(result.notes.iter().any(|n| n.starts_with("reference not scored")));
    }
}
