use anyhow::Context;
use fhsscore::processing::{EmphasisDetector, GridFitter, SearchWindow, ThresholdDetector};
use fhsscore::{CarrierDetector, CarrierGrid};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    #[default]
    Threshold,
    Emphasis,
}

/// Search settings for the carrier grid fit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridConfig {
    pub window_low: f64,
    pub window_high: f64,
    #[serde(default = "default_max_spacing")]
    pub max_spacing: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

fn default_max_spacing() -> f64 {
    GridFitter::default().max_spacing
}

fn default_tolerance() -> f64 {
    GridFitter::default().tolerance
}

/// Known channel layout the estimate is scored against.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceLayout {
    pub low: f64,
    pub high: f64,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Leading sweeps to average, 0 for all.
    pub sweep_count: usize,
    pub averaging_threshold: f64,
    /// Defaults to half the averaging threshold.
    pub peak_threshold: Option<f64>,
    pub detector: DetectorKind,
    pub emphasis_exponent: i32,
    pub separation_divisor: usize,
    pub grid: Option<GridConfig>,
    pub hop_threshold: f64,
    pub sweep_period_ms: Option<f64>,
    pub reference: Option<ReferenceLayout>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        let emphasis = EmphasisDetector::default();
        Self {
            sweep_count: 0,
            averaging_threshold: -40.0,
            peak_threshold: None,
            detector: DetectorKind::Threshold,
            emphasis_exponent: emphasis.exponent,
            separation_divisor: emphasis.separation_divisor,
            grid: None,
            hop_threshold: -40.0,
            sweep_period_ms: None,
            reference: None,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn to_threshold_detector(&self) -> ThresholdDetector {
        let mut detector = ThresholdDetector::with_averaging_threshold(self.averaging_threshold);
        detector.sweep_count = self.sweep_count;
        if let Some(peak_threshold) = self.peak_threshold {
            detector.peak_threshold = peak_threshold;
        }
        detector
    }

    pub fn to_emphasis_detector(&self) -> EmphasisDetector {
        EmphasisDetector {
            exponent: self.emphasis_exponent,
            separation_divisor: self.separation_divisor,
        }
    }

    pub fn detector(&self) -> Box<dyn CarrierDetector> {
        match self.detector {
            DetectorKind::Threshold => Box::new(self.to_threshold_detector()),
            DetectorKind::Emphasis => Box::new(self.to_emphasis_detector()),
        }
    }

    /// Grid fitter and window, when a grid fit is configured.
    pub fn to_grid_search(&self) -> Option<(GridFitter, SearchWindow)> {
        self.grid.as_ref().map(|grid| {
            let fitter = GridFitter {
                max_spacing: grid.max_spacing,
                tolerance: grid.tolerance,
                ..GridFitter::default()
            };
            (fitter, SearchWindow::new(grid.window_low, grid.window_high))
        })
    }

    pub fn reference_grid(&self) -> anyhow::Result<Option<CarrierGrid>> {
        self.reference
            .as_ref()
            .map(|layout| {
                CarrierGrid::spanning(layout.low, layout.high, layout.count)
                    .context("building reference carrier layout")
            })
            .transpose()
    }

    pub fn sweep_period_secs(&self) -> Option<f64> {
        self.sweep_period_ms.map(|ms| ms / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_follow_averaging_threshold() {
        let cfg = WorkflowConfig::default();
        let detector = cfg.to_threshold_detector();
        assert_eq!(detector.averaging_threshold, -40.0);
        assert_eq!(detector.peak_threshold, -20.0);
        assert_eq!(cfg.detector().name(), "threshold");
        assert!(cfg.to_grid_search().is_none());
    }

    #[test]
    fn explicit_peak_threshold_wins() {
        let cfg = WorkflowConfig {
            averaging_threshold: -60.0,
            peak_threshold: Some(-45.0),
            ..WorkflowConfig::default()
        };
        assert_eq!(cfg.to_threshold_detector().peak_threshold, -45.0);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"detector: emphasis\nemphasis_exponent: 8\ngrid:\n  window_low: 865000000\n  window_high: 870000000\nreference:\n  low: 865275000\n  high: 869575000\n  count: 13\nsweep_period_ms: 10.7\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();

        assert_eq!(cfg.detector, DetectorKind::Emphasis);
        assert_eq!(cfg.to_emphasis_detector().exponent, 8);
        assert_eq!(cfg.separation_divisor, 20);
        assert_eq!(cfg.hop_threshold, -40.0);

        let (fitter, window) = cfg.to_grid_search().unwrap();
        assert_eq!(fitter.max_spacing, GridFitter::default().max_spacing);
        assert_eq!(window.low, 865e6);

        let reference = cfg.reference_grid().unwrap().unwrap();
        assert_eq!(reference.count, 13);
        assert!((reference.spacing - 4_300_000.0 / 12.0).abs() < 1e-6);
        assert!((cfg.sweep_period_secs().unwrap() - 0.0107).abs() < 1e-12);
    }

    #[test]
    fn malformed_yaml_names_the_file() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"detector: [not, a, kind]\n").unwrap();
        let path = temp.into_temp_path();
        let err = WorkflowConfig::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("parsing workflow config"));
    }
}
