use crate::workflow::runner::WorkflowResult;
use fhsscore::CarrierGrid;
use serde::{Deserialize, Serialize};

/// Everything a renderer needs to draw one analysis: the searched curve,
/// the detected carriers and, when available, the fitted grid and hop timing.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct VisualizationModel {
    pub frequencies: Vec<f64>,
    pub curve: Vec<f64>,
    pub carriers: Vec<f64>,
    pub grid: Option<CarrierGrid>,
    /// Sweeps per hop.
    pub hop_duration: Option<f64>,
    pub notes: Vec<String>,
}

impl From<&WorkflowResult> for VisualizationModel {
    fn from(result: &WorkflowResult) -> Self {
        Self {
            frequencies: result.frequencies.clone(),
            curve: result.curve.clone(),
            carriers: result.carriers.frequencies().to_vec(),
            grid: result.grid.map(|fit| fit.grid),
            hop_duration: result.hop.as_ref().map(|trace| trace.hop_duration),
            notes: result.notes.clone(),
        }
    }
}
