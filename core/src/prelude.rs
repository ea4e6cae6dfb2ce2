use crate::capture::{CarrierSet, Capture};

/// Common error type for analysis and capture handling.
#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error("undefined result: {0}")]
    Undefined(String),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("table format: {0}")]
    Table(#[from] csv::Error),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Curve a detector searched together with the carriers it found on it.
#[derive(Debug, Clone)]
pub struct Detection {
    pub curve: Vec<f64>,
    pub carriers: CarrierSet,
}

impl Detection {
    pub fn count(&self) -> usize {
        self.carriers.len()
    }
}

/// Strategy for turning a capture into a set of carrier frequencies.
pub trait CarrierDetector {
    fn name(&self) -> &'static str;
    fn detect(&self, capture: &Capture) -> AnalysisResult<Detection>;
}
