pub mod averager;
pub mod emphasis;
pub mod grid;
pub mod hop;
pub mod peaks;
pub mod smoother;

pub use averager::average;
pub use emphasis::EmphasisDetector;
pub use grid::{grid_cost, GridFit, GridFitter, SearchWindow};
pub use hop::estimate_hop_duration;
pub use peaks::{find_peaks, ThresholdDetector};
pub use smoother::{suppress_minima, Smoother, SmoothingReport, MAX_STEPS_PER_BIN};
