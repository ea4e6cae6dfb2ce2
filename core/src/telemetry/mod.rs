//! Component-tagged logging and frame counters shared by the capture and
//! processing stages.

pub mod log;
pub mod metrics;

pub use log::LogManager;
pub use metrics::MetricsRecorder;
