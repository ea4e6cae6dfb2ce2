//! Carrier and hop-timing analysis for frequency-hopping spectrum captures.
//!
//! A capture is a batch of sweeps over a shared frequency axis. The
//! processing stages average it, suppress noise dips, pick carrier peaks,
//! fit an evenly spaced carrier grid and estimate how long the transmitter
//! dwells on a carrier between hops.

pub mod capture;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use capture::{Capture, CarrierGrid, CarrierSet, FrequencyAxis, HopTrace};
pub use prelude::{AnalysisError, AnalysisResult, CarrierDetector, Detection};
