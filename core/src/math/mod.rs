pub mod optimize;
pub mod stats;

pub use optimize::{minimize_bounded, ternary_search, BoundedMinimum};
pub use stats::StatsHelper;
