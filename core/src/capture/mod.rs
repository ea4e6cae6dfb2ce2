pub mod decoder;
pub mod model;
pub mod table;

pub use decoder::{encode_frame, DecodeSummary, FrameDecoder};
pub use model::{
    Capture, CarrierGrid, CarrierSet, FrequencyAxis, HopTrace, SweepOccupancy,
};
pub use table::{load_table, read_table, save_table, write_table};
