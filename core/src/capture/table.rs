//! Text table form of a capture.
//!
//! ```text
//! Snapshot,865000000.00 Hz,865250000.00 Hz,...
//! Sweep 1,-92.5,-41.03125,...
//! ```

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, Trim, WriterBuilder};

use crate::capture::model::{Capture, FrequencyAxis};
use crate::prelude::{AnalysisError, AnalysisResult};

const LABEL_COLUMN: &str = "Snapshot";
const FREQUENCY_UNIT: &str = "Hz";
const ROW_PREFIX: &str = "Sweep";

pub fn write_table<W: Write>(capture: &Capture, writer: W) -> AnalysisResult<()> {
    let mut writer = WriterBuilder::new().from_writer(writer);

    let mut header = Vec::with_capacity(capture.bin_count() + 1);
    header.push(LABEL_COLUMN.to_string());
    header.extend(
        capture
            .frequencies()
            .iter()
            .map(|freq| format!("{:.2} {}", freq, FREQUENCY_UNIT)),
    );
    writer.write_record(&header)?;

    for (index, sweep) in capture.sweeps().enumerate() {
        let mut row = Vec::with_capacity(sweep.len() + 1);
        row.push(format!("{} {}", ROW_PREFIX, index + 1));
        row.extend(sweep.iter().map(|value| value.to_string()));
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn read_table<R: Read>(reader: R) -> AnalysisResult<Capture> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let header = reader.headers()?.clone();
    let frequencies = header
        .iter()
        .skip(1)
        .map(parse_frequency)
        .collect::<AnalysisResult<Vec<f64>>>()?;
    let axis = FrequencyAxis::new(frequencies)?;

    let mut sweeps = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() != axis.len() + 1 {
            return Err(AnalysisError::InvalidInput(format!(
                "row {} has {} values, expected {}",
                index + 1,
                record.len().saturating_sub(1),
                axis.len()
            )));
        }
        let sweep = record
            .iter()
            .skip(1)
            .map(|cell| {
                cell.parse::<f64>().map_err(|_| {
                    AnalysisError::InvalidInput(format!(
                        "row {}: '{}' is not a number",
                        index + 1,
                        cell
                    ))
                })
            })
            .collect::<AnalysisResult<Vec<f64>>>()?;
        sweeps.push(sweep);
    }

    Capture::from_sweeps(axis, sweeps)
}

pub fn load_table<P: AsRef<Path>>(path: P) -> AnalysisResult<Capture> {
    read_table(File::open(path)?)
}

pub fn save_table<P: AsRef<Path>>(capture: &Capture, path: P) -> AnalysisResult<()> {
    write_table(capture, File::create(path)?)
}

fn parse_frequency(cell: &str) -> AnalysisResult<f64> {
    cell.split_whitespace()
        .next()
        .and_then(|token| token.parse::<f64>().ok())
        .ok_or_else(|| {
            AnalysisError::InvalidInput(format!("header cell '{}' is not a frequency", cell))
        })
}
