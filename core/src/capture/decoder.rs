use std::io::{ErrorKind, Read};
use std::time::Duration;

use crate::capture::model::{Capture, FrequencyAxis};
use crate::prelude::{AnalysisError, AnalysisResult};
use crate::telemetry::{LogManager, MetricsRecorder};

const FRAME_OPEN: u8 = b'{';
const FRAME_CLOSE: u8 = b'}';
const POINT_MARKER: u8 = b'x';
const BYTES_PER_POINT: usize = 3;
const RAW_PER_DBM: f64 = 32.0;
const DBM_OFFSET: f64 = 174.0;

/// Outcome of decoding a raw frame stream.
#[derive(Debug, Clone, Default)]
pub struct DecodeSummary {
    pub sweeps: Vec<Vec<f64>>,
    pub accepted: usize,
    pub discarded: usize,
}

impl DecodeSummary {
    /// Time per accepted sweep over a capture that took `elapsed`.
    pub fn sweep_period(&self, elapsed: Duration) -> Option<Duration> {
        u32::try_from(self.accepted)
            .ok()
            .filter(|count| *count > 0)
            .map(|count| elapsed / count)
    }
}

/// Decoder for the scanner's raw sweep frames.
///
/// A frame is `{`, then `points` triplets of `x` and a little-endian `i16`,
/// then `}`. Raw values convert to dBm as `v / 32 - 174`.
pub struct FrameDecoder {
    points: usize,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl FrameDecoder {
    pub fn new(points: usize) -> AnalysisResult<Self> {
        if points == 0 {
            return Err(AnalysisError::InvalidInput(
                "frames need at least one point".into(),
            ));
        }
        Ok(Self {
            points,
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("decoder"),
        })
    }

    pub fn frame_size(&self) -> usize {
        self.points * BYTES_PER_POINT + 2
    }

    pub fn decode_frame(&self, frame: &[u8]) -> AnalysisResult<Vec<f64>> {
        if frame.len() != self.frame_size() {
            return Err(AnalysisError::MalformedFrame(format!(
                "expected {} bytes, got {}",
                self.frame_size(),
                frame.len()
            )));
        }
        if frame[0] != FRAME_OPEN || frame[frame.len() - 1] != FRAME_CLOSE {
            return Err(AnalysisError::MalformedFrame(
                "missing frame delimiter".into(),
            ));
        }

        frame[1..frame.len() - 1]
            .chunks_exact(BYTES_PER_POINT)
            .enumerate()
            .map(|(index, point)| {
                if point[0] != POINT_MARKER {
                    return Err(AnalysisError::MalformedFrame(format!(
                        "expected 'x' at point {}, found {:#04x}",
                        index, point[0]
                    )));
                }
                let raw = i16::from_le_bytes([point[1], point[2]]);
                Ok(f64::from(raw) / RAW_PER_DBM - DBM_OFFSET)
            })
            .collect()
    }

    /// Reads frames until the stream ends. Corrupt frames and a trailing
    /// partial frame are skipped.
    pub fn decode_stream<R: Read>(&self, mut reader: R) -> AnalysisResult<DecodeSummary> {
        let mut buffer = vec![0u8; self.frame_size()];
        let mut sweeps = Vec::new();
        let mut discarded = 0;

        loop {
            let filled = fill_frame(&mut reader, &mut buffer)?;
            if filled == 0 {
                break;
            }
            if filled < buffer.len() {
                self.logger.warn(&format!(
                    "trailing frame is incomplete ({} of {} bytes), discarding it",
                    filled,
                    buffer.len()
                ));
                self.metrics.record_discarded();
                discarded += 1;
                break;
            }
            match self.decode_frame(&buffer) {
                Ok(sweep) => {
                    self.metrics.record_accepted();
                    sweeps.push(sweep);
                }
                Err(err) => {
                    self.logger.warn(&format!("discarding frame: {}", err));
                    self.metrics.record_discarded();
                    discarded += 1;
                }
            }
        }

        let accepted = sweeps.len();
        let (total_accepted, total_discarded) = self.metrics.snapshot();
        self.logger.record(&format!(
            "decoded {} sweeps, discarded {} frames (totals {}/{})",
            accepted, discarded, total_accepted, total_discarded
        ));

        Ok(DecodeSummary {
            sweeps,
            accepted,
            discarded,
        })
    }

    /// Decodes a stream into a capture over `points` bins linearly spaced
    /// between `start` and `stop`.
    pub fn decode_capture<R: Read>(
        &self,
        reader: R,
        start: f64,
        stop: f64,
    ) -> AnalysisResult<(Capture, DecodeSummary)> {
        let axis = FrequencyAxis::linspace(start, stop, self.points)?;
        let mut summary = self.decode_stream(reader)?;
        if summary.sweeps.is_empty() {
            return Err(AnalysisError::InvalidInput(
                "no intact frames in stream".into(),
            ));
        }
        let sweeps = std::mem::take(&mut summary.sweeps);
        let capture = Capture::from_sweeps(axis, sweeps)?;
        Ok((capture, summary))
    }
}

fn fill_frame<R: Read>(reader: &mut R, buffer: &mut [u8]) -> AnalysisResult<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(read) => filled += read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(filled)
}

/// Encodes dBm readings into one raw frame. The inverse of
/// [`FrameDecoder::decode_frame`] up to the 1/32 dB resolution.
pub fn encode_frame(dbm: &[f64]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(dbm.len() * BYTES_PER_POINT + 2);
    frame.push(FRAME_OPEN);
    for value in dbm {
        let raw = ((value + DBM_OFFSET) * RAW_PER_DBM)
            .round()
            .clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
        frame.push(POINT_MARKER);
        frame.extend_from_slice(&raw.to_le_bytes());
    }
    frame.push(FRAME_CLOSE);
    frame
}
