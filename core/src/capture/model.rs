use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::prelude::{AnalysisError, AnalysisResult};

/// Strictly increasing bin frequencies (Hz) shared by every sweep of a capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct FrequencyAxis {
    values: Vec<f64>,
}

impl FrequencyAxis {
    pub fn new(values: Vec<f64>) -> AnalysisResult<Self> {
        if values.is_empty() {
            return Err(AnalysisError::InvalidInput("frequency axis is empty".into()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidInput(
                "frequency axis contains non-finite values".into(),
            ));
        }
        if values.windows(2).any(|pair| pair[1] <= pair[0]) {
            return Err(AnalysisError::InvalidInput(
                "frequency axis must be strictly increasing".into(),
            ));
        }
        Ok(Self { values })
    }

    /// Evenly spaced axis with both endpoints included.
    pub fn linspace(start: f64, stop: f64, points: usize) -> AnalysisResult<Self> {
        if points < 2 {
            return Err(AnalysisError::InvalidInput(format!(
                "need at least 2 points, got {}",
                points
            )));
        }
        if !(start < stop) {
            return Err(AnalysisError::InvalidInput(format!(
                "start {} must be below stop {}",
                start, stop
            )));
        }
        let step = (stop - start) / (points - 1) as f64;
        let mut values: Vec<f64> = (0..points).map(|i| start + i as f64 * step).collect();
        values[points - 1] = stop;
        Self::new(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl TryFrom<Vec<f64>> for FrequencyAxis {
    type Error = AnalysisError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<FrequencyAxis> for Vec<f64> {
    fn from(axis: FrequencyAxis) -> Self {
        axis.values
    }
}

#[derive(Deserialize)]
struct CaptureRecord {
    axis: FrequencyAxis,
    powers: Array2<f64>,
}

/// One batch of sweeps (rows) over a shared frequency axis (columns), in dBm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CaptureRecord")]
pub struct Capture {
    axis: FrequencyAxis,
    powers: Array2<f64>,
}

impl Capture {
    pub fn new(axis: FrequencyAxis, powers: Array2<f64>) -> AnalysisResult<Self> {
        if powers.ncols() != axis.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "sweeps carry {} bins but the axis has {}",
                powers.ncols(),
                axis.len()
            )));
        }
        Ok(Self { axis, powers })
    }

    pub fn from_sweeps(axis: FrequencyAxis, sweeps: Vec<Vec<f64>>) -> AnalysisResult<Self> {
        let bins = axis.len();
        let rows = sweeps.len();
        let mut flat = Vec::with_capacity(rows * bins);
        for (index, sweep) in sweeps.into_iter().enumerate() {
            if sweep.len() != bins {
                return Err(AnalysisError::InvalidInput(format!(
                    "sweep {} has {} bins, expected {}",
                    index,
                    sweep.len(),
                    bins
                )));
            }
            flat.extend(sweep);
        }
        let powers = Array2::from_shape_vec((rows, bins), flat)
            .map_err(|err| AnalysisError::InvalidInput(err.to_string()))?;
        Self::new(axis, powers)
    }

    pub fn axis(&self) -> &FrequencyAxis {
        &self.axis
    }

    pub fn frequencies(&self) -> &[f64] {
        self.axis.values()
    }

    pub fn powers(&self) -> ArrayView2<'_, f64> {
        self.powers.view()
    }

    pub fn sweep(&self, index: usize) -> Option<ArrayView1<'_, f64>> {
        (index < self.sweep_count()).then(|| self.powers.row(index))
    }

    pub fn sweeps(&self) -> impl Iterator<Item = ArrayView1<'_, f64>> {
        self.powers.axis_iter(Axis(0))
    }

    pub fn sweep_count(&self) -> usize {
        self.powers.nrows()
    }

    pub fn bin_count(&self) -> usize {
        self.axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweep_count() == 0
    }
}

impl TryFrom<CaptureRecord> for Capture {
    type Error = AnalysisError;

    fn try_from(record: CaptureRecord) -> Result<Self, Self::Error> {
        Self::new(record.axis, record.powers)
    }
}

/// Carrier frequencies in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CarrierSet {
    frequencies: Vec<f64>,
}

impl CarrierSet {
    pub fn new(mut frequencies: Vec<f64>) -> Self {
        frequencies.sort_by(|a, b| a.total_cmp(b));
        Self { frequencies }
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Euclidean distance to a reference set of the same size, divided by the
    /// carrier count.
    pub fn distance_to(&self, reference: &CarrierSet) -> AnalysisResult<f64> {
        if self.len() != reference.len() {
            return Err(AnalysisError::InvalidInput(format!(
                "cannot compare {} carriers against a reference of {}",
                self.len(),
                reference.len()
            )));
        }
        if self.is_empty() {
            return Err(AnalysisError::InvalidInput("carrier sets are empty".into()));
        }
        let sum_sq: f64 = self
            .frequencies
            .iter()
            .zip(reference.frequencies())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();
        Ok(sum_sq.sqrt() / self.len() as f64)
    }
}

/// Evenly spaced carrier layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarrierGrid {
    pub start: f64,
    pub spacing: f64,
    pub count: usize,
}

impl CarrierGrid {
    pub fn new(start: f64, spacing: f64, count: usize) -> Self {
        Self {
            start,
            spacing,
            count,
        }
    }

    /// Grid whose first carrier is `low` and last carrier is `high`.
    pub fn spanning(low: f64, high: f64, count: usize) -> AnalysisResult<Self> {
        match count {
            0 => Err(AnalysisError::InvalidInput(
                "carrier count must be positive".into(),
            )),
            1 => Ok(Self::new(low, 0.0, 1)),
            _ => Ok(Self::new(low, (high - low) / (count - 1) as f64, count)),
        }
    }

    pub fn carrier(&self, index: usize) -> f64 {
        self.start + index as f64 * self.spacing
    }

    pub fn to_carrier_set(&self) -> CarrierSet {
        CarrierSet::new((0..self.count).map(|k| self.carrier(k)).collect())
    }
}

/// Occupancy classification of a single sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepOccupancy {
    /// Nothing above the threshold.
    Empty,
    /// Same active bins as the previous non-empty sweep.
    Steady,
    /// Active bins differ from the previous non-empty sweep.
    Hop,
}

/// Per-sweep hop marks plus the derived hop duration in sweeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopTrace {
    pub marks: Vec<SweepOccupancy>,
    pub hop_events: usize,
    pub hop_duration: f64,
}

impl HopTrace {
    pub fn sweep_count(&self) -> usize {
        self.marks.len()
    }

    pub fn empty_sweeps(&self) -> usize {
        self.marks
            .iter()
            .filter(|mark| **mark == SweepOccupancy::Empty)
            .count()
    }

    /// Mean length of the dwells enclosed by two hop events. The partial
    /// dwells at either end of the capture are left out.
    pub fn mean_dwell_sweeps(&self) -> Option<f64> {
        let hops: Vec<usize> = self
            .marks
            .iter()
            .enumerate()
            .filter(|(_, mark)| **mark == SweepOccupancy::Hop)
            .map(|(index, _)| index)
            .collect();
        match (hops.first(), hops.last()) {
            (Some(first), Some(last)) if hops.len() >= 2 => {
                Some((last - first) as f64 / (hops.len() - 1) as f64)
            }
            _ => None,
        }
    }

    pub fn hop_duration_secs(&self, sweep_period_secs: f64) -> f64 {
        self.hop_duration * sweep_period_secs
    }
}
