use crate::generator::template::lobe_dbm;
use anyhow::Context;
use fhsscore::{Capture, CarrierGrid, FrequencyAxis};
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration for generating a synthetic hopping capture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub start_freq: f64,
    pub stop_freq: f64,
    pub points: usize,
    pub sweeps: usize,
    pub carrier_start: f64,
    pub carrier_spacing: f64,
    pub carriers: usize,
    /// Sweeps spent on each carrier before hopping.
    pub dwell_sweeps: usize,
    pub carrier_dbm: f64,
    pub floor_dbm: f64,
    /// Offset from a carrier (Hz) at which its lobe is 12 dB down.
    pub lobe_width: f64,
    /// Peak-to-peak uniform jitter added to every bin, in dB.
    pub noise: f64,
    pub seed: u64,
    pub description: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            start_freq: 865_000_000.0,
            stop_freq: 870_000_000.0,
            points: 201,
            sweeps: 500,
            carrier_start: 865_275_000.0,
            carrier_spacing: 4_300_000.0 / 12.0,
            carriers: 13,
            dwell_sweeps: 10,
            carrier_dbm: -10.0,
            floor_dbm: -95.0,
            lobe_width: 25_000.0,
            noise: 3.0,
            seed: 0,
            description: None,
        }
    }
}

impl GeneratorConfig {
    pub fn grid(&self) -> CarrierGrid {
        CarrierGrid::new(self.carrier_start, self.carrier_spacing, self.carriers)
    }
}

/// Carrier index per dwell. Every carrier is visited once per cycle in a
/// shuffled order, and consecutive dwells never share a carrier.
fn hop_sequence(rng: &mut StdRng, carriers: usize, dwells: usize) -> Vec<usize> {
    let mut sequence = Vec::with_capacity(dwells);
    let mut order: Vec<usize> = (0..carriers).collect();
    while sequence.len() < dwells {
        order.shuffle(rng);
        if carriers > 1 && sequence.last() == order.first() {
            order.swap(0, 1);
        }
        sequence.extend(order.iter().copied());
    }
    sequence.truncate(dwells);
    sequence
}

pub fn build_capture(config: &GeneratorConfig) -> anyhow::Result<Capture> {
    if config.carriers == 0 || config.dwell_sweeps == 0 {
        anyhow::bail!("generator needs at least one carrier and a non-zero dwell");
    }
    let axis = FrequencyAxis::linspace(config.start_freq, config.stop_freq, config.points)
        .context("building generator frequency axis")?;
    let grid = config.grid();
    let half_noise = config.noise.abs() / 2.0;

    let mut rng = StdRng::seed_from_u64(config.seed);
    let dwells = config.sweeps.div_ceil(config.dwell_sweeps);
    let sequence = hop_sequence(&mut rng, config.carriers, dwells);

    let mut powers = Array2::zeros((config.sweeps, axis.len()));
    for (sweep_index, mut sweep) in powers.outer_iter_mut().enumerate() {
        let center = grid.carrier(sequence[sweep_index / config.dwell_sweeps]);
        for (value, &freq) in sweep.iter_mut().zip(axis.values()) {
            let clean = lobe_dbm(freq, center, config.lobe_width, config.carrier_dbm)
                .max(config.floor_dbm);
            *value = clean + rng.gen_range(-half_noise..=half_noise);
        }
    }

    Capture::new(axis, powers).context("assembling synthetic capture")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_builds_expected_shape() {
        let config = GeneratorConfig {
            sweeps: 40,
            points: 101,
            ..Default::default()
        };
        let capture = build_capture(&config).unwrap();
        assert_eq!(capture.sweep_count(), 40);
        assert_eq!(capture.bin_count(), 101);
        assert_eq!(capture.frequencies()[100], config.stop_freq);
    }

    #[test]
    fn same_seed_repeats_the_capture() {
        let config = GeneratorConfig {
            sweeps: 30,
            seed: 13,
            description: Some("repeat".into()),
            ..Default::default()
        };
        let first = build_capture(&config).unwrap();
        let second = build_capture(&config).unwrap();
        assert_eq!(first.powers(), second.powers());
    }

    #[test]
    fn hop_sequence_visits_every_carrier_without_repeats() {
        let mut rng = StdRng::seed_from_u64(7);
        let sequence = hop_sequence(&mut rng, 5, 23);
        assert_eq!(sequence.len(), 23);
        for carrier in 0..5 {
            assert!(sequence[..5].contains(&carrier));
        }
        assert!(sequence.windows(2).all(|pair| pair[0] != pair[1]));
    }

    #[test]
    fn noiseless_sweep_peaks_on_the_active_carrier() {
        let config = GeneratorConfig {
            sweeps: 1,
            noise: 0.0,
            ..Default::default()
        };
        let capture = build_capture(&config).unwrap();
        let sweep = capture.sweep(0).unwrap();
        let strongest = sweep
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        assert!(strongest > -11.5);
        assert!(sweep.iter().any(|&v| v == config.floor_dbm));
    }

    #[test]
    fn zero_dwell_is_rejected() {
        let config = GeneratorConfig {
            dwell_sweeps: 0,
            ..Default::default()
        };
        assert!(build_capture(&config).is_err());
    }
}
