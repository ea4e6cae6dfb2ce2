use crate::capture::{Capture, HopTrace, SweepOccupancy};
use crate::prelude::{AnalysisError, AnalysisResult};
use crate::telemetry::log::LogManager;

/// Estimates how many sweeps the transmitter stays on a carrier.
///
/// A sweep's active set is every bin above `threshold`. The first non-empty
/// sweep sets the reference; each later non-empty sweep whose active set
/// differs from the reference is a hop and becomes the new reference. Empty
/// sweeps are marked but otherwise skipped. The duration is the total sweep
/// count over the number of hops.
pub fn estimate_hop_duration(capture: &Capture, threshold: f64) -> AnalysisResult<HopTrace> {
    if capture.is_empty() {
        return Err(AnalysisError::InvalidInput(
            "capture holds no sweeps to time".into(),
        ));
    }

    let mut marks = Vec::with_capacity(capture.sweep_count());
    let mut reference: Option<Vec<usize>> = None;
    let mut hop_events = 0;

    for sweep in capture.sweeps() {
        let active: Vec<usize> = sweep
            .iter()
            .enumerate()
            .filter(|(_, &power)| power > threshold)
            .map(|(bin, _)| bin)
            .collect();

        let mark = if active.is_empty() {
            SweepOccupancy::Empty
        } else if reference.is_none() {
            reference = Some(active);
            SweepOccupancy::Steady
        } else if reference.as_deref() != Some(active.as_slice()) {
            hop_events += 1;
            reference = Some(active);
            SweepOccupancy::Hop
        } else {
            SweepOccupancy::Steady
        };
        marks.push(mark);
    }

    if hop_events == 0 {
        return Err(AnalysisError::Undefined(format!(
            "no carrier change across {} sweeps above {:.1} dBm",
            capture.sweep_count(),
            threshold
        )));
    }

    let hop_duration = capture.sweep_count() as f64 / hop_events as f64;
    let trace = HopTrace {
        marks,
        hop_events,
        hop_duration,
    };

    LogManager::new("hop").record(&format!(
        "{} hops over {} sweeps ({} empty), {:.2} sweeps per hop",
        hop_events,
        trace.sweep_count(),
        trace.empty_sweeps(),
        hop_duration
    ));

    Ok(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrequencyAxis;

    fn single_carrier_capture(
        bins: usize,
        active: impl Fn(usize) -> Option<usize>,
        sweeps: usize,
    ) -> Capture {
        let axis = FrequencyAxis::linspace(865e6, 870e6, bins).unwrap();
        let rows = (0..sweeps)
            .map(|n| {
                (0..bins)
                    .map(|bin| if active(n) == Some(bin) { -30.0 } else { -95.0 })
                    .collect()
            })
            .collect();
        Capture::from_sweeps(axis, rows).unwrap()
    }

    #[test]
    fn carrier_change_every_ten_sweeps() {
        let capture = single_carrier_capture(25, |n| Some((n / 10) * 2 % 25), 100);
        let trace = estimate_hop_duration(&capture, -40.0).unwrap();

        assert_eq!(trace.hop_events, 9);
        assert_eq!(trace.sweep_count(), 100);
        assert!((trace.hop_duration - 100.0 / 9.0).abs() < 1e-12);
        assert_eq!(trace.mean_dwell_sweeps(), Some(10.0));
        assert_eq!(trace.marks[10], SweepOccupancy::Hop);
        assert_eq!(trace.marks[11], SweepOccupancy::Steady);
    }

    #[test]
    fn empty_sweeps_neither_hop_nor_reset_reference() {
        let pattern = [Some(3), None, Some(3), None, Some(7), Some(7)];
        let capture = single_carrier_capture(10, |n| pattern[n], pattern.len());
        let trace = estimate_hop_duration(&capture, -40.0).unwrap();

        use SweepOccupancy::*;
        assert_eq!(trace.marks, vec![Steady, Empty, Steady, Empty, Hop, Steady]);
        assert_eq!(trace.hop_events, 1);
        assert_eq!(trace.hop_duration, 6.0);
    }

    #[test]
    fn leading_empty_sweeps_do_not_count_as_a_hop() {
        let pattern = [None, None, Some(2), Some(5)];
        let capture = single_carrier_capture(8, |n| pattern[n], pattern.len());
        let trace = estimate_hop_duration(&capture, -40.0).unwrap();
        assert_eq!(trace.hop_events, 1);
        assert_eq!(trace.hop_duration, 4.0);
    }

    #[test]
    fn constant_carrier_is_undefined() {
        let capture = single_carrier_capture(25, |_| Some(4), 100);
        assert!(matches!(
            estimate_hop_duration(&capture, -40.0),
            Err(AnalysisError::Undefined(_))
        ));
    }

    #[test]
    fn silent_capture_is_undefined() {
        let capture = single_carrier_capture(25, |_| None, 20);
        assert!(matches!(
            estimate_hop_duration(&capture, -40.0),
            Err(AnalysisError::Undefined(_))
        ));
    }

    #[test]
    fn duration_converts_with_sweep_period() {
        let capture = single_carrier_capture(25, |n| Some((n / 10) % 2), 40);
        let trace = estimate_hop_duration(&capture, -40.0).unwrap();
        assert_eq!(trace.hop_events, 3);
        let secs = trace.hop_duration_secs(0.0107);
        assert!((secs - 40.0 / 3.0 * 0.0107).abs() < 1e-12);
    }
}
