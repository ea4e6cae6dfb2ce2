pub struct StatsHelper;

impl StatsHelper {
    /// Mean of the non-NaN samples, NaN when there are none.
    pub fn nan_mean<I>(samples: I) -> f64
    where
        I: IntoIterator<Item = f64>,
    {
        let (sum, count) = samples
            .into_iter()
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
        if count == 0 {
            f64::NAN
        } else {
            sum / count as f64
        }
    }

    /// Minimum and maximum of the non-NaN samples.
    pub fn nan_min_max<I>(samples: I) -> Option<(f64, f64)>
    where
        I: IntoIterator<Item = f64>,
    {
        samples
            .into_iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn all_nan(samples: &[f64]) -> bool {
        samples.iter().all(|v| v.is_nan())
    }
}
