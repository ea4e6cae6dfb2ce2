/// Power (dBm) of a carrier lobe at `frequency`: a parabola in dB, i.e. a
/// Gaussian in linear power, that drops 12 dB at `width` Hz off center.
pub fn lobe_dbm(frequency: f64, center: f64, width: f64, peak_dbm: f64) -> f64 {
    let offset = (frequency - center) / width;
    peak_dbm - 12.0 * offset * offset
}
