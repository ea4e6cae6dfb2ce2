//! Derivative-free one-dimensional minimizers.

const GOLDEN_MEAN: f64 = 0.381_966_011_250_105_1; // (3 - sqrt(5)) / 2
const TERNARY_MAX_ITERATIONS: usize = 200;

/// Result of [`minimize_bounded`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundedMinimum {
    pub x: f64,
    pub value: f64,
    pub evaluations: usize,
    pub converged: bool,
}

/// Brent's bounded minimizer (golden section with parabolic interpolation)
/// over `[lower, upper]`.
///
/// Stops when the bracket around the best point is within
/// `sqrt(eps) * |x| + xatol / 3` on each side, or after `max_evaluations`
/// calls to `f`. Only finds a local minimum when `f` is not unimodal on the
/// interval.
pub fn minimize_bounded<F>(
    mut f: F,
    lower: f64,
    upper: f64,
    xatol: f64,
    max_evaluations: usize,
) -> BoundedMinimum
where
    F: FnMut(f64) -> f64,
{
    let sqrt_eps = f64::EPSILON.sqrt();
    let (mut a, mut b) = (lower, upper);

    let mut fulc = a + GOLDEN_MEAN * (b - a);
    let mut nfc = fulc;
    let mut xf = fulc;
    let mut rat: f64 = 0.0;
    let mut e: f64 = 0.0;
    let mut fx = f(xf);
    let mut evaluations = 1;
    let mut ffulc = fx;
    let mut fnfc = fx;
    let mut xm = 0.5 * (a + b);
    let mut tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
    let mut tol2 = 2.0 * tol1;
    let mut converged = true;

    while (xf - xm).abs() > tol2 - 0.5 * (b - a) {
        let mut golden = true;

        if e.abs() > tol1 {
            golden = false;
            let mut r = (xf - nfc) * (fx - ffulc);
            let mut q = (xf - fulc) * (fx - fnfc);
            let mut p = (xf - fulc) * q - (xf - nfc) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            r = e;
            e = rat;

            if p.abs() < (0.5 * q * r).abs() && p > q * (a - xf) && p < q * (b - xf) {
                rat = p / q;
                let x = xf + rat;
                if (x - a) < tol2 || (b - x) < tol2 {
                    rat = tol1 * sign_or_one(xm - xf);
                }
            } else {
                golden = true;
            }
        }

        if golden {
            e = if xf >= xm { a - xf } else { b - xf };
            rat = GOLDEN_MEAN * e;
        }

        let x = xf + sign_or_one(rat) * rat.abs().max(tol1);
        let fu = f(x);
        evaluations += 1;

        if fu <= fx {
            if x >= xf {
                a = xf;
            } else {
                b = xf;
            }
            fulc = nfc;
            ffulc = fnfc;
            nfc = xf;
            fnfc = fx;
            xf = x;
            fx = fu;
        } else {
            if x < xf {
                a = x;
            } else {
                b = x;
            }
            if fu <= fnfc || nfc == xf {
                fulc = nfc;
                ffulc = fnfc;
                nfc = x;
                fnfc = fu;
            } else if fu <= ffulc || fulc == xf || fulc == nfc {
                fulc = x;
                ffulc = fu;
            }
        }

        xm = 0.5 * (a + b);
        tol1 = sqrt_eps * xf.abs() + xatol / 3.0;
        tol2 = 2.0 * tol1;

        if evaluations >= max_evaluations {
            converged = false;
            break;
        }
    }

    BoundedMinimum {
        x: xf,
        value: fx,
        evaluations,
        converged,
    }
}

fn sign_or_one(value: f64) -> f64 {
    if value < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Ternary search for the minimum of `f` on `[left, right]`.
///
/// Assumes `f` is unimodal on the interval. On a tie the right third is
/// dropped, so flat regions resolve toward `left`. Returns the midpoint of
/// the final interval once it is narrower than `tolerance`.
pub fn ternary_search<F>(mut f: F, mut left: f64, mut right: f64, tolerance: f64) -> f64
where
    F: FnMut(f64) -> f64,
{
    let mut iterations = 0;
    while right - left > tolerance && iterations < TERNARY_MAX_ITERATIONS {
        let third = (right - left) / 3.0;
        let m1 = left + third;
        let m2 = right - third;
        if f(m1) <= f(m2) {
            right = m2;
        } else {
            left = m1;
        }
        iterations += 1;
    }
    0.5 * (left + right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_minimizer_finds_parabola_vertex() {
        let result = minimize_bounded(|x| (x - 2.5) * (x - 2.5) + 1.0, -10.0, 10.0, 1e-8, 500);
        assert!(result.converged);
        assert!((result.x - 2.5).abs() < 1e-6);
        assert!((result.value - 1.0).abs() < 1e-10);
    }

    #[test]
    fn bounded_minimizer_respects_bounds() {
        let result = minimize_bounded(|x| x, 3.0, 7.0, 1e-8, 500);
        assert!(result.x >= 3.0 && result.x <= 7.0);
        assert!((result.x - 3.0).abs() < 1e-6);
    }

    #[test]
    fn bounded_minimizer_handles_kinks() {
        let result = minimize_bounded(|x| (x - 1.25).abs(), 0.0, 4.0, 1e-9, 500);
        assert!((result.x - 1.25).abs() < 1e-6);
    }

    #[test]
    fn bounded_minimizer_stops_at_evaluation_cap() {
        let result = minimize_bounded(|x| (x - 0.3).powi(2), 0.0, 1.0, 0.0, 5);
        assert!(!result.converged);
        assert_eq!(result.evaluations, 5);
    }

    #[test]
    fn ternary_search_locates_unimodal_minimum() {
        let x = ternary_search(|x| (x - 358_333.333).powi(2), 0.0, 10_000_000.0, 1e-6);
        assert!((x - 358_333.333).abs() < 1e-5);
    }

    #[test]
    fn ternary_search_prefers_left_on_flat_tail() {
        let x = ternary_search(|x| if x < 4.0 { (x - 1.0).abs() } else { 3.0 }, 0.0, 10.0, 1e-9);
        assert!((x - 1.0).abs() < 1e-6);
    }
}
