//! Small numeric helpers shared by the simulator and the synthesis engine.

/// Clamp that also tolerates `min > max` (returns `min`) instead of panicking.
#[inline]
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max).max(min)
}

#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Exponential interpolation between two positive values.
///
/// Cutoffs and pitches are perceived logarithmically, so a linear sweep of
/// `t` should move them by equal ratios rather than equal Hz.
#[inline]
pub fn lerp_exp(min: f64, max: f64, t: f64) -> f64 {
    let lo = min.max(1e-6);
    let hi = max.max(1e-6);
    lo * (hi / lo).powf(t)
}

/// Cubic 0→1 gate over `[edge0, edge1]`.
#[inline]
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = clamp((x - edge0) / (edge1 - edge0), 0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// First-order approach of `current` toward `target` over `dt` seconds.
#[inline]
pub fn exp_approach(current: f64, target: f64, dt: f64, tau: f64) -> f64 {
    let tau = tau.max(0.001);
    let a = 1.0 - (-dt / tau).exp();
    current + (target - current) * a
}

/// Replace NaN/infinite values with `fallback`.
#[inline]
pub fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

/// Round to three decimals, the precision throttle travels at on the wire.
#[inline]
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothstep_edges() {
        assert_eq!(smoothstep(0.2, 0.7, 0.0), 0.0);
        assert_eq!(smoothstep(0.2, 0.7, 1.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn lerp_exp_is_geometric() {
        let mid = lerp_exp(100.0, 10_000.0, 0.5);
        assert!((mid - 1000.0).abs() < 1e-6, "got {mid}");
    }

    #[test]
    fn exp_approach_converges() {
        let mut x = 0.0;
        for _ in 0..100 {
            x = exp_approach(x, 1.0, 0.06, 0.06);
        }
        assert!((x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn exp_approach_zero_tau_is_safe() {
        let x = exp_approach(0.0, 1.0, 0.06, 0.0);
        assert!(x.is_finite() && x > 0.99);
    }

    #[test]
    fn finite_or_replaces_nan() {
        assert_eq!(finite_or(f64::NAN, 0.0), 0.0);
        assert_eq!(finite_or(f64::INFINITY, 2.0), 2.0);
        assert_eq!(finite_or(3.5, 0.0), 3.5);
    }

    #[test]
    fn round3_matches_wire_precision() {
        assert_eq!(round3(0.123_456), 0.123);
        assert_eq!(round3(0.9996), 1.0);
    }
}
