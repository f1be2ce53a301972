//! Table-driven tanh saturator.

/// Points in the transfer curve.
pub const CURVE_SIZE: usize = 2048;

/// A wave-shaper whose transfer curve is `tanh(k·x) / tanh(k)` over [-1, 1],
/// sampled into a table and read with linear interpolation. Inputs outside
/// [-1, 1] are held at the curve ends.
#[derive(Debug, Clone)]
pub struct Saturator {
    curve: Vec<f64>,
}

impl Saturator {
    pub fn tanh(amount: f64) -> Self {
        let k = amount.max(0.01);
        let norm = k.tanh();
        let curve = (0..CURVE_SIZE)
            .map(|i| {
                let x = (i as f64 * 2.0) / CURVE_SIZE as f64 - 1.0;
                (k * x).tanh() / norm
            })
            .collect();
        Saturator { curve }
    }

    #[inline]
    pub fn process(&self, input: f64) -> f64 {
        if !input.is_finite() {
            return 0.0;
        }
        let last = (CURVE_SIZE - 1) as f64;
        let pos = ((input + 1.0) * 0.5 * last).clamp(0.0, last);
        let i = pos.floor() as usize;
        let frac = pos - i as f64;
        let a = self.curve[i];
        let b = self.curve[(i + 1).min(CURVE_SIZE - 1)];
        a + (b - a) * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_is_odd_and_normalized() {
        let s = Saturator::tanh(2.4);
        assert!(s.process(0.0).abs() < 0.01);
        assert!((s.process(0.5) + s.process(-0.5)).abs() < 0.01);
        assert!((s.process(1.0) - 1.0).abs() < 0.01);
        assert!((s.process(-1.0) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn saturates_above_linear() {
        let s = Saturator::tanh(3.2);
        assert!(s.process(0.2) > 0.2, "tanh shaper should push small signals up");
    }

    #[test]
    fn out_of_range_is_held() {
        let s = Saturator::tanh(2.0);
        assert_eq!(s.process(5.0), s.process(1.0));
        assert_eq!(s.process(f64::NAN), 0.0);
    }
}
