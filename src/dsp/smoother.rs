//! One-pole parameter smoother with `setTargetAtTime` semantics.

use crate::math::finite_or;

/// A parameter that exponentially approaches its target.
///
/// After `tau` seconds the remaining distance to the target has shrunk to
/// 1/e. Retargeting to the value already being approached changes nothing.
#[derive(Debug, Clone)]
pub struct SmoothedParam {
    value: f64,
    target: f64,
    coeff: f64,
    sample_rate: f64,
}

impl SmoothedParam {
    pub fn new(initial: f64, tau: f64, sample_rate: f64) -> Self {
        let initial = finite_or(initial, 0.0);
        let mut p = SmoothedParam {
            value: initial,
            target: initial,
            coeff: 1.0,
            sample_rate,
        };
        p.set_tau(tau);
        p
    }

    /// Change the time constant; `tau <= 0` snaps on the next sample.
    pub fn set_tau(&mut self, tau: f64) {
        self.coeff = if tau > 0.0 && self.sample_rate > 0.0 {
            1.0 - (-1.0 / (tau * self.sample_rate)).exp()
        } else {
            1.0
        };
    }

    /// Non-finite targets are replaced with 0.
    pub fn set_target(&mut self, target: f64) {
        self.target = finite_or(target, 0.0);
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    #[inline]
    pub fn next(&mut self) -> f64 {
        self.value += (self.target - self.value) * self.coeff;
        self.value
    }

    /// Advance `n` samples at once (control-rate updates).
    pub fn advance(&mut self, n: usize) -> f64 {
        if n > 0 {
            let keep = (1.0 - self.coeff).powi(n as i32);
            self.value = self.target + (self.value - self.target) * keep;
        }
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 48000.0;

    #[test]
    fn reaches_one_over_e_after_tau() {
        let mut p = SmoothedParam::new(0.0, 0.05, SR);
        p.set_target(1.0);
        for _ in 0..(0.05 * SR) as usize {
            p.next();
        }
        let remaining = 1.0 - p.value();
        assert!((remaining - (-1.0f64).exp()).abs() < 0.01, "remaining {remaining}");
    }

    #[test]
    fn retarget_to_same_value_is_idempotent() {
        let mut a = SmoothedParam::new(0.0, 0.04, SR);
        let mut b = SmoothedParam::new(0.0, 0.04, SR);
        a.set_target(300.0);
        b.set_target(300.0);
        for i in 0..2000 {
            if i == 700 {
                b.set_target(300.0);
            }
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn nan_target_becomes_zero() {
        let mut p = SmoothedParam::new(5.0, 0.01, SR);
        p.set_target(f64::NAN);
        assert_eq!(p.target(), 0.0);
        for _ in 0..48000 {
            p.next();
        }
        assert!(p.value().abs() < 1e-6);
    }

    #[test]
    fn advance_matches_per_sample_steps() {
        let mut a = SmoothedParam::new(0.0, 0.1, SR);
        let mut b = a.clone();
        a.set_target(1.0);
        b.set_target(1.0);
        for _ in 0..32 {
            a.next();
        }
        b.advance(32);
        assert!((a.value() - b.value()).abs() < 1e-12);
    }

    #[test]
    fn shorter_tau_converges_faster() {
        let mut slow = SmoothedParam::new(0.0, 0.2, SR);
        let mut fast = slow.clone();
        fast.set_tau(0.01);
        slow.set_target(1.0);
        fast.set_target(1.0);
        slow.advance(960);
        fast.advance(960);
        assert!(fast.value() > 0.99, "fast {}", fast.value());
        assert!(slow.value() < 0.2, "slow {}", slow.value());
    }

    #[test]
    fn zero_tau_snaps() {
        let mut p = SmoothedParam::new(0.0, 0.0, SR);
        p.set_target(0.7);
        assert_eq!(p.next(), 0.7);
    }
}
