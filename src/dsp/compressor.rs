//! Compressor: master-bus dynamics control.
//!
//! A feed-forward peak compressor with threshold, ratio, soft knee, attack
//! and release, parameterised like the Web Audio `DynamicsCompressorNode`.

/// A mono dynamics compressor.
#[derive(Debug, Clone)]
pub struct Compressor {
    /// Threshold in dB.
    pub threshold: f64,
    /// Compression ratio (4.0 = 4:1).
    pub ratio: f64,
    /// Knee width in dB (0 = hard knee).
    pub knee: f64,

    attack_coef: f64,
    release_coef: f64,

    envelope: f64,
}

impl Compressor {
    /// Master-bus settings: −18 dB threshold, 24 dB knee, 4:1, 3 ms attack,
    /// 180 ms release.
    pub fn master(sample_rate: f64) -> Self {
        Self::with_params(sample_rate, -18.0, 4.0, 24.0, 0.003, 0.18)
    }

    pub fn with_params(
        sample_rate: f64,
        threshold: f64,
        ratio: f64,
        knee: f64,
        attack: f64,
        release: f64,
    ) -> Self {
        let coef = |secs: f64| (-1.0 / (secs * sample_rate)).exp();
        Compressor {
            threshold: threshold.clamp(-100.0, 0.0),
            ratio: ratio.clamp(1.0, 20.0),
            knee: knee.clamp(0.0, 40.0),
            attack_coef: coef(attack.clamp(0.0001, 1.0)),
            release_coef: coef(release.clamp(0.001, 5.0)),
            envelope: 0.0,
        }
    }

    #[inline]
    fn linear_to_db(linear: f64) -> f64 {
        if linear <= 0.0 {
            -120.0
        } else {
            20.0 * linear.log10()
        }
    }

    #[inline]
    fn db_to_linear(db: f64) -> f64 {
        10.0_f64.powf(db / 20.0)
    }

    /// Gain change in dB (≤ 0) for an input level in dB.
    #[inline]
    fn compute_gain(&self, input_db: f64) -> f64 {
        let slope = 1.0 - 1.0 / self.ratio;
        if self.knee <= 0.0 {
            if input_db <= self.threshold {
                0.0
            } else {
                (self.threshold - input_db) * slope
            }
        } else {
            let half_knee = self.knee / 2.0;
            let knee_start = self.threshold - half_knee;
            let knee_end = self.threshold + half_knee;

            if input_db <= knee_start {
                0.0
            } else if input_db >= knee_end {
                (self.threshold - input_db) * slope
            } else {
                // Quadratic through the knee
                let x = input_db - knee_start;
                -slope * x * x / (2.0 * self.knee)
            }
        }
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        let level = input.abs();
        let coef = if level > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * self.envelope + (1.0 - coef) * level;

        let gain_db = self.compute_gain(Self::linear_to_db(self.envelope));
        input * Self::db_to_linear(gain_db)
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }

    /// Current gain reduction in dB (for metering).
    pub fn gain_reduction(&self) -> f64 {
        -self.compute_gain(Self::linear_to_db(self.envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_below_knee() {
        // The master knee spans -30..-6 dB.
        let mut comp = Compressor::master(44100.0);
        for _ in 0..2000 {
            comp.process(0.01); // -40 dB
        }
        let out = comp.process(0.01);
        assert!((out - 0.01).abs() < 1e-6, "Below knee, output should equal input: got {out}");
    }

    #[test]
    fn reduces_loud_signals() {
        let mut comp = Compressor::master(44100.0);
        for _ in 0..5000 {
            comp.process(1.0);
        }
        let out = comp.process(1.0);
        // 18 dB over threshold at 4:1 → about -13.5 dB
        assert!(out < 0.35, "Compressor should reduce loud signals: got {out}");
        assert!(out > 0.1, "Compressor should not over-compress: got {out}");
    }

    #[test]
    fn knee_is_continuous() {
        let comp = Compressor::master(44100.0);
        let below = comp.compute_gain(-6.0 - 1e-9);
        let above = comp.compute_gain(-6.0 + 1e-9);
        assert!((below - above).abs() < 1e-6, "knee end mismatch: {below} vs {above}");
        assert_eq!(comp.compute_gain(-30.0), 0.0);
    }

    #[test]
    fn release_recovers_gain() {
        let mut comp = Compressor::master(44100.0);
        for _ in 0..1000 {
            comp.process(1.0);
        }
        let compressed = comp.process(0.1);
        for _ in 0..44100 {
            comp.process(0.1);
        }
        let released = comp.process(0.1);
        assert!(
            released > compressed,
            "After release, gain should recover: compressed={compressed}, released={released}"
        );
        assert!(comp.gain_reduction() >= 0.0);
    }
}
