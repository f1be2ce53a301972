//! Anti-aliased periodic oscillators using PolyBLEP.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// A band-limited oscillator with a start/stop lifecycle.
///
/// `frequency` and `detune` are plain fields so the owning layer can drive
/// them from smoothed parameters every sample.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    /// In cents.
    pub detune: f64,
    phase: f64,
    sample_rate: f64,
    running: bool,
}

impl Oscillator {
    /// A started oscillator.
    pub fn new(waveform: Waveform, sample_rate: f64) -> Self {
        Oscillator {
            waveform,
            frequency: 440.0,
            detune: 0.0,
            phase: 0.0,
            sample_rate,
            running: true,
        }
    }

    pub fn with_detune(mut self, cents: f64) -> Self {
        self.detune = cents;
        self
    }

    /// Stop the oscillator. Returns `false` if it was already stopped.
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn phase_inc(&self) -> f64 {
        let freq = self.frequency * (2.0_f64).powf(self.detune / 1200.0);
        let inc = freq / self.sample_rate;
        // Keep below Nyquist and away from NaN so PolyBLEP stays sane.
        if inc.is_finite() {
            inc.clamp(0.0, 0.5)
        } else {
            0.0
        }
    }

    /// Generate the next sample. A stopped oscillator is silent.
    pub fn next_sample(&mut self) -> f64 {
        if !self.running {
            return 0.0;
        }
        let inc = self.phase_inc();
        let sample = match self.waveform {
            Waveform::Sine => (2.0 * PI * self.phase).sin(),
            Waveform::Sawtooth => 2.0 * self.phase - 1.0 - poly_blep(self.phase, inc),
            Waveform::Square => {
                let naive = if self.phase < 0.5 { 1.0 } else { -1.0 };
                naive + poly_blep(self.phase, inc) - poly_blep((self.phase + 0.5) % 1.0, inc)
            }
            Waveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
        };

        self.phase += inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample
    }
}

/// PolyBLEP correction around the wrap discontinuity. `t` is the phase in
/// [0, 1), `dt` the phase increment per sample.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if dt <= 0.0 {
        0.0
    } else if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(waveform: Waveform, freq: f64) -> Vec<f64> {
        let mut osc = Oscillator::new(waveform, 44100.0);
        osc.frequency = freq;
        (0..44100).map(|_| osc.next_sample()).collect()
    }

    #[test]
    fn sine_starts_at_zero() {
        let mut osc = Oscillator::new(Waveform::Sine, 44100.0);
        assert!(osc.next_sample().abs() < 1e-10);
    }

    #[test]
    fn waveforms_stay_in_range() {
        for w in [Waveform::Sine, Waveform::Square, Waveform::Sawtooth, Waveform::Triangle] {
            for s in run(w, 440.0) {
                assert!(s.abs() <= 1.5, "{w:?} out of range: {s}");
            }
        }
    }

    #[test]
    fn detune_octave_doubles_increment() {
        let mut a = Oscillator::new(Waveform::Sine, 44100.0);
        a.frequency = 440.0;
        let b = a.clone().with_detune(1200.0);
        assert!((b.phase_inc() - 2.0 * a.phase_inc()).abs() < 1e-12);
        a.detune = -1200.0;
        assert!((a.phase_inc() - 220.0 / 44100.0).abs() < 1e-12);
    }

    #[test]
    fn stop_is_idempotent_and_silences() {
        let mut osc = Oscillator::new(Waveform::Sawtooth, 44100.0);
        assert!(osc.stop());
        assert!(!osc.stop());
        assert_eq!(osc.next_sample(), 0.0);
    }

    #[test]
    fn non_finite_frequency_is_silent_not_nan() {
        let mut osc = Oscillator::new(Waveform::Square, 44100.0);
        osc.frequency = f64::NAN;
        for _ in 0..64 {
            assert!(osc.next_sample().is_finite());
        }
    }
}
