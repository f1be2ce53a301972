//! Biquad filter: Web Audio `BiquadFilterNode` coefficient semantics.
//!
//! Low-pass and high-pass interpret `q` in decibels of resonance the way the
//! Web Audio node does; band-pass uses the classic cookbook Q. Coefficients are
//! only recomputed when a parameter actually changes.

use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
}

/// A 2nd-order IIR filter, Direct Form II Transposed.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    pub filter_type: FilterType,
    frequency: f64,
    q: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    z1: f64,
    z2: f64,

    sample_rate: f64,
    dirty: bool,
}

/// Frequency used when none is given (matches the Web Audio node default).
pub const DEFAULT_FREQUENCY: f64 = 350.0;

impl BiquadFilter {
    pub fn new(filter_type: FilterType, sample_rate: f64) -> Self {
        let mut f = BiquadFilter {
            filter_type,
            frequency: DEFAULT_FREQUENCY,
            q: 1.0,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
            dirty: true,
        };
        f.update_coefficients();
        f
    }

    pub fn with_params(filter_type: FilterType, sample_rate: f64, frequency: f64, q: f64) -> Self {
        let mut f = BiquadFilter::new(filter_type, sample_rate);
        f.set_frequency(frequency);
        f.set_q(q);
        f.update_coefficients();
        f
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    fn update_coefficients(&mut self) {
        let nyquist = self.sample_rate * 0.5;
        let freq = self.frequency.clamp(1.0, nyquist * 0.999);
        let w0 = 2.0 * PI * freq / self.sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();

        let (b0, b1, b2, a0, a1, a2) = match self.filter_type {
            FilterType::Lowpass => {
                let alpha = sin_w0 / (2.0 * 10f64.powf(self.q / 20.0));
                let b1 = 1.0 - cos_w0;
                let b0 = b1 / 2.0;
                (b0, b1, b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Highpass => {
                let alpha = sin_w0 / (2.0 * 10f64.powf(self.q / 20.0));
                let b0 = (1.0 + cos_w0) / 2.0;
                let b1 = -(1.0 + cos_w0);
                (b0, b1, b0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
            FilterType::Bandpass => {
                let alpha = sin_w0 / (2.0 * self.q.max(1e-4));
                (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha)
            }
        };

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
        self.dirty = false;
    }

    pub fn process(&mut self, input: f64) -> f64 {
        if self.dirty {
            self.update_coefficients();
        }
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    /// Non-finite values are ignored (the previous cutoff is kept).
    pub fn set_frequency(&mut self, freq: f64) {
        if freq.is_finite() && freq != self.frequency {
            self.frequency = freq;
            self.dirty = true;
        }
    }

    pub fn set_q(&mut self, q: f64) {
        if q.is_finite() && q != self.q {
            self.q = q;
            self.dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak_response(f: &mut BiquadFilter, freq: f64) -> f64 {
        let mut max_out = 0.0_f64;
        for i in 0..8820 {
            let t = i as f64 / 44100.0;
            let out = f.process((2.0 * PI * freq * t).sin());
            if i > 4410 {
                max_out = max_out.max(out.abs());
            }
        }
        max_out
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = BiquadFilter::with_params(FilterType::Lowpass, 44100.0, 5000.0, 0.75);
        let mut output = 0.0;
        for _ in 0..2000 {
            output = f.process(1.0);
        }
        assert!((output - 1.0).abs() < 0.001, "Lowpass should pass DC, got {output}");
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut f = BiquadFilter::with_params(FilterType::Highpass, 44100.0, 1000.0, 0.7);
        let mut output = 1.0;
        for _ in 0..2000 {
            output = f.process(1.0);
        }
        assert!(output.abs() < 0.001, "Highpass should block DC, got {output}");
    }

    #[test]
    fn lowpass_attenuates_high_freq() {
        let mut f = BiquadFilter::with_params(FilterType::Lowpass, 44100.0, 200.0, 0.0);
        let amp = peak_response(&mut f, 10_000.0);
        assert!(amp < 0.01, "Lowpass@200Hz should attenuate 10kHz, got {amp}");
    }

    #[test]
    fn narrow_bandpass_rings_at_center_only() {
        let mut on = BiquadFilter::with_params(FilterType::Bandpass, 44100.0, 2500.0, 11.0);
        let mut off = BiquadFilter::with_params(FilterType::Bandpass, 44100.0, 2500.0, 11.0);
        let center = peak_response(&mut on, 2500.0);
        let away = peak_response(&mut off, 600.0);
        assert!(center > 0.9, "center gain {center}");
        assert!(away < 0.1, "off-center gain {away}");
    }

    #[test]
    fn nan_cutoff_is_ignored() {
        let mut f = BiquadFilter::with_params(FilterType::Lowpass, 44100.0, 1200.0, 0.7);
        f.set_frequency(f64::NAN);
        assert_eq!(f.frequency(), 1200.0);
        for i in 0..1000 {
            let out = f.process(if i % 50 == 0 { 1.0 } else { 0.0 });
            assert!(out.is_finite());
        }
    }

    #[test]
    fn cutoff_above_nyquist_is_stable() {
        let mut f = BiquadFilter::with_params(FilterType::Lowpass, 44100.0, 40_000.0, 0.7);
        for i in 0..4000 {
            let out = f.process(if i % 7 == 0 { 1.0 } else { -1.0 });
            assert!(out.is_finite() && out.abs() < 10.0);
        }
    }
}
