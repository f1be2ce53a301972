//! Voice: self-disposing one-shot sounds played on a gear change.
//!
//! A voice is a handful of short parts (a pitch sweep, a filtered noise
//! burst, optionally a saturated pop). Each part stops itself at the end of
//! its envelope; the voice is finished once every part has stopped.

use crate::config::normalized_gear;
use crate::math::{clamp, lerp};

use super::envelope::Automation;
use super::filter::{BiquadFilter, FilterType};
use super::noise::{NoiseBuffer, NoisePlayer};
use super::oscillator::{Oscillator, Waveform};
use super::shaper::Saturator;

/// Starting (and ending) level of every one-shot envelope.
const FLOOR: f64 = 0.0001;

/// A speed jump above this on a down-shift adds a backfire pop.
pub const POP_THRESHOLD: f64 = 800.0;

#[derive(Debug, Clone)]
enum Source {
    Tone { osc: Oscillator, pitch: Automation },
    Noise(NoisePlayer),
}

impl Source {
    fn stop(&mut self) -> bool {
        match self {
            Source::Tone { osc, .. } => osc.stop(),
            Source::Noise(n) => n.stop(),
        }
    }

    fn is_running(&self) -> bool {
        match self {
            Source::Tone { osc, .. } => osc.is_running(),
            Source::Noise(n) => n.is_running(),
        }
    }
}

#[derive(Debug, Clone)]
struct Part {
    source: Source,
    filters: Vec<BiquadFilter>,
    shaper: Option<Saturator>,
    gain: Automation,
    stop_at: f64,
}

impl Part {
    /// Gain rises exponentially from the floor to `peak` at `attack`, then
    /// falls back to the floor at `duration`.
    fn new(source: Source, peak: f64, attack: f64, duration: f64) -> Self {
        let mut gain = Automation::new(FLOOR);
        gain.set_value_at(FLOOR, 0.0);
        gain.exponential_ramp_to(peak, attack);
        gain.exponential_ramp_to(FLOOR, duration);
        Part {
            source,
            filters: Vec::new(),
            shaper: None,
            gain,
            stop_at: duration,
        }
    }

    fn filter(mut self, f: BiquadFilter) -> Self {
        self.filters.push(f);
        self
    }

    fn shaped(mut self, s: Saturator) -> Self {
        self.shaper = Some(s);
        self
    }

    fn next_sample(&mut self, time: f64) -> f64 {
        if time >= self.stop_at {
            self.source.stop();
        }
        let raw = match &mut self.source {
            Source::Tone { osc, pitch } => {
                osc.frequency = pitch.value_at(time);
                osc.next_sample()
            }
            Source::Noise(n) => n.next_sample(),
        };
        if !self.source.is_running() && raw == 0.0 {
            return 0.0;
        }
        let mut x = raw;
        for f in &mut self.filters {
            x = f.process(x);
        }
        if let Some(s) = &self.shaper {
            x = s.process(x);
        }
        x * self.gain.value_at(time)
    }
}

fn sweep(wave: Waveform, sr: f64, from_hz: f64, to_hz: f64, duration: f64) -> Source {
    let mut pitch = Automation::new(from_hz);
    pitch.set_value_at(from_hz, 0.0);
    pitch.exponential_ramp_to(to_hz, duration);
    Source::Tone {
        osc: Oscillator::new(wave, sr),
        pitch,
    }
}

/// A one-shot transient voice. Runs on its own clock from 0.
#[derive(Debug, Clone)]
pub struct TransientVoice {
    parts: Vec<Part>,
    sample_rate: f64,
    elapsed: u64,
}

impl TransientVoice {
    /// Ignition-cut chirp: a descending triangle sweep with a burst of
    /// high-passed noise. Louder with throttle, quieter in high gears.
    pub fn upshift_chirp(gear: u8, throttle: f64, sample_rate: f64, noise: NoiseBuffer) -> Self {
        let sr = sample_rate;
        let g = normalized_gear(gear);
        let t = clamp(throttle, 0.0, 1.0);

        let dur = lerp(0.075, 0.055, g);
        let amp = (0.18 + 0.12 * t) * (0.9 - 0.15 * g);
        let start_hz = 1900.0 + 500.0 * (1.0 - g);
        let end_hz = 900.0 + 300.0 * g;
        let tone = Part::new(sweep(Waveform::Triangle, sr, start_hz, end_hz, dur), amp, 0.010, dur);

        let n_amp = (0.16 + 0.16 * t) * (0.9 - 0.2 * g);
        let hiss = Part::new(Source::Noise(NoisePlayer::one_shot(noise)), n_amp, 0.007, dur)
            .filter(BiquadFilter::with_params(FilterType::Highpass, sr, 2600.0, 0.7))
            .filter(BiquadFilter::with_params(FilterType::Bandpass, sr, 4200.0, 1.0));

        TransientVoice {
            parts: vec![tone, hiss],
            sample_rate: sr,
            elapsed: 0,
        }
    }

    /// Throttle-blip: a falling sawtooth sweep with band-passed noise, both
    /// boosted by the size of the speed jump. Jumps above
    /// [`POP_THRESHOLD`] add a short saturated pop.
    pub fn downshift_blip(
        gear: u8,
        throttle: f64,
        speed_delta: f64,
        sample_rate: f64,
        noise: NoiseBuffer,
    ) -> Self {
        let sr = sample_rate;
        let g = normalized_gear(gear);
        let t = clamp(throttle, 0.0, 1.0);

        let dur = lerp(0.14, 0.11, g);
        let boost = clamp(speed_delta / 2500.0, 0.0, 0.35);
        let amp = (0.20 + 0.10 * t) * (1.0 + boost);
        let start_hz = 720.0 - 180.0 * g;
        let end_hz = 220.0 + 60.0 * g;
        let tone = Part::new(sweep(Waveform::Sawtooth, sr, start_hz, end_hz, dur), amp, 0.018, dur);

        let n_amp = (0.22 + 0.12 * t) * (1.0 + boost);
        let burst_src = Source::Noise(NoisePlayer::one_shot(noise.clone()));
        let burst = Part::new(burst_src, n_amp, 0.016, dur)
            .filter(BiquadFilter::with_params(
                FilterType::Bandpass,
                sr,
                1200.0 + 500.0 * (1.0 - g),
                0.75,
            ));

        let mut parts = vec![tone, burst];
        if speed_delta > POP_THRESHOLD {
            let pop = Part::new(Source::Noise(NoisePlayer::one_shot(noise)), 0.18, 0.006, 0.035)
                .filter(BiquadFilter::with_params(FilterType::Lowpass, sr, 700.0, 0.9))
                .shaped(Saturator::tanh(3.6));
            parts.push(pop);
        }

        TransientVoice {
            parts,
            sample_rate: sr,
            elapsed: 0,
        }
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Longest part, in seconds.
    pub fn duration(&self) -> f64 {
        self.parts.iter().map(|p| p.stop_at).fold(0.0, f64::max)
    }

    pub fn next_sample(&mut self) -> f64 {
        let time = self.elapsed as f64 / self.sample_rate;
        self.elapsed += 1;
        self.parts.iter_mut().map(|p| p.next_sample(time)).sum()
    }

    pub fn is_finished(&self) -> bool {
        self.parts.iter().all(|p| !p.source.is_running())
    }

    /// Stop every part now. Returns how many were still running.
    pub fn release(&mut self) -> usize {
        self.parts.iter_mut().map(|p| p.source.stop()).filter(|stopped| *stopped).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn run(voice: &mut TransientVoice, secs: f64) -> (f64, usize) {
        let mut peak = 0.0_f64;
        let mut samples = 0;
        while !voice.is_finished() && samples < (secs * SR) as usize {
            peak = peak.max(voice.next_sample().abs());
            samples += 1;
        }
        (peak, samples)
    }

    #[test]
    fn chirp_is_short_and_audible() {
        let mut v = TransientVoice::upshift_chirp(1, 1.0, SR, NoiseBuffer::new(SR));
        assert!((v.duration() - 0.075).abs() < 1e-12);
        let (peak, samples) = run(&mut v, 1.0);
        assert!(peak > 0.05, "chirp too quiet: {peak}");
        assert!(v.is_finished(), "chirp should dispose itself");
        assert!(samples <= (0.075 * SR) as usize + 4, "ran {samples} samples");
    }

    #[test]
    fn chirp_is_shorter_in_high_gears() {
        let low = TransientVoice::upshift_chirp(2, 0.5, SR, NoiseBuffer::new(SR));
        let high = TransientVoice::upshift_chirp(8, 0.5, SR, NoiseBuffer::new(SR));
        assert!(high.duration() < low.duration());
        assert!((high.duration() - 0.055).abs() < 1e-12);
    }

    #[test]
    fn pop_only_on_large_jumps() {
        let small = TransientVoice::downshift_blip(4, 0.2, 600.0, SR, NoiseBuffer::new(SR));
        let big = TransientVoice::downshift_blip(4, 0.2, 1200.0, SR, NoiseBuffer::new(SR));
        assert_eq!(small.part_count(), 2);
        assert_eq!(big.part_count(), 3);
    }

    #[test]
    fn bigger_jump_is_louder() {
        let mut quiet = TransientVoice::downshift_blip(3, 0.0, 0.0, SR, NoiseBuffer::new(SR));
        let mut loud = TransientVoice::downshift_blip(3, 0.0, 700.0, SR, NoiseBuffer::new(SR));
        let (q, _) = run(&mut quiet, 1.0);
        let (l, _) = run(&mut loud, 1.0);
        assert!(l > q, "boosted blip {l} should exceed {q}");
    }

    #[test]
    fn blip_disposes_after_duration() {
        let mut v = TransientVoice::downshift_blip(1, 0.5, 2000.0, SR, NoiseBuffer::new(SR));
        let (_, samples) = run(&mut v, 1.0);
        assert!(v.is_finished());
        assert!(samples <= (0.14 * SR) as usize + 4);
        assert_eq!(v.next_sample(), 0.0);
    }

    #[test]
    fn release_is_idempotent() {
        let mut v = TransientVoice::downshift_blip(2, 0.5, 1500.0, SR, NoiseBuffer::new(SR));
        assert_eq!(v.release(), 3);
        assert_eq!(v.release(), 0);
        assert!(v.is_finished());
    }
}
