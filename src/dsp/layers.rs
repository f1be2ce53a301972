//! Continuous engine layers.
//!
//! [`compute_targets`] turns (engine speed, throttle, pitch multiplier) into
//! every layer parameter as a pure function of the profile. [`EngineGraph`]
//! owns the generators and filters for one profile and glides toward those
//! targets with per-parameter time constants.
//!
//! Signal flow:
//!
//! ```text
//! order A/B ─┐
//! sub ───────┼─ drive ─ tanh ─ core LP ─┬──────────────────────┐
//! harm A/B ──┘                          └─ body BP ─ body gain ┤
//! noise ─ HP ─ BP ─ drive ─ tanh ─ LP ─ rasp gain ─────────────┤
//!       └ mech HP ─ BP×n ─ gain×n ─────────────────────────────┤
//! whine (+ LFO detune) ─ BP ─ whine gain ──────────────────────┴─ out
//! ```

use crate::config::normalized_speed;
use crate::math::{clamp, finite_or, lerp, lerp_exp, smoothstep};

use super::filter::{BiquadFilter, FilterType};
use super::noise::{NoiseBuffer, NoisePlayer};
use super::oscillator::{Oscillator, Waveform};
use super::profile::EngineProfile;
use super::shaper::Saturator;
use super::smoother::SmoothedParam;

/// Largest mechanical band count any profile uses.
pub const MAX_MECH_BANDS: usize = 4;

/// Filter cutoffs are pushed into coefficient updates at this interval.
const CONTROL_INTERVAL: usize = 16;

const WHINE_LFO_HZ: f64 = 6.2;

/// Number of continuously running generators in a graph.
pub const SOURCE_COUNT: usize = 8;

/// Every continuous-layer parameter for one (speed, throttle) point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerTargets {
    pub base_hz: f64,
    pub sub_hz: f64,
    pub whine_hz: f64,

    pub core_cut_hz: f64,
    pub body_hz: f64,
    pub rasp_hp_hz: f64,
    pub rasp_bp_hz: f64,
    pub rasp_lp_hz: f64,
    pub mech_hz: [f64; MAX_MECH_BANDS],
    pub mech_bands: usize,

    pub core_drive: f64,
    pub rasp_drive: f64,

    pub order_gain: f64,
    pub sub_gain: f64,
    pub harm_gain: f64,
    pub rasp_gain: f64,
    pub whine_gain: f64,
    /// Per band; the total is split evenly.
    pub mech_gain: f64,
    pub body_gain: f64,
}

fn range(r: (f64, f64), t: f64) -> f64 {
    lerp(r.0, r.1, t)
}

fn range_exp(r: (f64, f64), t: f64) -> f64 {
    lerp_exp(r.0, r.1, t)
}

/// Layer parameters at engine `speed` and `throttle`.
///
/// `pitch_mul` is the transient shift multiplier (1 when settled); `nyquist`
/// bounds every upper-register frequency at 92% of it.
pub fn compute_targets(
    profile: &EngineProfile,
    speed: f64,
    throttle: f64,
    pitch_mul: f64,
    nyquist: f64,
) -> LayerTargets {
    let r = normalized_speed(finite_or(speed, 0.0));
    let t = clamp(finite_or(throttle, 0.0), 0.0, 1.0);
    let ceiling = nyquist * 0.92;

    let firing = profile.firing_hz(speed);
    let base_hz = clamp(finite_or(firing * pitch_mul, 0.0), 25.0, 2000.0);
    let sub_hz = clamp(base_hz * 0.5, 20.0, 800.0);
    let whine_hz = clamp(
        base_hz * profile.whine_mul + profile.whine_add_hz,
        profile.whine_min_hz,
        profile.whine_max_hz.min(ceiling),
    );

    let core_cut_hz = clamp(range_exp(profile.core_lp_hz, r) * (0.8 + 0.35 * t), 200.0, ceiling);
    let body_hz = clamp(range_exp(profile.body_res_hz, r), 80.0, 900.0);
    let rasp_hp_hz = clamp(range_exp(profile.rasp_hp_hz, r), 60.0, 1200.0);
    let rasp_bp_hz = clamp(range_exp(profile.rasp_bp_hz, r), 200.0, 4500.0);
    let rasp_lp_hz = clamp(range_exp(profile.rasp_lp_hz, r), 1500.0, ceiling);

    let mech_shift = 0.92 + 0.22 * r;
    let mech_bands = profile.mech_res_hz.len().min(MAX_MECH_BANDS);
    let mut mech_hz = [0.0; MAX_MECH_BANDS];
    for (slot, hz) in mech_hz.iter_mut().zip(profile.mech_res_hz) {
        *slot = clamp(hz * mech_shift, 600.0, ceiling);
    }

    let core_drive = range(profile.core_drive, r) * (0.55 + 0.85 * t);
    let rasp_drive = range(profile.rasp_drive, r) * (0.25 + 1.05 * t);

    let order_gain = range(profile.order_gain, r) * (0.88 - 0.25 * t);
    let sub_fade_high = 1.0 - smoothstep(0.55, 1.0, r) * 0.85;
    let sub_gain = range(profile.sub_gain, r) * (1.0 - 0.55 * t) * sub_fade_high;
    let harm_gain =
        range(profile.harm_gain, r) * smoothstep(0.12, 0.55, r) * (0.15 + 0.85 * t.powf(1.05));
    let rasp_gain = range(profile.rasp_gain, r) * smoothstep(0.20, 0.70, r) * t.powf(1.45);
    let whine_gain = range(profile.whine_gain, r) * r.powf(1.6) * (0.10 + 0.90 * t);
    let mech_total =
        range(profile.mech_gain, r) * (0.25 + 0.75 * smoothstep(0.08, 0.9, r)) * (0.35 + 0.65 * t);
    let mech_gain = mech_total / mech_bands.max(1) as f64;
    let body_gain = (0.06 + 0.10 * t) * smoothstep(0.10, 0.65, r);

    LayerTargets {
        base_hz,
        sub_hz,
        whine_hz,
        core_cut_hz,
        body_hz,
        rasp_hp_hz,
        rasp_bp_hz,
        rasp_lp_hz,
        mech_hz,
        mech_bands,
        core_drive,
        rasp_drive,
        order_gain,
        sub_gain,
        harm_gain,
        rasp_gain,
        whine_gain,
        mech_gain,
        body_gain,
    }
}

/// A filter whose cutoff glides at control rate.
#[derive(Debug, Clone)]
struct GlidingFilter {
    filter: BiquadFilter,
    cutoff: SmoothedParam,
}

impl GlidingFilter {
    fn new(kind: FilterType, sr: f64, hz: f64, q: f64, tau: f64) -> Self {
        GlidingFilter {
            filter: BiquadFilter::with_params(kind, sr, hz, q),
            cutoff: SmoothedParam::new(hz, tau, sr),
        }
    }

    fn control(&mut self, samples: usize) {
        let hz = self.cutoff.advance(samples);
        self.filter.set_frequency(hz);
    }

    #[inline]
    fn process(&mut self, x: f64) -> f64 {
        self.filter.process(x)
    }
}

#[derive(Debug, Clone)]
struct MechBand {
    bp: GlidingFilter,
    gain: SmoothedParam,
}

/// The continuous voice of one engine profile.
///
/// Frequencies start at their first targets; gains start at zero and fade in.
#[derive(Debug, Clone)]
pub struct EngineGraph {
    profile: &'static EngineProfile,

    order_a: Oscillator,
    order_b: Oscillator,
    sub: Oscillator,
    harm_a: Oscillator,
    harm_b: Oscillator,
    whine: Oscillator,
    whine_lfo: Oscillator,
    noise: NoisePlayer,

    order_hz: SmoothedParam,
    sub_hz: SmoothedParam,
    harm_hz: SmoothedParam,
    whine_hz: SmoothedParam,

    core_drive: SmoothedParam,
    core_shaper: Saturator,
    core_lp: GlidingFilter,
    body_res: GlidingFilter,

    rasp_hp: GlidingFilter,
    rasp_bp: GlidingFilter,
    rasp_drive: SmoothedParam,
    rasp_shaper: Saturator,
    rasp_lp: GlidingFilter,

    whine_bp: GlidingFilter,
    mech_hp: BiquadFilter,
    mech: Vec<MechBand>,

    order_gain: SmoothedParam,
    sub_gain: SmoothedParam,
    harm_gain: SmoothedParam,
    rasp_gain: SmoothedParam,
    whine_gain: SmoothedParam,
    body_gain: SmoothedParam,

    control_countdown: usize,
}

impl EngineGraph {
    pub fn build(
        profile: &'static EngineProfile,
        sample_rate: f64,
        noise: NoiseBuffer,
        initial: &LayerTargets,
    ) -> Self {
        let sr = sample_rate;
        let osc = |wave: Waveform, hz: f64| {
            let mut o = Oscillator::new(wave, sr);
            o.frequency = hz;
            o
        };
        let gain = |tau: f64| SmoothedParam::new(0.0, tau, sr);

        let mech = profile
            .mech_res_hz
            .iter()
            .take(MAX_MECH_BANDS)
            .zip(initial.mech_hz)
            .map(|(_, hz)| MechBand {
                bp: GlidingFilter::new(FilterType::Bandpass, sr, hz, profile.mech_q, 0.22),
                gain: gain(0.10),
            })
            .collect();

        let mut graph = EngineGraph {
            profile,
            order_a: osc(profile.order_wave, initial.base_hz),
            order_b: osc(profile.order_wave, initial.base_hz)
                .with_detune(profile.order_detune_cents),
            sub: osc(Waveform::Sine, initial.sub_hz),
            harm_a: osc(profile.harm_wave, initial.base_hz),
            harm_b: osc(profile.harm_wave, initial.base_hz).with_detune(-profile.harm_detune_cents),
            whine: osc(profile.whine_wave, initial.whine_hz),
            whine_lfo: osc(Waveform::Sine, WHINE_LFO_HZ),
            noise: NoisePlayer::looping(noise),

            order_hz: SmoothedParam::new(initial.base_hz, 0.04, sr),
            sub_hz: SmoothedParam::new(initial.sub_hz, 0.06, sr),
            harm_hz: SmoothedParam::new(initial.base_hz, 0.05, sr),
            whine_hz: SmoothedParam::new(initial.whine_hz, 0.06, sr),

            core_drive: SmoothedParam::new(initial.core_drive, 0.10, sr),
            core_shaper: Saturator::tanh(profile.core_distortion),
            core_lp: GlidingFilter::new(
                FilterType::Lowpass,
                sr,
                initial.core_cut_hz,
                profile.core_lp_q,
                0.10,
            ),
            body_res: GlidingFilter::new(
                FilterType::Bandpass,
                sr,
                initial.body_hz,
                profile.body_res_q,
                0.18,
            ),

            rasp_hp: GlidingFilter::new(FilterType::Highpass, sr, initial.rasp_hp_hz, 0.7, 0.12),
            rasp_bp: GlidingFilter::new(
                FilterType::Bandpass,
                sr,
                initial.rasp_bp_hz,
                profile.rasp_q,
                0.12,
            ),
            rasp_drive: SmoothedParam::new(initial.rasp_drive, 0.10, sr),
            rasp_shaper: Saturator::tanh(profile.rasp_distortion),
            rasp_lp: GlidingFilter::new(FilterType::Lowpass, sr, initial.rasp_lp_hz, 0.75, 0.14),

            whine_bp: GlidingFilter::new(
                FilterType::Bandpass,
                sr,
                initial.whine_hz,
                profile.whine_q,
                0.08,
            ),
            mech_hp: BiquadFilter::with_params(
                FilterType::Highpass,
                sr,
                super::filter::DEFAULT_FREQUENCY,
                0.7,
            ),
            mech,

            order_gain: gain(0.07),
            sub_gain: gain(0.08),
            harm_gain: gain(0.08),
            rasp_gain: gain(0.08),
            whine_gain: gain(0.08),
            body_gain: gain(0.15),

            control_countdown: 0,
        };
        graph.apply(initial);
        graph
    }

    pub fn profile(&self) -> &'static EngineProfile {
        self.profile
    }

    /// Retarget every parameter. Applying the same targets again is a no-op.
    pub fn apply(&mut self, t: &LayerTargets) {
        self.order_hz.set_target(t.base_hz);
        self.sub_hz.set_target(t.sub_hz);
        self.harm_hz.set_target(t.base_hz);
        self.whine_hz.set_target(t.whine_hz);
        self.whine_bp.cutoff.set_target(t.whine_hz);

        self.core_lp.cutoff.set_target(t.core_cut_hz);
        self.body_res.cutoff.set_target(t.body_hz);
        self.rasp_hp.cutoff.set_target(t.rasp_hp_hz);
        self.rasp_bp.cutoff.set_target(t.rasp_bp_hz);
        self.rasp_lp.cutoff.set_target(t.rasp_lp_hz);

        self.core_drive.set_target(t.core_drive);
        self.rasp_drive.set_target(t.rasp_drive);

        self.order_gain.set_target(t.order_gain);
        self.sub_gain.set_target(t.sub_gain);
        self.harm_gain.set_target(t.harm_gain);
        self.rasp_gain.set_target(t.rasp_gain);
        self.whine_gain.set_target(t.whine_gain);
        self.body_gain.set_target(t.body_gain);

        for (band, hz) in self.mech.iter_mut().zip(t.mech_hz) {
            band.bp.cutoff.set_target(hz);
            band.gain.set_target(t.mech_gain);
        }
    }

    fn control(&mut self) {
        let n = CONTROL_INTERVAL;
        for f in [
            &mut self.core_lp,
            &mut self.body_res,
            &mut self.rasp_hp,
            &mut self.rasp_bp,
            &mut self.rasp_lp,
            &mut self.whine_bp,
        ] {
            f.control(n);
        }
        for band in &mut self.mech {
            band.bp.control(n);
        }
    }

    pub fn next_sample(&mut self) -> f64 {
        if self.control_countdown == 0 {
            self.control();
            self.control_countdown = CONTROL_INTERVAL;
        }
        self.control_countdown -= 1;

        // Core tonal bus
        let order_hz = self.order_hz.next();
        self.order_a.frequency = order_hz;
        self.order_b.frequency = order_hz;
        let harm_hz = self.harm_hz.next();
        self.harm_a.frequency = harm_hz;
        self.harm_b.frequency = harm_hz;
        self.sub.frequency = self.sub_hz.next();

        let order =
            (self.order_a.next_sample() + self.order_b.next_sample()) * self.order_gain.next();
        let sub = self.sub.next_sample() * self.sub_gain.next();
        let harm = (self.harm_a.next_sample() + self.harm_b.next_sample()) * self.harm_gain.next();

        let driven = self.core_shaper.process((order + sub + harm) * self.core_drive.next());
        let core = self.core_lp.process(driven);
        let body = self.body_res.process(core) * self.body_gain.next();

        // Shared noise
        let noise = self.noise.next_sample();
        let rasp_in = self.rasp_bp.process(self.rasp_hp.process(noise));
        let rasp_sat = self.rasp_shaper.process(rasp_in * self.rasp_drive.next());
        let rasp = self.rasp_lp.process(rasp_sat) * self.rasp_gain.next();

        let mech_in = self.mech_hp.process(noise);
        let mut mech = 0.0;
        for band in &mut self.mech {
            mech += band.bp.process(mech_in) * band.gain.next();
        }

        // Whine with vibrato
        self.whine.detune = self.whine_lfo.next_sample() * self.profile.whine_vibrato_cents;
        self.whine.frequency = self.whine_hz.next();
        let whine = self.whine_bp.process(self.whine.next_sample()) * self.whine_gain.next();

        core + body + rasp + mech + whine
    }

    fn sources_mut(&mut self) -> [&mut dyn Source; SOURCE_COUNT] {
        [
            &mut self.order_a,
            &mut self.order_b,
            &mut self.sub,
            &mut self.harm_a,
            &mut self.harm_b,
            &mut self.noise,
            &mut self.whine,
            &mut self.whine_lfo,
        ]
    }

    /// Stop every generator. Returns how many were actually running, so a
    /// second call returns 0.
    pub fn release(&mut self) -> usize {
        self.sources_mut().into_iter().map(|s| s.stop()).filter(|stopped| *stopped).count()
    }

    /// Generators still running.
    pub fn active_generators(&self) -> usize {
        [
            self.order_a.is_running(),
            self.order_b.is_running(),
            self.sub.is_running(),
            self.harm_a.is_running(),
            self.harm_b.is_running(),
            self.noise.is_running(),
            self.whine.is_running(),
            self.whine_lfo.is_running(),
        ]
        .into_iter()
        .filter(|running| *running)
        .count()
    }
}

/// Anything with an idempotent stop.
trait Source {
    fn stop(&mut self) -> bool;
}

impl Source for Oscillator {
    fn stop(&mut self) -> bool {
        Oscillator::stop(self)
    }
}

impl Source for NoisePlayer {
    fn stop(&mut self) -> bool {
        NoisePlayer::stop(self)
    }
}
