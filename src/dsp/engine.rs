//! Synthesis engine: turns simulator messages into audio.
//!
//! A [`SynthesisContext`] owns the continuous layer graph, the one-shot
//! voices and the master bus. Messages are posted into a coalescing inbox
//! from any producer and applied at the start of the next render block, so
//! bursts of state snapshots collapse to the newest one.

use crate::config::{EngineType, MIN_ENGINE_SPEED, Settings, normalized_gear};
use crate::error::KeyRevError;
use crate::math::{clamp, lerp};
use crate::message::{EngineMessage, ShiftDirection, ShiftEvent};
use crate::transport::Inbox;

use super::deferred::Deferred;
use super::layers::{EngineGraph, LayerTargets, compute_targets};
use super::mixer::MasterBus;
use super::noise::NoiseBuffer;
use super::voice::TransientVoice;

/// Shortest time a transient pitch multiplier is held.
const MIN_PITCH_HOLD_SECS: f64 = 0.030;

/// Output device state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    Suspended,
    Running,
}

/// Lifetime counters, mostly for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub graphs_built: usize,
    pub generators_released: usize,
    pub voices_started: usize,
}

/// The synthesis side of the system.
#[derive(Debug)]
pub struct SynthesisContext {
    sample_rate: f64,
    state: AudioState,
    inbox: Inbox,
    settings: Settings,

    graph: Option<(EngineType, EngineGraph)>,
    voices: Vec<TransientVoice>,
    bus: MasterBus,
    noise: NoiseBuffer,

    last_speed: f64,
    last_throttle: f64,
    pitch_mul: f64,
    pitch_revert: Deferred<()>,

    /// Samples rendered while running.
    clock: u64,
    sync_requested: bool,
    stats: EngineStats,
}

impl SynthesisContext {
    /// A suspended context with default settings. A sync request is raised
    /// immediately so the host can ask the simulator for current state.
    pub fn new(sample_rate: f64) -> Self {
        let settings = Settings::default();
        SynthesisContext {
            sample_rate,
            state: AudioState::Suspended,
            inbox: Inbox::new(),
            settings,
            graph: None,
            voices: Vec::new(),
            bus: MasterBus::new(sample_rate, settings.clamped_volume()),
            noise: NoiseBuffer::new(sample_rate),
            last_speed: MIN_ENGINE_SPEED,
            last_throttle: 0.0,
            pitch_mul: 1.0,
            pitch_revert: Deferred::new(),
            clock: 0,
            sync_requested: true,
            stats: EngineStats::default(),
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn audio_state(&self) -> AudioState {
        self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Seconds of audio rendered while running.
    pub fn time(&self) -> f64 {
        self.clock as f64 / self.sample_rate
    }

    /// The device is allowed to play. Raises a sync request on transition.
    pub fn resume(&mut self) {
        if self.state == AudioState::Suspended {
            log::info!("synthesis: audio running");
            self.state = AudioState::Running;
            self.sync_requested = true;
        }
    }

    pub fn suspend(&mut self) {
        if self.state == AudioState::Running {
            log::info!("synthesis: audio suspended");
            self.state = AudioState::Suspended;
        }
    }

    /// Returns `true` once per raised sync request.
    pub fn take_sync_request(&mut self) -> bool {
        std::mem::take(&mut self.sync_requested)
    }

    /// Queue a message for the next render block.
    pub fn post(&mut self, msg: EngineMessage) {
        self.inbox.push(msg);
    }

    pub fn post_json(&mut self, json: &str) -> Result<(), KeyRevError> {
        let msg = EngineMessage::from_json(json).inspect_err(|e| {
            log::warn!("synthesis: dropping undecodable message: {e}");
        })?;
        self.post(msg);
        Ok(())
    }

    /// Messages waiting for the next render block.
    pub fn pending(&self) -> usize {
        self.inbox.len()
    }

    /// Apply one message immediately.
    pub fn handle(&mut self, msg: EngineMessage) {
        match msg {
            EngineMessage::State(s) => {
                if !self.settings.enabled {
                    self.stop();
                    return;
                }
                self.ensure_graph(self.settings.engine_type);
                self.update_sound(s.engine_speed as f64, s.throttle);
            }
            EngineMessage::Shift(e) => self.apply_shift(&e),
            EngineMessage::Settings(next) => {
                log::info!(
                    "synthesis: settings enabled={} volume={:.2} engine={}",
                    next.enabled,
                    next.volume,
                    next.engine_type.name()
                );
                self.settings = next;
                self.bus.set_volume(next.clamped_volume());
                if next.enabled {
                    self.ensure_graph(next.engine_type);
                } else {
                    self.stop();
                }
            }
            EngineMessage::Stop => self.stop(),
        }
    }

    /// Silence and release every continuous layer. Pending one-shots may
    /// finish. Safe to call repeatedly.
    pub fn stop(&mut self) {
        let released = self.teardown();
        if released > 0 {
            self.bus.reset();
            log::info!("synthesis: stopped, released {released} generators");
        }
    }

    fn teardown(&mut self) -> usize {
        self.pitch_mul = 1.0;
        self.pitch_revert.cancel();
        match self.graph.take() {
            Some((_, mut graph)) => {
                let released = graph.release();
                self.stats.generators_released += released;
                released
            }
            None => 0,
        }
    }

    /// Build the graph for `engine_type` unless it is already playing.
    fn ensure_graph(&mut self, engine_type: EngineType) {
        if matches!(&self.graph, Some((current, _)) if *current == engine_type) {
            return;
        }
        self.teardown();
        let profile = engine_type.profile();
        let targets = self.targets_for(engine_type);
        let graph = EngineGraph::build(profile, self.sample_rate, self.noise.clone(), &targets);
        self.graph = Some((engine_type, graph));
        self.stats.graphs_built += 1;
        log::info!("synthesis: built {} graph", engine_type.name());
    }

    fn targets_for(&self, engine_type: EngineType) -> LayerTargets {
        compute_targets(
            engine_type.profile(),
            self.last_speed,
            self.last_throttle,
            self.pitch_mul,
            self.sample_rate * 0.5,
        )
    }

    fn update_sound(&mut self, speed: f64, throttle: f64) {
        self.last_speed = speed;
        self.last_throttle = throttle;
        self.retarget();
    }

    fn retarget(&mut self) {
        let Some(ty) = self.engine_type() else {
            return;
        };
        let targets = self.targets_for(ty);
        if let Some((_, graph)) = &mut self.graph {
            graph.apply(&targets);
        }
    }

    /// Current continuous-layer targets, if a graph is playing.
    pub fn layer_targets(&self) -> Option<LayerTargets> {
        self.graph.as_ref().map(|(ty, _)| self.targets_for(*ty))
    }

    pub fn engine_type(&self) -> Option<EngineType> {
        self.graph.as_ref().map(|(ty, _)| *ty)
    }

    pub fn active_generators(&self) -> usize {
        self.graph.as_ref().map_or(0, |(_, g)| g.active_generators())
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn pitch_multiplier(&self) -> f64 {
        self.pitch_mul
    }

    fn apply_shift(&mut self, e: &ShiftEvent) {
        if self.state != AudioState::Running || !self.settings.enabled {
            log::trace!("synthesis: shift ignored while silent");
            return;
        }
        let g = normalized_gear(e.gear);
        let t = clamp(e.throttle, 0.0, 1.0);
        let now = self.time();

        let gain = &mut self.bus.shift_gain;
        gain.cancel_and_hold(now);

        let (pitch, hold, voice) = match e.direction {
            ShiftDirection::Up => {
                // Ignition cut: short and sharp, deeper in low gears.
                let dip = lerp(0.10, 0.22, g);
                let t_cut = lerp(0.085, 0.06, g);
                let t_recover = t_cut + lerp(0.11, 0.075, g);
                gain.linear_ramp_to(dip, now + t_cut * 0.35);
                gain.linear_ramp_to(1.0, now + t_recover);
                let voice =
                    TransientVoice::upshift_chirp(e.gear, t, self.sample_rate, self.noise.clone());
                (0.92, t_recover, voice)
            }
            ShiftDirection::Down => {
                let dip = lerp(0.82, 0.90, g);
                let bump = lerp(1.06, 1.02, g);
                let t_dip = 0.028;
                let t_bump = lerp(0.16, 0.12, g);
                gain.linear_ramp_to(dip, now + t_dip);
                gain.linear_ramp_to(bump, now + t_dip + 0.045);
                gain.linear_ramp_to(1.0, now + t_dip + t_bump);
                let voice = TransientVoice::downshift_blip(
                    e.gear,
                    t,
                    e.speed_delta(),
                    self.sample_rate,
                    self.noise.clone(),
                );
                (1.06, t_dip + t_bump, voice)
            }
        };

        log::debug!("synthesis: shift {:?} to gear {}", e.direction, e.gear);
        self.set_pitch_transient(pitch, hold);
        self.voices.push(voice);
        self.stats.voices_started += 1;
    }

    /// Hold `mult` on the tonal layers, reverting after `hold` seconds. A new
    /// transient replaces any pending revert.
    fn set_pitch_transient(&mut self, mult: f64, hold: f64) {
        self.pitch_mul = mult;
        self.retarget();
        let hold_ms = (hold * 1000.0).round().max(MIN_PITCH_HOLD_SECS * 1000.0);
        let due = self.clock + (hold_ms / 1000.0 * self.sample_rate).round() as u64;
        self.pitch_revert.schedule(due, ());
    }

    /// Apply queued messages, then fill `out` with mono samples. A suspended
    /// context outputs silence and does not advance its clock.
    pub fn render(&mut self, out: &mut [f32]) {
        let mut inbox = std::mem::take(&mut self.inbox);
        for msg in inbox.drain() {
            self.handle(msg);
        }
        self.inbox = inbox;

        if self.state == AudioState::Suspended {
            out.fill(0.0);
            return;
        }

        for sample in out.iter_mut() {
            if self.pitch_revert.poll(self.clock).is_some() {
                self.pitch_mul = 1.0;
                self.retarget();
            }

            let continuous = self.graph.as_mut().map_or(0.0, |(_, g)| g.next_sample());
            let one_shots: f64 = self.voices.iter_mut().map(|v| v.next_sample()).sum();
            let time = self.time();
            *sample = self.bus.process(continuous, one_shots, time) as f32;
            self.clock += 1;
        }

        self.voices.retain(|v| !v.is_finished());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::StateSnapshot;

    const SR: f64 = 22050.0;
    const BLOCK: usize = 128;

    fn running() -> SynthesisContext {
        let mut ctx = SynthesisContext::new(SR);
        ctx.resume();
        ctx.take_sync_request();
        ctx
    }

    fn state(speed: u32, throttle: f64) -> EngineMessage {
        EngineMessage::State(StateSnapshot {
            engine_speed: speed,
            gear: 3,
            throttle,
        })
    }

    fn shift(direction: ShiftDirection, gear: u8, before: u32, after: u32) -> EngineMessage {
        let from_gear = match direction {
            ShiftDirection::Up => gear - 1,
            ShiftDirection::Down => gear + 1,
        };
        EngineMessage::Shift(ShiftEvent {
            direction,
            gear,
            from_gear,
            speed_before: before,
            speed_after: after,
            throttle: 0.5,
        })
    }

    fn render_secs(ctx: &mut SynthesisContext, secs: f64) -> Vec<f32> {
        let mut all = Vec::new();
        let mut block = [0.0f32; BLOCK];
        for _ in 0..(secs * SR / BLOCK as f64).ceil() as usize {
            ctx.render(&mut block);
            all.extend_from_slice(&block);
        }
        all
    }

    #[test]
    fn sync_requested_on_creation_and_resume() {
        let mut ctx = SynthesisContext::new(SR);
        assert!(ctx.take_sync_request());
        assert!(!ctx.take_sync_request());
        ctx.resume();
        assert!(ctx.take_sync_request());
        ctx.resume();
        assert!(!ctx.take_sync_request(), "already running, no new request");
        ctx.suspend();
        ctx.resume();
        assert!(ctx.take_sync_request());
    }

    #[test]
    fn suspended_context_is_silent_but_applies_messages() {
        let mut ctx = SynthesisContext::new(SR);
        ctx.post(state(6000, 0.8));
        let out = render_secs(&mut ctx, 0.1);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(ctx.time(), 0.0);
        assert_eq!(ctx.pending(), 0);
        assert_eq!(ctx.active_generators(), 8);
    }

    #[test]
    fn state_builds_graph_and_sounds() {
        let mut ctx = running();
        ctx.post(state(6000, 0.8));
        let out = render_secs(&mut ctx, 0.5);
        let peak = out.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.01, "engine should be audible, peak {peak}");
        assert!(peak <= 1.0);
        assert_eq!(ctx.stats().graphs_built, 1);
        assert_eq!(ctx.engine_type(), Some(EngineType::V10));
    }

    #[test]
    fn duplicate_state_is_inaudible() {
        let mut once = running();
        let mut twice = running();
        once.post(state(5000, 0.4));
        twice.post(state(5000, 0.4));
        let a1 = render_secs(&mut once, 0.2);
        let b1 = render_secs(&mut twice, 0.2);
        assert_eq!(a1, b1);

        twice.post(state(5000, 0.4));
        let a2 = render_secs(&mut once, 0.2);
        let b2 = render_secs(&mut twice, 0.2);
        assert_eq!(a2, b2, "re-sending the same snapshot must not change output");
    }

    #[test]
    fn bursts_coalesce_to_newest_state() {
        let mut ctx = running();
        ctx.post(state(2000, 0.1));
        ctx.post(state(4000, 0.2));
        ctx.post(state(9000, 0.9));
        assert_eq!(ctx.pending(), 1);
        render_secs(&mut ctx, 0.01);
        let t = ctx.layer_targets().unwrap();
        // 9000 rev/min on a V10 fires at 750 Hz
        assert_eq!(t.base_hz, 750.0);
    }

    #[test]
    fn profile_switch_releases_old_generators_once() {
        let mut ctx = running();
        ctx.post(state(7000, 0.6));
        render_secs(&mut ctx, 0.1);
        assert_eq!(ctx.active_generators(), 8);

        let v8 = Settings {
            engine_type: EngineType::V8,
            ..Settings::default()
        };
        ctx.post(EngineMessage::Settings(v8));
        render_secs(&mut ctx, 0.05);
        let stats = ctx.stats();
        assert_eq!(stats.graphs_built, 2);
        assert_eq!(stats.generators_released, 8);
        assert_eq!(ctx.active_generators(), 8, "only the new graph's generators run");
        assert_eq!(ctx.engine_type(), Some(EngineType::V8));

        // New profile reflects the current speed immediately: V8 at 7000 → 466.7 Hz
        let t = ctx.layer_targets().unwrap();
        assert!((t.base_hz - 7000.0 / 60.0 * 4.0).abs() < 1e-9);

        // Same settings again: no rebuild, nothing released.
        ctx.post(EngineMessage::Settings(v8));
        render_secs(&mut ctx, 0.05);
        assert_eq!(ctx.stats().graphs_built, 2);
        assert_eq!(ctx.stats().generators_released, 8);
    }

    #[test]
    fn stop_silences_and_is_idempotent() {
        let mut ctx = running();
        ctx.post(state(6000, 0.5));
        render_secs(&mut ctx, 0.1);
        ctx.post(EngineMessage::Stop);
        ctx.post(EngineMessage::Stop);
        let out = render_secs(&mut ctx, 0.05);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(ctx.active_generators(), 0);
        assert_eq!(ctx.stats().generators_released, 8);
        ctx.stop();
        assert_eq!(ctx.stats().generators_released, 8);
    }

    #[test]
    fn disabled_state_stops_engine() {
        let mut ctx = running();
        ctx.post(state(6000, 0.5));
        render_secs(&mut ctx, 0.05);
        let off = Settings {
            enabled: false,
            ..Settings::default()
        };
        ctx.handle(EngineMessage::Settings(off));
        assert_eq!(ctx.active_generators(), 0);
        ctx.handle(state(6000, 0.5));
        assert_eq!(ctx.active_generators(), 0, "STATE while disabled must not rebuild");
        assert_eq!(ctx.stats().graphs_built, 1);
    }

    #[test]
    fn upshift_dips_pitch_then_reverts() {
        let mut ctx = running();
        ctx.post(state(8000, 0.8));
        render_secs(&mut ctx, 0.1);
        let settled = ctx.layer_targets().unwrap().base_hz;

        ctx.handle(shift(ShiftDirection::Up, 2, 8000, 7800));
        assert_eq!(ctx.pitch_multiplier(), 0.92);
        assert!((ctx.layer_targets().unwrap().base_hz - settled * 0.92).abs() < 1e-9);
        assert_eq!(ctx.active_voices(), 1);

        // Gear 2: recovery at 0.0814 + 0.105 ≈ 0.186 s
        let now = ctx.time();
        assert!(ctx.bus.shift_gain.value_at(now + 0.03) < 0.5, "ignition cut should dip the bus");

        render_secs(&mut ctx, 0.3);
        assert_eq!(ctx.pitch_multiplier(), 1.0);
        assert_eq!(ctx.active_voices(), 0, "chirp should have disposed itself");
        assert_eq!(ctx.bus.shift_gain.value_at(ctx.time()), 1.0);
    }

    #[test]
    fn new_shift_replaces_pending_revert() {
        let mut ctx = running();
        ctx.post(state(5000, 0.3));
        render_secs(&mut ctx, 0.05);
        ctx.handle(shift(ShiftDirection::Up, 4, 9300, 7000));
        let first_due = ctx.pitch_revert.due();
        render_secs(&mut ctx, 0.02);
        ctx.handle(shift(ShiftDirection::Down, 3, 4100, 5000));
        assert_eq!(ctx.pitch_multiplier(), 1.06);
        assert!(ctx.pitch_revert.due() > first_due);
        assert_eq!(ctx.active_voices(), 2);
    }

    #[test]
    fn shifts_are_dropped_while_suspended() {
        let mut ctx = SynthesisContext::new(SR);
        ctx.post(state(5000, 0.3));
        ctx.post(shift(ShiftDirection::Down, 2, 3300, 4500));
        render_secs(&mut ctx, 0.01);
        assert_eq!(ctx.active_voices(), 0);
        assert_eq!(ctx.pitch_multiplier(), 1.0);
    }

    #[test]
    fn stop_cancels_pitch_revert() {
        let mut ctx = running();
        ctx.post(state(5000, 0.3));
        render_secs(&mut ctx, 0.01);
        ctx.handle(shift(ShiftDirection::Up, 5, 10000, 8000));
        ctx.stop();
        assert_eq!(ctx.pitch_multiplier(), 1.0);
        assert!(!ctx.pitch_revert.is_pending());
    }

    #[test]
    fn stop_clears_a_pending_shift_dip() {
        let mut ctx = running();
        ctx.post(state(8000, 0.8));
        render_secs(&mut ctx, 0.05);
        ctx.handle(shift(ShiftDirection::Up, 2, 8000, 7800));
        let now = ctx.time();
        assert!(ctx.bus.shift_gain.value_at(now + 0.03) < 0.5);

        ctx.stop();
        assert_eq!(ctx.bus.shift_gain.value_at(now + 0.03), 1.0);
        assert_eq!(ctx.active_voices(), 1, "the chirp may still finish");
    }

    #[test]
    fn volume_is_clamped() {
        let mut ctx = running();
        let loud = Settings {
            volume: 4.0,
            ..Settings::default()
        };
        ctx.handle(EngineMessage::Settings(loud));
        assert_eq!(ctx.bus.volume_target(), 1.0);
    }

    #[test]
    fn bad_json_is_rejected_without_side_effects() {
        let mut ctx = running();
        assert!(ctx.post_json("{\"type\":\"NOPE\"}").is_err());
        assert!(ctx.post_json("{\"type\":\"STOP\"}").is_ok());
        assert_eq!(ctx.pending(), 1);
    }
}
