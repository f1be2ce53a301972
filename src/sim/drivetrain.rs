//! Drivetrain simulator: cadence in, throttle / engine speed / gear out.
//!
//! Single-threaded and non-blocking: the owner calls [`SimulatorContext::tick`]
//! on a fixed cadence and everything observable leaves through a
//! [`Transport`].

use crate::config::{
    MAX_ENGINE_SPEED, MAX_GEAR, MIN_ENGINE_SPEED, MIN_GEAR, Settings, normalized_speed,
};
use crate::math::{clamp, exp_approach, finite_or, round3};
use crate::message::{
    ControlMessage, EngineMessage, ShiftDirection, ShiftEvent, StateReport, StateSnapshot,
};
use crate::transport::Transport;

use super::params::{GearTable, MAX_TICK_DT, SimTuning, TICK_SECS, brake_curve, torque_curve};

/// Everything the simulator mutates once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationState {
    /// Smoothed demand [0, 1].
    pub throttle: f64,
    /// Always within `[MIN_ENGINE_SPEED, MAX_ENGINE_SPEED]`.
    pub engine_speed: f64,
    /// Velocity of engine speed (second-order memory), clamped.
    pub speed_velocity: f64,
    pub gear: u8,
    /// No shift may start before this time (seconds).
    pub shift_lockout_until: f64,
}

impl SimulationState {
    pub fn idle() -> Self {
        SimulationState {
            throttle: 0.0,
            engine_speed: MIN_ENGINE_SPEED,
            speed_velocity: 0.0,
            gear: MIN_GEAR,
            shift_lockout_until: 0.0,
        }
    }
}

/// Shift state machine. Shifts are only evaluated while `Stable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftPhase {
    Stable,
    CoolingDown,
}

pub struct SimulatorContext {
    state: SimulationState,
    tuning: SimTuning,
    gears: GearTable,
    settings: Settings,
    cadence: f64,
    last_tick: f64,
    last_sent: Option<StateSnapshot>,
}

impl SimulatorContext {
    /// A fresh simulator at idle. `now` is the current monotonic time in
    /// seconds; later ticks measure `dt` from it.
    pub fn new(settings: Settings, now: f64) -> Self {
        SimulatorContext::with_tuning(settings, SimTuning::default(), GearTable::default(), now)
    }

    pub fn with_tuning(settings: Settings, tuning: SimTuning, gears: GearTable, now: f64) -> Self {
        SimulatorContext {
            state: SimulationState::idle(),
            tuning,
            gears,
            settings,
            cadence: 0.0,
            last_tick: now,
            last_sent: None,
        }
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn gears(&self) -> &GearTable {
        &self.gears
    }

    pub fn shift_phase(&self, now: f64) -> ShiftPhase {
        if now < self.state.shift_lockout_until {
            ShiftPhase::CoolingDown
        } else {
            ShiftPhase::Stable
        }
    }

    /// Latest cadence sample (events/second).
    pub fn set_cadence(&mut self, rate: f64) {
        self.cadence = finite_or(rate, 0.0).max(0.0);
    }

    /// Apply a settings change, emitting STOP / SETTINGS as needed.
    pub fn apply_settings<T: Transport>(&mut self, next: Settings, out: &mut T) {
        let prev = self.settings;
        self.settings = next;

        if prev.enabled != next.enabled {
            if next.enabled {
                log::info!("drivetrain: enabled");
                // First frame after re-enabling is always sent.
                self.last_sent = None;
            } else {
                log::info!("drivetrain: disabled, letting the engine wind down");
                self.cadence = 0.0;
                out.send(EngineMessage::Stop);
            }
        }
        if prev.audible_change(&next) {
            out.send(EngineMessage::Settings(next));
        }
    }

    /// Bring a late-starting synthesis context up to date.
    pub fn sync_now<T: Transport>(&mut self, out: &mut T) {
        out.send(EngineMessage::Settings(self.settings));
        if self.settings.enabled {
            self.emit_state(true, out);
        }
    }

    pub fn report(&self) -> StateReport {
        StateReport {
            enabled: self.settings.enabled,
            engine_speed: self.state.engine_speed.round() as u32,
            gear: self.state.gear,
            throttle: round3(self.state.throttle),
            settings: self.settings,
        }
    }

    /// Handle a control message. Only `GetState` produces a reply.
    pub fn handle_control<T: Transport>(
        &mut self,
        msg: ControlMessage,
        out: &mut T,
    ) -> Option<StateReport> {
        match msg {
            ControlMessage::CadenceUpdate { rate } => self.set_cadence(rate),
            ControlMessage::SyncRequest => self.sync_now(out),
            ControlMessage::GetState => return Some(self.report()),
            ControlMessage::ToggleEnabled { enabled } => {
                let next = Settings {
                    enabled,
                    ..self.settings
                };
                self.apply_settings(next, out);
            }
        }
        None
    }

    /// Advance the simulation to `now` (seconds).
    pub fn tick<T: Transport>(&mut self, now: f64, out: &mut T) {
        let mut dt = now - self.last_tick;
        self.last_tick = now;
        if !dt.is_finite() || dt <= 0.0 {
            dt = TICK_SECS;
        }
        let dt = dt.min(MAX_TICK_DT);

        self.update_throttle(dt);
        self.step_speed(dt);

        if self.settings.enabled {
            if let Some(shift) = self.maybe_shift(now) {
                out.send(EngineMessage::Shift(shift));
                self.emit_state(true, out);
            } else {
                self.emit_state(false, out);
            }
        } else {
            self.settle_gear();
        }
    }

    fn throttle_target(&self) -> f64 {
        let max = self.settings.sensitivity.effective_max_cadence();
        let x = clamp(self.cadence / max, 0.0, 1.0);
        x.powf(self.tuning.throttle_gamma)
    }

    fn update_throttle(&mut self, dt: f64) {
        let target = if self.settings.enabled {
            self.throttle_target()
        } else {
            0.0
        };
        let tau = if target > self.state.throttle {
            self.tuning.throttle_attack_secs
        } else {
            self.tuning.throttle_release_secs
        };
        let next = exp_approach(self.state.throttle, target, dt, tau);
        self.state.throttle = clamp(finite_or(next, 0.0), 0.0, 1.0);
    }

    fn step_speed(&mut self, dt: f64) {
        let tune = &self.tuning;
        let s = &mut self.state;
        let throttle = s.throttle;
        let gear_factor = self.gears.gear_factor(s.gear);
        let n = normalized_speed(s.engine_speed);

        let mut accel = throttle * tune.accel_base * gear_factor * torque_curve(n);
        accel -= (1.0 - throttle) * tune.brake_base * gear_factor * brake_curve(n);
        accel -= tune.damping * s.speed_velocity;

        if throttle < tune.idle_spring_below_throttle {
            accel += (MIN_ENGINE_SPEED - s.engine_speed) * tune.idle_spring;
        }

        // Soft limiter: quadratic penalty past `limiter_start`.
        if throttle > tune.limiter_min_throttle && n > tune.limiter_start {
            let over = (n - tune.limiter_start) / (1.0 - tune.limiter_start);
            accel -= tune.accel_base * tune.limiter_strength * over * over;
        }

        let max_vel = tune.max_speed_velocity;
        s.speed_velocity = clamp(finite_or(s.speed_velocity + accel * dt, 0.0), -max_vel, max_vel);
        s.engine_speed = finite_or(s.engine_speed + s.speed_velocity * dt, MIN_ENGINE_SPEED);

        if s.engine_speed < MIN_ENGINE_SPEED {
            s.engine_speed = MIN_ENGINE_SPEED;
            if s.speed_velocity < 0.0 {
                s.speed_velocity *= -tune.floor_bounce;
            }
        }
        if s.engine_speed > MAX_ENGINE_SPEED {
            s.engine_speed = MAX_ENGINE_SPEED;
            if s.speed_velocity > 0.0 {
                s.speed_velocity *= -tune.limiter_bounce;
            }
        }
    }

    fn maybe_shift(&mut self, now: f64) -> Option<ShiftEvent> {
        if self.shift_phase(now) == ShiftPhase::CoolingDown {
            return None;
        }
        let SimulationState {
            gear,
            engine_speed,
            throttle,
            ..
        } = self.state;

        if gear < MAX_GEAR
            && engine_speed >= self.gears.upshift_speed(gear)
            && throttle >= self.tuning.upshift_min_throttle
        {
            return Some(self.commit_shift(ShiftDirection::Up, gear + 1, now));
        }

        if gear > MIN_GEAR
            && engine_speed <= self.gears.downshift_speed(gear)
            && throttle <= self.tuning.downshift_max_throttle
        {
            return Some(self.commit_shift(ShiftDirection::Down, gear - 1, now));
        }

        None
    }

    fn commit_shift(&mut self, direction: ShiftDirection, next_gear: u8, now: f64) -> ShiftEvent {
        let tune = &self.tuning;
        let s = &mut self.state;
        let from_gear = s.gear;
        let speed_before = s.engine_speed;

        // Vehicle speed is preserved across the ratio change.
        let ratio = self.gears.ratio(next_gear) / self.gears.ratio(from_gear);
        s.gear = next_gear;
        s.engine_speed = clamp(s.engine_speed * ratio, MIN_ENGINE_SPEED, MAX_ENGINE_SPEED);
        s.speed_velocity *= ratio;

        match direction {
            ShiftDirection::Up => {
                s.engine_speed = clamp(
                    s.engine_speed * tune.upshift_extra_drop,
                    MIN_ENGINE_SPEED,
                    MAX_ENGINE_SPEED,
                );
            }
            ShiftDirection::Down => {
                s.engine_speed = clamp(
                    s.engine_speed + tune.downshift_blip,
                    MIN_ENGINE_SPEED,
                    MAX_ENGINE_SPEED,
                );
                s.speed_velocity += tune.downshift_velocity_kick;
            }
        }
        let max_vel = tune.max_speed_velocity;
        s.speed_velocity = clamp(s.speed_velocity, -max_vel, max_vel);
        s.shift_lockout_until = now + tune.shift_cooldown_secs;

        log::debug!(
            "drivetrain: shift {:?} {} -> {} ({:.0} -> {:.0})",
            direction,
            from_gear,
            next_gear,
            speed_before,
            s.engine_speed
        );

        ShiftEvent {
            direction,
            gear: next_gear,
            from_gear,
            speed_before: speed_before.round() as u32,
            speed_after: s.engine_speed.round() as u32,
            throttle: round3(s.throttle),
        }
    }

    /// While disabled, walk the gear back one step at a time as speed decays.
    fn settle_gear(&mut self) {
        let s = &mut self.state;
        if s.gear > MIN_GEAR && s.engine_speed <= self.gears.downshift_speed(s.gear) {
            s.gear -= 1;
        }
    }

    fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            engine_speed: self.state.engine_speed.round() as u32,
            gear: self.state.gear,
            throttle: round3(self.state.throttle),
        }
    }

    fn emit_state<T: Transport>(&mut self, force: bool, out: &mut T) {
        if !self.settings.enabled {
            return;
        }
        let snap = self.snapshot();
        if !force {
            if let Some(last) = self.last_sent {
                let speed_delta = (last.engine_speed as f64 - snap.engine_speed as f64).abs();
                let throttle_delta = (last.throttle - snap.throttle).abs();
                if last.gear == snap.gear
                    && speed_delta < self.tuning.emit_speed_delta
                    && throttle_delta < self.tuning.emit_throttle_delta
                {
                    return;
                }
            }
        }
        self.last_sent = Some(snap);
        out.send(EngineMessage::State(snap));
    }
}
