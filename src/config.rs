//! User-facing configuration and the bounds shared by both subsystems.

use serde::{Deserialize, Serialize};

/// Idle engine speed.
pub const MIN_ENGINE_SPEED: f64 = 1000.0;
/// Hard ceiling of the engine-speed range (redline).
pub const MAX_ENGINE_SPEED: f64 = 11000.0;

pub const MIN_GEAR: u8 = 1;
pub const MAX_GEAR: u8 = 8;

/// Cadence (events/second) that maps to full throttle at `Sensitivity::Medium`.
pub const MAX_CADENCE_BASE: f64 = 12.0;

/// Engine-speed position in `[0, 1]` across the configured range.
pub fn normalized_speed(speed: f64) -> f64 {
    crate::math::clamp(
        (speed - MIN_ENGINE_SPEED) / (MAX_ENGINE_SPEED - MIN_ENGINE_SPEED),
        0.0,
        1.0,
    )
}

/// Gear position in `[0, 1]` across the configured range.
pub fn normalized_gear(gear: u8) -> f64 {
    crate::math::clamp(
        (gear as f64 - MIN_GEAR as f64) / (MAX_GEAR - MIN_GEAR) as f64,
        0.0,
        1.0,
    )
}

/// Engine character presets. Each one resolves to a fixed
/// [`EngineProfile`](crate::dsp::profile::EngineProfile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineType {
    V6,
    V8,
    #[default]
    V10,
    V12,
}

impl EngineType {
    pub const ALL: [EngineType; 4] = [
        EngineType::V6,
        EngineType::V8,
        EngineType::V10,
        EngineType::V12,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EngineType::V6 => "v6",
            EngineType::V8 => "v8",
            EngineType::V10 => "v10",
            EngineType::V12 => "v12",
        }
    }
}

/// How much cadence is needed for full throttle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Low,
    #[default]
    Medium,
    High,
}

impl Sensitivity {
    /// Multiplier applied to [`MAX_CADENCE_BASE`]. Lower ratio = less typing
    /// needed to reach full throttle.
    pub fn ratio(self) -> f64 {
        match self {
            Sensitivity::Low => 1.3,
            Sensitivity::Medium => 1.0,
            Sensitivity::High => 0.7,
        }
    }

    pub fn effective_max_cadence(self) -> f64 {
        MAX_CADENCE_BASE * self.ratio()
    }
}

/// Persisted user settings. Exchanged by value between contexts; never
/// mutated in place by more than one owner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub enabled: bool,
    /// Output volume [0, 1].
    pub volume: f64,
    pub engine_type: EngineType,
    pub sensitivity: Sensitivity,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            enabled: true,
            volume: 0.6,
            engine_type: EngineType::V10,
            sensitivity: Sensitivity::Medium,
        }
    }
}

impl Settings {
    /// Volume clamped to `[0, 1]`, with non-finite values treated as silence.
    pub fn clamped_volume(&self) -> f64 {
        crate::math::clamp(crate::math::finite_or(self.volume, 0.0), 0.0, 1.0)
    }

    /// Whether a change from `self` to `next` has to be pushed to the
    /// synthesis side. Sensitivity only matters to the simulator.
    pub fn audible_change(&self, next: &Settings) -> bool {
        self.enabled != next.enabled
            || self.volume != next.volume
            || self.engine_type != next.engine_type
    }
}
