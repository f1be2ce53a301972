//! Drivetrain tuning and gear tables.
//!
//! Units: `accel_base`/`brake_base` are speed units per s², `damping` is 1/s,
//! `idle_spring` is speed units per s² per unit of distance from idle.

use crate::config::{MAX_GEAR, MIN_GEAR};
use crate::error::GearTableError;

/// Fixed simulator tick.
pub const TICK_SECS: f64 = 0.06;
/// Largest `dt` a single tick will integrate, absorbing scheduler pauses.
pub const MAX_TICK_DT: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTuning {
    pub throttle_attack_secs: f64,
    pub throttle_release_secs: f64,
    /// >1 so light typing reads as light throttle.
    pub throttle_gamma: f64,

    pub accel_base: f64,
    pub brake_base: f64,
    pub damping: f64,

    pub idle_spring: f64,
    /// The idle spring only acts below this throttle.
    pub idle_spring_below_throttle: f64,

    /// Normalized speed where the soft limiter starts biting.
    pub limiter_start: f64,
    pub limiter_strength: f64,
    /// Velocity inversion factor when the ceiling is hit.
    pub limiter_bounce: f64,
    /// The limiter only acts above this throttle.
    pub limiter_min_throttle: f64,
    /// Velocity inversion factor when the floor is hit.
    pub floor_bounce: f64,

    /// Runaway guard for the velocity term.
    pub max_speed_velocity: f64,

    pub shift_cooldown_secs: f64,
    pub upshift_min_throttle: f64,
    pub downshift_max_throttle: f64,

    /// Multiplier applied after the ratio rescale on an up-shift.
    pub upshift_extra_drop: f64,
    /// Added after the ratio rescale on a down-shift.
    pub downshift_blip: f64,
    /// Added to the velocity term on a down-shift.
    pub downshift_velocity_kick: f64,

    /// Snapshot hysteresis.
    pub emit_speed_delta: f64,
    pub emit_throttle_delta: f64,
}

impl Default for SimTuning {
    fn default() -> Self {
        SimTuning {
            throttle_attack_secs: 0.06,
            throttle_release_secs: 0.28,
            throttle_gamma: 1.35,
            accel_base: 7200.0,
            brake_base: 8200.0,
            damping: 7.2,
            idle_spring: 3.8,
            idle_spring_below_throttle: 0.12,
            limiter_start: 0.985,
            limiter_strength: 1.35,
            limiter_bounce: 0.22,
            limiter_min_throttle: 0.2,
            floor_bounce: 0.15,
            max_speed_velocity: 28000.0,
            shift_cooldown_secs: 0.14,
            upshift_min_throttle: 0.22,
            downshift_max_throttle: 0.75,
            upshift_extra_drop: 0.985,
            downshift_blip: 180.0,
            downshift_velocity_kick: 900.0,
            emit_speed_delta: 12.0,
            emit_throttle_delta: 0.02,
        }
    }
}

/// Torque available at normalized speed `n`: strong low-to-mid, tapering
/// toward redline.
pub fn torque_curve(n: f64) -> f64 {
    0.35 + 0.65 * (1.0 - n.powf(1.85))
}

/// Engine braking at normalized speed `n`: grows with speed.
pub fn brake_curve(n: f64) -> f64 {
    0.25 + 0.75 * n.powf(0.9)
}

const GEAR_COUNT: usize = (MAX_GEAR - MIN_GEAR + 1) as usize;

const UPSHIFT_SPEED: [f64; GEAR_COUNT] = [
    7200.0, 7900.0, 8600.0, 9300.0, 10000.0, 10600.0, 11000.0, 11000.0,
];
const DOWNSHIFT_SPEED: [f64; GEAR_COUNT] = [
    2600.0, 3300.0, 4100.0, 4900.0, 5800.0, 6800.0, 7800.0, 8800.0,
];
const GEAR_RATIO: [f64; GEAR_COUNT] = [3.2, 2.55, 2.1, 1.8, 1.58, 1.4, 1.26, 1.14];

/// Per-gear shift thresholds and ratios, indexed by gear number
/// (`MIN_GEAR..=MAX_GEAR`).
#[derive(Debug, Clone, PartialEq)]
pub struct GearTable {
    up: Vec<f64>,
    down: Vec<f64>,
    ratio: Vec<f64>,
}

impl Default for GearTable {
    fn default() -> Self {
        GearTable {
            up: UPSHIFT_SPEED.to_vec(),
            down: DOWNSHIFT_SPEED.to_vec(),
            ratio: GEAR_RATIO.to_vec(),
        }
    }
}

impl GearTable {
    /// Build a table for gears `MIN_GEAR..=MAX_GEAR`, checking that up-shift
    /// thresholds never decrease and each down-shift threshold sits strictly
    /// below the same gear's up-shift threshold.
    pub fn new(up: Vec<f64>, down: Vec<f64>, ratio: Vec<f64>) -> Result<Self, GearTableError> {
        if up.is_empty() {
            return Err(GearTableError::Empty);
        }
        for len in [up.len(), down.len(), ratio.len()] {
            if len != GEAR_COUNT {
                return Err(GearTableError::LengthMismatch {
                    expected: GEAR_COUNT,
                    found: len,
                });
            }
        }
        for i in 0..GEAR_COUNT {
            let gear = MIN_GEAR + i as u8;
            if i > 0 && up[i] < up[i - 1] {
                return Err(GearTableError::UpshiftNotMonotonic { gear });
            }
            if down[i] >= up[i] {
                return Err(GearTableError::DownshiftNotBelowUpshift { gear });
            }
            if !(ratio[i] > 0.0) {
                return Err(GearTableError::NonPositiveRatio { gear });
            }
        }
        Ok(GearTable { up, down, ratio })
    }

    fn index(gear: u8) -> usize {
        (gear.clamp(MIN_GEAR, MAX_GEAR) - MIN_GEAR) as usize
    }

    pub fn upshift_speed(&self, gear: u8) -> f64 {
        self.up[Self::index(gear)]
    }

    pub fn downshift_speed(&self, gear: u8) -> f64 {
        self.down[Self::index(gear)]
    }

    pub fn ratio(&self, gear: u8) -> f64 {
        self.ratio[Self::index(gear)]
    }

    /// Acceleration scale for `gear` relative to the top gear; lower gears
    /// rev faster.
    pub fn gear_factor(&self, gear: u8) -> f64 {
        self.ratio(gear) / self.ratio(MAX_GEAR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_satisfies_invariants() {
        let d = GearTable::default();
        let rebuilt = GearTable::new(d.up.clone(), d.down.clone(), d.ratio.clone());
        assert_eq!(rebuilt, Ok(d));
    }

    #[test]
    fn rejects_decreasing_upshift() {
        let mut up = UPSHIFT_SPEED.to_vec();
        up[3] = 7000.0;
        let err = GearTable::new(up, DOWNSHIFT_SPEED.to_vec(), GEAR_RATIO.to_vec()).unwrap_err();
        assert_eq!(err, GearTableError::UpshiftNotMonotonic { gear: 4 });
    }

    #[test]
    fn rejects_downshift_at_or_above_upshift() {
        let mut down = DOWNSHIFT_SPEED.to_vec();
        down[0] = 7200.0;
        let err = GearTable::new(UPSHIFT_SPEED.to_vec(), down, GEAR_RATIO.to_vec()).unwrap_err();
        assert_eq!(err, GearTableError::DownshiftNotBelowUpshift { gear: 1 });
    }

    #[test]
    fn rejects_wrong_length() {
        let err = GearTable::new(vec![1.0], vec![0.5], vec![1.0]).unwrap_err();
        assert!(matches!(err, GearTableError::LengthMismatch { .. }));
    }

    #[test]
    fn lower_gears_accelerate_harder() {
        let t = GearTable::default();
        assert!(t.gear_factor(1) > t.gear_factor(4));
        assert_eq!(t.gear_factor(MAX_GEAR), 1.0);
    }

    #[test]
    fn curves_shape() {
        assert!(torque_curve(0.0) > torque_curve(1.0));
        assert!(brake_curve(1.0) > brake_curve(0.0));
        assert!((torque_curve(1.0) - 0.35).abs() < 1e-12);
        assert!((brake_curve(0.0) - 0.25).abs() < 1e-12);
    }
}
