//! Engine character presets.
//!
//! Each preset is a fixed-shape parameter record; ranges are `(low, high)`
//! pairs interpolated by normalized engine speed. The numbers are hand-tuned
//! and kept exactly as voiced.

use crate::config::EngineType;

use super::oscillator::Waveform;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineProfile {
    pub cylinders: u32,

    pub order_wave: Waveform,
    pub harm_wave: Waveform,
    pub order_detune_cents: f64,
    pub harm_detune_cents: f64,

    pub core_distortion: f64,
    pub rasp_distortion: f64,
    pub core_drive: (f64, f64),
    pub rasp_drive: (f64, f64),

    pub core_lp_hz: (f64, f64),
    pub core_lp_q: f64,
    pub body_res_hz: (f64, f64),
    pub body_res_q: f64,

    pub order_gain: (f64, f64),
    pub sub_gain: (f64, f64),
    pub harm_gain: (f64, f64),
    pub rasp_gain: (f64, f64),
    pub whine_gain: (f64, f64),
    pub mech_gain: (f64, f64),

    pub rasp_hp_hz: (f64, f64),
    pub rasp_bp_hz: (f64, f64),
    pub rasp_lp_hz: (f64, f64),
    pub rasp_q: f64,

    pub whine_wave: Waveform,
    pub whine_mul: f64,
    pub whine_add_hz: f64,
    pub whine_min_hz: f64,
    pub whine_max_hz: f64,
    pub whine_q: f64,
    pub whine_vibrato_cents: f64,

    pub mech_res_hz: &'static [f64],
    pub mech_q: f64,
}

pub const V6: EngineProfile = EngineProfile {
    cylinders: 6,
    order_wave: Waveform::Triangle,
    harm_wave: Waveform::Sawtooth,
    order_detune_cents: 4.0,
    harm_detune_cents: 7.0,
    core_distortion: 2.2,
    rasp_distortion: 3.0,
    core_drive: (0.85, 1.25),
    rasp_drive: (0.75, 1.35),
    core_lp_hz: (1600.0, 7200.0),
    core_lp_q: 0.75,
    body_res_hz: (220.0, 380.0),
    body_res_q: 1.2,
    order_gain: (0.20, 0.22),
    sub_gain: (0.16, 0.05),
    harm_gain: (0.05, 0.18),
    rasp_gain: (0.015, 0.14),
    whine_gain: (0.03, 0.24),
    mech_gain: (0.02, 0.08),
    rasp_hp_hz: (120.0, 320.0),
    rasp_bp_hz: (650.0, 2300.0),
    rasp_lp_hz: (5200.0, 10500.0),
    rasp_q: 0.9,
    whine_wave: Waveform::Sine,
    whine_mul: 12.5,
    whine_add_hz: 900.0,
    whine_min_hz: 1200.0,
    whine_max_hz: 10500.0,
    whine_q: 1.35,
    whine_vibrato_cents: 9.0,
    mech_res_hz: &[2500.0, 4100.0],
    mech_q: 11.0,
};

pub const V8: EngineProfile = EngineProfile {
    cylinders: 8,
    order_wave: Waveform::Square,
    harm_wave: Waveform::Sawtooth,
    order_detune_cents: 6.0,
    harm_detune_cents: 9.0,
    core_distortion: 2.6,
    rasp_distortion: 3.4,
    core_drive: (0.9, 1.35),
    rasp_drive: (0.9, 1.55),
    core_lp_hz: (1500.0, 6800.0),
    core_lp_q: 0.85,
    body_res_hz: (200.0, 320.0),
    body_res_q: 1.35,
    order_gain: (0.22, 0.24),
    sub_gain: (0.20, 0.07),
    harm_gain: (0.06, 0.20),
    rasp_gain: (0.02, 0.17),
    whine_gain: (0.02, 0.16),
    mech_gain: (0.03, 0.10),
    rasp_hp_hz: (140.0, 360.0),
    rasp_bp_hz: (700.0, 2600.0),
    rasp_lp_hz: (5200.0, 9800.0),
    rasp_q: 1.0,
    whine_wave: Waveform::Triangle,
    whine_mul: 9.5,
    whine_add_hz: 650.0,
    whine_min_hz: 900.0,
    whine_max_hz: 9500.0,
    whine_q: 1.25,
    whine_vibrato_cents: 7.0,
    mech_res_hz: &[2400.0, 3600.0, 5200.0],
    mech_q: 10.0,
};

pub const V10: EngineProfile = EngineProfile {
    cylinders: 10,
    order_wave: Waveform::Sawtooth,
    harm_wave: Waveform::Square,
    order_detune_cents: 7.0,
    harm_detune_cents: 11.0,
    core_distortion: 2.4,
    rasp_distortion: 3.2,
    core_drive: (0.95, 1.55),
    rasp_drive: (0.85, 1.65),
    core_lp_hz: (1900.0, 8200.0),
    core_lp_q: 0.7,
    body_res_hz: (260.0, 480.0),
    body_res_q: 1.15,
    order_gain: (0.18, 0.20),
    sub_gain: (0.12, 0.04),
    harm_gain: (0.07, 0.24),
    rasp_gain: (0.018, 0.18),
    whine_gain: (0.03, 0.22),
    mech_gain: (0.02, 0.09),
    rasp_hp_hz: (130.0, 360.0),
    rasp_bp_hz: (800.0, 3000.0),
    rasp_lp_hz: (5600.0, 11000.0),
    rasp_q: 1.05,
    whine_wave: Waveform::Sine,
    whine_mul: 10.8,
    whine_add_hz: 750.0,
    whine_min_hz: 1100.0,
    whine_max_hz: 11500.0,
    whine_q: 1.4,
    whine_vibrato_cents: 8.0,
    mech_res_hz: &[2800.0, 4300.0, 6100.0],
    mech_q: 11.0,
};

pub const V12: EngineProfile = EngineProfile {
    cylinders: 12,
    order_wave: Waveform::Sawtooth,
    harm_wave: Waveform::Triangle,
    order_detune_cents: 5.0,
    harm_detune_cents: 9.0,
    core_distortion: 2.1,
    rasp_distortion: 2.9,
    core_drive: (0.85, 1.35),
    rasp_drive: (0.70, 1.30),
    core_lp_hz: (2100.0, 8800.0),
    core_lp_q: 0.65,
    body_res_hz: (260.0, 520.0),
    body_res_q: 1.05,
    order_gain: (0.16, 0.18),
    sub_gain: (0.10, 0.03),
    harm_gain: (0.06, 0.20),
    rasp_gain: (0.012, 0.14),
    whine_gain: (0.02, 0.18),
    mech_gain: (0.018, 0.07),
    rasp_hp_hz: (120.0, 320.0),
    rasp_bp_hz: (750.0, 2600.0),
    rasp_lp_hz: (5600.0, 10500.0),
    rasp_q: 0.95,
    whine_wave: Waveform::Sine,
    whine_mul: 9.2,
    whine_add_hz: 650.0,
    whine_min_hz: 900.0,
    whine_max_hz: 11000.0,
    whine_q: 1.25,
    whine_vibrato_cents: 6.0,
    mech_res_hz: &[2600.0, 3900.0, 5400.0],
    mech_q: 10.0,
};

impl EngineType {
    /// The fixed preset for this engine character.
    pub fn profile(self) -> &'static EngineProfile {
        match self {
            EngineType::V6 => &V6,
            EngineType::V8 => &V8,
            EngineType::V10 => &V10,
            EngineType::V12 => &V12,
        }
    }
}

impl EngineProfile {
    /// Firing frequency of a four-stroke engine at `speed` rev/min.
    pub fn firing_hz(&self, speed: f64) -> f64 {
        (speed / 60.0) * (self.cylinders as f64 / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_a_profile() {
        for ty in EngineType::ALL {
            let p = ty.profile();
            assert!(!p.mech_res_hz.is_empty(), "{} has no mechanical bands", ty.name());
            assert!(p.whine_min_hz < p.whine_max_hz);
        }
        assert_eq!(EngineType::V6.profile().cylinders, 6);
        assert_eq!(EngineType::V12.profile().cylinders, 12);
    }

    #[test]
    fn firing_frequency() {
        // 6000 rev/min, 10 cylinders: 100 rev/s × 5 firings per rev
        assert_eq!(V10.firing_hz(6000.0), 500.0);
    }
}
