//! Master bus: shift envelope, volume, compression and soft clipping.

use super::compressor::Compressor;
use super::envelope::Automation;
use super::smoother::SmoothedParam;

/// Time constant for volume changes.
pub const VOLUME_TAU: f64 = 0.05;

/// The summing chain every sample passes through:
/// continuous layers → shift gain → (+ one-shots) → volume → master →
/// compressor → soft clip.
///
/// One-shot voices join after the shift gain so an ignition-cut dip never
/// swallows the chirp it accompanies.
#[derive(Debug, Clone)]
pub struct MasterBus {
    pub shift_gain: Automation,
    volume: SmoothedParam,
    pub master_gain: f64,
    compressor: Compressor,
}

impl MasterBus {
    pub fn new(sample_rate: f64, volume: f64) -> Self {
        MasterBus {
            shift_gain: Automation::new(1.0),
            volume: SmoothedParam::new(volume.clamp(0.0, 1.0), VOLUME_TAU, sample_rate),
            master_gain: 1.0,
            compressor: Compressor::master(sample_rate),
        }
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.volume.set_target(volume.clamp(0.0, 1.0));
    }

    pub fn volume_target(&self) -> f64 {
        self.volume.target()
    }

    /// Mix one sample at `time` seconds.
    pub fn process(&mut self, continuous: f64, one_shots: f64, time: f64) -> f64 {
        let shifted = continuous * self.shift_gain.value_at(time);
        let pre = (shifted + one_shots) * self.volume.next() * self.master_gain;
        soft_clip(self.compressor.process(pre))
    }

    /// Drop any pending shift envelope and clear compressor memory. Called
    /// once the continuous layers are released.
    pub fn reset(&mut self) {
        self.shift_gain = Automation::new(1.0);
        self.compressor.reset();
    }
}

/// Soft clipper using tanh to prevent harsh digital clipping.
fn soft_clip(x: f64) -> f64 {
    x.tanh()
}
