//! Shared white-noise buffer and the players that read from it.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

/// Length of the shared buffer in seconds.
pub const NOISE_SECONDS: f64 = 2.0;
/// Peak level the buffer is written at; layers scale it down with their gain.
pub const NOISE_LEVEL: f64 = 0.95;

const DEFAULT_SEED: u64 = 0x6b65_7972_6576;

/// Two seconds of white noise shared by every layer and one-shot voice.
/// Cloning is cheap.
#[derive(Debug, Clone)]
pub struct NoiseBuffer {
    samples: Arc<[f64]>,
}

impl NoiseBuffer {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_seed(sample_rate, DEFAULT_SEED)
    }

    pub fn with_seed(sample_rate: f64, seed: u64) -> Self {
        let len = ((sample_rate * NOISE_SECONDS).floor() as usize).max(1);
        let mut rng = Pcg32::seed_from_u64(seed);
        let samples: Vec<f64> = (0..len)
            .map(|_| (rng.random::<f64>() * 2.0 - 1.0) * NOISE_LEVEL)
            .collect();
        NoiseBuffer {
            samples: samples.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A playback head over a [`NoiseBuffer`].
#[derive(Debug, Clone)]
pub struct NoisePlayer {
    buffer: NoiseBuffer,
    pos: usize,
    looping: bool,
    running: bool,
}

impl NoisePlayer {
    /// Loops forever until stopped.
    pub fn looping(buffer: NoiseBuffer) -> Self {
        NoisePlayer {
            buffer,
            pos: 0,
            looping: true,
            running: true,
        }
    }

    /// Plays the buffer once, then goes silent.
    pub fn one_shot(buffer: NoiseBuffer) -> Self {
        NoisePlayer {
            buffer,
            pos: 0,
            looping: false,
            running: true,
        }
    }

    /// Returns `false` if the player was already stopped.
    pub fn stop(&mut self) -> bool {
        std::mem::replace(&mut self.running, false)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn next_sample(&mut self) -> f64 {
        if !self.running {
            return 0.0;
        }
        let s = self.buffer.samples[self.pos];
        self.pos += 1;
        if self.pos >= self.buffer.len() {
            if self.looping {
                self.pos = 0;
            } else {
                self.running = false;
            }
        }
        s
    }
}
