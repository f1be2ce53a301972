//! Offline renderer: drives a simulator and a synthesis context from a
//! cadence script and renders the result to samples or a WAV buffer.

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::KeyRevError;
use crate::message::{ControlMessage, EngineMessage};
use crate::sim::{SimulatorContext, TICK_SECS};

use super::engine::SynthesisContext;

/// Piecewise-linear cadence over time: `(seconds, events_per_second)`
/// keyframes. Held flat before the first and after the last keyframe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CadenceScript {
    keyframes: Vec<(f64, f64)>,
}

impl CadenceScript {
    pub fn new(mut keyframes: Vec<(f64, f64)>) -> Self {
        keyframes.retain(|(t, r)| t.is_finite() && r.is_finite());
        keyframes.sort_by(|a, b| a.0.total_cmp(&b.0));
        CadenceScript { keyframes }
    }

    pub fn rate_at(&self, time: f64) -> f64 {
        let idx = self.keyframes.partition_point(|(t, _)| *t <= time);
        let rate = match (idx.checked_sub(1).map(|i| self.keyframes[i]), self.keyframes.get(idx)) {
            (None, None) => 0.0,
            (None, Some(&(_, r))) | (Some((_, r)), None) => r,
            (Some((t0, r0)), Some(&(t1, r1))) => {
                let x = (time - t0) / (t1 - t0);
                r0 + (r1 - r0) * x
            }
        };
        rate.max(0.0)
    }
}

/// Run the full pipeline for `seconds` and return mono samples.
///
/// Messages cross between the two contexts as JSON, exactly as they would
/// between separate processes.
pub fn render_scenario(
    script: &CadenceScript,
    settings: Settings,
    sample_rate: u32,
    seconds: f64,
) -> Result<Vec<f32>, KeyRevError> {
    let sr = sample_rate as f64;
    let total = (seconds.max(0.0) * sr) as usize;
    let tick_samples = ((TICK_SECS * sr).round() as usize).max(1);

    let mut sim = SimulatorContext::new(settings, 0.0);
    let mut synth = SynthesisContext::new(sr);
    synth.resume();

    let mut outbox: Vec<EngineMessage> = Vec::new();
    let mut output = vec![0.0f32; total];
    let mut pos = 0;
    let mut tick = 0u64;

    while pos < total {
        if synth.take_sync_request() {
            sim.handle_control(ControlMessage::SyncRequest, &mut outbox);
        }
        tick += 1;
        let now = tick as f64 * TICK_SECS;
        sim.set_cadence(script.rate_at(now));
        sim.tick(now, &mut outbox);

        for msg in outbox.drain(..) {
            synth.post_json(&msg.to_json())?;
        }

        let end = (pos + tick_samples).min(total);
        synth.render(&mut output[pos..end]);
        pos = end;
    }

    log::debug!(
        "renderer: {} samples, {} shifts, {} graphs",
        total,
        synth.stats().voices_started,
        synth.stats().graphs_built
    );
    Ok(output)
}

/// [`render_scenario`] encoded as 16-bit mono PCM WAV.
pub fn render_scenario_wav(
    script: &CadenceScript,
    settings: Settings,
    sample_rate: u32,
    seconds: f64,
) -> Result<Vec<u8>, KeyRevError> {
    let samples = render_scenario(script, settings, sample_rate, seconds)?;
    let pcm: Vec<i16> = samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect();
    Ok(encode_wav(&pcm, sample_rate, 1))
}

/// Encode interleaved i16 PCM samples to a WAV byte buffer.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (samples.len() * 2) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}
