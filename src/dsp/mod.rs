//! DSP engine: procedural engine sound in pure Rust.
//!
//! The same code runs inside an AudioWorklet (via WASM) and in the offline
//! renderer, so output is deterministic across hosts.

pub mod compressor;
pub mod deferred;
pub mod engine;
pub mod envelope;
pub mod filter;
pub mod layers;
pub mod mixer;
pub mod noise;
pub mod oscillator;
pub mod profile;
pub mod renderer;
pub mod shaper;
pub mod smoother;
pub mod voice;

pub use engine::{AudioState, EngineStats, SynthesisContext};
pub use layers::{EngineGraph, LayerTargets, compute_targets};
pub use profile::EngineProfile;
pub use renderer::{CadenceScript, render_scenario, render_scenario_wav};
