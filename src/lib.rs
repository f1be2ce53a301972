pub mod cadence;
pub mod config;
pub mod dsp;
pub mod error;
pub mod math;
pub mod message;
#[cfg(feature = "native")]
pub mod runtime;
pub mod sim;
#[cfg(feature = "native")]
pub mod store;
pub mod transport;

use crate::cadence::CadenceEstimator;
use crate::config::Settings;
use crate::dsp::{CadenceScript, SynthesisContext};
use crate::message::{ControlMessage, EngineMessage};
use crate::sim::SimulatorContext;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the keyrev-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

fn settings_from_js(value: JsValue) -> Result<Settings, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(Settings::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(js_err)
}

/// WASM-exposed drivetrain: keystroke cadence in, engine messages out.
/// Times are milliseconds from a monotonic clock (`performance.now()`).
#[wasm_bindgen]
pub struct DrivetrainNode {
    sim: SimulatorContext,
    cadence: CadenceEstimator,
    /// Estimator reports only drive the simulator once keystrokes arrive,
    /// so a host feeding `set_cadence` directly is never overridden.
    keystrokes_seen: bool,
    outbox: Vec<EngineMessage>,
}

#[wasm_bindgen]
impl DrivetrainNode {
    #[wasm_bindgen(constructor)]
    pub fn new(settings: JsValue, now_ms: f64) -> Result<DrivetrainNode, JsValue> {
        let settings = settings_from_js(settings)?;
        Ok(DrivetrainNode::with_settings(settings, now_ms))
    }

    /// Count one keystroke. Ignored while disabled.
    pub fn record_keystroke(&mut self, now_ms: f64) {
        if self.sim.settings().enabled {
            self.cadence.record(now_ms / 1000.0);
            self.keystrokes_seen = true;
        }
    }

    /// Feed a pre-computed cadence directly (events/second).
    pub fn set_cadence(&mut self, rate: f64) {
        self.sim.set_cadence(rate);
    }

    pub fn apply_settings(&mut self, settings: JsValue) -> Result<(), JsValue> {
        let next = settings_from_js(settings)?;
        if !next.enabled {
            self.reset_cadence();
        }
        self.sim.apply_settings(next, &mut self.outbox);
        Ok(())
    }

    /// Handle a control message object. Returns the state report for
    /// `GET_STATE`, `null` otherwise.
    pub fn handle_control(&mut self, msg: JsValue) -> Result<JsValue, JsValue> {
        let msg: ControlMessage = serde_wasm_bindgen::from_value(msg).map_err(js_err)?;
        if let ControlMessage::ToggleEnabled { enabled: false } = msg {
            self.reset_cadence();
        }
        match self.sim.handle_control(msg, &mut self.outbox) {
            Some(report) => serde_wasm_bindgen::to_value(&report).map_err(js_err),
            None => Ok(JsValue::NULL),
        }
    }

    /// Advance one tick and return every message produced since the last
    /// call, oldest first.
    pub fn tick(&mut self, now_ms: f64) -> Result<JsValue, JsValue> {
        let messages = self.advance(now_ms);
        serde_wasm_bindgen::to_value(&messages).map_err(js_err)
    }
}

impl DrivetrainNode {
    fn with_settings(settings: Settings, now_ms: f64) -> Self {
        DrivetrainNode {
            sim: SimulatorContext::new(settings, now_ms / 1000.0),
            cadence: CadenceEstimator::default(),
            keystrokes_seen: false,
            outbox: Vec::new(),
        }
    }

    fn reset_cadence(&mut self) {
        self.cadence.reset();
        self.keystrokes_seen = false;
    }

    fn advance(&mut self, now_ms: f64) -> Vec<EngineMessage> {
        let now = now_ms / 1000.0;
        if self.keystrokes_seen {
            if let Some(rate) = self.cadence.poll_report(now) {
                self.sim.set_cadence(rate);
            }
        }
        self.sim.tick(now, &mut self.outbox);
        std::mem::take(&mut self.outbox)
    }
}

/// WASM-exposed synthesis context for an AudioWorklet.
#[wasm_bindgen]
pub struct SynthesisNode {
    ctx: SynthesisContext,
}

#[wasm_bindgen]
impl SynthesisNode {
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: f64) -> SynthesisNode {
        SynthesisNode {
            ctx: SynthesisContext::new(sample_rate),
        }
    }

    /// Queue an engine message object for the next render quantum.
    pub fn post_message(&mut self, msg: JsValue) -> Result<(), JsValue> {
        let msg: EngineMessage = serde_wasm_bindgen::from_value(msg).map_err(js_err)?;
        self.ctx.post(msg);
        Ok(())
    }

    pub fn resume(&mut self) {
        self.ctx.resume();
    }

    pub fn suspend(&mut self) {
        self.ctx.suspend();
    }

    /// True once after construction or resume; the host should then send
    /// `SYNC_REQUEST` to the drivetrain.
    pub fn take_sync_request(&mut self) -> bool {
        self.ctx.take_sync_request()
    }

    pub fn process(&mut self, output: &mut [f32]) {
        self.ctx.render(output);
    }
}

/// WASM-exposed: render a cadence script (`[[seconds, rate], ...]`) through
/// the full pipeline to a WAV byte array.
#[wasm_bindgen]
pub fn render_scenario_wav(
    script: JsValue,
    settings: JsValue,
    sample_rate: u32,
    seconds: f64,
) -> Result<Vec<u8>, JsValue> {
    let keyframes: Vec<(f64, f64)> = serde_wasm_bindgen::from_value(script).map_err(js_err)?;
    let settings = settings_from_js(settings)?;
    dsp::render_scenario_wav(&CadenceScript::new(keyframes), settings, sample_rate, seconds)
        .map_err(js_err)
}
