//! Message contract between the simulator and the synthesis engine.
//!
//! Messages are plain values with a JSON encoding so the two sides can live
//! in separate processes (or a worklet and a worker) without shared memory.
//! Field names on the wire are the compatibility surface.

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::error::KeyRevError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShiftDirection {
    Up,
    Down,
}

/// Continuous engine state, rate-limited by the simulator's hysteresis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    pub engine_speed: u32,
    pub gear: u8,
    /// Rounded to three decimals.
    pub throttle: f64,
}

/// A committed gear change. Delivered once, never coalesced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftEvent {
    pub direction: ShiftDirection,
    /// Gear after the shift.
    pub gear: u8,
    pub from_gear: u8,
    pub speed_before: u32,
    pub speed_after: u32,
    pub throttle: f64,
}

impl ShiftEvent {
    /// Engine-speed jump across the shift (positive on a blip).
    pub fn speed_delta(&self) -> f64 {
        self.speed_after as f64 - self.speed_before as f64
    }
}

/// Simulator → synthesis messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineMessage {
    State(StateSnapshot),
    Shift(ShiftEvent),
    Settings(Settings),
    Stop,
}

impl EngineMessage {
    pub fn to_json(&self) -> String {
        // Plain structs of numbers/enums; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn from_json(json: &str) -> Result<Self, KeyRevError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Host/UI → simulator messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Latest smoothed cadence (events/second) from the cadence source.
    CadenceUpdate { rate: f64 },
    /// A late-starting audio context asks for the current state.
    SyncRequest,
    /// UI poll; answered with a [`StateReport`].
    GetState,
    ToggleEnabled { enabled: bool },
}

impl ControlMessage {
    pub fn from_json(json: &str) -> Result<Self, KeyRevError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Response to [`ControlMessage::GetState`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateReport {
    pub enabled: bool,
    pub engine_speed: u32,
    pub gear: u8,
    pub throttle: f64,
    pub settings: Settings,
}
