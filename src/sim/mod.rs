//! Drivetrain simulation: throttle dynamics, second-order engine speed,
//! and gear shifting on a fixed tick.

pub mod drivetrain;
pub mod params;

pub use drivetrain::{ShiftPhase, SimulationState, SimulatorContext};
pub use params::{GearTable, SimTuning, TICK_SECS};
