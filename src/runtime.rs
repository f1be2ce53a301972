//! Fixed-tick simulator service on tokio.
//!
//! The simulator runs in its own task and is only reached through a command
//! channel; engine messages leave through an unbounded sender so the tick
//! never waits on the audio side.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};

use crate::config::Settings;
use crate::dsp::SynthesisContext;
use crate::error::KeyRevError;
use crate::message::{EngineMessage, StateReport};
use crate::sim::{SimulatorContext, TICK_SECS};

#[derive(Debug)]
pub enum SimCommand {
    Cadence(f64),
    Settings(Settings),
    Sync,
    Query(oneshot::Sender<StateReport>),
    Shutdown,
}

/// Owner-side handle to a running simulator task.
#[derive(Debug)]
pub struct SimulatorHandle {
    commands: mpsc::UnboundedSender<SimCommand>,
    task: JoinHandle<()>,
}

impl SimulatorHandle {
    fn send(&self, cmd: SimCommand) -> Result<(), KeyRevError> {
        self.commands.send(cmd).map_err(|_| KeyRevError::ServiceClosed)
    }

    pub fn set_cadence(&self, rate: f64) -> Result<(), KeyRevError> {
        self.send(SimCommand::Cadence(rate))
    }

    pub fn apply_settings(&self, settings: Settings) -> Result<(), KeyRevError> {
        self.send(SimCommand::Settings(settings))
    }

    pub fn request_sync(&self) -> Result<(), KeyRevError> {
        self.send(SimCommand::Sync)
    }

    /// Current state, answered between ticks.
    pub async fn query(&self) -> Result<StateReport, KeyRevError> {
        let (tx, rx) = oneshot::channel();
        self.send(SimCommand::Query(tx))?;
        rx.await.map_err(|_| KeyRevError::ServiceClosed)
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.commands.send(SimCommand::Shutdown);
        if let Err(e) = self.task.await {
            log::warn!("runtime: simulator task ended abnormally: {e}");
        }
    }
}

/// Spawn the simulator on the current tokio runtime.
pub fn spawn_simulator(
    settings: Settings,
    out: mpsc::UnboundedSender<EngineMessage>,
) -> SimulatorHandle {
    let (commands, rx) = mpsc::unbounded_channel();
    let sim = SimulatorContext::new(settings, 0.0);
    let task = tokio::spawn(run(sim, rx, out));
    log::info!("runtime: simulator started");
    SimulatorHandle { commands, task }
}

async fn run(
    mut sim: SimulatorContext,
    mut commands: mpsc::UnboundedReceiver<SimCommand>,
    mut out: mpsc::UnboundedSender<EngineMessage>,
) {
    let start = Instant::now();
    let mut ticker = time::interval(Duration::from_secs_f64(TICK_SECS));
    // A late tick is taken late, never in a burst.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sim.tick(start.elapsed().as_secs_f64(), &mut out);
            }
            cmd = commands.recv() => match cmd {
                Some(SimCommand::Cadence(rate)) => sim.set_cadence(rate),
                Some(SimCommand::Settings(next)) => sim.apply_settings(next, &mut out),
                Some(SimCommand::Sync) => sim.sync_now(&mut out),
                Some(SimCommand::Query(reply)) => {
                    let _ = reply.send(sim.report());
                }
                Some(SimCommand::Shutdown) | None => break,
            },
        }
    }
    log::info!("runtime: simulator stopped");
}

/// Move everything already delivered into the synthesis inbox without
/// waiting. Returns how many messages were moved.
pub fn forward_pending(
    rx: &mut mpsc::UnboundedReceiver<EngineMessage>,
    synth: &mut SynthesisContext,
) -> usize {
    let mut moved = 0;
    while let Ok(msg) = rx.try_recv() {
        synth.post(msg);
        moved += 1;
    }
    moved
}
