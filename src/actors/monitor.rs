//! MonitorActor - Runs the collect → persist → evaluate → alert cycle
//!
//! The same actor drives both cadences of the pipeline. What differs is where the
//! snapshot of a cycle comes from:
//!
//! ```text
//! Collecting:  source.collect() → store.save() ─┐
//!                                               ├→ evaluate() → sink.dispatch()
//! Alerting:    store.latest() ──────────────────┘
//!     ↑
//!     └─── Commands (RunNow, Shutdown)
//! ```
//!
//! A failing cycle is logged and counts as a cycle without alerts. Only a
//! `Shutdown` command (or dropping every handle) ends the loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, trace, warn};

use crate::alerts::AlertSink;
use crate::collector::MetricsSource;
use crate::evaluator::{Thresholds, evaluate};
use crate::storage::{SnapshotStore, StorageError};

use super::messages::{CycleReport, MonitorCommand, MonitorState};

/// Where the snapshot of a cycle comes from
pub enum Mode {
    /// Take a fresh snapshot and persist it
    Collecting { source: Box<dyn MetricsSource> },

    /// Re-evaluate whatever snapshot is newest in the store
    Alerting,
}

impl Mode {
    fn name(&self) -> &'static str {
        match self {
            Mode::Collecting { .. } => "collecting",
            Mode::Alerting => "alerting",
        }
    }
}

pub struct MonitorActor {
    mode: Mode,

    /// Shared with any other loop working on the same snapshots
    store: Arc<dyn SnapshotStore>,

    sink: AlertSink,

    thresholds: Thresholds,

    interval_duration: Duration,

    command_rx: mpsc::Receiver<MonitorCommand>,

    state_tx: watch::Sender<MonitorState>,
}

impl MonitorActor {
    pub fn new(
        mode: Mode,
        store: Arc<dyn SnapshotStore>,
        sink: AlertSink,
        thresholds: Thresholds,
        interval_duration: Duration,
        command_rx: mpsc::Receiver<MonitorCommand>,
        state_tx: watch::Sender<MonitorState>,
    ) -> Self {
        Self {
            mode,
            store,
            sink,
            thresholds,
            interval_duration,
            command_rx,
            state_tx,
        }
    }

    /// Run the actor's main loop
    ///
    /// The first cycle starts right away. The loop runs until:
    /// - A Shutdown command is received
    /// - The command channel is closed
    #[instrument(skip(self), fields(mode = self.mode.name()))]
    pub async fn run(mut self) {
        debug!("starting monitor actor");

        let mut ticker = interval(self.interval_duration);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // pending commands win over a due tick, so a shutdown is seen first
                biased;

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(MonitorCommand::RunNow { respond_to }) => {
                            debug!("received RunNow command");
                            let result = self.run_cycle().await;
                            if let Err(e) = &result {
                                error!("cycle failed: {e:#}");
                            }
                            let _ = respond_to.send(result);
                        }

                        Some(MonitorCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }

                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!("cycle failed: {e:#}");
                    }
                }
            }

            transition(&self.state_tx, MonitorState::Sleeping);
        }

        transition(&self.state_tx, MonitorState::Stopped);
        info!("monitor stopped");
    }

    /// Run a single cycle to completion
    async fn run_cycle(&mut self) -> Result<CycleReport> {
        let (record, snapshot) = match &mut self.mode {
            Mode::Collecting { source } => {
                transition(&self.state_tx, MonitorState::Collecting);
                let snapshot = source.collect().await;

                transition(&self.state_tx, MonitorState::Persisting);
                let record = self
                    .store
                    .save(&snapshot)
                    .await
                    .context("failed to persist snapshot")?;
                debug!("snapshot stored as {record}");

                (Some(record), snapshot)
            }

            Mode::Alerting => {
                transition(&self.state_tx, MonitorState::Evaluating);
                match self.store.latest().await {
                    Ok(snapshot) => (None, snapshot),
                    Err(StorageError::NotFound) => {
                        debug!("no snapshot stored yet");
                        return Ok(CycleReport::default());
                    }
                    Err(e) => return Err(e).context("failed to read latest snapshot"),
                }
            }
        };

        transition(&self.state_tx, MonitorState::Evaluating);
        let alerts = evaluate(&snapshot, &self.thresholds);

        if alerts.is_empty() {
            debug!("all checks passed");
        } else {
            self.sink
                .dispatch(&alerts)
                .await
                .context("failed to append alerts to log")?;
        }

        Ok(CycleReport { record, alerts })
    }
}

fn transition(state_tx: &watch::Sender<MonitorState>, state: MonitorState) {
    trace!("entering state {state}");
    state_tx.send_replace(state);
}

/// Handle for controlling a MonitorActor
///
/// This handle provides a typed API for sending commands to the actor.
/// It can be cloned and shared across tasks.
#[derive(Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,
    state: watch::Receiver<MonitorState>,
}

impl MonitorHandle {
    /// Spawn a loop that collects, persists and evaluates fresh snapshots
    pub fn spawn_collecting(
        source: Box<dyn MetricsSource>,
        store: Arc<dyn SnapshotStore>,
        sink: AlertSink,
        thresholds: Thresholds,
        interval: Duration,
    ) -> Self {
        Self::spawn(Mode::Collecting { source }, store, sink, thresholds, interval)
    }

    /// Spawn a loop that only evaluates the newest stored snapshot
    pub fn spawn_alerting(
        store: Arc<dyn SnapshotStore>,
        sink: AlertSink,
        thresholds: Thresholds,
        interval: Duration,
    ) -> Self {
        Self::spawn(Mode::Alerting, store, sink, thresholds, interval)
    }

    fn spawn(
        mode: Mode,
        store: Arc<dyn SnapshotStore>,
        sink: AlertSink,
        thresholds: Thresholds,
        interval: Duration,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(MonitorState::Idle);

        let actor = MonitorActor::new(mode, store, sink, thresholds, interval, cmd_rx, state_tx);

        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            state: state_rx,
        }
    }

    /// Trigger an immediate cycle and wait for its outcome
    pub async fn run_now(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        rx.await.context("failed to receive response")?
    }

    /// Ask the loop to stop once the current cycle is done
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(MonitorCommand::Shutdown)
            .await
            .context("failed to send Shutdown command")?;
        Ok(())
    }

    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    pub async fn wait_stopped(&self) -> Result<()> {
        let mut state = self.state.clone();
        state
            .wait_for(|state| *state == MonitorState::Stopped)
            .await
            .context("monitor exited without reaching the stopped state")?;
        Ok(())
    }
}
