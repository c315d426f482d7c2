//! Message types for the monitor actor
//!
//! Commands travel over an mpsc channel and carry a oneshot sender when the caller
//! wants an answer. The actor's lifecycle state is published through a `watch`
//! channel so that any number of handles can observe it without asking.

use std::fmt;

use tokio::sync::oneshot;

use crate::evaluator::Alert;
use crate::storage::RecordId;

/// Commands that can be sent to a MonitorActor
#[derive(Debug)]
pub enum MonitorCommand {
    /// Run one cycle right away, bypassing the interval timer
    ///
    /// Used for testing and manual refresh operations.
    RunNow {
        /// Channel to send the cycle outcome back
        respond_to: oneshot::Sender<anyhow::Result<CycleReport>>,
    },

    /// Gracefully shut down the monitor
    ///
    /// A cycle that is already running completes first. No new cycle is started.
    Shutdown,
}

/// Lifecycle of a monitor loop
///
/// ```text
/// Idle → Collecting → Persisting → Evaluating → Sleeping → Collecting → …
///                                                   (any) → Stopped
/// ```
///
/// A loop in alerting mode skips `Collecting` and `Persisting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Collecting,
    Persisting,
    Evaluating,
    Sleeping,
    Stopped,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MonitorState::Idle => "idle",
            MonitorState::Collecting => "collecting",
            MonitorState::Persisting => "persisting",
            MonitorState::Evaluating => "evaluating",
            MonitorState::Sleeping => "sleeping",
            MonitorState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Outcome of a single cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Record written during this cycle (collecting mode only)
    pub record: Option<RecordId>,

    /// Alerts produced by the evaluation, in evaluation order
    pub alerts: Vec<Alert>,
}
