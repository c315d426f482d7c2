//! Actor-based monitor loops
//!
//! Each monitor loop runs as an independent async task controlled through a
//! [`monitor::MonitorHandle`]. Two loops may work on the same snapshots at their own
//! cadence. They never share memory, only the store:
//!
//! ```text
//!   ┌──────────────────────┐                      ┌──────────────────────┐
//!   │ dbmon-collector      │                      │ dbmon-alerter        │
//!   │ MonitorActor         │                      │ MonitorActor         │
//!   │ (Collecting)         │                      │ (Alerting)           │
//!   └──────────┬───────────┘                      └──────────┬───────────┘
//!              │ save()                              latest() │
//!              │            ┌──────────────────┐             │
//!              └──────────▶│  SnapshotStore   │◀────────────┘
//!                           └──────────────────┘
//!              │                                             │
//!              ▼                                             ▼
//!        evaluate() → AlertSink                      evaluate() → AlertSink
//! ```
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: an mpsc channel per actor for control messages
//! 2. **State**: a watch channel publishing the current [`messages::MonitorState`]
//! 3. **Request/Response**: oneshot channels for `RunNow`

pub mod messages;
pub mod monitor;
