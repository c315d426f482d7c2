//! Snapshot persistence
//!
//! Every snapshot is stored as its own self-describing record. There is no shared
//! index, so a crash between two writes can never damage earlier records.
//!
//! ## Design
//!
//! - **Trait-based**: `SnapshotStore` keeps the monitor loops independent of the medium
//! - **Async**: All operations are async for use from Tokio actors
//! - **Append-only**: records are never rewritten or deleted by this crate
//!
//! ## Backends
//!
//! - **Directory** (default): one JSON file per snapshot, named after its timestamp
//!
//! ## Usage
//!
//! ```no_run
//! use db_monitoring::storage::{SnapshotStore, directory::DirectoryStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = DirectoryStore::open("./monitoring_logs").await?;
//!     let latest = store.latest().await?;
//!     println!("latest snapshot taken at {}", latest.timestamp);
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod directory;
pub mod error;
pub mod record;

pub use backend::{SnapshotStore, history};
pub use error::{StorageError, StorageResult};
pub use record::RecordId;
