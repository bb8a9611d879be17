//! Download task tracking.
//!
//! - [`task`]: the task value object and its state machine.
//! - [`registry`]: the concurrent, registration-ordered store of tasks.
//! - [`reporter`]: serialisable snapshots for the dashboard.
//! - [`executor`]: the trait implemented by the component that transfers files.
//! - [`tracker`]: glue that spawns executors and runs the cancellation protocol.

pub mod executor;
pub mod registry;
pub mod reporter;
pub mod task;
pub mod tracker;

pub use executor::{DownloadExecutor, DownloadJob, ExecutionOutcome, ProgressHandle};
pub use registry::{CancelDecision, RemoveDecision, TaskRegistry};
pub use reporter::{DownloadSnapshot, StatusReporter};
pub use task::{DownloadStatus, DownloadTask, TaskUpdate};
pub use tracker::DownloadTracker;
