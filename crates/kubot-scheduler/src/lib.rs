//! kubot-scheduler — runs a workspace's suites across pods and merges the
//! results.
//!
//! # Architecture
//!
//! ```text
//! Runner
//!   ├── Batcher (forward-only windows over the schedulable suites)
//!   ├── per batch: JoinSet of suite tasks, one ExecutionPod each
//!   │     └── join barrier before the next batch
//!   ├── Merger (one more pod running the aggregator over every output.xml)
//!   └── SharedVolume::download_output (always, even after a failed merge)
//! ```

pub mod error;
pub mod merger;
pub mod runner;

pub use error::{RunError, RunResult};
pub use merger::Merger;
pub use runner::{Runner, RunnerSettings};
