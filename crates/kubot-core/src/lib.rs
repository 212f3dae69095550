//! kubot-core — cluster-independent building blocks.
//!
//! - **`workspace`** — scans a workspace root into a tree of directories
//!   and yields the schedulable suite files (root level only)
//! - **`batch`** — forward-only cursor that slices the suite list into
//!   bounded windows
//! - **`layout`** — fixed paths on the shared volume and the remote
//!   runner/aggregator command lines
//! - **`types`** — run bookkeeping (`RunRecord`, `SuiteOutcome`, `RunSummary`)
//! - **`config`** — `kubot.toml` parsing and validation

pub mod batch;
pub mod config;
pub mod error;
pub mod layout;
pub mod types;
pub mod workspace;

pub use batch::Batcher;
pub use config::KubotConfig;
pub use error::{CoreError, CoreResult};
pub use types::*;
pub use workspace::{DirNode, WorkspaceTree};
