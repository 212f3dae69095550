//! Run error types.

use kubot_cluster::ClusterError;
use thiserror::Error;

/// Errors that end a run. Per-suite failures never show up here.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("shared volume unavailable: {0}")]
    Volume(#[source] ClusterError),

    #[error("merging results failed: {0}")]
    Merge(#[source] ClusterError),
}

pub type RunResult<T> = Result<T, RunError>;
