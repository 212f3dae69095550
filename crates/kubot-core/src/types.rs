//! Run bookkeeping types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time window of the batch loop, captured by the runner and consumed by the
/// merge step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunRecord {
    /// Wall-clock duration of the window.
    pub fn elapsed(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

/// How a single suite task ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SuiteStatus {
    /// The remote command ran to completion. The exit code is reported when
    /// the cluster provides it; a non-zero code still counts as completed.
    Completed { exit_code: Option<i32> },
    /// The pod could not be created or the command could not be run.
    Failed { reason: String },
}

/// Outcome of one suite task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteOutcome {
    pub suite: String,
    #[serde(flatten)]
    pub status: SuiteStatus,
}

impl SuiteOutcome {
    pub fn completed(suite: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            suite: suite.into(),
            status: SuiteStatus::Completed { exit_code },
        }
    }

    pub fn failed(suite: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            status: SuiteStatus::Failed {
                reason: reason.into(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, SuiteStatus::Failed { .. })
    }
}

/// Everything the runner learned about a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub record: RunRecord,
    /// Number of batches executed.
    pub batches: usize,
    /// Outcomes in completion order.
    pub suites: Vec<SuiteOutcome>,
}

impl RunSummary {
    pub fn failed(&self) -> impl Iterator<Item = &SuiteOutcome> {
        self.suites.iter().filter(|s| s.is_failed())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }
}
