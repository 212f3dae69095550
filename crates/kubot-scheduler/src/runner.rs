//! Runner — batch fan-out with a join barrier, then merge and download.
//!
//! Every suite in a batch gets its own pod and its own task. The batch's
//! tasks are joined before the next batch is pulled, so at most
//! `batch_size` suite pods exist at any time. Suite failures are logged and
//! recorded in the [`RunSummary`]; only a merge failure ends the run with an
//! error.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use kubot_cluster::{ExecutionPod, PodSettings, SharedVolume, VolumeHandle};
use kubot_core::layout::suite_command;
use kubot_core::{Batcher, RunRecord, RunSummary, SuiteOutcome, WorkspaceTree};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{RunError, RunResult};
use crate::merger::Merger;

/// Fixed for the lifetime of a runner.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// Image of suite and merge pods.
    pub image: String,
    pub pod: PodSettings,
    /// Pause between the last batch and the merge.
    pub settle_delay: Duration,
    /// Local directory the combined output is downloaded into.
    pub results_dir: PathBuf,
    /// Write each suite's captured output to `<results_dir>/console/<suite>.log`.
    pub console_logs: bool,
}

/// What every suite task needs. Shared across the tasks of a run.
struct SuiteContext {
    volume: VolumeHandle,
    image: String,
    pod: PodSettings,
    console_dir: Option<PathBuf>,
}

pub struct Runner {
    settings: RunnerSettings,
    merger: Merger,
}

impl Runner {
    pub fn new(settings: RunnerSettings, merger: Merger) -> Self {
        Self { settings, merger }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Run every schedulable suite of `tree` in batches of `batch_size`,
    /// merge the results, and download them.
    ///
    /// The download is attempted even when the merge fails; its own failure
    /// is only logged.
    pub async fn run(
        &self,
        tree: &WorkspaceTree,
        volume: &SharedVolume,
        batch_size: NonZeroUsize,
    ) -> RunResult<RunSummary> {
        let handle = volume.handle().map_err(RunError::Volume)?;
        let ctx = Arc::new(SuiteContext {
            volume: handle.clone(),
            image: self.settings.image.clone(),
            pod: self.settings.pod.clone(),
            console_dir: self
                .settings
                .console_logs
                .then(|| self.settings.results_dir.join("console")),
        });

        let mut batcher = Batcher::new(batch_size, tree.schedulable().to_vec());
        let mut outcomes = Vec::with_capacity(batcher.remaining());
        let mut batches = 0;

        let started_at = Utc::now();
        info!(
            suites = batcher.remaining(),
            batch_size = batch_size.get(),
            "run started"
        );

        while let Some(batch) = batcher.next_batch() {
            batches += 1;
            info!(batch = batches, suites = ?batch, "starting batch");
            outcomes.extend(run_batch(&ctx, batch).await);
        }

        let completed_at = Utc::now();
        let record = RunRecord {
            started_at,
            completed_at,
        };
        let summary = RunSummary {
            record,
            batches,
            suites: outcomes,
        };
        info!(
            batches,
            suites = summary.suites.len(),
            failed = summary.failed_count(),
            elapsed_secs = record.elapsed().num_seconds(),
            "all batches finished"
        );

        if !self.settings.settle_delay.is_zero() {
            debug!(delay = ?self.settings.settle_delay, "settling before merge");
            tokio::time::sleep(self.settings.settle_delay).await;
        }

        let merged = self
            .merger
            .merge_results(&handle, &self.settings.image, &self.settings.pod, &record)
            .await;
        if let Err(e) = &merged {
            error!(error = %e, "merge failed");
        }

        if let Err(e) = volume.download_output(&self.settings.results_dir).await {
            warn!(
                dir = %self.settings.results_dir.display(),
                error = %e,
                "failed to download output"
            );
        }

        merged.map_err(RunError::Merge)?;
        Ok(summary)
    }
}

/// Fan out one task per suite and wait for all of them.
async fn run_batch(ctx: &Arc<SuiteContext>, batch: &[String]) -> Vec<SuiteOutcome> {
    let mut tasks = JoinSet::new();
    for suite in batch {
        tasks.spawn(run_suite(Arc::clone(ctx), suite.clone()));
    }

    let mut outcomes = Vec::with_capacity(batch.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => error!(error = %e, "suite task aborted"),
        }
    }

    // A panicked task leaves no outcome behind; record it by elimination.
    if outcomes.len() < batch.len() {
        let reported: BTreeSet<&str> = outcomes.iter().map(|o| o.suite.as_str()).collect();
        let missing: Vec<SuiteOutcome> = batch
            .iter()
            .filter(|suite| !reported.contains(suite.as_str()))
            .map(|suite| SuiteOutcome::failed(suite.clone(), "suite task aborted"))
            .collect();
        outcomes.extend(missing);
    }
    outcomes
}

async fn run_suite(ctx: Arc<SuiteContext>, suite: String) -> SuiteOutcome {
    let mut pod = match ExecutionPod::create(&ctx.volume, &ctx.image, &ctx.pod).await {
        Ok(pod) => pod,
        Err(e) => {
            error!(%suite, error = %e, "could not start pod for suite");
            return SuiteOutcome::failed(suite, e.to_string());
        }
    };

    let result = pod.exec(&suite_command(&suite)).await;
    pod.release().await;

    match result {
        Ok(out) => {
            if !out.succeeded() {
                debug!(%suite, output = %out.output, "suite output");
            }
            if let Some(dir) = &ctx.console_dir {
                save_console(dir, &suite, &out.output).await;
            }
            info!(%suite, exit_code = ?out.exit_code, "suite finished");
            SuiteOutcome::completed(suite, out.exit_code)
        }
        Err(e) => {
            error!(%suite, error = %e, "suite failed");
            SuiteOutcome::failed(suite, e.to_string())
        }
    }
}

async fn save_console(dir: &Path, suite: &str, output: &str) {
    let path = dir.join(format!("{suite}.log"));
    let written = async {
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, output).await
    }
    .await;
    if let Err(e) = written {
        warn!(path = %path.display(), error = %e, "failed to save console output");
    }
}
