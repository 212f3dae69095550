//! Merger — combines every suite's raw result into one report.

use kubot_cluster::{ClusterResult, ExecOutput, ExecutionPod, PodSettings, VolumeHandle};
use kubot_core::layout::{MERGE_TIME_FORMAT, merge_command};
use kubot_core::RunRecord;
use tracing::{debug, info, warn};

/// Runs the aggregator over `/data/output/*/output.xml` in a dedicated pod.
#[derive(Debug, Clone)]
pub struct Merger {
    top_level_suite_name: String,
}

impl Merger {
    pub fn new(top_level_suite_name: impl Into<String>) -> Self {
        Self {
            top_level_suite_name: top_level_suite_name.into(),
        }
    }

    pub fn top_level_suite_name(&self) -> &str {
        &self.top_level_suite_name
    }

    /// Create a pod, run the aggregator bounded by `record`, and delete the
    /// pod whether or not the aggregator ran.
    pub async fn merge_results(
        &self,
        volume: &VolumeHandle,
        image: &str,
        pod_settings: &PodSettings,
        record: &RunRecord,
    ) -> ClusterResult<ExecOutput> {
        let mut pod = ExecutionPod::create(volume, image, pod_settings).await?;

        let command = merge_command(&self.top_level_suite_name, record);
        let result = pod.exec(&command).await;
        pod.release().await;
        let out = result?;

        if !out.succeeded() {
            // The aggregator exits non-zero when the merged suites contain failures.
            warn!(exit_code = ?out.exit_code, "aggregator reported failures");
            debug!(output = %out.output, "aggregator output");
        }
        info!(
            name = %self.top_level_suite_name,
            start = %record.started_at.format(MERGE_TIME_FORMAT),
            end = %record.completed_at.format(MERGE_TIME_FORMAT),
            "results merged"
        );
        Ok(out)
    }
}
