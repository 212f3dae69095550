//! Shared-volume layout and remote command lines.
//!
//! Every execution pod mounts the shared volume at [`MOUNT_PATH`]. Suite
//! output is namespaced per suite under [`OUTPUT_DIR`], which is what lets
//! sibling pods write concurrently without coordination.

use crate::types::RunRecord;

/// Where the shared volume is mounted inside every pod.
pub const MOUNT_PATH: &str = "/data";
/// Seeded workspace content.
pub const WORKSPACE_DIR: &str = "/data/workspace";
/// Workspace root files land here.
pub const SCRIPTS_DIR: &str = "/data/workspace/scripts";
/// Per-suite output directories and the combined report.
pub const OUTPUT_DIR: &str = "/data/output";
/// Reserved for console captures.
pub const CONSOLE_DIR: &str = "/data/console";

/// Test runner binary inside the execution image.
pub const RUNNER_TOOL: &str = "robot";
/// Aggregator binary inside the execution image.
pub const MERGE_TOOL: &str = "rebot";

/// Timestamp format the aggregator accepts for `--starttime`/`--endtime`.
pub const MERGE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Output directory of one suite.
pub fn suite_output_dir(suite: &str) -> String {
    format!("{OUTPUT_DIR}/{suite}")
}

/// Remote path of one suite script.
pub fn suite_script_path(suite: &str) -> String {
    format!("{SCRIPTS_DIR}/{suite}")
}

/// Raw results of every suite, as a pattern the aggregator expands.
pub fn merge_inputs() -> String {
    format!("{OUTPUT_DIR}/*/output.xml")
}

/// Creates the fixed directory layout on a fresh volume.
pub fn init_layout_command() -> Vec<String> {
    ["mkdir", "-p", WORKSPACE_DIR, OUTPUT_DIR, CONSOLE_DIR]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Runs one suite with on-pod log/report generation disabled.
pub fn suite_command(suite: &str) -> Vec<String> {
    vec![
        RUNNER_TOOL.to_string(),
        "--log".to_string(),
        "NONE".to_string(),
        "--report".to_string(),
        "NONE".to_string(),
        "--outputdir".to_string(),
        suite_output_dir(suite),
        suite_script_path(suite),
    ]
}

/// Combines every suite's `output.xml` into one report bounded by the run window.
pub fn merge_command(top_level_suite_name: &str, record: &RunRecord) -> Vec<String> {
    vec![
        MERGE_TOOL.to_string(),
        "--name".to_string(),
        top_level_suite_name.to_string(),
        "--starttime".to_string(),
        record.started_at.format(MERGE_TIME_FORMAT).to_string(),
        "--endtime".to_string(),
        record.completed_at.format(MERGE_TIME_FORMAT).to_string(),
        "--outputdir".to_string(),
        OUTPUT_DIR.to_string(),
        merge_inputs(),
    ]
}
