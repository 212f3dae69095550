//! End-to-end runs against the in-memory cluster.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use kubot_cluster::fake::{Call, FakeCluster};
use kubot_cluster::{ClusterSession, PodSettings, SharedVolume, VolumeSettings};
use kubot_core::layout::{merge_command, suite_command};
use kubot_core::{SuiteStatus, WorkspaceTree};
use kubot_scheduler::{Merger, RunError, Runner, RunnerSettings};

struct Harness {
    fake: Arc<FakeCluster>,
    volume: SharedVolume,
    tree: WorkspaceTree,
    runner: Runner,
    _workspace: tempfile::TempDir,
    results: tempfile::TempDir,
}

fn fast_pods() -> PodSettings {
    PodSettings {
        poll_interval: Duration::from_millis(2),
        start_timeout: Duration::from_millis(500),
    }
}

async fn harness(fake: FakeCluster, suites: &[&str], console_logs: bool) -> Harness {
    let fake = Arc::new(fake);
    let workspace = tempfile::tempdir().unwrap();
    for suite in suites {
        std::fs::write(workspace.path().join(suite), "*** Test Cases ***\n").unwrap();
    }
    std::fs::create_dir(workspace.path().join("resources")).unwrap();
    let tree = WorkspaceTree::scan(workspace.path()).unwrap();

    let session = ClusterSession::new(fake.clone(), "qa");
    let mut volume = SharedVolume::create(
        session,
        VolumeSettings {
            poll_interval: Duration::from_millis(2),
            ..VolumeSettings::default()
        },
    )
    .await
    .unwrap();
    volume.init_directories(&tree, &fast_pods()).await.unwrap();

    let results = tempfile::tempdir().unwrap();
    let runner = Runner::new(
        RunnerSettings {
            image: "robot:latest".to_string(),
            pod: fast_pods(),
            settle_delay: Duration::ZERO,
            results_dir: results.path().join(".kubot"),
            console_logs,
        },
        Merger::new("Regression"),
    );

    Harness {
        fake,
        volume,
        tree,
        runner,
        _workspace: workspace,
        results,
    }
}

fn batch(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn position(calls: &[Call], wanted: &Call) -> usize {
    calls
        .iter()
        .position(|c| c == wanted)
        .unwrap_or_else(|| panic!("{wanted:?} not recorded"))
}

fn exec_index(calls: &[Call], command: &[String]) -> usize {
    calls
        .iter()
        .position(|c| matches!(c, Call::Exec { command: cmd, .. } if cmd == command))
        .unwrap_or_else(|| panic!("{command:?} never exec'd"))
}

#[tokio::test]
async fn three_suites_in_batches_of_two() {
    let h = harness(
        FakeCluster::new().with_exec_delay(Duration::from_millis(20)),
        &["a.robot", "b.robot", "c.robot"],
        false,
    )
    .await;

    let summary = h.runner.run(&h.tree, &h.volume, batch(2)).await.unwrap();

    assert_eq!(summary.batches, 2);
    assert_eq!(summary.suites.len(), 3);
    assert_eq!(summary.failed_count(), 0);
    assert!(summary.record.started_at <= summary.record.completed_at);

    let calls = h.fake.calls();
    let a = exec_index(&calls, &suite_command("a.robot"));
    let b = exec_index(&calls, &suite_command("b.robot"));
    let c = exec_index(&calls, &suite_command("c.robot"));
    let merge = exec_index(&calls, &merge_command("Regression", &summary.record));

    // a and b share the first batch; c waits for both.
    assert!(a < c && b < c);
    assert!(c < merge);
    assert_eq!(h.fake.max_concurrent_execs(), 2);

    // Three suite pods, one merge pod, and the retained init pod.
    assert_eq!(h.fake.pods_created(), 5);
    assert_eq!(h.fake.live_pods(), 1);
}

#[tokio::test]
async fn every_pod_gets_the_forwarded_environment() {
    let h = harness(FakeCluster::new(), &["a.robot", "b.robot"], false).await;

    h.runner.run(&h.tree, &h.volume, batch(2)).await.unwrap();

    let expected = kubot_cluster::env::from_process();
    let created: Vec<String> = h
        .fake
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::CreatePod { pod } => Some(pod),
            _ => None,
        })
        .collect();
    // Init pod, two suite pods, merge pod.
    assert_eq!(created.len(), 4);
    for pod in created {
        let request = h.fake.pod_request(&pod).unwrap();
        assert_eq!(request.env, expected, "{pod} env");
    }
}

#[tokio::test]
async fn subdirectories_are_never_scheduled() {
    let h = harness(FakeCluster::new(), &["a.robot"], false).await;

    let summary = h.runner.run(&h.tree, &h.volume, batch(4)).await.unwrap();

    assert_eq!(summary.suites.len(), 1);
    assert_eq!(summary.suites[0].suite, "a.robot");
    assert!(h.tree.root().child("resources").is_some());
    assert!(
        !h.fake
            .exec_commands()
            .iter()
            .any(|cmd| cmd.iter().any(|arg| arg.contains("resources")))
    );
}

#[tokio::test]
async fn concurrency_never_exceeds_batch_size() {
    let suites: Vec<String> = (1..=7).map(|i| format!("s{i}.robot")).collect();
    let names: Vec<&str> = suites.iter().map(String::as_str).collect();
    let h = harness(
        FakeCluster::new().with_exec_delay(Duration::from_millis(15)),
        &names,
        false,
    )
    .await;

    let summary = h.runner.run(&h.tree, &h.volume, batch(3)).await.unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.suites.len(), 7);
    assert_eq!(h.fake.max_concurrent_execs(), 3);
}

#[tokio::test]
async fn failing_suite_does_not_stop_the_run() {
    let h = harness(
        FakeCluster::new()
            .with_failing_exec("b.robot")
            .with_exec_delay(Duration::from_millis(5)),
        &["a.robot", "b.robot", "c.robot"],
        false,
    )
    .await;

    let summary = h.runner.run(&h.tree, &h.volume, batch(2)).await.unwrap();

    assert_eq!(summary.suites.len(), 3);
    let failed: Vec<&str> = summary.failed().map(|o| o.suite.as_str()).collect();
    assert_eq!(failed, vec!["b.robot"]);

    let calls = h.fake.calls();
    let c = exec_index(&calls, &suite_command("c.robot"));
    let merge = exec_index(&calls, &merge_command("Regression", &summary.record));
    assert!(c < merge);

    // The failing suite's pod was still deleted.
    assert_eq!(h.fake.live_pods(), 1);
}

#[tokio::test]
async fn non_zero_suite_exit_is_completed() {
    let h = harness(
        FakeCluster::new().with_exit_code("a.robot", 1),
        &["a.robot"],
        false,
    )
    .await;

    let summary = h.runner.run(&h.tree, &h.volume, batch(1)).await.unwrap();

    assert_eq!(
        summary.suites[0].status,
        SuiteStatus::Completed { exit_code: Some(1) }
    );
    assert_eq!(summary.failed_count(), 0);
}

#[tokio::test]
async fn suite_pods_are_gone_before_merge_starts() {
    let h = harness(FakeCluster::new(), &["a.robot", "b.robot"], false).await;

    let summary = h.runner.run(&h.tree, &h.volume, batch(2)).await.unwrap();

    let calls = h.fake.calls();
    let merge = exec_index(&calls, &merge_command("Regression", &summary.record));
    let suite_pods: Vec<String> = calls
        .iter()
        .filter_map(|c| match c {
            Call::Exec { pod, command } if command[0] == "robot" => Some(pod.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(suite_pods.len(), 2);
    for pod in suite_pods {
        assert!(position(&calls, &Call::DeletePod { pod }) < merge);
    }
}

#[tokio::test]
async fn merge_failure_surfaces_but_output_is_downloaded() {
    let h = harness(
        FakeCluster::new().with_failing_exec("rebot"),
        &["a.robot", "b.robot"],
        false,
    )
    .await;

    let err = h.runner.run(&h.tree, &h.volume, batch(2)).await.unwrap_err();
    assert!(matches!(err, RunError::Merge(_)));

    let calls = h.fake.calls();
    let merge = calls
        .iter()
        .position(|c| matches!(c, Call::Exec { command, .. } if command[0] == "rebot"))
        .unwrap();
    let download = calls
        .iter()
        .position(|c| matches!(c, Call::CopyFrom { .. }))
        .expect("download attempted");
    assert!(merge < download);
    assert!(h.results.path().join(".kubot").is_dir());
}

#[tokio::test]
async fn download_failure_is_not_fatal() {
    let h = harness(FakeCluster::new().with_failing_download(), &["a.robot"], false).await;

    let summary = h.runner.run(&h.tree, &h.volume, batch(1)).await.unwrap();
    assert_eq!(summary.suites.len(), 1);
}

#[tokio::test]
async fn console_logs_are_written_when_enabled() {
    let h = harness(FakeCluster::new(), &["a.robot", "b.robot"], true).await;

    h.runner.run(&h.tree, &h.volume, batch(2)).await.unwrap();

    let console = h.results.path().join(".kubot").join("console");
    for suite in ["a.robot", "b.robot"] {
        let log = std::fs::read_to_string(console.join(format!("{suite}.log"))).unwrap();
        assert!(log.contains(&format!("/data/workspace/scripts/{suite}")));
    }
}

#[tokio::test]
async fn empty_workspace_still_merges() {
    let h = harness(FakeCluster::new(), &[], false).await;

    let summary = h.runner.run(&h.tree, &h.volume, batch(3)).await.unwrap();

    assert_eq!(summary.batches, 0);
    assert!(summary.suites.is_empty());
    assert_eq!(h.fake.exec_commands().len(), 2, "layout init and merge only");
}

#[tokio::test]
async fn destroying_volume_after_run_cleans_everything() {
    let mut h = harness(FakeCluster::new(), &["a.robot"], false).await;
    h.runner.run(&h.tree, &h.volume, batch(1)).await.unwrap();

    h.volume.destroy().await.unwrap();
    h.volume.destroy().await.unwrap();

    assert_eq!(h.fake.live_pods(), 0);
    assert_eq!(h.fake.live_claims(), 0);
}
