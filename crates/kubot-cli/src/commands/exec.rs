use std::path::{Path, PathBuf};

use anyhow::Context;
use kubot_cluster::{ClusterSession, PodSettings, SharedVolume, VolumeSettings};
use kubot_core::{KubotConfig, RunSummary, SuiteStatus, WorkspaceTree};
use kubot_scheduler::{Merger, Runner, RunnerSettings};
use tracing::{info, warn};

/// `kubot exec` flags. `None` leaves the config value alone.
#[derive(Debug, Default)]
pub struct ExecOptions {
    pub workspace: PathBuf,
    pub config: Option<PathBuf>,
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub image: Option<String>,
    pub batch_size: Option<usize>,
    pub storage_class: Option<String>,
    pub results_dir: Option<PathBuf>,
    pub console_logs: bool,
}

impl ExecOptions {
    fn apply(&self, config: &mut KubotConfig) {
        if let Some(name) = &self.name {
            config.run.name = name.clone();
        }
        if let Some(namespace) = &self.namespace {
            config.cluster.namespace = namespace.clone();
        }
        if let Some(image) = &self.image {
            config.pod.image = image.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.run.batch_size = batch_size;
        }
        if let Some(class) = &self.storage_class {
            config.volume.storage_class = Some(class.clone());
        }
        if let Some(dir) = &self.results_dir {
            config.run.results_dir = dir.clone();
        }
        if self.console_logs {
            config.run.console_logs = true;
        }
    }
}

/// Load kubot.toml, apply flags, and validate.
pub fn resolve_config(opts: &ExecOptions, dir: &Path) -> anyhow::Result<KubotConfig> {
    let mut config = KubotConfig::discover(opts.config.as_deref(), dir)
        .context("failed to load kubot.toml")?;
    opts.apply(&mut config);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn pod_settings(config: &KubotConfig) -> PodSettings {
    PodSettings {
        poll_interval: config.poll_interval(),
        start_timeout: config.start_timeout(),
    }
}

fn volume_settings(config: &KubotConfig) -> VolumeSettings {
    VolumeSettings {
        size: config.volume.size.clone(),
        storage_class: config.volume.storage_class.clone(),
        poll_interval: config.poll_interval(),
        bind_timeout: config.bind_timeout(),
        init_image: config.pod.init_image.clone(),
    }
}

pub async fn exec(opts: ExecOptions) -> anyhow::Result<()> {
    let config = resolve_config(&opts, Path::new("."))?;
    let batch_size = config.batch_size()?;

    let tree = WorkspaceTree::scan(&opts.workspace)
        .with_context(|| format!("failed to index workspace {}", opts.workspace.display()))?;
    info!(
        workspace = %opts.workspace.display(),
        suites = tree.schedulable().len(),
        "workspace indexed"
    );

    let session = ClusterSession::connect(config.cluster.namespace.clone())
        .await
        .context("failed to connect to the cluster")?;
    let mut volume = SharedVolume::create(session, volume_settings(&config))
        .await
        .context("failed to create the shared volume")?;

    let outcome = run(&config, &tree, &mut volume, batch_size).await;

    if let Err(e) = volume.destroy().await {
        warn!(claim = %volume.claim_name(), error = %e, "failed to clean up shared volume");
    }

    let summary = outcome?;
    print_summary(&summary, &config);
    Ok(())
}

async fn run(
    config: &KubotConfig,
    tree: &WorkspaceTree,
    volume: &mut SharedVolume,
    batch_size: std::num::NonZeroUsize,
) -> anyhow::Result<RunSummary> {
    let pods = pod_settings(config);
    volume
        .init_directories(tree, &pods)
        .await
        .context("failed to seed the shared volume")?;

    let runner = Runner::new(
        RunnerSettings {
            image: config.pod.image.clone(),
            pod: pods,
            settle_delay: config.settle_delay(),
            results_dir: config.run.results_dir.clone(),
            console_logs: config.run.console_logs,
        },
        Merger::new(config.run.name.clone()),
    );

    Ok(runner.run(tree, volume, batch_size).await?)
}

fn print_summary(summary: &RunSummary, config: &KubotConfig) {
    println!(
        "✓ Ran {} suites in {} batches ({}s)",
        summary.suites.len(),
        summary.batches,
        summary.record.elapsed().num_seconds()
    );
    for outcome in &summary.suites {
        match &outcome.status {
            SuiteStatus::Completed { exit_code } => match exit_code {
                Some(0) | None => println!("  {}  ok", outcome.suite),
                Some(code) => println!("  {}  exit {code}", outcome.suite),
            },
            SuiteStatus::Failed { reason } => println!("  {}  FAILED: {reason}", outcome.suite),
        }
    }
    println!("  Results: {}", config.run.results_dir.display());
}
