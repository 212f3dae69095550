use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

use commands::exec::ExecOptions;

#[derive(Parser)]
#[command(
    name = "kubot",
    about = "kubot — run a Robot Framework workspace across Kubernetes pods",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Log at debug level; ignored when RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every suite of a workspace in batches and merge the results.
    ///
    /// Flags override values from kubot.toml (read from --config, or the
    /// current directory when present).
    Exec {
        /// Workspace root; only files directly under it are scheduled
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
        /// Top-level suite name of the combined report
        #[arg(short, long)]
        name: Option<String>,
        /// Namespace every resource is created in
        #[arg(long)]
        namespace: Option<String>,
        /// Image with the test runner and aggregator installed
        #[arg(short, long)]
        image: Option<String>,
        /// Number of suites run concurrently
        #[arg(short, long = "batchsize", alias = "batch-size")]
        batch_size: Option<usize>,
        /// Storage class of the shared volume (cluster default if unset)
        #[arg(long)]
        storage_class: Option<String>,
        /// Local directory the combined output is downloaded into
        #[arg(long)]
        results_dir: Option<PathBuf>,
        /// Save each suite's console output under <results-dir>/console
        #[arg(long)]
        console_logs: bool,
        /// Path to kubot.toml
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write a kubot.toml scaffold
    Init {
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
        #[arg(long, default_value = "default")]
        namespace: String,
        #[arg(short, long, default_value = "")]
        image: String,
        /// Overwrite an existing kubot.toml
        #[arg(short, long)]
        force: bool,
    },
    /// Show what a run would schedule, without touching the cluster
    Index {
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let directives = log_directives(cli.verbose, std::env::var("RUST_LOG").ok());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_new(directives)?)
        .init();

    match cli.command {
        Commands::Exec {
            workspace,
            name,
            namespace,
            image,
            batch_size,
            storage_class,
            results_dir,
            console_logs,
            config,
        } => {
            commands::exec::exec(ExecOptions {
                workspace,
                config,
                name,
                namespace,
                image,
                batch_size,
                storage_class,
                results_dir,
                console_logs,
            })
            .await
        }
        Commands::Init {
            path,
            namespace,
            image,
            force,
        } => commands::init::init(&path, &namespace, &image, force),
        Commands::Index { workspace, format } => commands::index::index(&workspace, &format),
    }
}

/// RUST_LOG when set, otherwise kubot's own level.
fn log_directives(verbose: bool, rust_log: Option<String>) -> String {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => directives,
        _ if verbose => "kubot=debug".to_string(),
        _ => "kubot=info".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_default_level() {
        assert_eq!(log_directives(false, None), "kubot=info");
        assert_eq!(log_directives(true, None), "kubot=debug");
        assert_eq!(log_directives(true, Some(String::new())), "kubot=debug");
    }

    #[test]
    fn rust_log_overrides_verbose() {
        assert_eq!(log_directives(true, Some("kubot=warn".to_string())), "kubot=warn");
        assert_eq!(log_directives(false, Some("trace".to_string())), "trace");
    }
}
