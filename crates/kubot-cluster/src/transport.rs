//! External copy transport — `kubectl cp`.
//!
//! The kube client has no file-copy call, so copies shell out to kubectl:
//!
//! ```text
//! kubectl cp <local> <pod>:<remote> -n <namespace>
//! kubectl cp <pod>:<remote> <local> -n <namespace>
//! ```
//!
//! A non-zero exit is an error carrying the combined output.

use std::path::Path;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ClusterError, ClusterResult};

/// Runs copies through an external kubectl binary.
#[derive(Debug, Clone)]
pub struct CopyTransport {
    program: String,
}

impl Default for CopyTransport {
    fn default() -> Self {
        Self {
            program: "kubectl".to_string(),
        }
    }
}

impl CopyTransport {
    /// Use a specific kubectl binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub async fn copy_to(
        &self,
        namespace: &str,
        pod: &str,
        local: &Path,
        remote: &str,
    ) -> ClusterResult<()> {
        let args = vec![
            "cp".to_string(),
            local_arg(local),
            format!("{pod}:{remote}"),
            "-n".to_string(),
            namespace.to_string(),
        ];
        self.run(pod, &args).await
    }

    pub async fn copy_from(
        &self,
        namespace: &str,
        pod: &str,
        remote: &str,
        local: &Path,
    ) -> ClusterResult<()> {
        let args = vec![
            "cp".to_string(),
            format!("{pod}:{remote}"),
            local_arg(local),
            "-n".to_string(),
            namespace.to_string(),
        ];
        self.run(pod, &args).await
    }

    async fn run(&self, pod: &str, args: &[String]) -> ClusterResult<()> {
        info!(%pod, program = %self.program, ?args, "copy");

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .await
            .map_err(|source| ClusterError::CopyLaunch {
                program: self.program.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(ClusterError::Copy {
                status: output.status.to_string(),
                output: combined.trim().to_string(),
            });
        }

        debug!(%pod, output = %combined.trim(), "copy finished");
        Ok(())
    }
}

fn local_arg(path: &Path) -> String {
    kubectl_local_path(&path.to_string_lossy(), cfg!(windows))
}

/// kubectl reads `C:\x` as pod `C`, path `\x`. On Windows the drive prefix is
/// rewritten to a rooted path (`\c\x`) so the argument stays local.
pub fn kubectl_local_path(path: &str, windows: bool) -> String {
    let bytes = path.as_bytes();
    if windows && bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        let drive = (bytes[0] as char).to_ascii_lowercase();
        return format!("\\{drive}{}", &path[2..]);
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_prefix_is_rewritten_on_windows() {
        assert_eq!(kubectl_local_path(r"C:\tmp\ws", true), r"\c\tmp\ws");
        assert_eq!(kubectl_local_path(r"d:\ws", true), r"\d\ws");
    }

    #[test]
    fn other_paths_are_untouched() {
        assert_eq!(kubectl_local_path(r"C:\tmp\ws", false), r"C:\tmp\ws");
        assert_eq!(kubectl_local_path("/tmp/ws", true), "/tmp/ws");
        assert_eq!(kubectl_local_path("C", true), "C");
        assert_eq!(kubectl_local_path("./scripts", true), "./scripts");
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let transport = CopyTransport::with_program("kubot-no-such-kubectl");
        let err = transport
            .copy_to("ns", "pod", Path::new("."), "/data")
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::CopyLaunch { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_carries_output() {
        // `false` ignores its arguments and exits 1.
        let transport = CopyTransport::with_program("false");
        let err = transport
            .copy_from("ns", "pod", "/data/output/", Path::new(".kubot"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::Copy { .. }));
    }
}
