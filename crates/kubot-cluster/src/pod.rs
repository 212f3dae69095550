//! Execution pod — one ephemeral compute unit mounting the shared volume.
//!
//! ```text
//! create ──► Pending ──(poll)──► Running ──► exec / copy ──► destroy
//!              │                                   ▲
//!              └── timeout / terminal phase ───────┘ (deleted, error returned)
//! ```
//!
//! A pod is released exactly once: by [`ExecutionPod::destroy`], or, if the
//! owner never got that far, by a best-effort delete spawned from `Drop`.

use std::path::Path;
use std::time::Duration;

use kubot_core::layout::MOUNT_PATH;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{ExecOutput, PodPhase, PodRequest};
use crate::env;
use crate::error::{ClusterError, ClusterResult};
use crate::session::ClusterSession;
use crate::volume::VolumeHandle;

/// Generated pod names start with this.
pub const POD_NAME_PREFIX: &str = "kubot";

/// Keeps the container alive so commands can be exec'd into it.
const PLACEHOLDER_COMMAND: [&str; 2] = ["sleep", "infinity"];

/// Start-up polling behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodSettings {
    pub poll_interval: Duration,
    pub start_timeout: Duration,
}

impl Default for PodSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            start_timeout: Duration::from_secs(300),
        }
    }
}

/// A running pod that has the shared volume mounted at `/data`.
#[derive(Debug)]
pub struct ExecutionPod {
    session: ClusterSession,
    name: String,
    deleted: bool,
}

impl ExecutionPod {
    /// Submit a pod from `image` and block until it is Running.
    ///
    /// The container's environment is the forwardable subset of this
    /// process's environment. If the pod does not start, it is deleted before
    /// the error is returned.
    pub async fn create(
        volume: &VolumeHandle,
        image: &str,
        settings: &PodSettings,
    ) -> ClusterResult<Self> {
        let session = volume.session().clone();
        let request = PodRequest {
            name_prefix: POD_NAME_PREFIX.to_string(),
            image: image.to_string(),
            command: PLACEHOLDER_COMMAND.iter().map(|s| s.to_string()).collect(),
            env: env::from_process(),
            claim_name: volume.claim_name().to_string(),
            mount_path: MOUNT_PATH.to_string(),
        };

        let name = session
            .backend()
            .create_pod(session.namespace(), &request)
            .await?;
        debug!(pod = %name, %image, "pod submitted");

        let mut pod = Self {
            session,
            name,
            deleted: false,
        };

        if let Err(e) = pod.wait_until_running(settings).await {
            pod.release().await;
            return Err(e);
        }

        info!(pod = %pod.name, %image, "pod running");
        Ok(pod)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        self.session.namespace()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Run `command` in the pod and capture its combined output. The remote
    /// exit status is reported, not enforced.
    pub async fn exec(&self, command: &[String]) -> ClusterResult<ExecOutput> {
        info!(pod = %self.name, ?command, "exec");
        let result = self
            .session
            .backend()
            .exec(self.session.namespace(), &self.name, command)
            .await;

        match &result {
            Ok(out) if !out.succeeded() => {
                warn!(pod = %self.name, exit_code = ?out.exit_code, "command exited non-zero");
            }
            Err(e) => warn!(pod = %self.name, error = %e, "exec failed"),
            _ => {}
        }
        result
    }

    /// Copy a local path into the pod.
    pub async fn copy_in(&self, local: &Path, remote: &str) -> ClusterResult<()> {
        self.session
            .backend()
            .copy_to_pod(self.session.namespace(), &self.name, local, remote)
            .await
    }

    /// Copy a remote path out of the pod.
    pub async fn copy_out(&self, remote: &str, local: &Path) -> ClusterResult<()> {
        self.session
            .backend()
            .copy_from_pod(self.session.namespace(), &self.name, remote, local)
            .await
    }

    /// Delete the pod. Once a delete succeeds, further calls are no-ops; a
    /// failed delete is retried by the next call, or by `Drop`.
    pub async fn destroy(&mut self) -> ClusterResult<()> {
        if self.deleted {
            return Ok(());
        }
        self.session
            .backend()
            .delete_pod(self.session.namespace(), &self.name)
            .await?;
        self.deleted = true;
        debug!(pod = %self.name, "pod deleted");
        Ok(())
    }

    /// Destroy, logging instead of returning a failure.
    pub async fn release(&mut self) {
        if let Err(e) = self.destroy().await {
            warn!(pod = %self.name, error = %e, "failed to delete pod");
        }
    }

    async fn wait_until_running(&self, settings: &PodSettings) -> ClusterResult<()> {
        let namespace = self.session.namespace();
        let deadline = Instant::now() + settings.start_timeout;

        loop {
            let phase = self.session.backend().pod_phase(namespace, &self.name).await?;
            match phase {
                PodPhase::Running => return Ok(()),
                phase if phase.is_terminal() => {
                    return Err(ClusterError::PodTerminated {
                        namespace: namespace.to_string(),
                        pod: self.name.clone(),
                        phase: phase.as_str().to_string(),
                    });
                }
                phase => debug!(pod = %self.name, phase = phase.as_str(), "waiting for pod"),
            }

            if Instant::now() + settings.poll_interval > deadline {
                return Err(ClusterError::Timeout {
                    namespace: namespace.to_string(),
                    pod: self.name.clone(),
                    waited: settings.start_timeout,
                });
            }
            tokio::time::sleep(settings.poll_interval).await;
        }
    }
}

impl Drop for ExecutionPod {
    fn drop(&mut self) {
        if self.deleted {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(pod = %self.name, "pod dropped outside a runtime, left in cluster");
            return;
        };

        self.deleted = true;
        let session = self.session.clone();
        let name = std::mem::take(&mut self.name);
        warn!(pod = %name, "pod dropped without destroy, deleting in background");
        runtime.spawn(async move {
            if let Err(e) = session.backend().delete_pod(session.namespace(), &name).await {
                warn!(pod = %name, error = %e, "background pod delete failed");
            }
        });
    }
}
