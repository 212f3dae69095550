//! The cluster backend seam.
//!
//! Pods and volumes are written against [`ClusterBackend`] rather than the
//! kube client directly, so the lifecycle logic can run against the real
//! control plane ([`crate::KubeBackend`]) or an in-memory fake.

use std::path::Path;

use async_trait::async_trait;

use crate::error::ClusterResult;

/// Lifecycle phase of a pod, as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    pub fn parse(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => Self::Pending,
            Some("Running") => Self::Running,
            Some("Succeeded") => Self::Succeeded,
            Some("Failed") => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// The pod will never reach Running from here.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }
}

/// Binding phase of a persistent volume claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimPhase {
    Pending,
    Bound,
    Lost,
}

impl ClaimPhase {
    pub fn parse(phase: Option<&str>) -> Self {
        match phase {
            Some("Bound") => Self::Bound,
            Some("Lost") => Self::Lost,
            _ => Self::Pending,
        }
    }
}

/// Everything needed to submit one single-container pod that mounts a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRequest {
    /// The cluster appends a random suffix to this.
    pub name_prefix: String,
    pub image: String,
    pub command: Vec<String>,
    pub env: Vec<(String, String)>,
    pub claim_name: String,
    pub mount_path: String,
}

/// A persistent volume claim request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    pub name_prefix: String,
    /// Kubernetes quantity, e.g. `1Gi`.
    pub size: String,
    pub storage_class: Option<String>,
}

/// Captured result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Combined stdout and stderr (a TTY merges them).
    pub output: String,
    /// Remote exit code when the cluster reported one.
    pub exit_code: Option<i32>,
}

impl ExecOutput {
    pub fn succeeded(&self) -> bool {
        matches!(self.exit_code, Some(0) | None)
    }
}

/// Operations kubot needs from a cluster. All calls are scoped to one
/// namespace; implementations must be safe to share across tasks.
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Submit a pod and return its generated name.
    async fn create_pod(&self, namespace: &str, request: &PodRequest) -> ClusterResult<String>;

    async fn pod_phase(&self, namespace: &str, name: &str) -> ClusterResult<PodPhase>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> ClusterResult<()>;

    /// Run `command` in the pod's container and capture its output.
    /// Only transport failures are errors.
    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        command: &[String],
    ) -> ClusterResult<ExecOutput>;

    /// Submit a claim and return its generated name.
    async fn create_claim(&self, namespace: &str, request: &ClaimRequest) -> ClusterResult<String>;

    async fn claim_phase(&self, namespace: &str, name: &str) -> ClusterResult<ClaimPhase>;

    async fn delete_claim(&self, namespace: &str, name: &str) -> ClusterResult<()>;

    /// Copy a local file or directory into the pod.
    async fn copy_to_pod(
        &self,
        namespace: &str,
        pod: &str,
        local: &Path,
        remote: &str,
    ) -> ClusterResult<()>;

    /// Copy a remote file or directory out of the pod.
    async fn copy_from_pod(
        &self,
        namespace: &str,
        pod: &str,
        remote: &str,
        local: &Path,
    ) -> ClusterResult<()>;
}
