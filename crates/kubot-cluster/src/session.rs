//! Cluster session — a backend handle plus the namespace every call targets.

use std::fmt;
use std::sync::Arc;

use crate::backend::ClusterBackend;
use crate::error::ClusterResult;
use crate::kube_backend::KubeBackend;

/// Capability holder shared by volumes, pods, and suite tasks. Cloning is
/// cheap; the backend is shared.
#[derive(Clone)]
pub struct ClusterSession {
    backend: Arc<dyn ClusterBackend>,
    namespace: String,
}

impl ClusterSession {
    pub fn new(backend: Arc<dyn ClusterBackend>, namespace: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: namespace.into(),
        }
    }

    /// Connect to the cluster from the local kube config (or in-cluster
    /// service account) and target `namespace`.
    pub async fn connect(namespace: impl Into<String>) -> ClusterResult<Self> {
        let backend = KubeBackend::connect().await?;
        Ok(Self::new(Arc::new(backend), namespace))
    }

    pub fn backend(&self) -> &dyn ClusterBackend {
        self.backend.as_ref()
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl fmt::Debug for ClusterSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterSession")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}
