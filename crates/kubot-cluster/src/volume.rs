//! Shared volume — the claim every pod mounts, plus the retained init pod.
//!
//! ```text
//! Requested ──(poll until Bound)──► Bound ──► Destroyed
//!                                     │
//!                                     ├── init_directories (init pod created, kept)
//!                                     └── download_output  (through the init pod)
//! ```

use std::path::Path;
use std::time::Duration;

use kubot_core::layout::{OUTPUT_DIR, SCRIPTS_DIR, init_layout_command};
use kubot_core::WorkspaceTree;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{ClaimPhase, ClaimRequest};
use crate::error::{ClusterError, ClusterResult};
use crate::pod::{ExecutionPod, PodSettings};
use crate::session::ClusterSession;

/// Generated claim names start with this.
pub const CLAIM_NAME_PREFIX: &str = "pvc-kubot";

/// Claim request and bind-polling behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSettings {
    pub size: String,
    pub storage_class: Option<String>,
    pub poll_interval: Duration,
    /// `None` waits for the claim to bind forever.
    pub bind_timeout: Option<Duration>,
    /// Image of the init pod.
    pub init_image: String,
}

impl Default for VolumeSettings {
    fn default() -> Self {
        Self {
            size: "1Gi".to_string(),
            storage_class: None,
            poll_interval: Duration::from_secs(5),
            bind_timeout: None,
            init_image: "docker.io/ubuntu:bionic".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeState {
    Requested,
    Bound,
    Destroyed,
}

/// What a pod needs to mount the volume. Cheap to clone into tasks.
#[derive(Debug, Clone)]
pub struct VolumeHandle {
    session: ClusterSession,
    claim_name: String,
}

impl VolumeHandle {
    pub fn new(session: ClusterSession, claim_name: impl Into<String>) -> Self {
        Self {
            session,
            claim_name: claim_name.into(),
        }
    }

    pub fn session(&self) -> &ClusterSession {
        &self.session
    }

    pub fn claim_name(&self) -> &str {
        &self.claim_name
    }
}

/// A persistent volume claim shared by every pod of a run.
#[derive(Debug)]
pub struct SharedVolume {
    session: ClusterSession,
    claim_name: String,
    state: VolumeState,
    settings: VolumeSettings,
    init_pod: Option<ExecutionPod>,
    claim_deleted: bool,
}

impl SharedVolume {
    /// Request a claim and wait until it is Bound.
    ///
    /// A failed create call is returned as is. If waiting fails, the claim is
    /// deleted before the error is returned.
    pub async fn create(session: ClusterSession, settings: VolumeSettings) -> ClusterResult<Self> {
        let request = ClaimRequest {
            name_prefix: CLAIM_NAME_PREFIX.to_string(),
            size: settings.size.clone(),
            storage_class: settings.storage_class.clone(),
        };
        let claim_name = session
            .backend()
            .create_claim(session.namespace(), &request)
            .await?;
        info!(claim = %claim_name, size = %settings.size, "volume requested");

        let mut volume = Self {
            session,
            claim_name,
            state: VolumeState::Requested,
            settings,
            init_pod: None,
            claim_deleted: false,
        };

        if let Err(e) = volume.wait_until_bound().await {
            if let Err(cleanup) = volume.destroy().await {
                warn!(claim = %volume.claim_name, error = %cleanup, "failed to delete unbound claim");
            }
            return Err(e);
        }

        volume.state = VolumeState::Bound;
        info!(claim = %volume.claim_name, "volume bound");
        Ok(volume)
    }

    pub fn state(&self) -> VolumeState {
        self.state
    }

    pub fn claim_name(&self) -> &str {
        &self.claim_name
    }

    pub fn session(&self) -> &ClusterSession {
        &self.session
    }

    /// The init pod, once `init_directories` has run.
    pub fn init_pod(&self) -> Option<&ExecutionPod> {
        self.init_pod.as_ref()
    }

    /// A mount handle for pods of this run.
    pub fn handle(&self) -> ClusterResult<VolumeHandle> {
        if self.state == VolumeState::Destroyed {
            return Err(ClusterError::VolumeDestroyed);
        }
        Ok(VolumeHandle::new(self.session.clone(), self.claim_name.clone()))
    }

    /// Create the fixed layout and seed it with the workspace root.
    ///
    /// The pod used for this is kept as the volume's init pod so it can
    /// later serve [`SharedVolume::download_output`].
    pub async fn init_directories(
        &mut self,
        tree: &WorkspaceTree,
        pod_settings: &PodSettings,
    ) -> ClusterResult<()> {
        let handle = self.handle()?;
        let mut pod = ExecutionPod::create(&handle, &self.settings.init_image, pod_settings).await?;

        let seeded = async {
            pod.exec(&init_layout_command()).await?;
            pod.copy_in(tree.path(), SCRIPTS_DIR).await
        }
        .await;

        if let Err(e) = seeded {
            pod.release().await;
            return Err(e);
        }

        info!(
            pod = %pod.name(),
            suites = tree.schedulable().len(),
            "workspace copied to volume"
        );
        if let Some(mut previous) = self.init_pod.replace(pod) {
            previous.release().await;
        }
        Ok(())
    }

    /// Copy the combined output directory into `local_dir`.
    pub async fn download_output(&self, local_dir: &Path) -> ClusterResult<()> {
        if self.state == VolumeState::Destroyed {
            return Err(ClusterError::VolumeDestroyed);
        }
        let pod = self.init_pod.as_ref().ok_or(ClusterError::NotInitialized)?;

        tokio::fs::create_dir_all(local_dir).await?;
        pod.copy_out(&format!("{OUTPUT_DIR}/"), local_dir).await?;

        info!(dir = %local_dir.display(), "output downloaded");
        Ok(())
    }

    /// Delete the claim, then the init pod. Calling this again after a
    /// success does nothing; after a failure, only what failed is retried.
    ///
    /// Both deletions are attempted; the first failure is returned.
    pub async fn destroy(&mut self) -> ClusterResult<()> {
        if self.state == VolumeState::Destroyed {
            return Ok(());
        }

        let claim = if self.claim_deleted {
            Ok(())
        } else {
            self.session
                .backend()
                .delete_claim(self.session.namespace(), &self.claim_name)
                .await
        };
        if claim.is_ok() {
            self.claim_deleted = true;
        }

        let pod = match self.init_pod.as_mut() {
            Some(pod) => pod.destroy().await,
            None => Ok(()),
        };

        claim.and(pod)?;
        self.state = VolumeState::Destroyed;
        debug!(claim = %self.claim_name, "volume destroyed");
        Ok(())
    }

    async fn wait_until_bound(&self) -> ClusterResult<()> {
        let namespace = self.session.namespace();
        let deadline = self.settings.bind_timeout.map(|t| Instant::now() + t);

        loop {
            match self
                .session
                .backend()
                .claim_phase(namespace, &self.claim_name)
                .await?
            {
                ClaimPhase::Bound => return Ok(()),
                ClaimPhase::Lost => {
                    return Err(ClusterError::ClaimLost {
                        namespace: namespace.to_string(),
                        claim: self.claim_name.clone(),
                    });
                }
                ClaimPhase::Pending => debug!(claim = %self.claim_name, "waiting for claim to bind"),
            }

            if let (Some(deadline), Some(waited)) = (deadline, self.settings.bind_timeout) {
                if Instant::now() + self.settings.poll_interval > deadline {
                    return Err(ClusterError::BindTimeout {
                        namespace: namespace.to_string(),
                        claim: self.claim_name.clone(),
                        waited,
                    });
                }
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}
