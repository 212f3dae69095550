//! kube-rs implementation of [`ClusterBackend`].
//!
//! Pods and claims go through the typed API; exec uses the upgraded
//! websocket `exec` subresource with a TTY, so stdout and stderr arrive as a
//! single stream. Copies are delegated to [`CopyTransport`].

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    Container, EnvVar, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, Pod, PodSpec, Volume, VolumeMount,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Status};
use kube::api::{AttachParams, DeleteParams, PostParams};
use kube::{Api, Client};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::backend::{ClaimPhase, ClaimRequest, ClusterBackend, ExecOutput, PodPhase, PodRequest};
use crate::error::{ClusterError, ClusterResult, TransportError};
use crate::transport::CopyTransport;

/// Name of the single container in every kubot pod.
pub const CONTAINER_NAME: &str = "job-container";

/// Label attached to everything kubot creates.
pub const APP_LABEL: (&str, &str) = ("app", "kubot");

/// Talks to a real control plane.
#[derive(Clone)]
pub struct KubeBackend {
    client: Client,
    transport: CopyTransport,
}

impl KubeBackend {
    pub fn new(client: Client, transport: CopyTransport) -> Self {
        Self { client, transport }
    }

    /// Build a client from the local kube config or the in-cluster
    /// environment.
    pub async fn connect() -> ClusterResult<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| ClusterError::Connect(e.to_string()))?;
        Ok(Self::new(client, CopyTransport::default()))
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn claims(&self, namespace: &str) -> Api<PersistentVolumeClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterBackend for KubeBackend {
    async fn create_pod(&self, namespace: &str, request: &PodRequest) -> ClusterResult<String> {
        let pod = build_pod(namespace, request);
        let created = self.pods(namespace).create(&PostParams::default(), &pod).await?;
        created
            .metadata
            .name
            .ok_or(ClusterError::MissingName { kind: "pod" })
    }

    async fn pod_phase(&self, namespace: &str, name: &str) -> ClusterResult<PodPhase> {
        let pod = self.pods(namespace).get(name).await?;
        Ok(PodPhase::parse(
            pod.status.as_ref().and_then(|s| s.phase.as_deref()),
        ))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        self.pods(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        command: &[String],
    ) -> ClusterResult<ExecOutput> {
        let exec_error = |source: TransportError| ClusterError::Exec {
            namespace: namespace.to_string(),
            pod: pod.to_string(),
            command: command.to_vec(),
            source,
        };

        // A TTY merges stderr into stdout; the API rejects tty + stderr.
        let params = AttachParams::default()
            .container(CONTAINER_NAME)
            .stdin(false)
            .stdout(true)
            .stderr(false)
            .tty(true);

        let mut attached = self
            .pods(namespace)
            .exec(pod, command.to_vec(), &params)
            .await
            .map_err(|e| exec_error(Box::new(e)))?;

        let status = attached.take_status();

        let mut buf = Vec::new();
        if let Some(mut stdout) = attached.stdout() {
            stdout
                .read_to_end(&mut buf)
                .await
                .map_err(|e| exec_error(Box::new(e)))?;
        }

        let status = match status {
            Some(status) => status.await,
            None => None,
        };

        attached.join().await.map_err(|e| exec_error(Box::new(e)))?;

        let exit_code = status.as_ref().and_then(exit_code);
        debug!(%pod, ?exit_code, bytes = buf.len(), "exec finished");

        Ok(ExecOutput {
            output: String::from_utf8_lossy(&buf).into_owned(),
            exit_code,
        })
    }

    async fn create_claim(&self, namespace: &str, request: &ClaimRequest) -> ClusterResult<String> {
        let claim = build_claim(namespace, request);
        let created = self
            .claims(namespace)
            .create(&PostParams::default(), &claim)
            .await?;
        created
            .metadata
            .name
            .ok_or(ClusterError::MissingName {
                kind: "persistent volume claim",
            })
    }

    async fn claim_phase(&self, namespace: &str, name: &str) -> ClusterResult<ClaimPhase> {
        let claim = self.claims(namespace).get(name).await?;
        Ok(ClaimPhase::parse(
            claim.status.as_ref().and_then(|s| s.phase.as_deref()),
        ))
    }

    async fn delete_claim(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        self.claims(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn copy_to_pod(
        &self,
        namespace: &str,
        pod: &str,
        local: &Path,
        remote: &str,
    ) -> ClusterResult<()> {
        self.transport.copy_to(namespace, pod, local, remote).await
    }

    async fn copy_from_pod(
        &self,
        namespace: &str,
        pod: &str,
        remote: &str,
        local: &Path,
    ) -> ClusterResult<()> {
        self.transport.copy_from(namespace, pod, remote, local).await
    }
}

fn labels() -> BTreeMap<String, String> {
    BTreeMap::from([(APP_LABEL.0.to_string(), APP_LABEL.1.to_string())])
}

/// A single-container pod that idles until commands are exec'd into it.
pub fn build_pod(namespace: &str, request: &PodRequest) -> Pod {
    let env = request
        .env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            value_from: None,
        })
        .collect();

    Pod {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", request.name_prefix)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: CONTAINER_NAME.to_string(),
                image: Some(request.image.clone()),
                command: Some(request.command.clone()),
                env: Some(env),
                volume_mounts: Some(vec![VolumeMount {
                    name: request.claim_name.clone(),
                    mount_path: request.mount_path.clone(),
                    ..Default::default()
                }]),
                ..Default::default()
            }],
            volumes: Some(vec![Volume {
                name: request.claim_name.clone(),
                persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                    claim_name: request.claim_name.clone(),
                    read_only: None,
                }),
                ..Default::default()
            }]),
            restart_policy: Some("Never".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// A single-writer claim of the requested size.
pub fn build_claim(namespace: &str, request: &ClaimRequest) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", request.name_prefix)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            storage_class_name: request.storage_class.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(request.size.clone()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Exit code carried by the exec status frame, if any.
pub fn exit_code(status: &Status) -> Option<i32> {
    if status.status.as_deref() == Some("Success") {
        return Some(0);
    }
    status
        .details
        .as_ref()?
        .causes
        .as_ref()?
        .iter()
        .find(|cause| cause.reason.as_deref() == Some("ExitCode"))
        .and_then(|cause| cause.message.as_deref()?.parse().ok())
}
