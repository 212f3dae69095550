//! kubot-cluster — everything that touches the cluster.
//!
//! # Architecture
//!
//! ```text
//! ClusterSession (namespace + backend handle)
//!   ├── SharedVolume   (claim + retained init pod)
//!   │     └── VolumeHandle ── cloned into every suite task
//!   └── ExecutionPod   (create / wait / exec / copy / destroy)
//!
//! ClusterBackend (trait)
//!   ├── KubeBackend    (kube-rs API + kubectl copy transport)
//!   └── FakeCluster    (in-memory, feature `test-util`)
//! ```

pub mod backend;
pub mod env;
pub mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
pub mod kube_backend;
pub mod pod;
pub mod session;
pub mod transport;
pub mod volume;

pub use backend::{ClaimPhase, ClaimRequest, ClusterBackend, ExecOutput, PodPhase, PodRequest};
pub use error::{ClusterError, ClusterResult};
pub use kube_backend::KubeBackend;
pub use pod::{ExecutionPod, PodSettings};
pub use session::ClusterSession;
pub use volume::{SharedVolume, VolumeHandle, VolumeSettings, VolumeState};
