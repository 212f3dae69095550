//! Cluster error types.

use std::time::Duration;

use thiserror::Error;

/// Boxed transport failure carried by [`ClusterError::Exec`].
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur while talking to the cluster.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("failed to connect to cluster: {0}")]
    Connect(String),

    #[error("control-plane call failed: {0}")]
    Api(#[from] ::kube::Error),

    #[error("cluster returned {kind} without a name")]
    MissingName { kind: &'static str },

    #[error("timed out after {waited:?} waiting for pod {namespace}/{pod} to start")]
    Timeout {
        namespace: String,
        pod: String,
        waited: Duration,
    },

    #[error("pod {namespace}/{pod} terminated before running (phase {phase})")]
    PodTerminated {
        namespace: String,
        pod: String,
        phase: String,
    },

    #[error("timed out after {waited:?} waiting for claim {namespace}/{claim} to bind")]
    BindTimeout {
        namespace: String,
        claim: String,
        waited: Duration,
    },

    #[error("claim {namespace}/{claim} was lost")]
    ClaimLost { namespace: String, claim: String },

    #[error("failed executing command {command:?} on {namespace}/{pod}: {source}")]
    Exec {
        namespace: String,
        pod: String,
        command: Vec<String>,
        #[source]
        source: TransportError,
    },

    #[error("failed to launch {program}: {source}")]
    CopyLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("copy failed ({status}): {output}")]
    Copy { status: String, output: String },

    #[error("local I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("volume has been destroyed")]
    VolumeDestroyed,

    #[error("volume has no init pod; run init_directories first")]
    NotInitialized,
}
