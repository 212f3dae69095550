//! In-memory [`ClusterBackend`] for tests.
//!
//! Records every call in order, tracks which pods and claims are alive, and
//! can be told to misbehave: pods that never start, claims that never bind,
//! failing execs, copies, and so on.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{ClaimPhase, ClaimRequest, ClusterBackend, ExecOutput, PodPhase, PodRequest};
use crate::error::{ClusterError, ClusterResult};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreatePod { pod: String },
    DeletePod { pod: String },
    Exec { pod: String, command: Vec<String> },
    CreateClaim { claim: String },
    DeleteClaim { claim: String },
    CopyTo { pod: String, local: PathBuf, remote: String },
    CopyFrom { pod: String, remote: String, local: PathBuf },
}

#[derive(Debug, Default)]
struct State {
    next_id: u32,
    calls: Vec<Call>,
    pods: BTreeMap<String, PodRequest>,
    live_pods: BTreeSet<String>,
    phase_polls: BTreeMap<String, usize>,
    pod_deletes: usize,
    claims: BTreeMap<String, ClaimRequest>,
    live_claims: BTreeSet<String>,
    claim_polls: usize,
    execs_in_flight: usize,
    max_execs_in_flight: usize,
    pod_delete_failures: usize,
    claim_delete_failures: usize,
}

impl State {
    fn generate_name(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{:05}", self.next_id)
    }
}

/// Scriptable fake cluster. Configure with the `with_*` builders, then wrap
/// in an `Arc` and hand it to a [`crate::ClusterSession`].
#[derive(Debug, Default)]
pub struct FakeCluster {
    state: Mutex<State>,
    pending_polls: usize,
    pods_never_running: bool,
    pods_failing_to_start: bool,
    claim_pending_polls: usize,
    claims_never_bound: bool,
    failing_claim_create: bool,
    failing_exec: Vec<String>,
    exit_codes: Vec<(String, i32)>,
    exec_delay: Option<Duration>,
    failing_copy: bool,
    failing_download: bool,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pods report Pending this many times before Running.
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    pub fn with_pods_never_running(mut self) -> Self {
        self.pods_never_running = true;
        self
    }

    /// Pods go straight to Failed.
    pub fn with_pods_failing_to_start(mut self) -> Self {
        self.pods_failing_to_start = true;
        self
    }

    pub fn with_claim_pending_polls(mut self, polls: usize) -> Self {
        self.claim_pending_polls = polls;
        self
    }

    pub fn with_claims_never_bound(mut self) -> Self {
        self.claims_never_bound = true;
        self
    }

    pub fn with_failing_claim_create(mut self) -> Self {
        self.failing_claim_create = true;
        self
    }

    /// Exec fails at the transport level when any argument contains `needle`.
    pub fn with_failing_exec(mut self, needle: impl Into<String>) -> Self {
        self.failing_exec.push(needle.into());
        self
    }

    /// Exec reports `code` when any argument contains `needle`.
    pub fn with_exit_code(mut self, needle: impl Into<String>, code: i32) -> Self {
        self.exit_codes.push((needle.into(), code));
        self
    }

    /// Every exec takes this long.
    pub fn with_exec_delay(mut self, delay: Duration) -> Self {
        self.exec_delay = Some(delay);
        self
    }

    /// The next `count` pod deletes fail without deleting anything.
    pub fn with_failing_pod_deletes(mut self, count: usize) -> Self {
        self.state_mut().pod_delete_failures = count;
        self
    }

    /// The next `count` claim deletes fail without deleting anything.
    pub fn with_failing_claim_deletes(mut self, count: usize) -> Self {
        self.state_mut().claim_delete_failures = count;
        self
    }

    /// Copies into pods fail.
    pub fn with_failing_copy(mut self) -> Self {
        self.failing_copy = true;
        self
    }

    /// Copies out of pods fail.
    pub fn with_failing_download(mut self) -> Self {
        self.failing_download = true;
        self
    }

    fn state_mut(&mut self) -> &mut State {
        self.state.get_mut().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// Commands exec'd so far, in order.
    pub fn exec_commands(&self) -> Vec<Vec<String>> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::Exec { command, .. } => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn pod_request(&self, name: &str) -> Option<PodRequest> {
        self.lock().pods.get(name).cloned()
    }

    pub fn claim_request(&self, name: &str) -> Option<ClaimRequest> {
        self.lock().claims.get(name).cloned()
    }

    pub fn phase_polls(&self, name: &str) -> usize {
        self.lock().phase_polls.get(name).copied().unwrap_or(0)
    }

    pub fn claim_polls(&self) -> usize {
        self.lock().claim_polls
    }

    pub fn pods_created(&self) -> usize {
        self.lock().pods.len()
    }

    pub fn pod_deletes(&self) -> usize {
        self.lock().pod_deletes
    }

    pub fn live_pods(&self) -> usize {
        self.lock().live_pods.len()
    }

    pub fn live_claims(&self) -> usize {
        self.lock().live_claims.len()
    }

    /// Highest number of execs that were running at the same time.
    pub fn max_concurrent_execs(&self) -> usize {
        self.lock().max_execs_in_flight
    }

    fn matches(command: &[String], needle: &str) -> bool {
        command.iter().any(|arg| arg.contains(needle))
    }
}

fn not_found(kind: &str, name: &str) -> ClusterError {
    ClusterError::Api(::kube::Error::Api(::kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{kind} \"{name}\" not found"),
        reason: "NotFound".to_string(),
        code: 404,
    }))
}

fn unavailable(kind: &str, name: &str) -> ClusterError {
    ClusterError::Api(::kube::Error::Api(::kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("etcdserver: request timed out deleting {kind} \"{name}\""),
        reason: "InternalError".to_string(),
        code: 500,
    }))
}

fn rejected(message: &str) -> ClusterError {
    ClusterError::Api(::kube::Error::Api(::kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: "Forbidden".to_string(),
        code: 403,
    }))
}

#[async_trait]
impl ClusterBackend for FakeCluster {
    async fn create_pod(&self, _namespace: &str, request: &PodRequest) -> ClusterResult<String> {
        let mut state = self.lock();
        let name = state.generate_name(&request.name_prefix);
        state.pods.insert(name.clone(), request.clone());
        state.live_pods.insert(name.clone());
        state.calls.push(Call::CreatePod { pod: name.clone() });
        Ok(name)
    }

    async fn pod_phase(&self, _namespace: &str, name: &str) -> ClusterResult<PodPhase> {
        let mut state = self.lock();
        if !state.live_pods.contains(name) {
            return Err(not_found("pods", name));
        }
        let polls = state.phase_polls.entry(name.to_string()).or_insert(0);
        *polls += 1;

        let phase = if self.pods_failing_to_start {
            PodPhase::Failed
        } else if self.pods_never_running || *polls <= self.pending_polls {
            PodPhase::Pending
        } else {
            PodPhase::Running
        };
        Ok(phase)
    }

    async fn delete_pod(&self, _namespace: &str, name: &str) -> ClusterResult<()> {
        let mut state = self.lock();
        if state.pod_delete_failures > 0 {
            state.pod_delete_failures -= 1;
            return Err(unavailable("pods", name));
        }
        if !state.live_pods.remove(name) {
            return Err(not_found("pods", name));
        }
        state.pod_deletes += 1;
        state.calls.push(Call::DeletePod {
            pod: name.to_string(),
        });
        Ok(())
    }

    async fn exec(
        &self,
        namespace: &str,
        pod: &str,
        command: &[String],
    ) -> ClusterResult<ExecOutput> {
        let exec_error = |message: &str| ClusterError::Exec {
            namespace: namespace.to_string(),
            pod: pod.to_string(),
            command: command.to_vec(),
            source: Box::new(std::io::Error::other(message.to_string())),
        };

        {
            let mut state = self.lock();
            if !state.live_pods.contains(pod) {
                return Err(exec_error("pod not found"));
            }
            state.calls.push(Call::Exec {
                pod: pod.to_string(),
                command: command.to_vec(),
            });
            state.execs_in_flight += 1;
            state.max_execs_in_flight = state.max_execs_in_flight.max(state.execs_in_flight);
        }

        if let Some(delay) = self.exec_delay {
            tokio::time::sleep(delay).await;
        }
        self.lock().execs_in_flight -= 1;

        if self.failing_exec.iter().any(|n| Self::matches(command, n)) {
            return Err(exec_error("stream closed"));
        }

        let exit_code = self
            .exit_codes
            .iter()
            .find(|(needle, _)| Self::matches(command, needle))
            .map(|(_, code)| *code)
            .unwrap_or(0);

        Ok(ExecOutput {
            output: format!("ran: {}\n", command.join(" ")),
            exit_code: Some(exit_code),
        })
    }

    async fn create_claim(&self, _namespace: &str, request: &ClaimRequest) -> ClusterResult<String> {
        if self.failing_claim_create {
            return Err(rejected("exceeded quota: persistentvolumeclaims"));
        }
        let mut state = self.lock();
        let name = state.generate_name(&request.name_prefix);
        state.claims.insert(name.clone(), request.clone());
        state.live_claims.insert(name.clone());
        state.calls.push(Call::CreateClaim {
            claim: name.clone(),
        });
        Ok(name)
    }

    async fn claim_phase(&self, _namespace: &str, name: &str) -> ClusterResult<ClaimPhase> {
        let mut state = self.lock();
        if !state.live_claims.contains(name) {
            return Err(not_found("persistentvolumeclaims", name));
        }
        state.claim_polls += 1;

        let phase = if self.claims_never_bound || state.claim_polls <= self.claim_pending_polls {
            ClaimPhase::Pending
        } else {
            ClaimPhase::Bound
        };
        Ok(phase)
    }

    async fn delete_claim(&self, _namespace: &str, name: &str) -> ClusterResult<()> {
        let mut state = self.lock();
        if state.claim_delete_failures > 0 {
            state.claim_delete_failures -= 1;
            return Err(unavailable("persistentvolumeclaims", name));
        }
        if !state.live_claims.remove(name) {
            return Err(not_found("persistentvolumeclaims", name));
        }
        state.calls.push(Call::DeleteClaim {
            claim: name.to_string(),
        });
        Ok(())
    }

    async fn copy_to_pod(
        &self,
        _namespace: &str,
        pod: &str,
        local: &Path,
        remote: &str,
    ) -> ClusterResult<()> {
        let mut state = self.lock();
        state.calls.push(Call::CopyTo {
            pod: pod.to_string(),
            local: local.to_path_buf(),
            remote: remote.to_string(),
        });
        if self.failing_copy || !state.live_pods.contains(pod) {
            return Err(ClusterError::Copy {
                status: "exit status: 1".to_string(),
                output: format!("error: unable to upload to {pod}"),
            });
        }
        Ok(())
    }

    async fn copy_from_pod(
        &self,
        _namespace: &str,
        pod: &str,
        remote: &str,
        local: &Path,
    ) -> ClusterResult<()> {
        let mut state = self.lock();
        state.calls.push(Call::CopyFrom {
            pod: pod.to_string(),
            remote: remote.to_string(),
            local: local.to_path_buf(),
        });
        if self.failing_download || !state.live_pods.contains(pod) {
            return Err(ClusterError::Copy {
                status: "exit status: 1".to_string(),
                output: format!("error: unable to download from {pod}"),
            });
        }
        Ok(())
    }
}
