use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

/// Lifecycle phase reported by the cluster for a pod.
///
/// Derived fresh from every status poll, never persisted. `Running`,
/// `Failed` and `Unknown` stop the readiness poll loop; any other
/// reported phase keeps it going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PodPhase {
    Pending,
    Running,
    Failed,
    Unknown,
}

impl PodPhase {
    /// Map the phase string from a pod status to a typed phase.
    ///
    /// A missing or unrecognized phase (e.g. `Succeeded`) maps to
    /// [`PodPhase::Pending`] so the poll loop keeps waiting on it; only the
    /// literal `Unknown` string is treated as the terminal unknown state.
    pub(crate) fn from_status(phase: Option<&str>) -> Self {
        match phase {
            Some("Running") => Self::Running,
            Some("Failed") => Self::Failed,
            Some("Unknown") => Self::Unknown,
            _ => Self::Pending,
        }
    }

    /// Whether this phase stops the readiness poll loop.
    pub(crate) const fn is_terminal(self) -> bool {
        matches!(self, Self::Running | Self::Failed | Self::Unknown)
    }

    pub(crate) const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Failed => "Failed",
            Self::Unknown => "Unknown",
        }
    }
}

/// One deployed pod in the orchestration roster.
///
/// Created once the pod's address is resolved and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PodRecord {
    pub name: String,
    pub namespace: String,
    pub pod_ip: String,
}

/// Result of executing the probe command inside a pod.
///
/// `PodMissing` is the non-fatal sentinel for a pod that does not (yet)
/// exist in the cluster; transport failures are reported as
/// [`DeployError::ExecFailed`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ExecOutcome {
    /// Captured standard output of the remote command.
    Captured(String),
    /// The pod was not found in the cluster.
    PodMissing,
}

/// Errors that can occur while deploying and probing pods.
///
/// Every variant is fatal to the orchestration run; the one recoverable
/// condition (pod absent during exec) is a value, [`ExecOutcome::PodMissing`],
/// not an error.
#[derive(Debug, Error)]
pub(crate) enum DeployError {
    #[error("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
    #[error("Failed to load pod manifest: {path}")]
    ManifestLoad { path: String },
    #[error("Invalid deployment configuration: {message}")]
    InvalidConfig { message: String },
    #[error("Failed to create pod {pod_name} in namespace {namespace}")]
    PodCreateFailed { pod_name: String, namespace: String },
    #[error("Failed to read status of pod {pod_name} in namespace {namespace}")]
    StatusReadFailed { pod_name: String, namespace: String },
    #[error("Exec channel failed for pod {pod_name} in namespace {namespace}")]
    ExecFailed { pod_name: String, namespace: String },
    #[error("Failed to delete config map {name}")]
    CleanupFailed { name: String },
    #[error("Failed to write run results under {path}")]
    ResultsWriteFailed { path: String },
}
