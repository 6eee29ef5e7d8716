use std::time::Duration;

use error_stack::Report;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::k8s::cluster::ClusterOps;
use crate::k8s::types::DeployError;
use crate::k8s::types::PodPhase;

/// Timing knobs for the readiness poll loop.
///
/// Defaults give the observed production behavior: a 5 s settle after
/// submission, then up to 10 polls 5 s apart, 55 s worst case before the
/// poller gives up on seeing a terminal phase.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PollTiming {
    /// Settle time after pod submission before the first status poll.
    pub settle: Duration,
    /// Sleep between non-terminal status polls.
    pub interval: Duration,
    /// Maximum number of status polls before giving up.
    pub max_attempts: u32,
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(5),
            interval: Duration::from_secs(5),
            max_attempts: 10,
        }
    }
}

/// Drives a freshly submitted pod towards a terminal phase with bounded
/// polling, then resolves its assigned address.
///
/// Exhausting the poll bound is not a failure: the last observed phase is
/// handed back as-is and the caller proceeds with it. Only transport errors
/// on the status reads abort the run.
pub(crate) struct ReadinessPoller<'a, C: ClusterOps + ?Sized> {
    cluster: &'a C,
    timing: PollTiming,
}

impl<'a, C: ClusterOps + ?Sized> ReadinessPoller<'a, C> {
    pub(crate) fn new(cluster: &'a C, timing: PollTiming) -> Self {
        Self { cluster, timing }
    }

    /// Poll the pod's phase until it is terminal or the bound is exhausted.
    ///
    /// Creation is not instantaneous, so the poller sleeps a settle interval
    /// before the first read. Worst case this blocks for
    /// `settle + max_attempts * interval` before returning the last phase it
    /// saw (default [`PodPhase::Unknown`] if it never read one).
    ///
    /// # Errors
    ///
    /// - [`DeployError::StatusReadFailed`] if a status read fails
    pub(crate) async fn await_ready(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<PodPhase, Report<DeployError>> {
        tokio::time::sleep(self.timing.settle).await;

        let mut phase = PodPhase::Unknown;
        for attempt in 1..=self.timing.max_attempts {
            phase = self.cluster.pod_phase(name, namespace).await?;
            if phase.is_terminal() {
                info!(
                    pod_name = name,
                    phase = phase.as_str(),
                    attempt,
                    "Pod reached terminal phase"
                );
                return Ok(phase);
            }
            debug!(
                pod_name = name,
                phase = phase.as_str(),
                attempt,
                "Pod not ready yet"
            );
            tokio::time::sleep(self.timing.interval).await;
        }

        warn!(
            pod_name = name,
            phase = phase.as_str(),
            attempts = self.timing.max_attempts,
            "Gave up waiting for terminal phase, proceeding with last observed phase"
        );
        Ok(phase)
    }

    /// Resolve the pod's assigned IP after polling has concluded.
    ///
    /// Unlike the poll loop this read is authoritative: without an address
    /// the pod record is meaningless, so a transport failure here is fatal.
    /// A pod that simply has no address yet resolves to an empty string.
    ///
    /// # Errors
    ///
    /// - [`DeployError::StatusReadFailed`] if the status read fails
    pub(crate) async fn resolve_ip(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<String, Report<DeployError>> {
        let ip = self.cluster.pod_ip(name, namespace).await?;
        Ok(ip.unwrap_or_default())
    }
}
