//! Sequential pod deployment pipeline.
//!
//! Drives N pods from manifest to roster entry: submit to the cluster, poll
//! for readiness, resolve the pod IP, fire the annotation probe, append a
//! record. Pods are handled strictly one after another; a transport error
//! anywhere aborts the whole run and leaves already-created pods in place.

use error_stack::Report;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::DeployConfig;
use crate::config::SRIOV_PLUGIN;
use crate::k8s::annotations::NetworkAttachment;
use crate::k8s::types::PodPhase;
use crate::k8s::ClusterOps;
use crate::k8s::DeployError;
use crate::k8s::ExecOutcome;
use crate::k8s::PodRecord;
use crate::k8s::PollTiming;
use crate::k8s::ReadinessPoller;
use crate::manifest;

/// In-pod path of the downward-API file carrying network annotations.
const ANNOTATIONS_PATH: &str = "/etc/podnetinfo/annotations";

/// The fixed probe command executed inside each pod.
fn probe_command() -> Vec<String> {
    vec!["cat".to_string(), ANNOTATIONS_PATH.to_string()]
}

/// Orchestrates one deployment run against a cluster.
pub(crate) struct Deployer<C> {
    cluster: C,
    config: DeployConfig,
    timing: PollTiming,
}

impl<C: ClusterOps> Deployer<C> {
    pub(crate) fn new(cluster: C, config: DeployConfig) -> Self {
        Self::with_timing(cluster, config, PollTiming::default())
    }

    pub(crate) fn with_timing(cluster: C, config: DeployConfig, timing: PollTiming) -> Self {
        Self {
            cluster,
            config,
            timing,
        }
    }

    /// Deploy all configured pods and return the roster, in submission order.
    ///
    /// Each pod is loaded, created, polled to readiness and probed before the
    /// next one is touched. The annotation probe output is only logged here;
    /// callers that need structured socket or interface data use
    /// [`Deployer::virtual_sockets`] and [`Deployer::sriov_interfaces`].
    ///
    /// # Errors
    ///
    /// Any [`DeployError`] aborts the run. Pods created before the failure
    /// stay in the cluster; there is no rollback.
    pub(crate) async fn deploy_all(&self) -> Result<Vec<PodRecord>, Report<DeployError>> {
        let namespace = self.config.namespace.as_str();

        // Namespace provisioning is a best-effort side routine, not part of
        // the lifecycle contract.
        if let Err(err) = self.cluster.ensure_namespace(namespace).await {
            warn!(namespace, "Could not ensure namespace exists: {err:?}");
        }

        let poller = ReadinessPoller::new(&self.cluster, self.timing);
        let mut roster = Vec::with_capacity(self.config.count);

        for path in self.config.manifests.iter().take(self.config.count) {
            let pod_manifest = manifest::load(path).await?;
            let name = manifest::pod_name(&pod_manifest)?.to_string();

            self.cluster.create_pod(namespace, &pod_manifest).await?;
            info!(pod_name = %name, namespace, "Created pod");

            let phase = poller.await_ready(&name, namespace).await?;
            if phase != PodPhase::Running {
                warn!(
                    pod_name = %name,
                    phase = phase.as_str(),
                    "Pod did not reach Running, recording it anyway"
                );
            }

            let pod_ip = poller.resolve_ip(&name, namespace).await?;

            match self.cluster.exec(&name, namespace, &probe_command()).await? {
                ExecOutcome::Captured(output) => {
                    debug!(pod_name = %name, output = %output.trim_end(), "Probed network annotations");
                }
                ExecOutcome::PodMissing => {
                    warn!(pod_name = %name, "Pod vanished before the annotation probe");
                }
            }

            roster.push(PodRecord {
                name,
                namespace: namespace.to_string(),
                pod_ip,
            });
        }

        info!(pods = roster.len(), "Deployment run complete");
        Ok(roster)
    }

    /// Probe a pod for its virtual socket paths (memif / vhost-user).
    ///
    /// A missing pod yields an empty socket list, as does annotation output
    /// without socket entries.
    ///
    /// # Errors
    ///
    /// - [`DeployError::ExecFailed`] if the exec channel fails
    pub(crate) async fn virtual_sockets(
        &self,
        pod_name: &str,
    ) -> Result<NetworkAttachment, Report<DeployError>> {
        match self
            .cluster
            .exec(pod_name, &self.config.namespace, &probe_command())
            .await?
        {
            ExecOutcome::Captured(output) => Ok(NetworkAttachment::sockets(&output)),
            ExecOutcome::PodMissing => {
                warn!(pod_name, "Pod not found while probing for sockets");
                Ok(NetworkAttachment::sockets(""))
            }
        }
    }

    /// Probe a pod for its SR-IOV logical-name to interface mapping.
    ///
    /// # Errors
    ///
    /// - [`DeployError::ExecFailed`] if the exec channel fails
    pub(crate) async fn sriov_interfaces(
        &self,
        pod_name: &str,
    ) -> Result<NetworkAttachment, Report<DeployError>> {
        match self
            .cluster
            .exec(pod_name, &self.config.namespace, &probe_command())
            .await?
        {
            ExecOutcome::Captured(output) => Ok(NetworkAttachment::interfaces(&output)),
            ExecOutcome::PodMissing => {
                warn!(pod_name, "Pod not found while probing for interfaces");
                Ok(NetworkAttachment::interfaces(""))
            }
        }
    }

    /// Plugin-specific cleanup.
    ///
    /// Only the sriov plugin mode requires extra work (deleting the device
    /// plugin config map); everything else is deliberately a no-op. Broader
    /// teardown of pods or namespaces is out of contract.
    ///
    /// # Errors
    ///
    /// - [`DeployError::CleanupFailed`] if the config map cannot be deleted
    pub(crate) async fn terminate(
        &self,
        plugin: &str,
        sriov_config: &str,
        sriov_config_namespace: &str,
    ) -> Result<(), Report<DeployError>> {
        info!(plugin, "Terminating deployment");
        if plugin == SRIOV_PLUGIN {
            self.cluster
                .delete_config_map(sriov_config, sriov_config_namespace)
                .await?;
        } else {
            debug!(plugin, "No plugin cleanup required");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::Pod;
    use tempfile::TempDir;

    use super::*;

    /// In-memory cluster recording every call the orchestrator makes.
    #[derive(Default)]
    struct FakeCluster {
        created: Mutex<Vec<String>>,
        deleted_config_maps: Mutex<Vec<(String, String)>>,
        fail_create_for: Option<String>,
        annotation_dump: Option<String>,
        pod_missing: bool,
    }

    #[async_trait]
    impl ClusterOps for FakeCluster {
        async fn create_pod(
            &self,
            _namespace: &str,
            pod_manifest: &Pod,
        ) -> Result<(), Report<DeployError>> {
            let name = pod_manifest.metadata.name.clone().unwrap();
            if self.fail_create_for.as_deref() == Some(name.as_str()) {
                return Err(Report::new(DeployError::PodCreateFailed {
                    pod_name: name,
                    namespace: "default".to_string(),
                }));
            }
            self.created.lock().unwrap().push(name);
            Ok(())
        }

        async fn pod_phase(&self, _: &str, _: &str) -> Result<PodPhase, Report<DeployError>> {
            Ok(PodPhase::Running)
        }

        async fn pod_ip(
            &self,
            name: &str,
            _: &str,
        ) -> Result<Option<String>, Report<DeployError>> {
            // Distinct address per pod so roster entries are attributable.
            Ok(Some(format!("10.1.0.{}", name.len())))
        }

        async fn exec(
            &self,
            _: &str,
            _: &str,
            _: &[String],
        ) -> Result<ExecOutcome, Report<DeployError>> {
            if self.pod_missing {
                return Ok(ExecOutcome::PodMissing);
            }
            Ok(ExecOutcome::Captured(
                self.annotation_dump.clone().unwrap_or_default(),
            ))
        }

        async fn ensure_namespace(&self, _: &str) -> Result<(), Report<DeployError>> {
            Ok(())
        }

        async fn delete_config_map(
            &self,
            name: &str,
            namespace: &str,
        ) -> Result<(), Report<DeployError>> {
            self.deleted_config_maps
                .lock()
                .unwrap()
                .push((name.to_string(), namespace.to_string()));
            Ok(())
        }
    }

    fn write_manifests(dir: &TempDir, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(format!("{name}.yaml"));
                let mut file = std::fs::File::create(&path).unwrap();
                writeln!(
                    file,
                    "apiVersion: v1\nkind: Pod\nmetadata:\n  name: {name}\nspec:\n  containers:\n    - name: app\n      image: busybox"
                )
                .unwrap();
                path
            })
            .collect()
    }

    fn instant_timing() -> PollTiming {
        PollTiming {
            settle: Duration::ZERO,
            interval: Duration::ZERO,
            max_attempts: 10,
        }
    }

    fn deployer(cluster: FakeCluster, manifests: Vec<PathBuf>) -> Deployer<FakeCluster> {
        let count = manifests.len();
        Deployer::with_timing(
            cluster,
            DeployConfig {
                manifests,
                count,
                namespace: "default".to_string(),
                plugin: "none".to_string(),
            },
            instant_timing(),
        )
    }

    #[tokio::test]
    async fn roster_preserves_submission_order() {
        let dir = TempDir::new().unwrap();
        let manifests = write_manifests(&dir, &["pod-a", "pod-b", "pod-c"]);
        let deployer = deployer(FakeCluster::default(), manifests);

        let roster = deployer.deploy_all().await.unwrap();

        let names: Vec<&str> = roster.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["pod-a", "pod-b", "pod-c"]);
        assert!(roster.iter().all(|r| r.namespace == "default"));
        assert!(roster.iter().all(|r| !r.pod_ip.is_empty()));
    }

    #[tokio::test]
    async fn create_failure_aborts_without_rollback() {
        let dir = TempDir::new().unwrap();
        let manifests = write_manifests(&dir, &["pod-a", "pod-b", "pod-c"]);
        let cluster = FakeCluster {
            fail_create_for: Some("pod-b".to_string()),
            ..Default::default()
        };
        let deployer = deployer(cluster, manifests);

        let result = deployer.deploy_all().await;

        assert!(result.is_err());
        // pod-a stays created, pod-c was never submitted.
        let created = deployer.cluster.created.lock().unwrap().clone();
        assert_eq!(created, ["pod-a"]);
    }

    #[tokio::test]
    async fn missing_pod_during_probe_still_records() {
        let dir = TempDir::new().unwrap();
        let manifests = write_manifests(&dir, &["pod-a"]);
        let cluster = FakeCluster {
            pod_missing: true,
            ..Default::default()
        };
        let deployer = deployer(cluster, manifests);

        let roster = deployer.deploy_all().await.unwrap();
        assert_eq!(roster.len(), 1);
    }

    #[tokio::test]
    async fn count_limits_deployed_pods() {
        let dir = TempDir::new().unwrap();
        let manifests = write_manifests(&dir, &["pod-a", "pod-b"]);
        let deployer = Deployer::with_timing(
            FakeCluster::default(),
            DeployConfig {
                manifests,
                count: 1,
                namespace: "default".to_string(),
                plugin: "none".to_string(),
            },
            instant_timing(),
        );

        let roster = deployer.deploy_all().await.unwrap();
        assert_eq!(roster.len(), 1);
        assert_eq!(roster[0].name, "pod-a");
    }

    #[tokio::test]
    async fn virtual_sockets_parses_probe_output() {
        let cluster = FakeCluster {
            annotation_dump: Some(
                "userspace/configuration-data=\"{\\\"socketfile\\\": \\\"/run/memif-a.sock\\\"}\""
                    .to_string(),
            ),
            ..Default::default()
        };
        let deployer = deployer(cluster, Vec::new());

        let sockets = deployer.virtual_sockets("pod-a").await.unwrap();
        assert_eq!(
            sockets,
            NetworkAttachment::SocketList(vec!["/run/memif-a.sock".to_string()])
        );
    }

    #[tokio::test]
    async fn probe_helpers_tolerate_missing_pod() {
        let cluster = FakeCluster {
            pod_missing: true,
            ..Default::default()
        };
        let deployer = deployer(cluster, Vec::new());

        assert_eq!(
            deployer.virtual_sockets("ghost").await.unwrap(),
            NetworkAttachment::SocketList(Vec::new())
        );
        assert_eq!(
            deployer.sriov_interfaces("ghost").await.unwrap(),
            NetworkAttachment::InterfaceMap(Default::default())
        );
    }

    #[tokio::test]
    async fn terminate_deletes_config_map_in_sriov_mode() {
        let deployer = deployer(FakeCluster::default(), Vec::new());

        deployer
            .terminate("sriov", "sriovdp-config", "kube-system")
            .await
            .unwrap();

        let deleted = deployer.cluster.deleted_config_maps.lock().unwrap().clone();
        assert_eq!(
            deleted,
            [("sriovdp-config".to_string(), "kube-system".to_string())]
        );
    }

    #[tokio::test]
    async fn terminate_is_a_noop_without_sriov() {
        let deployer = deployer(FakeCluster::default(), Vec::new());

        deployer
            .terminate("none", "sriovdp-config", "kube-system")
            .await
            .unwrap();

        assert!(deployer.cluster.deleted_config_maps.lock().unwrap().is_empty());
    }
}
