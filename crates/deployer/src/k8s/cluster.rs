use async_trait::async_trait;
use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::AttachParams;
use kube::api::DeleteParams;
use kube::api::PostParams;
use kube::Api;
use kube::Client;
use tokio::io::AsyncReadExt;
use tracing::debug;
use tracing::info;

use crate::k8s::types::DeployError;
use crate::k8s::types::ExecOutcome;
use crate::k8s::types::PodPhase;

/// Cluster operations the orchestrator depends on.
///
/// The production implementation is [`KubeCluster`]; tests script this trait
/// to drive the readiness and deployment logic without a live cluster.
#[async_trait]
pub(crate) trait ClusterOps: Send + Sync {
    /// Submit a pod manifest to the cluster.
    async fn create_pod(
        &self,
        namespace: &str,
        manifest: &Pod,
    ) -> Result<(), Report<DeployError>>;

    /// Read the current lifecycle phase of a pod.
    async fn pod_phase(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<PodPhase, Report<DeployError>>;

    /// Read the pod's assigned cluster IP, if one has been assigned yet.
    async fn pod_ip(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<String>, Report<DeployError>>;

    /// Execute a command inside a running pod and capture its stdout.
    ///
    /// A pod that does not exist yields [`ExecOutcome::PodMissing`] rather
    /// than an error; any other failure on the exec channel is fatal.
    async fn exec(
        &self,
        name: &str,
        namespace: &str,
        command: &[String],
    ) -> Result<ExecOutcome, Report<DeployError>>;

    /// Create the namespace if it does not exist yet.
    async fn ensure_namespace(&self, namespace: &str) -> Result<(), Report<DeployError>>;

    /// Delete a named config map (device plugin cleanup).
    async fn delete_config_map(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<(), Report<DeployError>>;
}

/// Production [`ClusterOps`] backed by the Kubernetes API.
pub(crate) struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterOps for KubeCluster {
    async fn create_pod(
        &self,
        namespace: &str,
        manifest: &Pod,
    ) -> Result<(), Report<DeployError>> {
        let pod_name = manifest
            .metadata
            .name
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        let response = self
            .pods(namespace)
            .create(&PostParams::default(), manifest)
            .await
            .change_context(DeployError::PodCreateFailed {
                pod_name: pod_name.clone(),
                namespace: namespace.to_string(),
            })?;
        debug!(pod_name = %pod_name, resource_version = ?response.metadata.resource_version, "Pod created");
        Ok(())
    }

    async fn pod_phase(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<PodPhase, Report<DeployError>> {
        let pod = self.pods(namespace).get_status(name).await.change_context(
            DeployError::StatusReadFailed {
                pod_name: name.to_string(),
                namespace: namespace.to_string(),
            },
        )?;
        let phase = pod.status.and_then(|status| status.phase);
        Ok(PodPhase::from_status(phase.as_deref()))
    }

    async fn pod_ip(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<Option<String>, Report<DeployError>> {
        let pod = self.pods(namespace).get_status(name).await.change_context(
            DeployError::StatusReadFailed {
                pod_name: name.to_string(),
                namespace: namespace.to_string(),
            },
        )?;
        Ok(pod.status.and_then(|status| status.pod_ip))
    }

    async fn exec(
        &self,
        name: &str,
        namespace: &str,
        command: &[String],
    ) -> Result<ExecOutcome, Report<DeployError>> {
        let pods = self.pods(namespace);

        // Existence pre-check: a missing pod is a sentinel, not a failure.
        match pods.get(name).await {
            Ok(_) => {}
            Err(kube::Error::Api(err)) if err.code == 404 => {
                return Ok(ExecOutcome::PodMissing);
            }
            Err(err) => {
                return Err(Report::new(err).change_context(DeployError::ExecFailed {
                    pod_name: name.to_string(),
                    namespace: namespace.to_string(),
                }));
            }
        }

        let params = AttachParams {
            stdin: false,
            stdout: true,
            stderr: true,
            tty: false,
            ..Default::default()
        };
        let mut attached = pods
            .exec(name, command.iter().map(String::as_str), &params)
            .await
            .change_context(DeployError::ExecFailed {
                pod_name: name.to_string(),
                namespace: namespace.to_string(),
            })?;

        let mut captured = String::new();
        if let Some(mut stdout) = attached.stdout() {
            stdout
                .read_to_string(&mut captured)
                .await
                .change_context(DeployError::ExecFailed {
                    pod_name: name.to_string(),
                    namespace: namespace.to_string(),
                })?;
        }
        attached
            .join()
            .await
            .change_context(DeployError::ExecFailed {
                pod_name: name.to_string(),
                namespace: namespace.to_string(),
            })?;

        Ok(ExecOutcome::Captured(captured))
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<(), Report<DeployError>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let existing =
            api.get_opt(namespace)
                .await
                .change_context(DeployError::ConnectionFailed {
                    message: format!("Failed to look up namespace {namespace}"),
                })?;
        if existing.is_some() {
            return Ok(());
        }

        let manifest = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        match api.create(&PostParams::default(), &manifest).await {
            Ok(_) => {
                info!(namespace, "Created namespace");
                Ok(())
            }
            // Lost the race against another creator; the namespace is there.
            Err(kube::Error::Api(err)) if err.code == 409 => Ok(()),
            Err(err) => Err(Report::new(err).change_context(DeployError::ConnectionFailed {
                message: format!("Failed to create namespace {namespace}"),
            })),
        }
    }

    async fn delete_config_map(
        &self,
        name: &str,
        namespace: &str,
    ) -> Result<(), Report<DeployError>> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .change_context(DeployError::CleanupFailed {
                name: name.to_string(),
            })?;
        info!(name, namespace, "Deleted config map");
        Ok(())
    }
}
