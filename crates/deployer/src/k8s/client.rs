use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;

use crate::k8s::types::DeployError;

/// Build a Kubernetes client from an optional kubeconfig path.
///
/// With a path the kubeconfig file is loaded explicitly; without one the
/// default configuration is used (in-cluster or `~/.kube/config`).
///
/// # Errors
///
/// - [`DeployError::ConnectionFailed`] if the kubeconfig cannot be read or
///   the client cannot be constructed
pub(crate) async fn build_client(
    kubeconfig: Option<PathBuf>,
) -> Result<Client, Report<DeployError>> {
    match kubeconfig {
        Some(kubeconfig_path) => {
            let kubeconfig = Kubeconfig::read_from(&kubeconfig_path).change_context(
                DeployError::ConnectionFailed {
                    message: format!(
                        "Failed to read kubeconfig file: {}",
                        kubeconfig_path.display()
                    ),
                },
            )?;

            let config =
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .change_context(DeployError::ConnectionFailed {
                        message: format!(
                            "Failed to create config from kubeconfig: {}",
                            kubeconfig_path.display()
                        ),
                    })?;

            Client::try_from(config).change_context(DeployError::ConnectionFailed {
                message: "Failed to create Kubernetes client from custom kubeconfig".to_string(),
            })
        }
        None => Client::try_default()
            .await
            .change_context(DeployError::ConnectionFailed {
                message: "Failed to create Kubernetes client".to_string(),
            }),
    }
}
