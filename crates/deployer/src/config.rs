use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use error_stack::Report;

use crate::k8s::DeployError;

/// Plugin mode that requires config-map cleanup on terminate.
pub const SRIOV_PLUGIN: &str = "sriov";

#[derive(Parser)]
#[command(about, long_about = None, version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy workload pods and collect their network records
    Deploy(DeployArgs),
    /// Clean up plugin-specific cluster resources
    Terminate(TerminateArgs),
}

#[derive(Parser)]
pub struct DeployArgs {
    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long = "manifest",
        required = true,
        value_hint = clap::ValueHint::FilePath,
        help = "Pod manifest file (JSON or YAML), one per pod; repeat for each pod"
    )]
    pub manifests: Vec<PathBuf>,

    #[arg(
        long,
        env = "POD_COUNT",
        help = "Number of pods to deploy (defaults to the number of manifests)"
    )]
    pub count: Option<usize>,

    #[arg(
        long,
        env = "POD_NAMESPACE",
        default_value = "default",
        help = "Namespace to deploy pods into"
    )]
    pub namespace: String,

    #[arg(
        long,
        env = "PLUGIN",
        default_value = "none",
        help = "Network device plugin mode; 'sriov' probes interface mappings instead of sockets"
    )]
    pub plugin: String,

    #[arg(
        long,
        env = "LOG_DIR",
        default_value = "logs",
        value_hint = clap::ValueHint::DirPath,
        help = "Directory under which the timestamped results directory is created"
    )]
    pub log_dir: PathBuf,
}

#[derive(Parser)]
pub struct TerminateArgs {
    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        env = "PLUGIN",
        default_value = "none",
        help = "Network device plugin mode, e.g. 'sriov'"
    )]
    pub plugin: String,

    #[arg(
        long,
        default_value = "sriovdp-config",
        help = "Name of the SR-IOV device plugin config map to delete in sriov mode"
    )]
    pub sriov_config: String,

    #[arg(
        long,
        default_value = "kube-system",
        help = "Namespace of the SR-IOV device plugin config map"
    )]
    pub sriov_config_namespace: String,
}

/// Run-scoped deployment configuration, handed to the orchestrator by value.
#[derive(Debug, Clone)]
pub(crate) struct DeployConfig {
    /// Manifest files, one per pod, in submission order.
    pub manifests: Vec<PathBuf>,
    /// Number of pods to deploy.
    pub count: usize,
    /// Namespace the pods are created in.
    pub namespace: String,
    /// Network device plugin mode, selecting which attachment data to probe.
    pub plugin: String,
}

impl DeployConfig {
    /// Validate CLI arguments into a deployment configuration.
    ///
    /// # Errors
    ///
    /// - [`DeployError::InvalidConfig`] if more pods are requested than
    ///   manifests were given
    pub(crate) fn from_args(args: &DeployArgs) -> Result<Self, Report<DeployError>> {
        let count = args.count.unwrap_or(args.manifests.len());
        if count > args.manifests.len() {
            return Err(Report::new(DeployError::InvalidConfig {
                message: format!(
                    "{count} pods requested but only {} manifests given",
                    args.manifests.len()
                ),
            }));
        }
        Ok(Self {
            manifests: args.manifests.clone(),
            count,
            namespace: args.namespace.clone(),
            plugin: args.plugin.clone(),
        })
    }
}
