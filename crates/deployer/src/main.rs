mod config;
mod k8s;
mod logging;
mod manifest;
mod orchestrator;
mod results;

use anyhow::Result;
use clap::Parser;

use crate::config::Cli;
use crate::config::Commands;
use crate::config::DeployConfig;
use crate::config::SRIOV_PLUGIN;
use crate::k8s::client::build_client;
use crate::k8s::KubeCluster;
use crate::orchestrator::Deployer;
use crate::results::RunResults;

/// Bridge a typed report into the binary-level anyhow error, keeping the
/// full context chain in the message.
fn to_anyhow<C>(report: error_stack::Report<C>) -> anyhow::Error {
    anyhow::anyhow!("{report:?}")
}

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();
    logging::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy(deploy_args) => run_deploy(deploy_args).await,
        Commands::Terminate(terminate_args) => run_terminate(terminate_args).await,
    }
}

async fn run_deploy(args: config::DeployArgs) -> Result<()> {
    let deploy_config = DeployConfig::from_args(&args).map_err(to_anyhow)?;
    let results = RunResults::prepare(&args.log_dir)
        .await
        .map_err(to_anyhow)?;

    tracing::info!(
        results = %results.path().display(),
        pods = deploy_config.count,
        "Starting deployment run"
    );

    let client = build_client(args.kubeconfig)
        .await
        .map_err(to_anyhow)?;
    let sriov = deploy_config.plugin == SRIOV_PLUGIN;
    let deployer = Deployer::new(KubeCluster::new(client), deploy_config);

    let roster = deployer
        .deploy_all()
        .await
        .map_err(to_anyhow)?;

    for record in &roster {
        let attachment = if sriov {
            deployer.sriov_interfaces(&record.name).await
        } else {
            deployer.virtual_sockets(&record.name).await
        }
        .map_err(to_anyhow)?;
        tracing::info!(pod_name = %record.name, ?attachment, "Network attachment");
    }

    results
        .write_roster(&roster)
        .await
        .map_err(to_anyhow)?;

    Ok(())
}

async fn run_terminate(args: config::TerminateArgs) -> Result<()> {
    let client = build_client(args.kubeconfig)
        .await
        .map_err(to_anyhow)?;
    let deployer = Deployer::new(
        KubeCluster::new(client),
        DeployConfig {
            manifests: Vec::new(),
            count: 0,
            namespace: "default".to_string(),
            plugin: args.plugin.clone(),
        },
    );

    deployer
        .terminate(&args.plugin, &args.sriov_config, &args.sriov_config_namespace)
        .await
        .map_err(to_anyhow)?;

    Ok(())
}
