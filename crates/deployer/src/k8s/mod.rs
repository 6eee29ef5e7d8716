//! Kubernetes integration module.
//!
//! This module provides the cluster-facing pieces of the deployment
//! pipeline: client construction, the [`ClusterOps`] seam with its
//! production [`KubeCluster`] implementation, bounded readiness polling,
//! and parsing of the network annotations captured from inside pods.

pub(crate) mod annotations;
pub(crate) mod client;
pub(crate) mod cluster;
pub(crate) mod readiness;
pub(crate) mod types;

pub(crate) use cluster::ClusterOps;
pub(crate) use cluster::KubeCluster;
pub(crate) use readiness::PollTiming;
pub(crate) use readiness::ReadinessPoller;
pub(crate) use types::DeployError;
pub(crate) use types::ExecOutcome;
pub(crate) use types::PodRecord;
