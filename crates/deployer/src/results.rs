//! Run-scoped results bookkeeping.
//!
//! Each deployment run gets a timestamped directory under the configured log
//! directory; the roster is externalized there as JSON for downstream
//! consumers instead of being pushed into shared state.

use std::path::Path;
use std::path::PathBuf;

use chrono::Local;
use error_stack::Report;
use error_stack::ResultExt;
use tracing::info;

use crate::k8s::DeployError;
use crate::k8s::PodRecord;

/// File the roster is written to inside the results directory.
const ROSTER_FILE: &str = "pods.json";

/// Results directory for a single orchestration run.
pub(crate) struct RunResults {
    path: PathBuf,
}

impl RunResults {
    /// Create `results_<timestamp>` under `log_dir`.
    ///
    /// # Errors
    ///
    /// - [`DeployError::ResultsWriteFailed`] if the directory cannot be created
    pub(crate) async fn prepare(log_dir: &Path) -> Result<Self, Report<DeployError>> {
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let path = log_dir.join(format!("results_{timestamp}"));
        tokio::fs::create_dir_all(&path)
            .await
            .change_context(DeployError::ResultsWriteFailed {
                path: path.display().to_string(),
            })?;
        info!(path = %path.display(), "Prepared results directory");
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the roster as JSON and return the file path.
    ///
    /// # Errors
    ///
    /// - [`DeployError::ResultsWriteFailed`] if serialization or the write fails
    pub(crate) async fn write_roster(
        &self,
        roster: &[PodRecord],
    ) -> Result<PathBuf, Report<DeployError>> {
        let file = self.path.join(ROSTER_FILE);
        let json = serde_json::to_string_pretty(roster).change_context(
            DeployError::ResultsWriteFailed {
                path: file.display().to_string(),
            },
        )?;
        tokio::fs::write(&file, json).await.change_context(
            DeployError::ResultsWriteFailed {
                path: file.display().to_string(),
            },
        )?;
        info!(path = %file.display(), pods = roster.len(), "Wrote roster");
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn roster_round_trips_through_json() {
        let dir = TempDir::new().unwrap();
        let results = RunResults::prepare(dir.path()).await.unwrap();
        assert!(results.path().starts_with(dir.path()));

        let roster = vec![
            PodRecord {
                name: "pod-a".to_string(),
                namespace: "default".to_string(),
                pod_ip: "10.1.0.5".to_string(),
            },
            PodRecord {
                name: "pod-b".to_string(),
                namespace: "default".to_string(),
                pod_ip: String::new(),
            },
        ];

        let file = results.write_roster(&roster).await.unwrap();
        let json = tokio::fs::read_to_string(&file).await.unwrap();
        let restored: Vec<PodRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, roster);
    }

    #[tokio::test]
    async fn empty_roster_is_still_written() {
        let dir = TempDir::new().unwrap();
        let results = RunResults::prepare(dir.path()).await.unwrap();
        let file = results.write_roster(&[]).await.unwrap();
        let json = tokio::fs::read_to_string(&file).await.unwrap();
        assert_eq!(json.trim(), "[]");
    }
}
