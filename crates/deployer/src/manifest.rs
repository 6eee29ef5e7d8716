//! Pod manifest loading.
//!
//! Manifests are accepted in two serializations, trying JSON first and
//! falling back to YAML, matching what cluster tooling commonly emits.
//! A file that parses as neither is a fatal load error.

use std::path::Path;

use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Pod;

use crate::k8s::DeployError;

/// Load a pod manifest from a JSON or YAML file.
///
/// # Errors
///
/// - [`DeployError::ManifestLoad`] if the file cannot be read or parses as
///   neither JSON nor YAML
pub(crate) async fn load(path: &Path) -> Result<Pod, Report<DeployError>> {
    let data =
        tokio::fs::read_to_string(path)
            .await
            .change_context(DeployError::ManifestLoad {
                path: path.display().to_string(),
            })?;

    match serde_json::from_str::<Pod>(&data) {
        Ok(manifest) => Ok(manifest),
        Err(json_err) => serde_yaml::from_str::<Pod>(&data)
            .map_err(Report::new)
            .attach_printable(format!("not valid JSON either: {json_err}"))
            .change_context(DeployError::ManifestLoad {
                path: path.display().to_string(),
            }),
    }
}

/// The pod's cluster identity, required of every manifest.
///
/// # Errors
///
/// - [`DeployError::InvalidConfig`] if the manifest carries no name
pub(crate) fn pod_name(manifest: &Pod) -> Result<&str, Report<DeployError>> {
    manifest.metadata.name.as_deref().ok_or_else(|| {
        Report::new(DeployError::InvalidConfig {
            message: "pod manifest has no metadata.name".to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    async fn load_str(content: &str) -> Result<Pod, Report<DeployError>> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        load(file.path()).await
    }

    #[tokio::test]
    async fn loads_json_manifest() {
        let manifest = load_str(
            r#"{
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": {"name": "pod-json"},
                "spec": {"containers": [{"name": "app", "image": "busybox"}]}
            }"#,
        )
        .await
        .unwrap();

        assert_eq!(pod_name(&manifest).unwrap(), "pod-json");
    }

    #[tokio::test]
    async fn loads_yaml_manifest() {
        let manifest = load_str(
            r#"
apiVersion: v1
kind: Pod
metadata:
  name: pod-yaml
spec:
  containers:
    - name: app
      image: busybox
"#,
        )
        .await
        .unwrap();

        assert_eq!(pod_name(&manifest).unwrap(), "pod-yaml");
    }

    #[tokio::test]
    async fn rejects_unparseable_content() {
        let result = load_str("{not valid json: [nor yaml").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn rejects_missing_file() {
        let result = load(Path::new("/nonexistent/pod.yaml")).await;
        assert!(result.is_err());
    }

    #[test]
    fn pod_name_requires_name() {
        let manifest = Pod::default();
        assert!(pod_name(&manifest).is_err());
    }
}
