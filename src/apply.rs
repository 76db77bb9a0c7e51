//! Manifest application against the target cluster
//!
//! The real implementation shells out to kubectl for the declarative apply.
//! Manifests that need credential rewriting are downloaded natively, rewritten
//! in-process, and staged to a uniquely named file that is removed once the
//! apply completes. No external text-processing tools are involved.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::component::ComponentSpec;
use crate::credentials::{apply_substitutions, SubstitutionRule};
use crate::error::Error;
use crate::Result;

/// Trait for applying component manifests to the target cluster
///
/// Abstracts the kubectl execution so the orchestrator can be tested
/// without a cluster.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ManifestApplier: Send + Sync {
    /// Apply one component manifest, rewriting placeholders first when
    /// substitution rules are supplied.
    async fn apply(&self, spec: &ComponentSpec, substitutions: &[SubstitutionRule]) -> Result<()>;
}

/// Applies manifests with kubectl, staging rewritten copies locally
///
/// Construction resolves kubectl up front so a missing tool aborts the run
/// before any apply is attempted. Concurrent runs against the same working
/// directory are not coordinated here; staged files are unique per run.
pub struct KubectlApplier {
    kubectl: PathBuf,
    kubeconfig: Option<PathBuf>,
    work_dir: PathBuf,
    http: reqwest::Client,
    run_id: String,
}

impl KubectlApplier {
    /// Resolve kubectl and build an applier.
    ///
    /// `work_dir` is where rewritten manifests are staged; `kubeconfig`, if
    /// given, is passed to every kubectl invocation. Cluster targeting is
    /// otherwise left to the ambient kubectl configuration.
    pub async fn new(work_dir: PathBuf, kubeconfig: Option<PathBuf>) -> Result<Self> {
        let kubectl = resolve_tool(
            "kubectl",
            "Install kubectl: https://kubernetes.io/docs/tasks/tools/",
        )
        .await?;

        Ok(Self {
            kubectl,
            kubeconfig,
            work_dir,
            http: reqwest::Client::new(),
            run_id: generate_run_id(),
        })
    }

    /// Switch the active kubectl context before provisioning.
    pub async fn use_context(&self, context: &str) -> Result<()> {
        let output = self
            .command()
            .args(["config", "use-context", context])
            .output()
            .await
            .map_err(|e| Error::command_failed(format!("failed to run kubectl: {}", e)))?;

        if !output.status.success() {
            return Err(Error::command_failed(format!(
                "kubectl config use-context {} failed: {}",
                context,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        debug!(context, "Switched kubectl context");
        Ok(())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.kubectl);
        if let Some(ref kubeconfig) = self.kubeconfig {
            cmd.env("KUBECONFIG", kubeconfig);
        }
        cmd
    }

    /// Fetch a component manifest into an owned buffer.
    async fn download(&self, spec: &ComponentSpec) -> Result<String> {
        let response = self
            .http
            .get(&spec.manifest_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                Error::apply_failed(
                    spec.component,
                    format!("failed to download {}: {}", spec.manifest_url, e),
                )
            })?;

        response.text().await.map_err(|e| {
            Error::apply_failed(
                spec.component,
                format!("failed to read {}: {}", spec.manifest_url, e),
            )
        })
    }

    /// Run `kubectl apply -f <target>`, mapping failure to the component.
    async fn kubectl_apply(&self, spec: &ComponentSpec, target: impl AsRef<OsStr>) -> Result<()> {
        let output = self
            .command()
            .arg("apply")
            .arg("-f")
            .arg(target)
            .output()
            .await
            .map_err(|e| {
                Error::apply_failed(spec.component, format!("failed to run kubectl: {}", e))
            })?;

        if !output.status.success() {
            return Err(Error::apply_failed(
                spec.component,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl ManifestApplier for KubectlApplier {
    async fn apply(&self, spec: &ComponentSpec, substitutions: &[SubstitutionRule]) -> Result<()> {
        if substitutions.is_empty() {
            return self.kubectl_apply(spec, &spec.manifest_url).await;
        }

        let manifest = self.download(spec).await?;
        let rewritten = apply_substitutions(&manifest, substitutions);

        let name = format!("{}-components-{}.yaml", spec.component, self.run_id);
        let staged = TempManifest::write(&self.work_dir, &name, &rewritten).await?;
        debug!(
            component = %spec.component,
            path = %staged.path().display(),
            rules = substitutions.len(),
            "Staged rewritten manifest"
        );

        self.kubectl_apply(spec, staged.path()).await
    }
}

/// RAII guard for a staged manifest file; the file is removed on drop.
struct TempManifest {
    path: PathBuf,
}

impl TempManifest {
    /// Write `content` to `name` under `dir`.
    async fn write(dir: &Path, name: &str, content: &str) -> Result<Self> {
        let path = dir.join(name);
        tokio::fs::write(&path, content).await?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempManifest {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!(
                path = %self.path.display(),
                error = %e,
                "failed to remove staged manifest"
            );
        }
    }
}

/// Resolve an executable on PATH via `which`.
async fn resolve_tool(tool: &str, hint: &str) -> Result<PathBuf> {
    let output = Command::new("which")
        .arg(tool)
        .output()
        .await
        .map_err(|e| Error::tool_not_found(tool, format!("failed to run which: {}", e)))?;

    if !output.status.success() {
        return Err(Error::tool_not_found(tool, hint));
    }

    Ok(PathBuf::from(
        String::from_utf8_lossy(&output.stdout).trim(),
    ))
}

/// Generate a short readable run ID (6 hex chars).
///
/// Staged manifest names carry it so runs sharing a working directory do
/// not clobber each other's files.
fn generate_run_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u32;
    let pid = std::process::id();
    format!("{:06x}", (timestamp ^ pid) & 0xFFFFFF)
}
