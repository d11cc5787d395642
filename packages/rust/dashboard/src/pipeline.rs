//! End-to-end `dashboard` pipeline: clone → locate notebook → convert → rewrite → clean up.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use nirvana_assets_shared::{AppConfig, AssetsError, ProgressReporter, Result, ToolsConfig};

use crate::notebook::{convert_notebook, ensure_nbconvert, find_notebooks};
use crate::repo::{FetchOutcome, OverwritePrompt, ensure_repository};
use crate::webview::{WebViewTemplate, post_process_file};

/// Configuration for the `update_dashboard` pipeline.
#[derive(Debug, Clone)]
pub struct UpdateDashboardConfig {
    /// Notebook repository to clone.
    pub repo_url: String,
    /// Directory receiving the dashboard HTML.
    pub output_dir: PathBuf,
    /// Temporary checkout location, removed when the pipeline ends.
    pub checkout_dir: PathBuf,
    /// Dashboard file name (e.g. `dashboard.html`).
    pub output_file: String,
    /// Blocks injected by the post-processor.
    pub template: WebViewTemplate,
    /// External program commands.
    pub tools: ToolsConfig,
    /// Run the nbconvert availability check before cloning.
    pub check_requirements: bool,
}

impl From<&AppConfig> for UpdateDashboardConfig {
    fn from(config: &AppConfig) -> Self {
        let output_dir = PathBuf::from(&config.dashboard.output_dir);
        Self {
            repo_url: config.dashboard.repo_url.clone(),
            checkout_dir: output_dir.join(&config.dashboard.checkout_dir_name),
            output_dir,
            output_file: config.dashboard.output_file.clone(),
            template: WebViewTemplate::from(&config.dashboard),
            tools: config.tools.clone(),
            check_requirements: true,
        }
    }
}

/// Result of the `update_dashboard` pipeline.
#[derive(Debug)]
pub enum DashboardOutcome {
    /// The dashboard was regenerated.
    Updated {
        /// Path to the rewritten HTML file.
        html_path: PathBuf,
        /// File name of the notebook that was converted.
        notebook: String,
        /// Whether the checkout was cloned or reused.
        fetch: FetchOutcome,
        /// Total elapsed time.
        elapsed: Duration,
    },
    /// The repository holds no top-level notebook; nothing was converted.
    NoNotebooks,
}

/// Owns the temporary checkout and deletes it when dropped.
///
/// The happy path calls [`Checkout::remove`] so the removal is logged and its
/// errors surface; the `Drop` impl only covers early returns.
struct Checkout {
    path: PathBuf,
    armed: bool,
}

impl Checkout {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn remove(mut self) -> Result<()> {
        self.armed = false;
        let exists = tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| AssetsError::io(&self.path, e))?;
        if exists {
            tokio::fs::remove_dir_all(&self.path)
                .await
                .map_err(|e| AssetsError::io(&self.path, e))?;
            info!(path = %self.path.display(), "Removed temporary directory");
        }
        Ok(())
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        if self.armed && self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to remove temporary directory");
            }
        }
    }
}

/// Run the full dashboard pipeline.
///
/// 1. Check that nbconvert is available (optional)
/// 2. Clone or reuse the notebook repository
/// 3. Pick the first top-level notebook
/// 4. Convert it to HTML
/// 5. Rewrite the HTML for the WebView
/// 6. Delete the checkout
#[instrument(skip_all, fields(repo = %config.repo_url))]
pub async fn update_dashboard(
    config: &UpdateDashboardConfig,
    prompt: &dyn OverwritePrompt,
    progress: &dyn ProgressReporter,
) -> Result<DashboardOutcome> {
    let start = Instant::now();

    if config.check_requirements {
        progress.phase("Checking for nbconvert");
        ensure_nbconvert(&config.tools).await?;
    }

    // --- Phase 1: Fetch ---
    let checkout = Checkout::new(&config.checkout_dir);
    progress.phase("Fetching notebook repository");
    let fetch = ensure_repository(&config.repo_url, checkout.path(), &config.tools, prompt).await?;

    // --- Phase 2: Locate ---
    progress.phase("Locating notebook");
    let notebooks = find_notebooks(checkout.path())?;
    let Some(notebook) = notebooks.into_iter().next() else {
        info!("No Jupyter notebooks found in the repository.");
        checkout.remove().await?;
        progress.done();
        return Ok(DashboardOutcome::NoNotebooks);
    };
    info!(notebook = %notebook.display(), "found notebook");

    // --- Phase 3: Convert ---
    progress.phase("Converting notebook to HTML");
    let html_path = convert_notebook(
        &notebook,
        &config.output_dir,
        &config.output_file,
        &config.tools,
    )
    .await?;

    // --- Phase 4: Rewrite ---
    progress.phase("Post-processing HTML");
    post_process_file(&html_path, &config.template).await?;

    // --- Phase 5: Clean up ---
    progress.phase("Cleaning up");
    let notebook = notebook
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    checkout.remove().await?;

    let elapsed = start.elapsed();
    info!(
        html = %html_path.display(),
        elapsed_ms = elapsed.as_millis() as u64,
        "dashboard update complete"
    );
    progress.done();

    Ok(DashboardOutcome::Updated {
        html_path,
        notebook,
        fetch,
        elapsed,
    })
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use nirvana_assets_shared::SilentProgress;

    use super::*;
    use crate::repo::FixedAnswer;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("nirvana-pipeline-{label}-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    /// Stand-in for `git clone <url> <target>` that lays down one notebook.
    const CLONE_WITH_NOTEBOOK: &str = r#"mkdir -p "$3" && printf '{"cells": []}' > "$3/patterns.ipynb""#;

    /// Stand-in for `jupyter nbconvert --to html --output <stem> --output-dir <dir> <nb>`.
    const FAKE_NBCONVERT: &str = r#"[ "$1" = "nbconvert" ] || exit 2
printf '<!DOCTYPE html>\n<html>\n<head>\n<meta name="viewport" content="width=device-width, initial-scale=1.0">\n<title>report</title>\n</head>\n<body>\n<p>weekly intake</p>\n</body>\n</html>\n' > "$7/$5.html""#;

    fn config_for(root: &Path, git: String, jupyter: String) -> UpdateDashboardConfig {
        let output_dir = root.join("dietary_dashboard");
        UpdateDashboardConfig {
            repo_url: "https://example.com/Dietary-Patterns-DAP.git".into(),
            checkout_dir: output_dir.join("temp_repo"),
            output_dir,
            output_file: "dashboard.html".into(),
            template: WebViewTemplate::default(),
            tools: ToolsConfig {
                git,
                jupyter,
                python: "false".into(),
            },
            check_requirements: false,
        }
    }

    #[tokio::test]
    async fn pipeline_writes_dashboard_and_removes_checkout() {
        let root = scratch_dir("full");
        let bin = scratch_dir("full-bin");
        let git = write_script(&bin, "git", CLONE_WITH_NOTEBOOK);
        let jupyter = write_script(&bin, "jupyter", FAKE_NBCONVERT);
        let config = config_for(&root, git, jupyter);

        let outcome = update_dashboard(&config, &FixedAnswer(true), &SilentProgress)
            .await
            .unwrap();

        match outcome {
            DashboardOutcome::Updated {
                html_path,
                notebook,
                fetch,
                ..
            } => {
                assert_eq!(html_path, config.output_dir.join("dashboard.html"));
                assert_eq!(notebook, "patterns.ipynb");
                assert_eq!(fetch, FetchOutcome::Cloned);

                let html = std::fs::read_to_string(&html_path).unwrap();
                assert_eq!(html.matches(r#"name="viewport""#).count(), 1);
                assert!(html.contains("user-scalable=no"));
                assert!(html.contains("<h1>Dietary Patterns Dashboard</h1>"));
                assert!(html.contains("<p>weekly intake</p>"));
            }
            DashboardOutcome::NoNotebooks => panic!("expected a converted dashboard"),
        }
        assert!(!config.checkout_dir.exists());

        let _ = std::fs::remove_dir_all(&root);
        let _ = std::fs::remove_dir_all(&bin);
    }

    #[tokio::test]
    async fn empty_repository_skips_conversion() {
        let root = scratch_dir("empty");
        let bin = scratch_dir("empty-bin");
        let git = write_script(&bin, "git", r#"mkdir -p "$3""#);
        // Conversion must not run; a converter that fails loudly proves it.
        let config = config_for(&root, git, "false".into());

        let outcome = update_dashboard(&config, &FixedAnswer(true), &SilentProgress)
            .await
            .unwrap();

        assert!(matches!(outcome, DashboardOutcome::NoNotebooks));
        assert!(!config.checkout_dir.exists());
        assert!(!config.output_dir.join("dashboard.html").exists());

        let _ = std::fs::remove_dir_all(&root);
        let _ = std::fs::remove_dir_all(&bin);
    }

    #[tokio::test]
    async fn failed_conversion_still_removes_checkout() {
        let root = scratch_dir("fail");
        let bin = scratch_dir("fail-bin");
        let git = write_script(&bin, "git", CLONE_WITH_NOTEBOOK);
        let config = config_for(&root, git, "false".into());

        let err = update_dashboard(&config, &FixedAnswer(true), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, AssetsError::ExternalTool { .. }));
        assert!(!config.checkout_dir.exists());

        let _ = std::fs::remove_dir_all(&root);
        let _ = std::fs::remove_dir_all(&bin);
    }

    #[tokio::test]
    async fn reused_checkout_is_converted_then_removed() {
        let root = scratch_dir("reuse");
        let bin = scratch_dir("reuse-bin");
        let jupyter = write_script(&bin, "jupyter", FAKE_NBCONVERT);
        let config = config_for(&root, "nirvana-assets-no-such-git".into(), jupyter);

        std::fs::create_dir_all(&config.checkout_dir).unwrap();
        std::fs::write(config.checkout_dir.join("existing.ipynb"), "{}").unwrap();

        let outcome = update_dashboard(&config, &FixedAnswer(false), &SilentProgress)
            .await
            .unwrap();

        match outcome {
            DashboardOutcome::Updated { notebook, fetch, .. } => {
                assert_eq!(notebook, "existing.ipynb");
                assert_eq!(fetch, FetchOutcome::Reused);
            }
            DashboardOutcome::NoNotebooks => panic!("expected a converted dashboard"),
        }
        assert!(!config.checkout_dir.exists());

        let _ = std::fs::remove_dir_all(&root);
        let _ = std::fs::remove_dir_all(&bin);
    }

    #[tokio::test]
    async fn unreadable_checkout_location_is_reported() {
        let root = scratch_dir("notdir");
        let file = root.join("plain-file");
        std::fs::write(&file, "not a directory").unwrap();

        // A path below a regular file cannot be stat'ed; cleanup must say so.
        let err = Checkout::new(&file.join("temp_repo")).remove().await.unwrap_err();
        assert!(matches!(err, AssetsError::Io { .. }));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn removing_an_absent_checkout_is_fine() {
        let root = scratch_dir("absent");
        Checkout::new(&root.join("temp_repo")).remove().await.unwrap();
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn config_defaults_follow_app_config() {
        let config = UpdateDashboardConfig::from(&AppConfig::default());
        assert_eq!(
            config.checkout_dir,
            PathBuf::from("app/src/main/assets/dietary_dashboard/temp_repo")
        );
        assert_eq!(config.output_file, "dashboard.html");
        assert!(config.check_requirements);
    }
}
