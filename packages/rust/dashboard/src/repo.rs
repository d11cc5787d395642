//! Repository fetcher: make sure the notebook repository is checked out locally.

use std::ffi::OsStr;
use std::path::Path;

use tracing::{debug, info, instrument};

use nirvana_assets_shared::{AssetsError, Result, ToolsConfig};

use crate::process::run_tool;

/// Decides what happens when the checkout directory is already present.
pub trait OverwritePrompt: Send + Sync {
    /// Return `true` to delete `path` and clone again, `false` to reuse it.
    fn confirm_overwrite(&self, path: &Path) -> bool;
}

/// Non-interactive answer, for `--yes` / `--reuse` and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl OverwritePrompt for FixedAnswer {
    fn confirm_overwrite(&self, _path: &Path) -> bool {
        self.0
    }
}

/// How the checkout came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A fresh clone was made.
    Cloned,
    /// The existing directory was kept as-is.
    Reused,
}

/// Ensure `url` is checked out at `target`.
///
/// An existing `target` is either deleted and re-cloned or reused, depending
/// on `prompt`. Clone failures surface as [`AssetsError::ExternalTool`].
#[instrument(skip_all, fields(url = %url, checkout = %target.display()))]
pub async fn ensure_repository(
    url: &str,
    target: &Path,
    tools: &ToolsConfig,
    prompt: &dyn OverwritePrompt,
) -> Result<FetchOutcome> {
    if target.exists() {
        info!("checkout directory already exists");
        if !prompt.confirm_overwrite(target) {
            info!("Using existing directory.");
            return Ok(FetchOutcome::Reused);
        }
        tokio::fs::remove_dir_all(target)
            .await
            .map_err(|e| AssetsError::io(target, e))?;
        debug!("removed existing checkout");
    }

    info!(url, "cloning repository");
    run_tool(
        &tools.git,
        [OsStr::new("clone"), OsStr::new(url), target.as_os_str()],
    )
    .await?;
    info!("repository cloned");

    Ok(FetchOutcome::Cloned)
}
