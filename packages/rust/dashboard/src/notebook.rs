//! Notebook discovery and conversion through `jupyter nbconvert`.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use nirvana_assets_shared::{AssetsError, Result, ToolsConfig};

use crate::process::{probe_tool, run_tool};

/// Make sure `jupyter nbconvert` can run, installing it with pip once if not.
#[instrument(skip_all)]
pub async fn ensure_nbconvert(tools: &ToolsConfig) -> Result<()> {
    if probe_tool(&tools.jupyter, ["nbconvert", "--version"]).await {
        info!("nbconvert is installed");
        return Ok(());
    }

    warn!(python = %tools.python, "nbconvert is not installed, installing");
    run_tool(&tools.python, ["-m", "pip", "install", "nbconvert"]).await?;

    if probe_tool(&tools.jupyter, ["nbconvert", "--version"]).await {
        return Ok(());
    }
    Err(AssetsError::tool(
        &tools.jupyter,
        -1,
        "nbconvert is still unavailable after installing it",
    ))
}

/// List the `.ipynb` files directly inside `dir`, sorted by path.
///
/// A missing directory yields an empty list.
pub fn find_notebooks(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(AssetsError::io(dir, e)),
    };

    let mut notebooks = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| AssetsError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "ipynb") {
            notebooks.push(path);
        }
    }
    notebooks.sort();

    Ok(notebooks)
}

/// Convert `notebook` to `<output_dir>/<output_name>` and return that path.
///
/// `output_name` must carry the `.html` extension, since nbconvert appends it
/// to the stem it is given.
#[instrument(skip_all, fields(notebook = %notebook.display()))]
pub async fn convert_notebook(
    notebook: &Path,
    output_dir: &Path,
    output_name: &str,
    tools: &ToolsConfig,
) -> Result<PathBuf> {
    let name = Path::new(output_name);
    if !name.extension().is_some_and(|ext| ext == "html") {
        return Err(AssetsError::validation(format!(
            "dashboard file name must end in .html, got '{output_name}'"
        )));
    }
    let stem = name
        .file_stem()
        .ok_or_else(|| AssetsError::validation(format!("invalid file name '{output_name}'")))?;

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| AssetsError::io(output_dir, e))?;

    info!("converting notebook to HTML");
    run_tool(
        &tools.jupyter,
        [
            OsStr::new("nbconvert"),
            OsStr::new("--to"),
            OsStr::new("html"),
            OsStr::new("--output"),
            stem,
            OsStr::new("--output-dir"),
            output_dir.as_os_str(),
            notebook.as_os_str(),
        ],
    )
    .await?;

    let output_path = output_dir.join(output_name);
    if !output_path.is_file() {
        return Err(AssetsError::validation(format!(
            "nbconvert finished but {} was not written",
            output_path.display()
        )));
    }

    info!(path = %output_path.display(), "notebook converted");
    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("nirvana-nb-{label}-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn finds_top_level_notebooks_sorted() {
        let dir = scratch_dir("find");
        std::fs::write(dir.join("b_trends.ipynb"), "{}").unwrap();
        std::fs::write(dir.join("a_patterns.ipynb"), "{}").unwrap();
        std::fs::write(dir.join("README.md"), "# repo").unwrap();
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested/deep.ipynb"), "{}").unwrap();

        let found = find_notebooks(&dir).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a_patterns.ipynb", "b_trends.ipynb"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_directory_has_no_notebooks() {
        let dir = std::env::temp_dir().join(format!("nirvana-nb-absent-{}", uuid::Uuid::now_v7()));
        assert!(find_notebooks(&dir).unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_non_html_output_name() {
        let dir = scratch_dir("name");
        let err = convert_notebook(
            &dir.join("a.ipynb"),
            &dir,
            "dashboard.pdf",
            &ToolsConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AssetsError::Validation { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn converter_that_writes_nothing_is_an_error() {
        let dir = scratch_dir("silent");
        let tools = ToolsConfig {
            jupyter: "true".into(),
            ..ToolsConfig::default()
        };
        let err = convert_notebook(&dir.join("a.ipynb"), &dir, "dashboard.html", &tools)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("was not written"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nbconvert_present_needs_no_install() {
        let tools = ToolsConfig {
            jupyter: "true".into(),
            python: "nirvana-assets-no-such-python".into(),
            ..ToolsConfig::default()
        };
        ensure_nbconvert(&tools).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_install_is_reported() {
        let tools = ToolsConfig {
            jupyter: "false".into(),
            python: "false".into(),
            ..ToolsConfig::default()
        };
        let err = ensure_nbconvert(&tools).await.unwrap_err();
        assert!(matches!(err, AssetsError::ExternalTool { .. }));
    }
}
