//! Application configuration for nirvana-assets.
//!
//! User config lives at `~/.nirvana-assets/nirvana-assets.toml`.
//! CLI flags override config file values, which override defaults.
//! Every default matches the constant the asset scripts were run with, so a
//! missing config file reproduces the stock behaviour.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AssetsError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "nirvana-assets.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".nirvana-assets";

// ---------------------------------------------------------------------------
// Config structs (matching nirvana-assets.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Dietary dashboard pipeline.
    #[serde(default)]
    pub dashboard: DashboardConfig,

    /// Model hub download (variant A).
    #[serde(default)]
    pub hub: HubConfig,

    /// Direct URL model download (variant B).
    #[serde(default)]
    pub direct: DirectDownloadConfig,

    /// External programs.
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// `[dashboard]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Notebook repository to clone.
    #[serde(default = "default_repo_url")]
    pub repo_url: String,

    /// Directory that receives the dashboard HTML (and hosts the temporary checkout).
    #[serde(default = "default_dashboard_dir")]
    pub output_dir: String,

    /// Name of the temporary checkout directory inside `output_dir`.
    #[serde(default = "default_checkout_dir_name")]
    pub checkout_dir_name: String,

    /// File name of the generated dashboard.
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Heading injected at the top of the dashboard body.
    #[serde(default = "default_title")]
    pub title: String,

    /// Sub-heading injected under the title.
    #[serde(default = "default_subtitle")]
    pub subtitle: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            repo_url: default_repo_url(),
            output_dir: default_dashboard_dir(),
            checkout_dir_name: default_checkout_dir_name(),
            output_file: default_output_file(),
            title: default_title(),
            subtitle: default_subtitle(),
        }
    }
}

fn default_repo_url() -> String {
    "https://github.com/Aayush-Chawla/Dietary-Patterns-DAP.git".into()
}
fn default_dashboard_dir() -> String {
    "app/src/main/assets/dietary_dashboard".into()
}
fn default_checkout_dir_name() -> String {
    "temp_repo".into()
}
fn default_output_file() -> String {
    "dashboard.html".into()
}
fn default_title() -> String {
    "Dietary Patterns Dashboard".into()
}
fn default_subtitle() -> String {
    "Advanced analysis based on your dietary data".into()
}

/// `[hub]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    /// Model handle: `owner/model/framework/variation[/version]`.
    #[serde(default = "default_handle")]
    pub handle: String,

    /// Hub API endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Cache root override. Falls back to `$KAGGLEHUB_CACHE`, then `~/.cache/kagglehub`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,

    /// Destination assets directory.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,

    /// File extensions (without the dot) copied into the assets directory.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Name of the env var holding the hub username (never store the value itself).
    #[serde(default = "default_username_env")]
    pub username_env: String,

    /// Name of the env var holding the hub API key.
    #[serde(default = "default_key_env")]
    pub key_env: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            handle: default_handle(),
            endpoint: default_endpoint(),
            cache_dir: None,
            assets_dir: default_assets_dir(),
            extensions: default_extensions(),
            username_env: default_username_env(),
            key_env: default_key_env(),
        }
    }
}

fn default_handle() -> String {
    "google/aiy/tfLite/vision-classifier-food-v1".into()
}
fn default_endpoint() -> String {
    "https://www.kaggle.com".into()
}
fn default_assets_dir() -> String {
    "app/src/main/assets".into()
}
fn default_extensions() -> Vec<String> {
    vec!["tflite".into(), "txt".into()]
}
fn default_username_env() -> String {
    "KAGGLE_USERNAME".into()
}
fn default_key_env() -> String {
    "KAGGLE_KEY".into()
}

/// `[direct]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectDownloadConfig {
    /// Model file URL.
    #[serde(default = "default_model_url")]
    pub url: String,

    /// Destination file path.
    #[serde(default = "default_destination")]
    pub destination: String,

    /// User-Agent header sent with the request. Some model hosts reject
    /// non-browser agents.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DirectDownloadConfig {
    fn default() -> Self {
        Self {
            url: default_model_url(),
            destination: default_destination(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_model_url() -> String {
    "https://tfhub.dev/google/lite-model/aiy/vision/classifier/food_V1/1?lite-format=tflite".into()
}
fn default_destination() -> String {
    "app/src/main/assets/food_recognition_model.tflite".into()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36"
        .into()
}

/// `[tools]` section: commands used for the external programs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Source-control client.
    #[serde(default = "default_git")]
    pub git: String,

    /// Jupyter launcher (runs `nbconvert`).
    #[serde(default = "default_jupyter")]
    pub jupyter: String,

    /// Python interpreter used to install `nbconvert` when it is missing.
    #[serde(default = "default_python")]
    pub python: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: default_git(),
            jupyter: default_jupyter(),
            python: default_python(),
        }
    }
}

fn default_git() -> String {
    "git".into()
}
fn default_jupyter() -> String {
    "jupyter".into()
}
fn default_python() -> String {
    "python3".into()
}

impl AppConfig {
    /// Check that every configured URL parses and the allow-list is usable.
    pub fn validate(&self) -> Result<()> {
        parse_url("dashboard.repo_url", &self.dashboard.repo_url)?;
        parse_url("hub.endpoint", &self.hub.endpoint)?;
        parse_url("direct.url", &self.direct.url)?;

        if self.hub.extensions.is_empty() {
            return Err(AssetsError::config("hub.extensions must not be empty"));
        }
        if let Some(ext) = self.hub.extensions.iter().find(|e| e.starts_with('.')) {
            return Err(AssetsError::config(format!(
                "hub.extensions entries are written without a leading dot, got '{ext}'"
            )));
        }
        if self.dashboard.checkout_dir_name.is_empty() {
            return Err(AssetsError::config("dashboard.checkout_dir_name must not be empty"));
        }

        Ok(())
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| AssetsError::config(format!("{key}: invalid URL '{value}': {e}")))
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.nirvana-assets/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| AssetsError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.nirvana-assets/nirvana-assets.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AssetsError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| AssetsError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Load from an explicit path when given, otherwise from the default location,
/// then validate.
pub fn resolve_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config = match explicit {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    config.validate()?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AssetsError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AssetsError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AssetsError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("repo_url"));
        assert!(toml_str.contains("KAGGLE_USERNAME"));
        assert!(!toml_str.contains("cache_dir"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.dashboard.output_file, "dashboard.html");
        assert_eq!(parsed.hub.extensions, vec!["tflite", "txt"]);
        assert_eq!(parsed.tools.git, "git");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[dashboard]
title = "Weekly Report"

[hub]
cache_dir = "/tmp/hub-cache"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.dashboard.title, "Weekly Report");
        assert_eq!(
            config.dashboard.subtitle,
            "Advanced analysis based on your dietary data"
        );
        assert_eq!(config.hub.cache_dir.as_deref(), Some("/tmp/hub-cache"));
        assert_eq!(config.hub.handle, "google/aiy/tfLite/vision-classifier-food-v1");
        assert_eq!(
            config.direct.destination,
            "app/src/main/assets/food_recognition_model.tflite"
        );
    }

    #[test]
    fn default_config_is_valid() {
        AppConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn invalid_url_rejected() {
        let mut config = AppConfig::default();
        config.direct.url = "not a url".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("direct.url"));
    }

    #[test]
    fn dotted_extension_rejected() {
        let mut config = AppConfig::default();
        config.hub.extensions = vec![".tflite".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("nirvana-assets-does-not-exist/config.toml");
        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, AssetsError::Io { .. }));
    }
}
