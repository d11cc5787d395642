//! Shared error model, configuration, and progress reporting for nirvana-assets.
//!
//! This crate is the foundation depended on by all other nirvana-assets crates.
//! It provides:
//! - [`AssetsError`]: the unified error type
//! - Configuration ([`AppConfig`] and its sections, config loading)
//! - [`ProgressReporter`]: the callback surface the CLI renders

pub mod config;
pub mod error;
pub mod progress;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DashboardConfig, DirectDownloadConfig, HubConfig, ToolsConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_config,
};
pub use error::{AssetsError, Result};
pub use progress::{ProgressReporter, SilentProgress};
