//! Dietary dashboard pipeline for the Nirvana app's WebView assets.
//!
//! This crate provides:
//! - [`repo`]: clone or reuse the notebook repository checkout
//! - [`notebook`]: notebook discovery and `nbconvert` invocation
//! - [`webview`]: structural HTML rewrite for mobile WebView embedding
//! - [`pipeline`]: end-to-end `update_dashboard` workflow with cleanup

mod process;

pub mod notebook;
pub mod pipeline;
pub mod repo;
pub mod webview;

pub use notebook::{convert_notebook, ensure_nbconvert, find_notebooks};
pub use pipeline::{DashboardOutcome, UpdateDashboardConfig, update_dashboard};
pub use repo::{FetchOutcome, FixedAnswer, OverwritePrompt, ensure_repository};
pub use webview::{WebViewTemplate, post_process, post_process_file};
