//! Food-classifier model fetchers for the Nirvana app's assets directory.
//!
//! Two independent ways to get the model:
//! - [`hub`] + [`assets`]: resolve a model handle on the Kaggle model hub,
//!   cache the unpacked archive, then copy allow-listed files into the assets
//!   directory
//! - [`direct`]: one HTTP GET with a browser user-agent, streamed to a file

mod download;

pub mod assets;
pub mod direct;
pub mod hub;

pub use assets::copy_model_assets;
pub use direct::{DirectDownloadOptions, DownloadOutcome, download_model_file};
pub use hub::{HubClient, HubCredentials, HubDownload, HubOptions, ModelHandle};
