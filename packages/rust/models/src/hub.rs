//! Kaggle model hub client with a local, versioned download cache.
//!
//! Layout under the cache root, matching what `kagglehub` produces so both
//! tools can share one cache:
//!
//! ```text
//! models/<owner>/<model>/<framework>/<variation>/<version>/          unpacked files
//! models/<owner>/<model>/<framework>/<variation>/<version>.complete  marker
//! ```

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use flate2::read::GzDecoder;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tar::Archive;
use tracing::{debug, info, instrument};
use url::Url;

use nirvana_assets_shared::{AssetsError, HubConfig, ProgressReporter, Result};

use crate::download::{build_client, check_status, stream_to_file};

/// User-Agent string for hub API requests.
const USER_AGENT: &str = concat!("nirvana-assets/", env!("CARGO_PKG_VERSION"));

/// Env var overriding the cache root.
const CACHE_ENV: &str = "KAGGLEHUB_CACHE";

// ---------------------------------------------------------------------------
// ModelHandle
// ---------------------------------------------------------------------------

/// `owner/model/framework/variation[/version]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    pub owner: String,
    pub model: String,
    pub framework: String,
    pub variation: String,
    /// `None` means "latest", resolved against the hub.
    pub version: Option<u32>,
}

impl ModelHandle {
    /// The handle without its version.
    fn instance_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.owner, self.model, self.framework, self.variation
        )
    }
}

impl FromStr for ModelHandle {
    type Err = AssetsError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        if !(4..=5).contains(&parts.len()) || parts.iter().any(|p| p.is_empty()) {
            return Err(AssetsError::validation(format!(
                "invalid model handle '{s}': expected owner/model/framework/variation[/version]"
            )));
        }

        let version = match parts.get(4) {
            Some(v) => Some(v.parse::<u32>().map_err(|_| {
                AssetsError::validation(format!("invalid model handle '{s}': version '{v}' is not a number"))
            })?),
            None => None,
        };

        Ok(Self {
            owner: parts[0].to_string(),
            model: parts[1].to_string(),
            framework: parts[2].to_string(),
            variation: parts[3].to_string(),
            version,
        })
    }
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instance_path())?;
        if let Some(version) = self.version {
            write!(f, "/{version}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Basic-auth credentials for the hub API.
#[derive(Clone)]
pub struct HubCredentials {
    pub username: String,
    pub key: String,
}

impl fmt::Debug for HubCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubCredentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Runtime hub settings, merged from config and environment.
#[derive(Debug, Clone)]
pub struct HubOptions {
    /// API endpoint (e.g. `https://www.kaggle.com`).
    pub endpoint: Url,
    /// Cache root directory.
    pub cache_root: PathBuf,
    /// Optional credentials; public models need none.
    pub credentials: Option<HubCredentials>,
}

impl HubOptions {
    /// Build options from the `[hub]` config section, reading the cache root
    /// override and credentials from the environment.
    pub fn from_config(config: &HubConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            AssetsError::config(format!("invalid hub endpoint '{}': {e}", config.endpoint))
        })?;

        let cache_root = match &config.cache_dir {
            Some(dir) => PathBuf::from(dir),
            None => default_cache_root()?,
        };

        let credentials = match (
            std::env::var(&config.username_env),
            std::env::var(&config.key_env),
        ) {
            (Ok(username), Ok(key)) if !username.is_empty() && !key.is_empty() => {
                Some(HubCredentials { username, key })
            }
            _ => None,
        };

        Ok(Self {
            endpoint,
            cache_root,
            credentials,
        })
    }
}

/// `$KAGGLEHUB_CACHE`, or `~/.cache/kagglehub`.
pub fn default_cache_root() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(CACHE_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home =
        dirs::home_dir().ok_or_else(|| AssetsError::config("could not determine home directory"))?;
    Ok(home.join(".cache").join("kagglehub"))
}

// ---------------------------------------------------------------------------
// HubClient
// ---------------------------------------------------------------------------

/// A model resolved to a local directory.
#[derive(Debug, Clone)]
pub struct HubDownload {
    /// Directory holding the unpacked model files.
    pub path: PathBuf,
    /// Version that was fetched.
    pub version: u32,
    /// `true` when served from cache without any network request.
    pub cached: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInstance {
    version_number: u32,
}

/// Hub API client.
pub struct HubClient {
    client: Client,
    options: HubOptions,
}

impl HubClient {
    pub fn new(options: HubOptions) -> Result<Self> {
        Ok(Self {
            client: build_client(USER_AGENT)?,
            options,
        })
    }

    /// Directory the given model version unpacks into.
    pub fn cache_dir(&self, handle: &ModelHandle, version: u32) -> PathBuf {
        self.options
            .cache_root
            .join("models")
            .join(&handle.owner)
            .join(&handle.model)
            .join(&handle.framework)
            .join(&handle.variation)
            .join(version.to_string())
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/v1/{path}",
            self.options.endpoint.as_str().trim_end_matches('/')
        )
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.options.credentials {
            Some(creds) => request.basic_auth(&creds.username, Some(&creds.key)),
            None => request,
        }
    }

    /// Ask the hub for the latest version of `handle`.
    #[instrument(skip_all, fields(handle = %handle))]
    pub async fn resolve_version(&self, handle: &ModelHandle) -> Result<u32> {
        let url = self.api_url(&format!("models/{}/get", handle.instance_path()));
        let response = self
            .get(&url)
            .send()
            .await
            .map_err(|e| AssetsError::Network(format!("GET {url}: {e}")))?;

        let instance: ModelInstance = check_status(response)?
            .json()
            .await
            .map_err(|e| AssetsError::parse(format!("model instance response: {e}")))?;

        debug!(version = instance.version_number, "resolved latest version");
        Ok(instance.version_number)
    }

    /// Make `handle` available locally and return its directory.
    ///
    /// A version with a completion marker is served from cache. Otherwise the
    /// archive is downloaded next to the cache directory, unpacked, deleted,
    /// and the marker written last.
    #[instrument(skip_all, fields(handle = %handle))]
    pub async fn model_download(
        &self,
        handle: &ModelHandle,
        progress: &dyn ProgressReporter,
    ) -> Result<HubDownload> {
        let version = match handle.version {
            Some(version) => version,
            None => {
                progress.phase("Resolving model version");
                self.resolve_version(handle).await?
            }
        };

        let dir = self.cache_dir(handle, version);
        let marker = dir.with_file_name(format!("{version}.complete"));
        if marker.is_file() && dir.is_dir() {
            info!(path = %dir.display(), "model found in cache");
            return Ok(HubDownload {
                path: dir,
                version,
                cached: true,
            });
        }

        if let Some(parent) = dir.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AssetsError::io(parent, e))?;
        }

        progress.phase("Downloading model archive");
        let url = self.api_url(&format!(
            "models/{}/{version}/download",
            handle.instance_path()
        ));
        info!(%url, version, "downloading model from hub");

        let response = self
            .get(&url)
            .send()
            .await
            .map_err(|e| AssetsError::Network(format!("GET {url}: {e}")))?;
        let response = check_status(response)?;

        let archive = dir.with_file_name(format!("{version}.archive"));
        let streamed = match stream_to_file(response, &archive, progress).await {
            Ok(streamed) => streamed,
            Err(e) => {
                let _ = tokio::fs::remove_file(&archive).await;
                return Err(e);
            }
        };
        debug!(bytes = streamed.bytes, sha256 = %streamed.sha256, "archive downloaded");

        // Leftovers from an interrupted earlier run would mix with this version.
        if dir.exists() {
            tokio::fs::remove_dir_all(&dir)
                .await
                .map_err(|e| AssetsError::io(&dir, e))?;
        }
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AssetsError::io(&dir, e))?;

        progress.phase("Unpacking model archive");
        let (archive_path, dest) = (archive.clone(), dir.clone());
        let unpacked = tokio::task::spawn_blocking(move || unpack_archive(&archive_path, &dest))
            .await
            .map_err(|e| AssetsError::Archive(format!("unpack task failed: {e}")))?;
        let _ = tokio::fs::remove_file(&archive).await;
        unpacked?;

        tokio::fs::write(&marker, b"")
            .await
            .map_err(|e| AssetsError::io(&marker, e))?;

        info!(path = %dir.display(), "model downloaded to cache");
        progress.done();

        Ok(HubDownload {
            path: dir,
            version,
            cached: false,
        })
    }
}

// ---------------------------------------------------------------------------
// Archive unpacking
// ---------------------------------------------------------------------------

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const TAR_MAGIC_OFFSET: usize = 257;
const TAR_MAGIC: &[u8] = b"ustar";

/// Unpack a `.tar.gz` or plain `.tar` into `dest`.
fn unpack_archive(archive: &Path, dest: &Path) -> Result<()> {
    let mut file = File::open(archive).map_err(|e| AssetsError::io(archive, e))?;

    let mut head = Vec::with_capacity(512);
    (&mut file)
        .take(512)
        .read_to_end(&mut head)
        .map_err(|e| AssetsError::io(archive, e))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| AssetsError::io(archive, e))?;

    let unpacked = if head.starts_with(&GZIP_MAGIC) {
        Archive::new(GzDecoder::new(file)).unpack(dest)
    } else if head.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len()) == Some(TAR_MAGIC) {
        Archive::new(file).unpack(dest)
    } else {
        return Err(AssetsError::Archive(format!(
            "{} is neither a gzip nor a tar archive",
            archive.display()
        )));
    };

    unpacked.map_err(|e| AssetsError::Archive(format!("unpack {}: {e}", archive.display())))
}
