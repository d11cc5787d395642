//! Direct URL model download: one GET, streamed to a fixed file.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};
use url::Url;

use nirvana_assets_shared::{AssetsError, DirectDownloadConfig, ProgressReporter, Result};

use crate::download::{build_client, check_status, stream_to_file};

/// Runtime options for [`download_model_file`].
#[derive(Debug, Clone)]
pub struct DirectDownloadOptions {
    /// Model file URL.
    pub url: Url,
    /// Final file path.
    pub destination: PathBuf,
    /// User-Agent header value.
    pub user_agent: String,
}

impl TryFrom<&DirectDownloadConfig> for DirectDownloadOptions {
    type Error = AssetsError;

    fn try_from(config: &DirectDownloadConfig) -> Result<Self> {
        let url = Url::parse(&config.url)
            .map_err(|e| AssetsError::config(format!("invalid model URL '{}': {e}", config.url)))?;
        Ok(Self {
            url,
            destination: PathBuf::from(&config.destination),
            user_agent: config.user_agent.clone(),
        })
    }
}

/// A completed download.
#[derive(Debug)]
pub struct DownloadOutcome {
    /// Where the file landed.
    pub final_path: PathBuf,
    /// Bytes written.
    pub bytes_downloaded: u64,
    /// SHA-256 of the file, hex encoded.
    pub checksum: String,
}

/// Download `opts.url` to `opts.destination`.
///
/// The body is streamed to `<destination>.part` and renamed on success, so an
/// interrupted or rejected download never leaves a truncated model behind.
/// An empty body is an error.
#[instrument(skip_all, fields(url = %opts.url))]
pub async fn download_model_file(
    opts: &DirectDownloadOptions,
    progress: &dyn ProgressReporter,
) -> Result<DownloadOutcome> {
    if let Some(parent) = opts.destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AssetsError::io(parent, e))?;
    }

    // The browser User-Agent is the client default, so every request and
    // redirect carries it.
    let client = build_client(&opts.user_agent)?;

    progress.phase("Downloading model");
    info!(dest = %opts.destination.display(), "downloading model");

    let response = client
        .get(opts.url.clone())
        .send()
        .await
        .map_err(|e| AssetsError::Network(format!("GET {}: {e}", opts.url)))?;
    let response = check_status(response)?;

    let staging = staging_path(&opts.destination);
    let streamed = match stream_to_file(response, &staging, progress).await {
        Ok(streamed) => streamed,
        Err(e) => {
            discard(&staging).await;
            return Err(e);
        }
    };

    if streamed.bytes == 0 {
        discard(&staging).await;
        return Err(AssetsError::validation(format!(
            "{} returned an empty body",
            opts.url
        )));
    }

    if let Err(e) = tokio::fs::rename(&staging, &opts.destination).await {
        discard(&staging).await;
        return Err(AssetsError::io(&opts.destination, e));
    }

    info!(
        path = %opts.destination.display(),
        bytes = streamed.bytes,
        sha256 = %streamed.sha256,
        "model downloaded"
    );
    progress.done();

    Ok(DownloadOutcome {
        final_path: opts.destination.clone(),
        bytes_downloaded: streamed.bytes,
        checksum: streamed.sha256,
    })
}

fn staging_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    destination.with_file_name(name)
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove partial download");
        }
    }
}

#[cfg(test)]
mod tests {
    use nirvana_assets_shared::SilentProgress;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const BROWSER_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) Chrome/120.0 Safari/537.36";

    fn scratch_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("nirvana-direct-{label}-{}", uuid::Uuid::now_v7()))
    }

    fn options(server: &MockServer, route: &str, destination: PathBuf) -> DirectDownloadOptions {
        DirectDownloadOptions {
            url: Url::parse(&format!("{}{route}", server.uri())).unwrap(),
            destination,
            user_agent: BROWSER_UA.into(),
        }
    }

    #[tokio::test]
    async fn downloads_with_browser_user_agent() {
        let server = MockServer::start().await;
        let model = b"TFL3\x00\x01\x02food-classifier".to_vec();

        Mock::given(method("GET"))
            .and(path("/food_V1.tflite"))
            .and(header("User-Agent", BROWSER_UA))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(model.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let root = scratch_dir("ok");
        let dest = root.join("app/src/main/assets/food_recognition_model.tflite");
        let outcome = download_model_file(&options(&server, "/food_V1.tflite", dest.clone()), &SilentProgress)
            .await
            .unwrap();

        assert_eq!(outcome.final_path, dest);
        assert_eq!(outcome.bytes_downloaded, model.len() as u64);
        assert_eq!(outcome.checksum.len(), 64);
        assert_eq!(std::fs::read(&dest).unwrap(), model);
        assert!(!staging_path(&dest).exists());

        let requests = server.received_requests().await.unwrap();
        let agents: Vec<_> = requests[0].headers.get_all("user-agent").iter().collect();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0], BROWSER_UA);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn failed_rename_removes_staging_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"TFL3".to_vec()))
            .mount(&server)
            .await;

        // A non-empty directory at the destination makes the final rename fail.
        let root = scratch_dir("rename");
        let dest = root.join("food_recognition_model.tflite");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("occupied"), b"x").unwrap();

        let err = download_model_file(&options(&server, "/food_V1.tflite", dest.clone()), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, AssetsError::Io { .. }));
        assert!(!staging_path(&dest).exists());
        assert!(dest.join("occupied").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn http_error_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let root = scratch_dir("404");
        let dest = root.join("model.tflite");
        let err = download_model_file(&options(&server, "/missing.tflite", dest.clone()), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, AssetsError::Network(_)));
        assert!(!dest.exists());
        assert!(!staging_path(&dest).exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn empty_body_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let root = scratch_dir("empty");
        let dest = root.join("model.tflite");
        let err = download_model_file(&options(&server, "/empty.tflite", dest.clone()), &SilentProgress)
            .await
            .unwrap_err();

        assert!(matches!(err, AssetsError::Validation { .. }));
        assert!(!dest.exists());
        assert!(!staging_path(&dest).exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn options_from_default_config() {
        let opts = DirectDownloadOptions::try_from(&DirectDownloadConfig::default()).unwrap();
        assert_eq!(opts.url.host_str(), Some("tfhub.dev"));
        assert_eq!(
            opts.destination,
            PathBuf::from("app/src/main/assets/food_recognition_model.tflite")
        );
        assert!(opts.user_agent.starts_with("Mozilla/5.0"));
    }

    #[test]
    fn staging_sits_next_to_destination() {
        let staged = staging_path(Path::new("assets/model.tflite"));
        assert_eq!(staged, PathBuf::from("assets/model.tflite.part"));
    }
}
