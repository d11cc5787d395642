//! HTTP client construction and chunked response-to-file streaming.

use std::path::Path;
use std::time::Duration;

use reqwest::{Client, Response};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use nirvana_assets_shared::{AssetsError, ProgressReporter, Result};

/// Bytes written and their SHA-256, reported for the logs only.
#[derive(Debug)]
pub(crate) struct StreamedFile {
    pub bytes: u64,
    pub sha256: String,
}

/// Build an HTTP client with the given default User-Agent.
pub(crate) fn build_client(user_agent: &str) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| AssetsError::Network(format!("failed to build HTTP client: {e}")))
}

/// Fail on non-2xx statuses, naming the URL.
pub(crate) fn check_status(response: Response) -> Result<Response> {
    let url = response.url().to_string();
    response
        .error_for_status()
        .map_err(|e| AssetsError::Network(format!("GET {url}: {e}")))
}

/// Write the response body to `path` chunk by chunk.
pub(crate) async fn stream_to_file(
    mut response: Response,
    path: &Path,
    progress: &dyn ProgressReporter,
) -> Result<StreamedFile> {
    let total = response.content_length();
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| AssetsError::io(path, e))?;

    let mut hasher = Sha256::new();
    let mut downloaded = 0u64;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| AssetsError::Network(format!("read download chunk: {e}")))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| AssetsError::io(path, e))?;
        hasher.update(&chunk);
        downloaded += chunk.len() as u64;
        progress.bytes_downloaded(downloaded, total);
    }
    file.flush().await.map_err(|e| AssetsError::io(path, e))?;

    Ok(StreamedFile {
        bytes: downloaded,
        sha256: format!("{:x}", hasher.finalize()),
    })
}
