//! HTTP download of runtime packages.
//!
//! Packages are streamed straight to disk so large cabinets never sit in
//! memory. There is no retry: a failed download fails the run, and the
//! partial file is removed with the scratch workspace.
//!
//! Progress is reported through an optional [`ProgressCallback`], throttled to
//! one [`ProgressEvent::Progress`] per [`PROGRESS_CALLBACK_INTERVAL_MS`].

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::errors::FetchError;

/// Progress event emitted during downloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Download has started.
    Started {
        /// Total size in bytes from `Content-Length`, or 0 if unknown.
        total: u64,
    },
    /// Download progress update.
    Progress {
        /// Bytes downloaded so far.
        downloaded: u64,
        /// Current download speed in bytes per second.
        speed: u64,
    },
    /// Download completed successfully.
    Completed {
        /// Total bytes written.
        downloaded: u64,
    },
}

/// Callback type for receiving progress updates during downloads.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Request timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 300;

/// User-Agent header for HTTP requests.
const USER_AGENT: &str = concat!("webview-fetch/", env!("CARGO_PKG_VERSION"));

/// Minimum interval between progress callback invocations in milliseconds.
pub const PROGRESS_CALLBACK_INTERVAL_MS: u128 = 100;

/// Builds the HTTP client shared by the metadata and package requests.
///
/// # Errors
///
/// Returns `DownloadFailed` if the TLS backend cannot be initialised.
pub fn http_client() -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| {
            FetchError::download_failed_with_source("failed to create HTTP client", Box::new(e))
        })
}

/// Downloads `url` to `dest` and returns the number of bytes written.
///
/// The file is complete and flushed when this returns `Ok`.
///
/// # Errors
///
/// Returns `DownloadFailed` if:
/// - The request fails or the server answers with a non-success status
/// - The destination file cannot be created
/// - Reading the body or writing to the file fails
#[instrument(skip_all, fields(url = %url, dest = %dest.display()))]
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    dest: &Path,
    progress: Option<&ProgressCallback>,
) -> Result<u64, FetchError> {
    let response = client.get(url).send().await.map_err(|e| {
        FetchError::download_failed_with_source(format!("failed to connect to {url}"), Box::new(e))
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::download_failed(format!(
            "HTTP error {status}: {url}"
        )));
    }

    let total = response.content_length().unwrap_or(0);
    emit(progress, ProgressEvent::Started { total });

    let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
        FetchError::download_failed_with_source(
            format!("failed to create file: {}", dest.display()),
            Box::new(e),
        )
    })?;

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let start_time = Instant::now();
    let mut last_callback_time = Instant::now();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| {
            FetchError::download_failed_with_source(
                format!("failed to read chunk from {url}"),
                Box::new(e),
            )
        })?;
        file.write_all(&chunk).await.map_err(|e| {
            FetchError::download_failed_with_source(
                format!("failed to write to {}", dest.display()),
                Box::new(e),
            )
        })?;
        downloaded += chunk.len() as u64;

        let now = Instant::now();
        if now.duration_since(last_callback_time).as_millis() >= PROGRESS_CALLBACK_INTERVAL_MS {
            let speed = bytes_per_second(downloaded, start_time.elapsed().as_secs_f64());
            emit(progress, ProgressEvent::Progress { downloaded, speed });
            last_callback_time = now;
        }
    }

    file.flush().await.map_err(|e| {
        FetchError::download_failed_with_source(
            format!("failed to flush {}", dest.display()),
            Box::new(e),
        )
    })?;

    debug!("Downloaded {downloaded} bytes from {url}");
    emit(progress, ProgressEvent::Completed { downloaded });
    Ok(downloaded)
}

fn emit(progress: Option<&ProgressCallback>, event: ProgressEvent) {
    if let Some(callback) = progress {
        callback(event);
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn bytes_per_second(downloaded: u64, elapsed_secs: f64) -> u64 {
    if elapsed_secs > 0.0 {
        (downloaded as f64 / elapsed_secs) as u64
    } else {
        0
    }
}

/// Formats bytes into a human-readable string (KB, MB, GB).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}
