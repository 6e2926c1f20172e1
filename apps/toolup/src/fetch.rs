//! Downloading tool archives.
//!
//! [`Fetcher`] is the seam between the install pipeline and the network:
//! [`HttpFetcher`] streams `http(s)://` URLs to disk with reqwest and copies
//! `file://` URLs from the local filesystem. Downloads are attempted once;
//! a failed fetch fails the tool.

use std::io::{IsTerminal, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Url;
use tokio::io::AsyncWriteExt;

use crate::errors::ToolupError;

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Minimum interval between progress updates in milliseconds.
const PROGRESS_INTERVAL_MS: u128 = 250;

/// Retrieves the bytes behind a URL into a local file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Writes the content at `url` to `dest`, replacing any existing file.
    /// Returns the number of bytes written.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, ToolupError>;
}

/// Fetcher for `http`, `https` and `file` URLs.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    show_progress: bool,
}

impl HttpFetcher {
    /// Creates a fetcher. Progress is printed only when `show_progress` is set
    /// and stdout is a terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialised.
    pub fn new(show_progress: bool) -> Result<Self, ToolupError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(concat!("toolup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolupError::fetch_error_with_source("", "failed to create HTTP client", e))?;

        Ok(Self {
            client,
            show_progress: show_progress && std::io::stdout().is_terminal(),
        })
    }

    async fn download(&self, url: Url, dest: &Path) -> Result<u64, ToolupError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| {
                ToolupError::fetch_error_with_source(url.as_str(), format!("failed to connect to {url}"), e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolupError::fetch_error(
                url.as_str(),
                format!("HTTP {status} for {url}"),
            ));
        }

        let total_size = response.content_length().unwrap_or(0);
        tracing::debug!(%url, total_size, "Download started");

        let mut file = tokio::fs::File::create(dest).await.map_err(|e| {
            ToolupError::io_error(format!("failed to create {}", dest.display()), e)
        })?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let start_time = Instant::now();
        let mut last_update = Instant::now();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                ToolupError::fetch_error_with_source(url.as_str(), format!("failed to read body of {url}"), e)
            })?;
            file.write_all(&chunk).await.map_err(|e| {
                ToolupError::io_error(format!("failed to write {}", dest.display()), e)
            })?;
            downloaded += chunk.len() as u64;

            let now = Instant::now();
            if self.show_progress
                && now.duration_since(last_update).as_millis() >= PROGRESS_INTERVAL_MS
            {
                print_progress(downloaded, total_size, start_time.elapsed().as_secs_f64());
                last_update = now;
            }
        }

        file.flush().await.map_err(|e| {
            ToolupError::io_error(format!("failed to flush {}", dest.display()), e)
        })?;

        if self.show_progress {
            print_progress(downloaded, total_size, start_time.elapsed().as_secs_f64());
            println!();
        }

        Ok(downloaded)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64, ToolupError> {
        let parsed = Url::parse(url)
            .map_err(|e| ToolupError::fetch_error_with_source(url, format!("invalid URL `{url}`"), e))?;

        let bytes = match parsed.scheme() {
            "http" | "https" => self.download(parsed, dest).await?,
            "file" => copy_local_file(&parsed, dest).await?,
            scheme => {
                return Err(ToolupError::fetch_error(
                    url,
                    format!("unsupported URL scheme `{scheme}` in {url}"),
                ));
            }
        };

        tracing::debug!(url, bytes, dest = %dest.display(), "Fetched");
        Ok(bytes)
    }
}

async fn copy_local_file(url: &Url, dest: &Path) -> Result<u64, ToolupError> {
    let path = url
        .to_file_path()
        .map_err(|()| ToolupError::fetch_error(url.as_str(), format!("invalid file URL {url}")))?;

    tokio::fs::copy(&path, dest).await.map_err(|e| {
        ToolupError::fetch_error_with_source(
            url.as_str(),
            format!("failed to read {}", path.display()),
            e,
        )
    })
}

/// Prints a simple text-based progress line.
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn print_progress(downloaded: u64, total: u64, elapsed_secs: f64) {
    let percent = if total > 0 {
        (downloaded as f64 / total as f64 * 100.0) as u8
    } else {
        0
    };
    let speed = if elapsed_secs > 0.0 {
        downloaded as f64 / elapsed_secs
    } else {
        0.0
    };

    print!(
        "\r{}/{} ({percent}%) {}     ",
        format_bytes(downloaded),
        format_bytes(total),
        format_speed(speed)
    );
    let _ = std::io::stdout().flush();
}

/// Formats bytes into a human-readable string (KB, MB, GB).
fn format_bytes(bytes: u64) -> String {
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

fn format_speed(speed: f64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    if speed >= MB {
        format!("{:.2} MB/s", speed / MB)
    } else if speed >= KB {
        format!("{:.2} KB/s", speed / KB)
    } else {
        format!("{speed:.0} B/s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_url(path: &Path) -> String {
        Url::from_file_path(path)
            .expect("Should build file URL")
            .to_string()
    }

    #[tokio::test]
    async fn file_urls_are_copied() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let src = dir.path().join("tool.tar.gz");
        let dest = dir.path().join("download");
        std::fs::write(&src, b"archive bytes").expect("Should write source");

        let fetcher = HttpFetcher::new(false).expect("Should create fetcher");
        let bytes = fetcher
            .fetch(&file_url(&src), &dest)
            .await
            .expect("Should fetch");

        assert_eq!(bytes, 13);
        assert_eq!(std::fs::read(&dest).expect("Should read"), b"archive bytes");
    }

    #[tokio::test]
    async fn missing_local_file_is_a_fetch_error() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let fetcher = HttpFetcher::new(false).expect("Should create fetcher");

        let err = fetcher
            .fetch(&file_url(&dir.path().join("absent.zip")), &dir.path().join("download"))
            .await
            .expect_err("Should fail");

        assert!(matches!(err, ToolupError::FetchError { .. }));
        assert!(!dir.path().join("download").exists());
    }

    #[tokio::test]
    async fn unsupported_scheme_is_rejected() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let fetcher = HttpFetcher::new(false).expect("Should create fetcher");

        let err = fetcher
            .fetch("ftp://example.com/tool.zip", &dir.path().join("download"))
            .await
            .expect_err("Should fail");

        assert_eq!(
            err.to_string(),
            "download error: unsupported URL scheme `ftp` in ftp://example.com/tool.zip"
        );
    }

    #[tokio::test]
    async fn relative_url_is_invalid() {
        let dir = tempfile::tempdir().expect("Should create temp dir");
        let fetcher = HttpFetcher::new(false).expect("Should create fetcher");

        let err = fetcher
            .fetch("downloads/tool.zip", &dir.path().join("download"))
            .await
            .expect_err("Should fail");

        assert!(matches!(err, ToolupError::FetchError { ref url, .. } if url == "downloads/tool.zip"));
    }

    #[test]
    fn format_bytes_picks_unit() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn format_speed_picks_unit() {
        assert_eq!(format_speed(100.0), "100 B/s");
        assert_eq!(format_speed(1536.0), "1.50 KB/s");
        assert_eq!(format_speed(2.0 * 1024.0 * 1024.0), "2.00 MB/s");
    }
}
