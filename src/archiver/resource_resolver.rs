//! Single-resource fetching and data-URI encoding.
//!
//! One [`ResourceResolver`] lives for exactly one archiver build. Its cache
//! and fetch budget are never shared across concurrent captures, so one
//! site's resources can never leak into another capture and memory growth is
//! bounded to one build at a time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use base64::Engine;
use futures::StreamExt;
use reqwest::Client;
use tokio::sync::Mutex;

use crate::retry::RetryPolicy;

/// Browser-like user agent for outbound resource fetches.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Limits applied to every fetch within one build.
#[derive(Debug, Clone)]
pub struct FetchLimits {
    /// Total fetches allowed per build; further calls return `Empty` without
    /// attempting network I/O.
    pub max_fetches: usize,
    /// Per-resource timeout.
    pub timeout: Duration,
    /// Per-resource size ceiling, checked against `Content-Length` when
    /// present and re-checked against the actual byte count while streaming.
    pub max_bytes: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            max_fetches: 500,
            timeout: Duration::from_secs(15),
            max_bytes: 5 * 1024 * 1024,
        }
    }
}

/// Outcome of resolving one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The resource was fetched and encoded; callers substitute the data URI.
    Inlined(String),
    /// Not a real network resource (`data:`, fragment, `mailto:`, ...);
    /// callers leave the original reference unchanged.
    Skipped,
    /// Fetch failed, was over budget, or violated limits; callers blank the
    /// reference. Never an error.
    Empty,
}

enum DownloadError {
    Transport(reqwest::Error),
    RetryableStatus(reqwest::StatusCode),
    Failed(String),
}

/// Per-build resource fetcher with memoization.
pub struct ResourceResolver {
    client: Client,
    limits: FetchLimits,
    retry: RetryPolicy,
    /// Successful data URIs keyed by absolute URL, for the lifetime of one build.
    cache: Mutex<HashMap<String, String>>,
    fetch_count: AtomicUsize,
}

impl ResourceResolver {
    #[must_use]
    pub fn new(limits: FetchLimits) -> Self {
        Self {
            client: Client::new(),
            limits,
            retry: RetryPolicy::default(),
            cache: Mutex::new(HashMap::new()),
            fetch_count: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Number of network fetches attempted so far in this build.
    #[must_use]
    pub fn fetches_attempted(&self) -> usize {
        self.fetch_count.load(Ordering::Relaxed)
    }

    /// Fetch a URL and encode it as a data URI.
    ///
    /// Skippable schemes are reported as [`FetchOutcome::Skipped`]; every
    /// failure mode degrades to [`FetchOutcome::Empty`].
    pub async fn fetch_as_data_uri(&self, url: &str) -> FetchOutcome {
        if is_skippable(url) {
            return FetchOutcome::Skipped;
        }

        if let Some(cached) = self.cache.lock().await.get(url) {
            return FetchOutcome::Inlined(cached.clone());
        }

        if !self.take_fetch_slot(url) {
            return FetchOutcome::Empty;
        }

        match self.download(url).await {
            Ok((bytes, content_type)) => {
                let mime = resolve_mime(content_type.as_deref(), url);
                let mut data_uri = String::with_capacity(
                    mime.len() + 13 + base64::encoded_len(bytes.len(), false).unwrap_or(0),
                );
                data_uri.push_str("data:");
                data_uri.push_str(&mime);
                data_uri.push_str(";base64,");
                base64::engine::general_purpose::STANDARD
                    .encode_string(&bytes, &mut data_uri);

                self.cache
                    .lock()
                    .await
                    .insert(url.to_string(), data_uri.clone());
                FetchOutcome::Inlined(data_uri)
            }
            Err(reason) => {
                log::debug!(target: "demoforge::archive", "dropping resource {url}: {reason}");
                FetchOutcome::Empty
            }
        }
    }

    /// Fetch a URL as UTF-8 text under the same budget and limits.
    ///
    /// Used for stylesheet bodies, which are spliced as text rather than
    /// encoded. Returns `None` on any failure.
    pub async fn fetch_text(&self, url: &str) -> Option<String> {
        if is_skippable(url) || !self.take_fetch_slot(url) {
            return None;
        }

        match self.download(url).await {
            Ok((bytes, _)) => match String::from_utf8(bytes) {
                Ok(text) => Some(text),
                Err(_) => {
                    log::debug!(target: "demoforge::archive", "stylesheet {url} is not valid UTF-8");
                    None
                }
            },
            Err(reason) => {
                log::debug!(target: "demoforge::archive", "dropping stylesheet {url}: {reason}");
                None
            }
        }
    }

    /// Reserve one slot from the per-build fetch budget.
    fn take_fetch_slot(&self, url: &str) -> bool {
        let n = self.fetch_count.fetch_add(1, Ordering::Relaxed);
        if n >= self.limits.max_fetches {
            log::warn!(
                target: "demoforge::archive",
                "fetch budget of {} exhausted, blanking {url}",
                self.limits.max_fetches
            );
            return false;
        }
        true
    }

    /// Download with streaming size enforcement. Transient connect failures
    /// and retryable status classes go through the shared retry policy first.
    async fn download(&self, url: &str) -> Result<(Vec<u8>, Option<String>), String> {
        let response = self
            .retry
            .run(
                || async {
                    let resp = self
                        .client
                        .get(url)
                        .timeout(self.limits.timeout)
                        .header("User-Agent", CHROME_USER_AGENT)
                        .header("Accept", "*/*")
                        .send()
                        .await
                        .map_err(DownloadError::Transport)?;
                    let status = resp.status();
                    if RetryPolicy::is_retryable_status(status) {
                        return Err(DownloadError::RetryableStatus(status));
                    }
                    Ok(resp)
                },
                |e| match e {
                    // A timed-out fetch already spent its budget; only connect
                    // failures are worth a second attempt.
                    DownloadError::Transport(err) => err.is_connect(),
                    DownloadError::RetryableStatus(_) => true,
                    DownloadError::Failed(_) => false,
                },
            )
            .await
            .map_err(|e| match e {
                DownloadError::Transport(err) => err.to_string(),
                DownloadError::RetryableStatus(status) => format!("HTTP {status}"),
                DownloadError::Failed(msg) => msg,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {status}"));
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // First line of defense: the declared length, when present.
        let expected = response.content_length().unwrap_or(0);
        if expected > self.limits.max_bytes as u64 {
            return Err(format!(
                "declared size {expected} exceeds limit of {} bytes",
                self.limits.max_bytes
            ));
        }

        let mut buffer = if expected > 0 {
            Vec::with_capacity(expected as usize)
        } else {
            Vec::new()
        };

        // Second line of defense: the actual byte count while streaming.
        let mut stream = response.bytes_stream();
        let mut total = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("stream error: {e}"))?;
            total += chunk.len();
            if total > self.limits.max_bytes {
                return Err(format!(
                    "download exceeded limit of {} bytes",
                    self.limits.max_bytes
                ));
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok((buffer, content_type))
    }
}

impl std::fmt::Display for DownloadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "{e}"),
            Self::RetryableStatus(s) => write!(f, "HTTP {s}"),
            Self::Failed(msg) => write!(f, "{msg}"),
        }
    }
}

/// Whether a reference is not a fetchable network resource.
///
/// These are left in place unchanged by every caller.
#[must_use]
pub fn is_skippable(url: &str) -> bool {
    let trimmed = url.trim_start();
    let lower = trimmed
        .get(..16)
        .unwrap_or(trimmed)
        .to_ascii_lowercase();
    trimmed.starts_with('#')
        || trimmed.starts_with("%23")
        || lower.starts_with("data:")
        || lower.starts_with("blob:")
        || lower.starts_with("javascript:")
        || lower.starts_with("about:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
}

/// Pick a MIME type from the response header, falling back to the extension
/// table when the header is a generic placeholder.
#[must_use]
pub fn resolve_mime(content_type: Option<&str>, url: &str) -> String {
    if let Some(ct) = content_type {
        let essence = ct.split(';').next().unwrap_or(ct).trim();
        if !essence.is_empty()
            && essence != "application/octet-stream"
            && essence != "text/plain"
        {
            return essence.to_string();
        }
    }
    mime_for_extension(url).to_string()
}

/// Static extension→MIME table for responses without a usable content type.
#[must_use]
pub fn mime_for_extension(url: &str) -> &'static str {
    let path = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .to_ascii_lowercase();
    let ext = path.rsplit('.').next().unwrap_or("");
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "css" => "text/css",
        "js" => "text/javascript",
        "json" => "application/json",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}
