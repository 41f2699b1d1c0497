use crate::config::Timeouts;
use crate::error::{Error, Result};
use crate::utils::files::partial_path;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::StatusCode;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Get standard user agent string
pub fn get_user_agent() -> &'static str {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36"
}

/// Build the client shared by every request of a run
pub fn build_client(timeouts: &Timeouts) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("image/webp,image/apng,image/*,*/*;q=0.8"),
    );

    Ok(reqwest::Client::builder()
        .user_agent(get_user_agent())
        .default_headers(headers)
        .connect_timeout(timeouts.connect)
        .pool_max_idle_per_host(30)
        .build()?)
}

/// Result of a GET that either wrote the body or was told there is nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetched {
    Saved { bytes: u64 },
    NotFound,
}

/// GET `url` and stream the body into `path`.
///
/// The body is written to a `.part` sibling and renamed into place once
/// complete, so an existing `path` is always a whole transfer. A 404 is
/// returned as [`Fetched::NotFound`]; other non-success statuses are errors.
pub async fn fetch_to_file(
    client: &reqwest::Client,
    url: &str,
    path: &Path,
    timeout: Duration,
) -> Result<Fetched> {
    let mut response = client.get(url).timeout(timeout).send().await?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(Fetched::NotFound);
    }
    if !status.is_success() {
        return Err(Error::Status {
            status,
            url: url.to_string(),
        });
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::fs(parent, e))?;
    }

    let partial = partial_path(path);
    match write_body(&mut response, &partial).await {
        Ok(bytes) => {
            tokio::fs::rename(&partial, path)
                .await
                .map_err(|e| Error::fs(path, e))?;
            Ok(Fetched::Saved { bytes })
        }
        Err(e) => {
            if let Err(cleanup_err) = tokio::fs::remove_file(&partial).await {
                tracing::debug!(path = %partial.display(), error = %cleanup_err, "Failed to remove partial file");
            }
            Err(e)
        }
    }
}

async fn write_body(response: &mut reqwest::Response, partial: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(partial)
        .await
        .map_err(|e| Error::fs(partial, e))?;

    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::fs(partial, e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| Error::fs(partial, e))?;

    Ok(written)
}

/// Run-wide cap on in-flight requests, with a peak gauge
#[derive(Debug)]
pub struct RequestLimiter {
    semaphore: Semaphore,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl RequestLimiter {
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Semaphore::new(limit),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Wait for a free slot. The semaphore is private and never closed, so
    /// waiting always ends with a permit.
    pub async fn acquire(&self) -> LimiterPermit<'_> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .expect("request limiter semaphore is never closed");
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        LimiterPermit {
            _permit: permit,
            in_flight: &self.in_flight,
        }
    }

    /// Highest number of permits held at once so far
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

pub struct LimiterPermit<'a> {
    _permit: SemaphorePermit<'a>,
    in_flight: &'a AtomicUsize,
}

impl Drop for LimiterPermit<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
