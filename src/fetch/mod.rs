//! The fetch pipeline: per-target decisions, the fallback source, probe scans
//! for sets of unknown size, and the fan-out across sets and languages.

use crate::config::{Endpoints, FetchConfig};
use crate::error::Result;
use crate::stats::RunStats;
use crate::utils::http::{fetch_to_file, Fetched, RequestLimiter};
use crate::utils::retry::RetryPolicy;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod fallback;
mod item;
mod orchestrator;
mod probe;

pub use orchestrator::{dedup_sets, estimate_total, progress_bar};

/// Shared context for every fetch task of a run
pub struct Fetcher {
    client: reqwest::Client,
    base_dir: PathBuf,
    endpoints: Endpoints,
    request_timeout: Duration,
    retry: RetryPolicy,
    limiter: RequestLimiter,
    stats: Arc<RunStats>,
    progress: ProgressBar,
}

impl Fetcher {
    pub fn new(
        config: &FetchConfig,
        client: reqwest::Client,
        stats: Arc<RunStats>,
        progress: ProgressBar,
    ) -> Self {
        Self {
            client,
            base_dir: config.base_dir.clone(),
            endpoints: config.endpoints.clone(),
            request_timeout: config.timeouts.request,
            retry: RetryPolicy::new(&config.retry),
            limiter: RequestLimiter::new(config.concurrency),
            stats,
            progress,
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn limiter(&self) -> &RequestLimiter {
        &self.limiter
    }

    /// A single GET holding one limiter permit for its whole duration
    async fn limited_fetch(&self, url: &str, path: &Path) -> Result<Fetched> {
        let _permit = self.limiter.acquire().await;
        fetch_to_file(&self.client, url, path, self.request_timeout).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::{RetryConfig, Timeouts};

    pub const FALLBACK_PREFIX: &str = "/fallback";

    /// A fetcher whose primary host is `server_uri` and whose fallback host is
    /// `server_uri` + [`FALLBACK_PREFIX`], with millisecond backoff.
    pub fn fetcher(server_uri: &str, base_dir: &Path, concurrency: usize) -> Arc<Fetcher> {
        let config = FetchConfig {
            base_dir: base_dir.to_path_buf(),
            series: vec!["a".into()],
            languages: vec!["en-US".into()],
            concurrency,
            retry: RetryConfig {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(50),
                ..RetryConfig::default()
            },
            timeouts: Timeouts {
                request: Duration::from_millis(500),
                ..Timeouts::default()
            },
            endpoints: Endpoints {
                catalog_url: format!("{server_uri}/api/tcg/set"),
                image_host: server_uri.to_string(),
                fallback_host: format!("{server_uri}{FALLBACK_PREFIX}"),
                ..Endpoints::default()
            },
        };
        Arc::new(Fetcher::new(
            &config,
            reqwest::Client::new(),
            Arc::new(RunStats::new()),
            ProgressBar::hidden(),
        ))
    }
}
