//! Run configuration assembled from the command line.

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CATALOG_URL: &str = "https://api.pokeos.com/api/tcg/set";
pub const DEFAULT_CATALOG_ORIGIN: &str = "https://www.pokeos.com/";
pub const DEFAULT_IMAGE_HOST: &str = "https://s3.pokeos.com/pokeos-uploads/tcg/pocket";
pub const DEFAULT_FALLBACK_HOST: &str = "https://raw.githubusercontent.com/marcelpanse/tcg-pocket-collection-tracker/main/frontend/public/images";

/// Remote hosts the pipeline talks to
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub catalog_url: String,
    pub catalog_origin: String,
    pub image_host: String,
    pub fallback_host: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            catalog_origin: DEFAULT_CATALOG_ORIGIN.to_string(),
            image_host: DEFAULT_IMAGE_HOST.to_string(),
            fallback_host: DEFAULT_FALLBACK_HOST.to_string(),
        }
    }
}

/// Backoff parameters for primary-source requests
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

/// Per-request timeouts applied by the shared HTTP client
#[derive(Debug, Clone)]
pub struct Timeouts {
    pub connect: Duration,
    pub request: Duration,
    pub catalog: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            request: Duration::from_secs(60),
            catalog: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_dir: PathBuf,
    pub series: Vec<String>,
    pub languages: Vec<String>,
    /// Upper bound on in-flight requests across the whole run
    pub concurrency: usize,
    pub retry: RetryConfig,
    pub timeouts: Timeouts,
    pub endpoints: Endpoints,
}

impl FetchConfig {
    pub fn new(
        base_dir: impl Into<PathBuf>,
        series: &str,
        languages: &str,
        concurrency: usize,
        max_retries: u32,
    ) -> Result<Self> {
        let series = split_list(series);
        let languages = split_list(languages);

        if series.is_empty() {
            return Err(Error::Config("at least one series is required".into()));
        }
        if languages.is_empty() {
            return Err(Error::Config("at least one language is required".into()));
        }
        if concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".into()));
        }
        if max_retries == 0 {
            return Err(Error::Config("max-retries must be at least 1".into()));
        }

        Ok(Self {
            base_dir: base_dir.into(),
            series,
            languages,
            concurrency,
            retry: RetryConfig {
                max_attempts: max_retries,
                ..RetryConfig::default()
            },
            timeouts: Timeouts::default(),
            endpoints: Endpoints::default(),
        })
    }
}

/// Split a comma-separated list, trimming entries and dropping blanks and repeats
pub fn split_list(raw: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}
