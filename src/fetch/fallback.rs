use super::Fetcher;
use crate::tcg::rules::{fallback_set_code, FALLBACK_LANGUAGE};
use crate::tcg::DownloadTarget;
use crate::utils::files::{image_path, FALLBACK_EXT};
use crate::utils::http::Fetched;

/// Result of the single fallback request for a target
pub(super) struct FallbackAttempt {
    pub saved: bool,
    pub url: String,
}

impl Fetcher {
    /// The fallback host only serves English images, whatever was asked for
    pub(super) fn fallback_url(&self, set_code: &str, number: u32) -> String {
        format!(
            "{}/{}/{}-{}.{}",
            self.endpoints.fallback_host,
            FALLBACK_LANGUAGE,
            fallback_set_code(set_code),
            number,
            FALLBACK_EXT
        )
    }

    /// One attempt against the fallback host, no retry. The image lands in the
    /// requested language's directory with the fallback extension.
    pub(super) async fn fetch_fallback(&self, target: &DownloadTarget) -> FallbackAttempt {
        let url = self.fallback_url(&target.set_code, target.number);
        let path = image_path(
            &self.base_dir,
            &target.language,
            &target.set_code,
            target.number,
            FALLBACK_EXT,
        );

        let saved = match self.limited_fetch(&url, &path).await {
            Ok(Fetched::Saved { bytes }) => {
                tracing::info!(item = %target, bytes, "Downloaded from fallback source");
                true
            }
            Ok(Fetched::NotFound) => {
                tracing::debug!(item = %target, %url, "Fallback source has no image");
                false
            }
            Err(e) => {
                tracing::warn!(item = %target, %url, error = %e, "Fallback request failed");
                false
            }
        };

        FallbackAttempt { saved, url }
    }
}
