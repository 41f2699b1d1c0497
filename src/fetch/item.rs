use super::Fetcher;
use crate::tcg::rules::{is_blacklisted, primary_language_code};
use crate::tcg::{DownloadTarget, Mode, Outcome};
use crate::utils::files::{image_path, PRIMARY_EXT};
use crate::utils::http::Fetched;
use std::path::Path;

impl Fetcher {
    pub(super) fn primary_url(&self, target: &DownloadTarget) -> String {
        format!(
            "{}/{}/src/{}_{}.{}",
            self.endpoints.image_host,
            target.set_id,
            target.number,
            primary_language_code(&target.language),
            PRIMARY_EXT
        )
    }

    /// Produce the outcome of one target and record it.
    ///
    /// Every error is absorbed here; the caller only ever sees an [`Outcome`].
    pub async fn fetch_item(&self, target: &DownloadTarget, mode: Mode) -> Outcome {
        let (outcome, url) = if is_blacklisted(&target.set_code, target.number) {
            self.fetch_blacklisted(target).await
        } else {
            self.fetch_primary(target, mode).await
        };

        self.stats.record(target, outcome, url.as_deref());
        self.progress.inc(1);
        outcome
    }

    /// Blacklisted slots never touch the primary host
    async fn fetch_blacklisted(&self, target: &DownloadTarget) -> (Outcome, Option<String>) {
        let stale = image_path(
            &self.base_dir,
            &target.language,
            &target.set_code,
            target.number,
            PRIMARY_EXT,
        );
        remove_stale_primary(&stale).await;

        let attempt = self.fetch_fallback(target).await;
        let outcome = if attempt.saved {
            Outcome::DownloadedFallback
        } else {
            tracing::warn!(item = %target, url = %attempt.url, "Blacklisted card unavailable from fallback source");
            Outcome::Failed
        };
        (outcome, Some(attempt.url))
    }

    async fn fetch_primary(&self, target: &DownloadTarget, mode: Mode) -> (Outcome, Option<String>) {
        let path = image_path(
            &self.base_dir,
            &target.language,
            &target.set_code,
            target.number,
            PRIMARY_EXT,
        );
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return (Outcome::SkippedExists, None);
        }

        let url = self.primary_url(target);
        let result = {
            let url = url.as_str();
            let path = path.as_path();
            self.retry
                .run(|| async move { self.limited_fetch(url, path).await })
                .await
        };

        match result {
            Ok(Fetched::Saved { bytes }) => {
                tracing::debug!(item = %target, bytes, "Downloaded");
                (Outcome::Downloaded, Some(url))
            }
            Ok(Fetched::NotFound) => match mode {
                Mode::Probe => (Outcome::Absent, Some(url)),
                Mode::Bulk => {
                    let attempt = self.fetch_fallback(target).await;
                    if attempt.saved {
                        (Outcome::DownloadedFallback, Some(attempt.url))
                    } else {
                        tracing::warn!(item = %target, %url, "Missing from primary and fallback sources");
                        (Outcome::Missing, Some(url))
                    }
                }
            },
            Err(e) => {
                tracing::warn!(item = %target, %url, error = %e, "Download failed");
                (Outcome::Failed, Some(url))
            }
        }
    }
}

async fn remove_stale_primary(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::info!(path = %path.display(), "Removed blacklisted primary image"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove blacklisted primary image")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::test_support::{fetcher, FALLBACK_PREFIX};
    use crate::tcg::CardSet;
    use crate::utils::files::FALLBACK_EXT;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn card_set(id: &str, set_code: &str) -> CardSet {
        CardSet {
            id: id.into(),
            set_code: set_code.into(),
            total_cards: 100,
            series: "a".into(),
        }
    }

    async fn request_paths(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect()
    }

    #[tokio::test]
    async fn existing_file_is_skipped_without_requests() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&server.uri(), dir.path(), 4);
        let target = DownloadTarget::new(&card_set("7", "A1"), 3, "en-US");

        let path = image_path(dir.path(), "en-US", "A1", 3, PRIMARY_EXT);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"cached").unwrap();

        assert_eq!(fetcher.fetch_item(&target, Mode::Bulk).await, Outcome::SkippedExists);
        assert!(request_paths(&server).await.is_empty());
        assert_eq!(fetcher.stats().counts().skipped, 1);
    }

    #[tokio::test]
    async fn primary_success_uses_remapped_language_code() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/7/src/3_zh.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&server.uri(), dir.path(), 4);
        let target = DownloadTarget::new(&card_set("7", "A1"), 3, "zh-TW");

        assert_eq!(fetcher.fetch_item(&target, Mode::Bulk).await, Outcome::Downloaded);
        assert!(image_path(dir.path(), "zh-TW", "A1", 3, PRIMARY_EXT).exists());
    }

    #[tokio::test]
    async fn blacklisted_target_goes_straight_to_english_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{FALLBACK_PREFIX}/en-US/A1a-63.webp")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"webp".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&server.uri(), dir.path(), 4);
        let target = DownloadTarget::new(&card_set("9", "A1a"), 63, "zh-TW");

        let stale = image_path(dir.path(), "zh-TW", "A1a", 63, PRIMARY_EXT);
        std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
        std::fs::write(&stale, b"wrong card").unwrap();

        assert_eq!(
            fetcher.fetch_item(&target, Mode::Bulk).await,
            Outcome::DownloadedFallback
        );
        assert!(!stale.exists());
        assert!(image_path(dir.path(), "zh-TW", "A1a", 63, FALLBACK_EXT).exists());
        assert!(request_paths(&server)
            .await
            .iter()
            .all(|p| p.starts_with(FALLBACK_PREFIX)));
    }

    #[tokio::test]
    async fn blacklisted_fallback_failure_is_failed_not_missing() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&server.uri(), dir.path(), 4);
        let target = DownloadTarget::new(&card_set("11", "PROMO-A"), 110, "en-US");

        assert_eq!(fetcher.fetch_item(&target, Mode::Bulk).await, Outcome::Failed);

        let failed = fetcher.stats().failed_by_set();
        assert_eq!(failed["PROMO-A"].len(), 1);
        assert!(failed["PROMO-A"][0].ends_with("/en-US/P-A-110.webp"));
        assert!(fetcher.stats().missing_by_set().is_empty());
        assert_eq!(request_paths(&server).await.len(), 1);
    }

    #[tokio::test]
    async fn bulk_404_falls_back_to_english_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{FALLBACK_PREFIX}/en-US/A2-4.webp")))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"webp".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&server.uri(), dir.path(), 4);
        let target = DownloadTarget::new(&card_set("20", "A2"), 4, "zh-TW");

        assert_eq!(
            fetcher.fetch_item(&target, Mode::Bulk).await,
            Outcome::DownloadedFallback
        );
        assert!(image_path(dir.path(), "zh-TW", "A2", 4, FALLBACK_EXT).exists());

        let paths = request_paths(&server).await;
        assert_eq!(paths, vec!["/20/src/4_zh.png".to_string(), format!("{FALLBACK_PREFIX}/en-US/A2-4.webp")]);
        assert!(paths.iter().all(|p| !p.contains("zh-TW")));
    }

    #[tokio::test]
    async fn bulk_404_with_failed_fallback_records_primary_url_as_missing() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&server.uri(), dir.path(), 4);
        let target = DownloadTarget::new(&card_set("20", "A2"), 4, "en-US");

        assert_eq!(fetcher.fetch_item(&target, Mode::Bulk).await, Outcome::Missing);

        let missing = fetcher.stats().missing_by_set();
        assert_eq!(missing["A2"], vec![format!("{}/20/src/4_en.png", server.uri())]);
        assert_eq!(fetcher.stats().counts().failed, 0);
    }

    #[tokio::test]
    async fn probe_404_is_absent_and_skips_fallback() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&server.uri(), dir.path(), 4);
        let target = DownloadTarget::new(&card_set("20", "A2"), 4, "en-US");

        assert_eq!(fetcher.fetch_item(&target, Mode::Probe).await, Outcome::Absent);
        assert_eq!(request_paths(&server).await, vec!["/20/src/4_en.png".to_string()]);

        let counts = fetcher.stats().counts();
        assert_eq!((counts.missing, counts.failed, counts.processed), (0, 0, 1));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let server = MockServer::start().await;
        // Slower than the request timeout, so the first two attempts time out
        Mock::given(method("GET"))
            .and(path("/7/src/3_en.png"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/7/src/3_en.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .with_priority(2)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&server.uri(), dir.path(), 4);
        let target = DownloadTarget::new(&card_set("7", "A1"), 3, "en-US");

        assert_eq!(fetcher.fetch_item(&target, Mode::Bulk).await, Outcome::Downloaded);
        assert_eq!(request_paths(&server).await.len(), 3);
        assert!(!crate::utils::files::partial_path(&image_path(dir.path(), "en-US", "A1", 3, PRIMARY_EXT)).exists());
    }

    #[tokio::test]
    async fn server_error_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&server.uri(), dir.path(), 4);
        let target = DownloadTarget::new(&card_set("7", "A1"), 3, "en-US");

        assert_eq!(fetcher.fetch_item(&target, Mode::Bulk).await, Outcome::Failed);
        assert_eq!(request_paths(&server).await.len(), 1);
        assert_eq!(
            fetcher.stats().failed_by_set()["A1"],
            vec![format!("{}/7/src/3_en.png", server.uri())]
        );
    }

    async fn read_request_head(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
            }
        }
    }

    #[tokio::test]
    async fn dropped_connections_are_retried_until_success() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));

        let accepted = connections.clone();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = accepted.fetch_add(1, Ordering::SeqCst);
                read_request_head(&mut socket).await;
                // First two connections close without sending a response
                if n < 2 {
                    drop(socket);
                    continue;
                }
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 3\r\nConnection: close\r\n\r\npng")
                    .await;
                let _ = socket.shutdown().await;
            }
        });

        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&format!("http://{addr}"), dir.path(), 4);
        let target = DownloadTarget::new(&card_set("7", "A1"), 3, "en-US");

        assert_eq!(fetcher.fetch_item(&target, Mode::Bulk).await, Outcome::Downloaded);
        assert_eq!(connections.load(Ordering::SeqCst), 3);
        let saved = image_path(dir.path(), "en-US", "A1", 3, PRIMARY_EXT);
        assert_eq!(std::fs::read(saved).unwrap(), b"png");
        assert_eq!(fetcher.stats().counts().failed, 0);
    }
}
