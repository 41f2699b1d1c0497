//! Run-wide counters and the end-of-run report.

use crate::tcg::{DownloadTarget, Outcome};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// A fallback download that succeeded
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FallbackEntry {
    pub number: u32,
    pub language: String,
    pub url: String,
}

/// Counters and categorized outcome lists shared by every fetch task
#[derive(Debug, Default)]
pub struct RunStats {
    downloaded: AtomicUsize,
    downloaded_fallback: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    processed: AtomicUsize,
    failed_items: Mutex<Vec<(String, String)>>,
    missing_items: Mutex<Vec<(String, String)>>,
    fallback_items: Mutex<Vec<(String, FallbackEntry)>>,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub downloaded: usize,
    pub downloaded_fallback: usize,
    pub skipped: usize,
    pub failed: usize,
    pub missing: usize,
    pub processed: usize,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the single outcome of `target`. `url` is the request the
    /// outcome is about: the primary URL for `Failed`/`Missing` after a
    /// primary attempt, the fallback URL for fallback results.
    pub fn record(&self, target: &DownloadTarget, outcome: Outcome, url: Option<&str>) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        let url = url.unwrap_or_default().to_string();
        match outcome {
            Outcome::Downloaded => {
                self.downloaded.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::SkippedExists => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::DownloadedFallback => {
                self.downloaded_fallback.fetch_add(1, Ordering::Relaxed);
                push(
                    &self.fallback_items,
                    (
                        target.set_code.clone(),
                        FallbackEntry {
                            number: target.number,
                            language: target.language.clone(),
                            url,
                        },
                    ),
                );
            }
            Outcome::Missing => push(&self.missing_items, (target.set_code.clone(), url)),
            Outcome::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                push(&self.failed_items, (target.set_code.clone(), url));
            }
            Outcome::Absent => {}
        }
    }

    pub fn counts(&self) -> Counts {
        Counts {
            downloaded: self.downloaded.load(Ordering::Relaxed),
            downloaded_fallback: self.downloaded_fallback.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            missing: lock(&self.missing_items).len(),
            processed: self.processed.load(Ordering::Relaxed),
        }
    }

    /// Failed URLs grouped by set code, set codes in order
    pub fn failed_by_set(&self) -> BTreeMap<String, Vec<String>> {
        group(lock(&self.failed_items).iter().cloned())
    }

    /// Missing (404) primary URLs grouped by set code
    pub fn missing_by_set(&self) -> BTreeMap<String, Vec<String>> {
        group(lock(&self.missing_items).iter().cloned())
    }

    /// Fallback successes grouped by set code, sorted by number then language
    pub fn fallback_by_set(&self) -> BTreeMap<String, Vec<FallbackEntry>> {
        let mut grouped = group(lock(&self.fallback_items).iter().cloned());
        for entries in grouped.values_mut() {
            entries.sort();
        }
        grouped
    }

    /// Render the end-of-run report
    pub fn render_report(&self, peak_in_flight: usize) -> String {
        let counts = self.counts();
        let rule = "=".repeat(50);
        let mut out = String::new();

        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Download complete!");
        let _ = writeln!(out, "  Primary downloads:  {}", counts.downloaded);
        let _ = writeln!(out, "  Fallback downloads: {}", counts.downloaded_fallback);
        let _ = writeln!(out, "  Skipped (existing): {}", counts.skipped);
        let _ = writeln!(out, "  Missing (404):      {}", counts.missing);
        let _ = writeln!(out, "  Failed:             {}", counts.failed);
        let _ = writeln!(out, "  Processed:          {}", counts.processed);
        let _ = writeln!(out, "  Peak in-flight:     {peak_in_flight}");
        let _ = writeln!(out, "{rule}");

        let missing = self.missing_by_set();
        if !missing.is_empty() {
            let _ = writeln!(out, "\nMissing URLs (404) ({}):", counts.missing);
            write_url_groups(&mut out, &missing);
        }

        let fallback = self.fallback_by_set();
        if !fallback.is_empty() {
            let _ = writeln!(
                out,
                "\nDownloaded from fallback source ({}):",
                counts.downloaded_fallback
            );
            for (set_code, entries) in &fallback {
                let _ = writeln!(out, "\n  [{set_code}] ({}):", entries.len());
                for entry in entries {
                    let _ = writeln!(out, "    - #{} [{}]: {}", entry.number, entry.language, entry.url);
                }
            }
        }

        let failed = self.failed_by_set();
        if !failed.is_empty() {
            let _ = writeln!(out, "\nFailed URLs ({}):", counts.failed);
            write_url_groups(&mut out, &failed);
        }

        out
    }
}

fn write_url_groups(out: &mut String, groups: &BTreeMap<String, Vec<String>>) {
    for (set_code, urls) in groups {
        let _ = writeln!(out, "\n  [{set_code}] ({}):", urls.len());
        for url in urls {
            let _ = writeln!(out, "    - {url}");
        }
    }
}

fn group<T>(items: impl Iterator<Item = (String, T)>) -> BTreeMap<String, Vec<T>> {
    let mut grouped: BTreeMap<String, Vec<T>> = BTreeMap::new();
    for (set_code, item) in items {
        grouped.entry(set_code).or_default().push(item);
    }
    grouped
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn push<T>(list: &Mutex<Vec<T>>, item: T) {
    lock(list).push(item);
}
