use super::Fetcher;
use crate::tcg::{CardSet, DownloadTarget, Mode};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Per-language guess for sets whose size the catalog does not declare
const PROBE_ESTIMATE: u64 = 50;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

pub fn progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Expected number of outcomes for a run, probe sets counted by estimate
pub fn estimate_total(sets: &[CardSet], languages: &[String]) -> u64 {
    sets.iter()
        .map(|set| {
            let per_language = if set.is_size_unknown() {
                PROBE_ESTIMATE
            } else {
                u64::from(set.total_cards)
            };
            per_language * languages.len() as u64
        })
        .sum()
}

/// Keep the first set for each set code so no slot is fetched twice
pub fn dedup_sets(sets: Vec<CardSet>) -> Vec<CardSet> {
    let mut seen = HashSet::new();
    sets.into_iter()
        .filter(|set| {
            let first = seen.insert(set.set_code.clone());
            if !first {
                tracing::warn!(set_code = %set.set_code, id = %set.id, "Duplicate set code, skipping");
            }
            first
        })
        .collect()
}

impl Fetcher {
    /// Process every set concurrently
    pub async fn run(self: &Arc<Self>, sets: &[CardSet], languages: &[String]) {
        join_all(sets.iter().map(|set| self.process_set(set, languages))).await;
    }

    /// Fan one set out across its languages and card numbers.
    ///
    /// Each target runs as its own task; a panicking task is logged and does
    /// not affect its siblings.
    pub async fn process_set(self: &Arc<Self>, set: &CardSet, languages: &[String]) {
        let mut tasks = JoinSet::new();

        if set.is_size_unknown() {
            tracing::info!(set_code = %set.set_code, "Size unknown, probing");
            for language in languages {
                let fetcher = Arc::clone(self);
                let set = set.clone();
                let language = language.clone();
                tasks.spawn(async move {
                    fetcher.probe_set(&set, &language).await;
                });
            }
        } else {
            tracing::info!(set_code = %set.set_code, cards = set.total_cards, "Fetching set");
            for language in languages {
                for number in 1..=set.total_cards {
                    let fetcher = Arc::clone(self);
                    let target = DownloadTarget::new(set, number, language);
                    tasks.spawn(async move {
                        fetcher.fetch_item(&target, Mode::Bulk).await;
                    });
                }
            }
        }

        let mut aborted = 0usize;
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                aborted += 1;
                tracing::error!(set_code = %set.set_code, error = %e, "Fetch task aborted");
            }
        }

        tracing::debug!(set_code = %set.set_code, aborted, "Set processed");
    }
}
