//! Card catalog model and the static sourcing rules.

use std::fmt;

pub mod catalog;
pub mod rules;

/// A top-level card set as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSet {
    /// Catalog id, used by the primary image host
    pub id: String,
    /// Human-readable code, promo codes already disambiguated per series
    pub set_code: String,
    /// Declared card count (regular + secret); 0 means unknown
    pub total_cards: u32,
    pub series: String,
}

impl CardSet {
    pub fn is_size_unknown(&self) -> bool {
        self.total_cards == 0
    }
}

/// One image slot: a card number of a set in one language
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadTarget {
    pub set_id: String,
    pub set_code: String,
    pub number: u32,
    pub language: String,
}

impl DownloadTarget {
    pub fn new(set: &CardSet, number: u32, language: &str) -> Self {
        Self {
            set_id: set.id.clone(),
            set_code: set.set_code.clone(),
            number,
            language: language.to_string(),
        }
    }
}

impl fmt::Display for DownloadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{} [{}]", self.set_code, self.number, self.language)
    }
}

/// What happened to a single target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Fetched from the primary host
    Downloaded,
    /// File already present, no request made
    SkippedExists,
    /// Fetched from the fallback host
    DownloadedFallback,
    /// Primary 404 and the fallback had nothing either
    Missing,
    Failed,
    /// Probe-mode 404: the end of the set, or a gap in it
    Absent,
}

/// How a primary 404 is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Declared range; 404 falls back to the secondary host
    Bulk,
    /// Discovery scan; 404 is an expected answer
    Probe,
}
