use super::Fetcher;
use crate::tcg::{CardSet, DownloadTarget, Mode, Outcome};

/// Highest card number a probe scan will request
pub const PROBE_MAX_NUMBER: u32 = 200;
/// Consecutive primary 404s that end a probe scan
pub const PROBE_MAX_CONSECUTIVE_MISSES: u32 = 3;

impl Fetcher {
    /// Scan a set of undeclared size in one language, from card 1 upward.
    ///
    /// Stops after [`PROBE_MAX_CONSECUTIVE_MISSES`] 404s in a row or at
    /// [`PROBE_MAX_NUMBER`]. Any other outcome resets the run of misses, so a
    /// single gap mid-set does not end the scan. Returns the last number
    /// requested.
    pub async fn probe_set(&self, set: &CardSet, language: &str) -> u32 {
        let mut misses = 0;
        let mut last = 0;

        for number in 1..=PROBE_MAX_NUMBER {
            last = number;
            let target = DownloadTarget::new(set, number, language);
            if self.fetch_item(&target, Mode::Probe).await == Outcome::Absent {
                misses += 1;
                if misses >= PROBE_MAX_CONSECUTIVE_MISSES {
                    break;
                }
            } else {
                misses = 0;
            }
        }

        tracing::info!(
            set_code = %set.set_code,
            language,
            last_number = last,
            "Probe scan finished"
        );
        last
    }
}
