use crate::config::{Endpoints, Timeouts};
use crate::error::{Error, Result};
use crate::tcg::rules::local_set_code;
use crate::tcg::CardSet;
use serde::Deserialize;

/// Catalog partition the pocket sets live under
const CATALOG_LANG: &str = "pocket";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(u64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRecord {
    id: RawId,
    set_code: String,
    #[serde(default)]
    main_set: Option<serde_json::Value>,
    #[serde(default)]
    set_n_cards: Option<u32>,
    #[serde(default)]
    set_n_secrets: Option<u32>,
}

impl CatalogRecord {
    /// Sub-sets point at their parent through `main_set`
    fn is_top_level(&self) -> bool {
        matches!(self.main_set, None | Some(serde_json::Value::Null))
    }

    /// `None` when the declared counts do not fit a card number
    fn into_card_set(self, series: &str) -> Option<CardSet> {
        let cards = self.set_n_cards.unwrap_or(0);
        let secrets = self.set_n_secrets.unwrap_or(0);
        let Some(total_cards) = cards.checked_add(secrets) else {
            tracing::warn!(
                series,
                set_code = %self.set_code,
                cards,
                secrets,
                "Declared card count overflows, skipping set"
            );
            return None;
        };
        Some(CardSet {
            id: self.id.into_string(),
            set_code: local_set_code(&self.set_code, series),
            total_cards,
            series: series.to_string(),
        })
    }
}

pub struct CatalogClient<'a> {
    client: &'a reqwest::Client,
    endpoints: &'a Endpoints,
    timeouts: &'a Timeouts,
}

impl<'a> CatalogClient<'a> {
    pub fn new(client: &'a reqwest::Client, endpoints: &'a Endpoints, timeouts: &'a Timeouts) -> Self {
        Self {
            client,
            endpoints,
            timeouts,
        }
    }

    /// Fetch the top-level sets of one series.
    ///
    /// A failed request is logged and yields an empty list so the remaining
    /// series still run.
    pub async fn fetch_sets(&self, series: &str) -> Vec<CardSet> {
        match self.try_fetch_sets(series).await {
            Ok(sets) => {
                tracing::info!(series, sets = sets.len(), "Fetched catalog");
                sets
            }
            Err(e) => {
                tracing::error!(series, error = %e, "Failed to fetch catalog, skipping series");
                Vec::new()
            }
        }
    }

    pub async fn try_fetch_sets(&self, series: &str) -> Result<Vec<CardSet>> {
        let catalog_err = |source| Error::Catalog {
            series: series.to_string(),
            source,
        };

        // Decoded record by record so one bad entry only costs its own set
        let values: Vec<serde_json::Value> = self
            .client
            .get(&self.endpoints.catalog_url)
            .query(&[("lang", CATALOG_LANG), ("group", series)])
            .header("Origin", &self.endpoints.catalog_origin)
            .header("Accept", "application/json")
            .timeout(self.timeouts.catalog)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(catalog_err)?
            .json()
            .await
            .map_err(catalog_err)?;

        let records: Vec<CatalogRecord> = values
            .into_iter()
            .filter_map(|value| decode_record(series, value))
            .collect();

        let total = records.len();
        let top_level: Vec<CatalogRecord> = records
            .into_iter()
            .filter(CatalogRecord::is_top_level)
            .collect();
        if top_level.len() < total {
            tracing::debug!(series, dropped = total - top_level.len(), "Dropped sub-set records");
        }

        let sets = top_level
            .into_iter()
            .filter_map(|record| record.into_card_set(series))
            .collect();

        Ok(sets)
    }
}

fn decode_record(series: &str, value: serde_json::Value) -> Option<CatalogRecord> {
    let set_code = value
        .get("set_code")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("<unknown>")
        .to_string();
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!(series, set_code = %set_code, error = %e, "Malformed catalog record, skipping set");
            None
        }
    }
}
