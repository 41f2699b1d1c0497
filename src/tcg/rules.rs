//! Static sourcing rules: the fallback blacklist, promo code conventions and
//! primary-host language codes.

use std::borrow::Cow;
use std::ops::RangeInclusive;

/// A set code and the card numbers that must come from the fallback host
#[derive(Debug, Clone)]
pub struct BlacklistEntry {
    pub set_code: &'static str,
    pub numbers: RangeInclusive<u32>,
}

const fn entry(set_code: &'static str, numbers: RangeInclusive<u32>) -> BlacklistEntry {
    BlacklistEntry { set_code, numbers }
}

/// Primary-host assets known to be absent or wrong
pub const BLACKLIST: &[BlacklistEntry] = &[
    entry("A1a", 63..=63),
    // 80 and 81 are swapped on the primary host
    entry("A1a", 80..=81),
    entry("A2a", 75..=75),
    entry("A2a", 85..=85),
    entry("PROMO-A", 109..=117),
];

pub fn is_blacklisted(set_code: &str, number: u32) -> bool {
    BLACKLIST
        .iter()
        .any(|e| e.set_code == set_code && e.numbers.contains(&number))
}

/// Code the catalog reuses for every series' promo pool
pub const CATALOG_PROMO_CODE: &str = "PROMO";
/// Prefix of a series-disambiguated promo code, e.g. `PROMO-A`
pub const PROMO_PREFIX: &str = "PROMO-";
/// The fallback host's spelling of the same prefix, e.g. `P-A`
pub const FALLBACK_PROMO_PREFIX: &str = "P-";

/// Catalog code to local set code: `PROMO` in series `b` becomes `PROMO-B`
pub fn local_set_code(catalog_code: &str, series: &str) -> String {
    if catalog_code == CATALOG_PROMO_CODE {
        format!("{PROMO_PREFIX}{}", series.to_uppercase())
    } else {
        catalog_code.to_string()
    }
}

/// Local set code to the fallback host's code: `PROMO-B` becomes `P-B`
pub fn fallback_set_code(set_code: &str) -> Cow<'_, str> {
    let has_prefix = set_code
        .get(..PROMO_PREFIX.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(PROMO_PREFIX));
    if has_prefix {
        Cow::Owned(format!(
            "{FALLBACK_PROMO_PREFIX}{}",
            &set_code[PROMO_PREFIX.len()..]
        ))
    } else {
        Cow::Borrowed(set_code)
    }
}

/// Language tags the primary host spells differently
pub const PRIMARY_LANGUAGE_CODES: &[(&str, &str)] = &[("zh-TW", "zh"), ("en-US", "en")];

/// The only language the fallback host serves
pub const FALLBACK_LANGUAGE: &str = "en-US";

pub fn primary_language_code(language: &str) -> &str {
    PRIMARY_LANGUAGE_CODES
        .iter()
        .find(|(tag, _)| *tag == language)
        .map_or(language, |(_, code)| code)
}
