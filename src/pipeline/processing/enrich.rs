use std::collections::HashMap;

use crate::constants::{
    CATEGORY_FUN, CATEGORY_INTERNATIONAL, CATEGORY_PUBLIC, CATEGORY_RELIGIOUS, CATEGORY_SEASONAL,
    GLOBE_EMOJI,
};
use crate::types::CanonicalRecord;

const RELIGIOUS_KEYWORDS: &[&str] = &[
    "christmas", "easter", "ramadan", "eid", "hanukkah", "diwali", "buddha", "prophet", "saint",
    "holy", "religious",
];
const INTERNATIONAL_KEYWORDS: &[&str] =
    &["international", "world", "global", "united nations", "un day"];
const FUN_KEYWORDS: &[&str] = &[
    "day of", "awareness", "appreciation", "pizza", "coffee", "cat", "dog", "emoji", "star wars",
    "pi day", "towel day",
];
const SEASONAL_KEYWORDS: &[&str] = &[
    "spring", "summer", "autumn", "fall", "winter", "equinox", "solstice", "harvest",
];

const REGIONAL_INDICATOR_OFFSET: u32 = 0x1F1E6 - 'A' as u32;

/// Flag emoji per country code, memoised for the lifetime of one run.
#[derive(Debug, Default)]
pub struct FlagCache {
    flags: HashMap<String, String>,
}

impl FlagCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag_for(&mut self, country_code: &str) -> String {
        if let Some(flag) = self.flags.get(country_code) {
            return flag.clone();
        }
        let flag = flag_emoji(country_code);
        self.flags.insert(country_code.to_string(), flag.clone());
        flag
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Regional-indicator pair for a 2-letter code; the globe for anything else.
pub fn flag_emoji(country_code: &str) -> String {
    let code = country_code.trim();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return GLOBE_EMOJI.to_string();
    }
    code.chars()
        .filter_map(|c| char::from_u32(c.to_ascii_uppercase() as u32 + REGIONAL_INDICATOR_OFFSET))
        .collect()
}

/// Keyword classification for records that arrive without categories.
pub fn classify(record: &CanonicalRecord) -> Vec<&'static str> {
    let name = record.name.to_lowercase();
    let description = record
        .description
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let in_text = |keywords: &[&str]| {
        keywords
            .iter()
            .any(|k| name.contains(k) || description.contains(k))
    };

    let mut categories = Vec::new();
    if in_text(RELIGIOUS_KEYWORDS) {
        categories.push(CATEGORY_RELIGIOUS);
    }
    if record.is_public_holiday || name.contains("national") || name.contains("independence") {
        categories.push(CATEGORY_PUBLIC);
    }
    if in_text(INTERNATIONAL_KEYWORDS) {
        categories.push(CATEGORY_INTERNATIONAL);
    }
    if FUN_KEYWORDS.iter().any(|k| name.contains(k)) {
        categories.push(CATEGORY_FUN);
    }
    if in_text(SEASONAL_KEYWORDS) {
        categories.push(CATEGORY_SEASONAL);
    }
    if categories.is_empty() {
        categories.push(CATEGORY_PUBLIC);
    }
    categories
}

/// Best-guess English Wikipedia article for a holiday name.
pub fn wikipedia_url(name: &str) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(format!(
        "https://en.wikipedia.org/wiki/{}",
        name.replace(' ', "_")
    ))
}

/// Fills flags, categories and a wikipedia link on canonical records. Owns its
/// flag cache, so one enricher per run.
#[derive(Debug, Default)]
pub struct Enricher {
    flags: FlagCache,
}

impl Enricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enrich(&mut self, record: &mut CanonicalRecord) {
        for country in record.countries.values_mut() {
            if country.flag_emoji.is_none() {
                country.flag_emoji = Some(self.flags.flag_for(&country.code));
            }
        }
        if record.categories.is_empty() {
            record
                .categories
                .extend(classify(record).into_iter().map(str::to_string));
        }
        if record.wikipedia_url.is_none() {
            record.wikipedia_url = wikipedia_url(&record.name);
        }
    }

    pub fn enrich_all(&mut self, records: &mut [CanonicalRecord]) {
        for record in records.iter_mut() {
            self.enrich(record);
        }
    }

    pub fn flag_cache(&self) -> &FlagCache {
        &self.flags
    }
}
