use chrono::{DateTime, Datelike, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// The period an ingestion run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchPeriod {
    pub year: i32,
}

impl FetchPeriod {
    pub fn year(year: i32) -> Self {
        Self { year }
    }
}

impl fmt::Display for FetchPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.year)
    }
}

/// A date as a source reported it, before the normalizer resolves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawDate {
    /// ISO-8601 date or datetime text, possibly malformed.
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    /// Separate year/month/day fields, possibly out of range.
    Parts { year: i32, month: u32, day: u32 },
}

impl fmt::Display for RawDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawDate::Text(s) => write!(f, "{}", s),
            RawDate::Date(d) => write!(f, "{}", d),
            RawDate::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            RawDate::Parts { year, month, day } => write!(f, "{}-{}-{}", year, month, day),
        }
    }
}

impl From<&str> for RawDate {
    fn from(s: &str) -> Self {
        RawDate::Text(s.to_string())
    }
}

impl From<NaiveDate> for RawDate {
    fn from(d: NaiveDate) -> Self {
        RawDate::Date(d)
    }
}

/// One source's report of one holiday occurrence, as mapped by an adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub name: String,
    pub date: RawDate,
    pub description: Option<String>,
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub is_public_holiday: bool,
    pub is_global: bool,
    pub categories: BTreeSet<String>,
    /// Single category some sources report instead of a list.
    pub category_type: Option<String>,
    pub source: String,
}

impl RawRecord {
    pub fn new(
        name: impl Into<String>,
        date: impl Into<RawDate>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            date: date.into(),
            description: None,
            country_code: None,
            country_name: None,
            is_public_holiday: false,
            is_global: false,
            categories: BTreeSet::new(),
            category_type: None,
            source: source.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_country(mut self, code: impl Into<String>, name: Option<String>) -> Self {
        self.country_code = Some(code.into());
        self.country_name = name;
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.insert(category.into());
        self
    }

    pub fn public_holiday(mut self, value: bool) -> Self {
        self.is_public_holiday = value;
        self
    }

    pub fn global(mut self, value: bool) -> Self {
        self.is_global = value;
        self
    }
}

/// A country reference carried on a record; keyed by its ISO 3166-1 alpha-2 code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryRef {
    pub code: String,
    pub name: Option<String>,
    pub flag_emoji: Option<String>,
}

impl CountryRef {
    pub fn new(code: impl Into<String>, name: Option<String>) -> Self {
        Self {
            code: code.into(),
            name,
            flag_emoji: None,
        }
    }
}

/// A raw record after validation: name and date are guaranteed, text is trimmed
/// and empty strings are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub name: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub country: Option<CountryRef>,
    pub is_public_holiday: bool,
    pub is_global: bool,
    pub categories: BTreeSet<String>,
    pub source: String,
}

/// Persistence identity of a holiday. Matching on it is exact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub name: String,
    pub date: NaiveDate,
    pub year: i32,
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.date, self.year)
    }
}

/// The deduplicated, merge-resolved representation of one real-world holiday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub name: String,
    pub date: NaiveDate,
    pub year: i32,
    pub description: Option<String>,
    pub sources: BTreeSet<String>,
    pub categories: BTreeSet<String>,
    /// Keyed by country code.
    pub countries: BTreeMap<String, CountryRef>,
    pub is_public_holiday: bool,
    pub is_global: bool,
    pub wikipedia_url: Option<String>,
}

impl CanonicalRecord {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            name: self.name.clone(),
            date: self.date,
            year: self.year,
        }
    }

    /// Number of populated fields; the merge engine bases a group on the highest score.
    pub fn completeness_score(&self) -> usize {
        let mut score = 1; // date is always present
        if !self.name.is_empty() {
            score += 1;
        }
        if self.description.is_some() {
            score += 1;
        }
        if !self.sources.is_empty() {
            score += 1;
        }
        if !self.categories.is_empty() {
            score += 1;
        }
        if !self.countries.is_empty() {
            score += 1;
        }
        if self.countries.values().any(|c| c.name.is_some()) {
            score += 1;
        }
        if self.is_public_holiday {
            score += 1;
        }
        if self.is_global {
            score += 1;
        }
        if self.wikipedia_url.is_some() {
            score += 1;
        }
        score
    }
}

impl From<NormalizedRecord> for CanonicalRecord {
    fn from(record: NormalizedRecord) -> Self {
        let mut countries = BTreeMap::new();
        if let Some(country) = record.country {
            countries.insert(country.code.clone(), country);
        }
        let mut sources = BTreeSet::new();
        if !record.source.is_empty() {
            sources.insert(record.source);
        }
        Self {
            year: record.date.year(),
            name: record.name,
            date: record.date,
            description: record.description,
            sources,
            categories: record.categories,
            countries,
            is_public_holiday: record.is_public_holiday,
            is_global: record.is_global,
            wikipedia_url: None,
        }
    }
}
