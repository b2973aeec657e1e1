use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::IngestError;
use crate::observability::metrics;
use crate::types::{CountryRef, NormalizedRecord, RawDate, RawRecord};

/// Why a raw record was dropped before deduplication.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("record from {source_id} has an empty name")]
    EmptyName { source_id: String },

    #[error("unparseable date from {source_id}: {raw:?}")]
    UnparseableDate { source_id: String, raw: String },
}

impl Rejection {
    pub fn source_id(&self) -> &str {
        match self {
            Rejection::EmptyName { source_id } | Rejection::UnparseableDate { source_id, .. } => {
                source_id
            }
        }
    }
}

impl From<Rejection> for IngestError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::UnparseableDate { source_id, raw } => {
                IngestError::UnparseableDate { source_id, raw }
            }
            Rejection::EmptyName { source_id } => IngestError::InvalidRecord {
                source_id,
                reason: "empty name".to_string(),
            },
        }
    }
}

/// Result of normalizing one batch. Rejected records are reported, never counted.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub records: Vec<NormalizedRecord>,
    pub rejected: Vec<Rejection>,
}

/// Resolves dates and cleans text so every downstream stage sees one shape.
#[derive(Debug, Default, Clone, Copy)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: RawRecord) -> Result<NormalizedRecord, Rejection> {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(Rejection::EmptyName { source_id: raw.source });
        }

        let date = match parse_date(&raw.date) {
            Some(date) => date,
            None => {
                return Err(Rejection::UnparseableDate {
                    source_id: raw.source,
                    raw: raw.date.to_string(),
                })
            }
        };

        let country = raw.country_code.as_deref().and_then(|code| {
            let code = code.trim().to_ascii_uppercase();
            if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
                Some(CountryRef::new(code, non_empty(raw.country_name.as_deref())))
            } else {
                debug!(source = %raw.source, code = %code, "Dropping invalid country code");
                None
            }
        });

        let categories: BTreeSet<String> = raw
            .categories
            .iter()
            .chain(raw.category_type.iter())
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        Ok(NormalizedRecord {
            name,
            date,
            description: non_empty(raw.description.as_deref()),
            country,
            is_public_holiday: raw.is_public_holiday,
            is_global: raw.is_global,
            categories,
            source: raw.source,
        })
    }

    /// Normalize in input order, logging and collecting rejections.
    pub fn normalize_all(&self, raws: Vec<RawRecord>) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        for raw in raws {
            match self.normalize(raw) {
                Ok(record) => batch.records.push(record),
                Err(rejection) => {
                    warn!(source = rejection.source_id(), "Rejected record: {}", rejection);
                    metrics::normalize::rejected(rejection.source_id());
                    batch.rejected.push(rejection);
                }
            }
        }
        metrics::normalize::accepted(batch.records.len());
        batch
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Resolve a source date to a calendar date. Datetimes keep their local
/// calendar date; the offset is discarded, not applied.
pub fn parse_date(raw: &RawDate) -> Option<NaiveDate> {
    match raw {
        RawDate::Date(date) => Some(*date),
        RawDate::DateTime(dt) => Some(dt.date_naive()),
        RawDate::Parts { year, month, day } => NaiveDate::from_ymd_opt(*year, *month, *day),
        RawDate::Text(text) => parse_date_text(text.trim()),
    }
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if text.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.date_naive());
        }
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn text(s: &str) -> RawDate {
        RawDate::Text(s.to_string())
    }

    #[test]
    fn test_parse_date_forms() {
        assert_eq!(parse_date(&text("2025-04-22")), Some(ymd(2025, 4, 22)));
        assert_eq!(parse_date(&text(" 2025-04-22 ")), Some(ymd(2025, 4, 22)));
        assert_eq!(parse_date(&text("2025-04-22T10:00:00Z")), Some(ymd(2025, 4, 22)));
        assert_eq!(parse_date(&text("2025-04-22T10:00:00")), Some(ymd(2025, 4, 22)));
        assert_eq!(
            parse_date(&RawDate::Parts { year: 2025, month: 2, day: 28 }),
            Some(ymd(2025, 2, 28))
        );
        assert_eq!(parse_date(&RawDate::Date(ymd(2024, 2, 29))), Some(ymd(2024, 2, 29)));
    }

    #[test]
    fn test_offset_is_stripped_not_applied() {
        // 23:30 at -05:00 is already the next day in UTC; the local date wins
        assert_eq!(
            parse_date(&text("2025-12-31T23:30:00-05:00")),
            Some(ymd(2025, 12, 31))
        );
        let dt = FixedOffset::east_opt(14 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 1, 1, 0, 30, 0)
            .unwrap();
        assert_eq!(parse_date(&RawDate::DateTime(dt)), Some(ymd(2025, 1, 1)));
    }

    #[test]
    fn test_unparseable_dates() {
        for raw in ["", "12/25/2025", "tomorrow", "2025-13-01", "2025-02-30"] {
            assert_eq!(parse_date(&text(raw)), None, "{raw}");
        }
        assert_eq!(parse_date(&RawDate::Parts { year: 2025, month: 2, day: 29 }), None);
    }

    #[test]
    fn test_normalize_cleans_text_and_country() {
        let mut raw = RawRecord::new("  Earth Day ", "2025-04-22", "un")
            .with_description("   ")
            .with_country(" us ", Some(" ".to_string()))
            .with_category(" International ");
        raw.category_type = Some("Observance".to_string());

        let record = Normalizer::new().normalize(raw).unwrap();
        assert_eq!(record.name, "Earth Day");
        assert_eq!(record.description, None);
        let country = record.country.unwrap();
        assert_eq!(country.code, "US");
        assert_eq!(country.name, None);
        assert_eq!(
            record.categories.into_iter().collect::<Vec<_>>(),
            vec!["international", "observance"]
        );
    }

    #[test]
    fn test_invalid_country_code_is_dropped_not_rejected() {
        let raw = RawRecord::new("Day", "2025-01-01", "nager").with_country("USA", None);
        let record = Normalizer::new().normalize(raw).unwrap();
        assert!(record.country.is_none());
    }

    #[test]
    fn test_rejections_are_reported_and_excluded() {
        let batch = Normalizer::new().normalize_all(vec![
            RawRecord::new("Good", "2025-01-01", "nager"),
            RawRecord::new("Bad", "not a date", "calendarific"),
            RawRecord::new("  ", "2025-01-01", "abstract"),
        ]);

        assert_eq!(batch.records.len(), 1);
        assert_eq!(
            batch.rejected,
            vec![
                Rejection::UnparseableDate {
                    source_id: "calendarific".to_string(),
                    raw: "not a date".to_string(),
                },
                Rejection::EmptyName { source_id: "abstract".to_string() },
            ]
        );
        let err: IngestError = batch.rejected[0].clone().into();
        assert!(matches!(err, IngestError::UnparseableDate { .. }));
    }
}
