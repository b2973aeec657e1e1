use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::apis::base::{
    fetch_json, fetch_units, parse_items, FetchContext, FetchOutcome, HolidaySource, SourceError,
    SourceErrorKind,
};
use crate::config::KeyedSourceConfig;
use crate::constants::{ABSTRACT_BASE_URL, ABSTRACT_COUNTRIES, ABSTRACT_SOURCE, CATEGORY_PUBLIC};
use crate::types::{FetchPeriod, RawDate, RawRecord};

#[derive(Debug, Deserialize)]
struct AbstractHoliday {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    country_name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    date_year: Option<String>,
    #[serde(default)]
    date_month: Option<String>,
    #[serde(default)]
    date_day: Option<String>,
}

impl AbstractHoliday {
    /// Prefer the split fields; `date` is `MM/DD/YYYY` and only used as a fallback.
    fn raw_date(&self) -> Option<RawDate> {
        let parts = (
            self.date_year.as_deref().and_then(|y| y.trim().parse().ok()),
            self.date_month.as_deref().and_then(|m| m.trim().parse().ok()),
            self.date_day.as_deref().and_then(|d| d.trim().parse().ok()),
        );
        match parts {
            (Some(year), Some(month), Some(day)) => Some(RawDate::Parts { year, month, day }),
            _ => self.date.clone().map(RawDate::Text),
        }
    }
}

/// AbstractAPI holidays; requires an API key.
pub struct AbstractApiSource {
    base_url: String,
    countries: Vec<String>,
    api_key: Option<String>,
}

impl AbstractApiSource {
    pub fn new(config: &KeyedSourceConfig) -> Self {
        Self {
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(ABSTRACT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            countries: config.countries.clone().unwrap_or_else(|| {
                ABSTRACT_COUNTRIES.iter().map(|c| c.to_string()).collect()
            }),
            api_key: config.api_key().map(str::to_string),
        }
    }

    fn holidays_url(&self) -> String {
        format!("{}/v1/", self.base_url)
    }

    fn to_raw_records(country_code: &str, items: &[Value]) -> Vec<RawRecord> {
        parse_items::<AbstractHoliday>(ABSTRACT_SOURCE, items)
            .into_iter()
            .filter_map(|item| {
                let date = item.raw_date()?;
                let mut record = RawRecord::new(item.name, date, ABSTRACT_SOURCE)
                    .with_country(country_code.to_string(), item.country_name)
                    .public_holiday(item.kind.as_deref() == Some("National"))
                    .with_category(CATEGORY_PUBLIC);
                record.description = item.description;
                Some(record)
            })
            .collect()
    }
}

#[async_trait]
impl HolidaySource for AbstractApiSource {
    fn source_id(&self) -> &'static str {
        ABSTRACT_SOURCE
    }

    fn missing_configuration(&self) -> Option<String> {
        if self.api_key.is_none() {
            Some("AbstractAPI key not configured".to_string())
        } else {
            None
        }
    }

    #[instrument(skip(self, ctx), fields(source = ABSTRACT_SOURCE))]
    async fn fetch(&self, period: FetchPeriod, ctx: &FetchContext) -> FetchOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return FetchOutcome::Disabled {
                reason: "AbstractAPI key not configured".to_string(),
            };
        };

        let url = self.holidays_url();
        let url = url.as_str();
        let countries = self.countries.clone();
        let (records, errors) = fetch_units(ctx, ABSTRACT_SOURCE, countries, |country| async move {
            let query = [
                ("api_key", api_key.to_string()),
                ("country", country.clone()),
                ("year", period.year.to_string()),
            ];
            let body = fetch_json(ctx, ABSTRACT_SOURCE, &country, url, &query).await?;
            match body {
                Value::Array(items) => Ok(Self::to_raw_records(&country, &items)),
                _ => Err(SourceError::new(
                    ABSTRACT_SOURCE,
                    country,
                    SourceErrorKind::Malformed,
                    "expected a JSON array of holidays",
                )),
            }
        })
        .await;

        info!("AbstractAPI: {} holidays", records.len());
        FetchOutcome::from_parts(records, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::base::test_support::{context, FakeHttp};
    use serde_json::json;

    #[test]
    fn test_maps_split_date_fields_and_national_type() {
        let items = vec![
            json!({
                "name": "Christmas Day",
                "country": "US",
                "country_name": "United States",
                "date": "12/25/2025",
                "date_year": "2025",
                "date_month": "12",
                "date_day": "25",
                "type": "National"
            }),
            json!({
                "name": "Groundhog Day",
                "date": "2025-02-02",
                "type": "Observance"
            }),
        ];

        let records = AbstractApiSource::to_raw_records("US", &items);
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].date,
            RawDate::Parts { year: 2025, month: 12, day: 25 }
        );
        assert!(records[0].is_public_holiday);
        assert_eq!(records[0].source, "abstract");
        assert_eq!(records[1].date, RawDate::Text("2025-02-02".to_string()));
        assert!(!records[1].is_public_holiday);
        assert!(records[1].categories.contains("public"));
    }

    #[test]
    fn test_item_without_any_date_is_dropped() {
        let records = AbstractApiSource::to_raw_records("GB", &[json!({"name": "Mystery"})]);
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_blank_key_disables_source() {
        let (ctx, http) = context(FakeHttp::new());
        let source = AbstractApiSource::new(&KeyedSourceConfig {
            api_key: Some("  ".to_string()),
            ..Default::default()
        });

        let outcome = source.fetch(FetchPeriod::year(2025), &ctx).await;
        assert!(outcome.is_disabled());
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn test_non_array_body_is_malformed_unit() {
        let http = FakeHttp::new().json(
            "http://abstract.test/v1/",
            json!({"error": {"message": "quota exceeded"}}),
        );
        let (ctx, _) = context(http);
        let source = AbstractApiSource::new(&KeyedSourceConfig {
            base_url: Some("http://abstract.test".to_string()),
            countries: Some(vec!["CA".to_string()]),
            api_key: Some("key".to_string()),
        });

        let outcome = source.fetch(FetchPeriod::year(2025), &ctx).await;
        assert!(outcome.records().is_empty());
        assert_eq!(outcome.errors().len(), 1);
        assert_eq!(outcome.errors()[0].kind, SourceErrorKind::Malformed);
    }
}
