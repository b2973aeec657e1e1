use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::apis::base::{
    fetch_json, fetch_units, parse_items, FetchContext, FetchOutcome, HolidaySource, SourceError,
    SourceErrorKind,
};
use crate::config::KeyedSourceConfig;
use crate::constants::{
    CALENDARIFIC_BASE_URL, CALENDARIFIC_COUNTRIES, CALENDARIFIC_SOURCE, CATEGORY_INTERNATIONAL,
    CATEGORY_PUBLIC, CATEGORY_RELIGIOUS, CATEGORY_SEASONAL,
};
use crate::types::{FetchPeriod, RawDate, RawRecord};

const RELIGIOUS_TYPES: &[&str] = &[
    "christian",
    "hindu",
    "muslim",
    "jewish",
    "orthodox",
    "religious",
];

#[derive(Debug, Deserialize)]
struct CalendarificHoliday {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    country: Option<CalendarificCountry>,
    date: CalendarificDate,
    #[serde(default, rename = "type")]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarificCountry {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CalendarificDate {
    #[serde(default)]
    iso: Option<String>,
    #[serde(default)]
    datetime: Option<CalendarificDateParts>,
}

#[derive(Debug, Deserialize)]
struct CalendarificDateParts {
    year: i32,
    month: u32,
    day: u32,
}

/// Calendarific holidays API; requires an API key.
pub struct CalendarificSource {
    base_url: String,
    countries: Vec<String>,
    api_key: Option<String>,
}

impl CalendarificSource {
    pub fn new(config: &KeyedSourceConfig) -> Self {
        Self {
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(CALENDARIFIC_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            countries: config.countries.clone().unwrap_or_else(|| {
                CALENDARIFIC_COUNTRIES.iter().map(|c| c.to_string()).collect()
            }),
            api_key: config.api_key().map(str::to_string),
        }
    }

    fn holidays_url(&self) -> String {
        format!("{}/api/v2/holidays", self.base_url)
    }

    fn to_raw_record(country_code: &str, item: CalendarificHoliday) -> Option<RawRecord> {
        let date = match (item.date.iso, item.date.datetime) {
            (Some(iso), _) if !iso.trim().is_empty() => RawDate::Text(iso),
            (_, Some(parts)) => RawDate::Parts {
                year: parts.year,
                month: parts.month,
                day: parts.day,
            },
            _ => return None,
        };

        let is_national = item.types.iter().any(|t| t == "National holiday");
        let mut record = RawRecord::new(item.name, date, CALENDARIFIC_SOURCE)
            .with_country(
                country_code.to_string(),
                item.country.and_then(|c| c.name),
            )
            .public_holiday(is_national);
        record.description = item.description;

        for kind in &item.types {
            let lower = kind.to_lowercase();
            if kind == "National holiday" {
                record.categories.insert(CATEGORY_PUBLIC.to_string());
            }
            if kind == "Observance" {
                record.categories.insert(CATEGORY_INTERNATIONAL.to_string());
            }
            if lower.contains("season") {
                record.categories.insert(CATEGORY_SEASONAL.to_string());
            }
            if RELIGIOUS_TYPES.iter().any(|r| lower.contains(r)) {
                record.categories.insert(CATEGORY_RELIGIOUS.to_string());
            }
        }
        if record.categories.is_empty() {
            record.categories.insert(CATEGORY_PUBLIC.to_string());
        }
        Some(record)
    }

    fn parse_response(country_code: &str, body: &Value) -> Result<Vec<RawRecord>, SourceError> {
        let items = body
            .get("response")
            .and_then(|r| r.get("holidays"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SourceError::new(
                    CALENDARIFIC_SOURCE,
                    country_code,
                    SourceErrorKind::Malformed,
                    "missing response.holidays",
                )
            })?;
        Ok(parse_items::<CalendarificHoliday>(CALENDARIFIC_SOURCE, items)
            .into_iter()
            .filter_map(|item| Self::to_raw_record(country_code, item))
            .collect())
    }
}

#[async_trait]
impl HolidaySource for CalendarificSource {
    fn source_id(&self) -> &'static str {
        CALENDARIFIC_SOURCE
    }

    fn missing_configuration(&self) -> Option<String> {
        match self.api_key {
            Some(_) => None,
            None => Some("Calendarific API key not configured".to_string()),
        }
    }

    #[instrument(skip(self, ctx), fields(source = CALENDARIFIC_SOURCE))]
    async fn fetch(&self, period: FetchPeriod, ctx: &FetchContext) -> FetchOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return FetchOutcome::Disabled {
                reason: "Calendarific API key not configured".to_string(),
            };
        };

        let url = self.holidays_url();
        let countries = self.countries.clone();
        let (records, errors) = fetch_units(ctx, CALENDARIFIC_SOURCE, countries, |country| {
            let url = url.as_str();
            async move {
                let query = [
                    ("api_key", api_key.to_string()),
                    ("country", country.clone()),
                    ("year", period.year.to_string()),
                ];
                let body = fetch_json(ctx, CALENDARIFIC_SOURCE, &country, url, &query).await?;
                Self::parse_response(&country, &body)
            }
        })
        .await;

        info!("Calendarific: {} holidays", records.len());
        FetchOutcome::from_parts(records, errors)
    }
}
