use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tracing::{error, info, instrument};

use crate::apis::base::{
    fetch_json, fetch_units, parse_items, FetchContext, FetchOutcome, HolidaySource, SourceError,
    SourceErrorKind,
};
use crate::config::NagerConfig;
use crate::constants::{CATEGORY_PUBLIC, NAGER_SOURCE};
use crate::types::{FetchPeriod, RawRecord};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NagerCountry {
    country_code: String,
    #[serde(default)]
    name: Option<String>,
}

impl fmt::Display for NagerCountry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.country_code)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NagerHoliday {
    date: String,
    name: String,
    #[serde(default)]
    global: bool,
}

/// Nager.Date public holidays: one request for the country list, then one per country.
pub struct NagerSource {
    base_url: String,
    max_countries: usize,
}

impl NagerSource {
    pub fn new(config: &NagerConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_countries: config.max_countries,
        }
    }

    fn countries_url(&self) -> String {
        format!("{}/api/v3/AvailableCountries", self.base_url)
    }

    fn holidays_url(&self, year: i32, country_code: &str) -> String {
        format!(
            "{}/api/v3/PublicHolidays/{}/{}",
            self.base_url, year, country_code
        )
    }

    fn to_raw_records(country: &NagerCountry, items: &[Value]) -> Vec<RawRecord> {
        parse_items::<NagerHoliday>(NAGER_SOURCE, items)
            .into_iter()
            .map(|item| {
                RawRecord::new(item.name, item.date.as_str(), NAGER_SOURCE)
                    .with_country(country.country_code.clone(), country.name.clone())
                    .public_holiday(item.global)
                    .with_category(CATEGORY_PUBLIC)
            })
            .collect()
    }
}

#[async_trait]
impl HolidaySource for NagerSource {
    fn source_id(&self) -> &'static str {
        NAGER_SOURCE
    }

    #[instrument(skip(self, ctx), fields(source = NAGER_SOURCE))]
    async fn fetch(&self, period: FetchPeriod, ctx: &FetchContext) -> FetchOutcome {
        let countries_url = self.countries_url();
        let response = fetch_json(ctx, NAGER_SOURCE, "countries", &countries_url, &[]).await;
        let countries = match response {
            Ok(Value::Array(items)) => parse_items::<NagerCountry>(NAGER_SOURCE, &items),
            Ok(_) => {
                let err = SourceError::new(
                    NAGER_SOURCE,
                    "countries",
                    SourceErrorKind::Malformed,
                    "expected a JSON array of countries",
                );
                error!("Error fetching Nager countries: {}", err);
                return FetchOutcome::from_parts(Vec::new(), vec![err]);
            }
            Err(err) => {
                error!("Error fetching Nager countries: {}", err);
                return FetchOutcome::from_parts(Vec::new(), vec![err]);
            }
        };

        let countries: Vec<NagerCountry> = countries.into_iter().take(self.max_countries).collect();
        let (records, errors) = fetch_units(ctx, NAGER_SOURCE, countries, |country| async move {
            let url = self.holidays_url(period.year, &country.country_code);
            match fetch_json(ctx, NAGER_SOURCE, &country.country_code, &url, &[]).await? {
                Value::Array(items) => Ok(Self::to_raw_records(&country, &items)),
                _ => Err(SourceError::new(
                    NAGER_SOURCE,
                    country.country_code.clone(),
                    SourceErrorKind::Malformed,
                    "expected a JSON array of holidays",
                )),
            }
        })
        .await;

        info!("Nager.Date: {} holidays", records.len());
        FetchOutcome::from_parts(records, errors)
    }
}
