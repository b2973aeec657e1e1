use async_trait::async_trait;
use tracing::info;

use crate::apis::base::{FetchContext, FetchOutcome, HolidaySource};
use crate::constants::{CATEGORY_INTERNATIONAL, UN_SOURCE};
use crate::types::{FetchPeriod, RawDate, RawRecord};

/// Major UN international days, kept locally since the UN publishes no stable API.
/// (name, month, day, description)
const UN_OBSERVANCES: &[(&str, u32, u32, &str)] = &[
    ("International Women's Day", 3, 8, "Celebrating women's achievements"),
    ("World Health Day", 4, 7, "WHO celebration"),
    ("Earth Day", 4, 22, "Environmental protection"),
    ("International Workers' Day", 5, 1, "Labor day"),
    ("World Environment Day", 6, 5, "UN Environment Programme"),
    ("International Peace Day", 9, 21, "Peace and non-violence"),
    ("World Food Day", 10, 16, "FAO celebration"),
    ("Human Rights Day", 12, 10, "Universal Declaration"),
];

pub struct UnObservancesSource;

impl UnObservancesSource {
    pub fn records_for(year: i32) -> Vec<RawRecord> {
        UN_OBSERVANCES
            .iter()
            .map(|&(name, month, day, description)| {
                RawRecord::new(name, RawDate::Parts { year, month, day }, UN_SOURCE)
                    .with_description(description)
                    .global(true)
                    .with_category(CATEGORY_INTERNATIONAL)
            })
            .collect()
    }
}

#[async_trait]
impl HolidaySource for UnObservancesSource {
    fn source_id(&self) -> &'static str {
        UN_SOURCE
    }

    async fn fetch(&self, period: FetchPeriod, _ctx: &FetchContext) -> FetchOutcome {
        let records = Self::records_for(period.year);
        info!("UN Observances: {} holidays", records.len());
        FetchOutcome::Complete(records)
    }
}
