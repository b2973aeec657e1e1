use async_trait::async_trait;
use tracing::info;

use crate::apis::base::{FetchContext, FetchOutcome, HolidaySource};
use crate::constants::{CATEGORY_FUN, CURATED_SOURCE};
use crate::types::{FetchPeriod, RawDate, RawRecord};

const FUN_DAYS: &[(&str, u32, u32, &str)] = &[
    ("Star Wars Day", 5, 4, "May the 4th be with you!"),
    ("Pi Day", 3, 14, "Celebrating π (3.14)"),
    ("International Cat Day", 8, 8, "Celebrating our feline friends"),
    ("International Coffee Day", 10, 1, "For coffee lovers worldwide"),
    ("World Emoji Day", 7, 17, "📅 Celebrating emojis!"),
    ("International Pizza Day", 2, 9, "🍕 Pizza lovers unite!"),
    ("World Chocolate Day", 7, 7, "🍫 Sweet celebration"),
    ("International Friendship Day", 7, 30, "Celebrating friendships"),
];

/// Hand-picked observances with no authoritative feed.
pub struct CuratedSource;

#[async_trait]
impl HolidaySource for CuratedSource {
    fn source_id(&self) -> &'static str {
        CURATED_SOURCE
    }

    async fn fetch(&self, period: FetchPeriod, _ctx: &FetchContext) -> FetchOutcome {
        let year = period.year;
        let records: Vec<RawRecord> = FUN_DAYS
            .iter()
            .map(|&(name, month, day, description)| {
                RawRecord::new(name, RawDate::Parts { year, month, day }, CURATED_SOURCE)
                    .with_description(description)
                    .global(true)
                    .with_category(CATEGORY_FUN)
            })
            .collect();
        info!("Fun holidays: {} holidays", records.len());
        FetchOutcome::Complete(records)
    }
}
