use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Country, Holiday, HolidayCategory};
use crate::error::Result;
use crate::types::IdentityKey;

/// Persistent store for canonical holidays and their dimension rows.
#[async_trait]
pub trait HolidayStore: Send + Sync {
    // Holidays
    async fn find_holiday(&self, key: &IdentityKey) -> Result<Option<Holiday>>;
    /// Assigns `holiday.id`. Fails with a conflict if the identity key exists.
    async fn insert_holiday(&self, holiday: &mut Holiday) -> Result<()>;
    async fn update_holiday(&self, holiday: &Holiday) -> Result<()>;
    async fn list_holidays(&self, year: Option<i32>) -> Result<Vec<Holiday>>;

    // Dimensions. The first write of a code/slug wins; later calls return the stored row.
    async fn get_or_create_country(&self, country: &Country) -> Result<Country>;
    async fn get_or_create_category(&self, category: &HolidayCategory) -> Result<HolidayCategory>;

    // Associations. Re-attaching an existing pair is a no-op.
    async fn attach_country(&self, holiday_id: Uuid, country_id: Uuid) -> Result<()>;
    async fn attach_category(&self, holiday_id: Uuid, category_id: Uuid) -> Result<()>;
    async fn holiday_countries(&self, holiday_id: Uuid) -> Result<Vec<Country>>;
    async fn holiday_categories(&self, holiday_id: Uuid) -> Result<Vec<HolidayCategory>>;
}
