use super::traits::HolidayStore;
use crate::domain::{Country, Holiday, HolidayCategory};
use crate::error::{IngestError, Result};
use crate::types::IdentityKey;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    holidays: HashMap<Uuid, Holiday>,
    by_identity: HashMap<IdentityKey, Uuid>,
    countries: HashMap<String, Country>,
    categories: HashMap<String, HolidayCategory>,
    holiday_countries: BTreeSet<(Uuid, Uuid)>,
    holiday_categories: BTreeSet<(Uuid, Uuid)>,
}

/// In-memory store for tests and dry runs
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        // a panic mid-write leaves the maps consistent, so poisoning is ignored
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn holiday_count(&self) -> usize {
        self.lock().holidays.len()
    }
}

#[async_trait]
impl HolidayStore for InMemoryStore {
    async fn find_holiday(&self, key: &IdentityKey) -> Result<Option<Holiday>> {
        let tables = self.lock();
        Ok(tables
            .by_identity
            .get(key)
            .and_then(|id| tables.holidays.get(id))
            .cloned())
    }

    async fn insert_holiday(&self, holiday: &mut Holiday) -> Result<()> {
        let mut tables = self.lock();
        let key = holiday.identity_key();
        if tables.by_identity.contains_key(&key) {
            return Err(IngestError::PersistenceConflict(format!(
                "holiday {} already exists",
                key
            )));
        }
        let id = Uuid::new_v4();
        holiday.id = Some(id);
        tables.by_identity.insert(key, id);
        tables.holidays.insert(id, holiday.clone());

        debug!("Created holiday: {} with id {}", holiday.name, id);
        Ok(())
    }

    async fn update_holiday(&self, holiday: &Holiday) -> Result<()> {
        let id = holiday.id.ok_or_else(|| {
            IngestError::PersistenceConflict(format!("holiday {} has no id", holiday.name))
        })?;
        let mut tables = self.lock();
        match tables.holidays.get_mut(&id) {
            Some(stored) if stored.identity_key() == holiday.identity_key() => {
                *stored = holiday.clone();
                Ok(())
            }
            Some(_) => Err(IngestError::PersistenceConflict(format!(
                "update of {} would change its identity",
                id
            ))),
            None => Err(IngestError::PersistenceConflict(format!(
                "holiday {} not found",
                id
            ))),
        }
    }

    async fn list_holidays(&self, year: Option<i32>) -> Result<Vec<Holiday>> {
        let tables = self.lock();
        let mut holidays: Vec<Holiday> = tables
            .holidays
            .values()
            .filter(|h| year.map_or(true, |y| h.year == y))
            .cloned()
            .collect();
        holidays.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
        Ok(holidays)
    }

    async fn get_or_create_country(&self, country: &Country) -> Result<Country> {
        let mut tables = self.lock();
        let stored = tables
            .countries
            .entry(country.code.clone())
            .or_insert_with(|| Country {
                id: Some(Uuid::new_v4()),
                ..country.clone()
            });
        Ok(stored.clone())
    }

    async fn get_or_create_category(&self, category: &HolidayCategory) -> Result<HolidayCategory> {
        let mut tables = self.lock();
        let stored = tables
            .categories
            .entry(category.slug.clone())
            .or_insert_with(|| HolidayCategory {
                id: Some(Uuid::new_v4()),
                ..category.clone()
            });
        Ok(stored.clone())
    }

    async fn attach_country(&self, holiday_id: Uuid, country_id: Uuid) -> Result<()> {
        self.lock().holiday_countries.insert((holiday_id, country_id));
        Ok(())
    }

    async fn attach_category(&self, holiday_id: Uuid, category_id: Uuid) -> Result<()> {
        self.lock().holiday_categories.insert((holiday_id, category_id));
        Ok(())
    }

    async fn holiday_countries(&self, holiday_id: Uuid) -> Result<Vec<Country>> {
        let tables = self.lock();
        let mut countries: Vec<Country> = tables
            .countries
            .values()
            .filter(|c| {
                c.id.map_or(false, |id| {
                    tables.holiday_countries.contains(&(holiday_id, id))
                })
            })
            .cloned()
            .collect();
        countries.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(countries)
    }

    async fn holiday_categories(&self, holiday_id: Uuid) -> Result<Vec<HolidayCategory>> {
        let tables = self.lock();
        let mut categories: Vec<HolidayCategory> = tables
            .categories
            .values()
            .filter(|c| {
                c.id.map_or(false, |id| {
                    tables.holiday_categories.contains(&(holiday_id, id))
                })
            })
            .cloned()
            .collect();
        categories.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(categories)
    }
}
