use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::constants::CATEGORY_PUBLIC;
use crate::domain::{Country, Holiday, HolidayCategory};
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::storage::HolidayStore;
use crate::types::CanonicalRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub created: bool,
    pub updated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Records skipped after a store error; counted in neither created nor updated.
    pub failed: usize,
}

/// Fields an incoming record changed on a stored holiday.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub fields: Vec<&'static str>,
}

impl ChangeSet {
    fn add(&mut self, field: &'static str) {
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.fields.is_empty()
    }
}

/// Apply the update policy for an existing row. The stored row is authoritative:
/// text is only filled when missing, sources only grow and flags only turn on.
pub fn apply_incoming(stored: &mut Holiday, incoming: &CanonicalRecord) -> ChangeSet {
    let mut changes = ChangeSet::default();

    if is_blank(&stored.description) && !is_blank(&incoming.description) {
        stored.description = incoming.description.clone();
        changes.add("description");
    }
    for source in &incoming.sources {
        if !stored.sources.contains(source) {
            stored.sources.push(source.clone());
            changes.add("sources");
        }
    }
    if incoming.is_public_holiday && !stored.is_public_holiday {
        stored.is_public_holiday = true;
        changes.add("is_public_holiday");
    }
    if incoming.is_global && !stored.is_global {
        stored.is_global = true;
        changes.add("is_global");
    }
    if is_blank(&stored.wikipedia_url) && !is_blank(&incoming.wikipedia_url) {
        stored.wikipedia_url = incoming.wikipedia_url.clone();
        changes.add("wikipedia_url");
    }
    changes
}

/// Rows written by other tools store missing text as `''`.
fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Upserts canonical records one at a time against a `HolidayStore`.
pub struct Reconciler {
    store: Arc<dyn HolidayStore>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn HolidayStore>) -> Self {
        Self { store }
    }

    pub async fn reconcile(&self, record: &CanonicalRecord) -> Result<ReconcileOutcome> {
        let now = Utc::now();
        let key = record.identity_key();

        let (holiday, outcome) = match self.store.find_holiday(&key).await? {
            None => {
                let mut holiday = Holiday::from_canonical(record, now);
                self.store.insert_holiday(&mut holiday).await?;
                debug!(holiday = %key, "Created holiday");
                (
                    holiday,
                    ReconcileOutcome {
                        created: true,
                        updated: false,
                    },
                )
            }
            Some(mut stored) => {
                let changes = apply_incoming(&mut stored, record);
                if changes.has_changes() {
                    stored.updated_at = now;
                    stored.last_verified = Some(now);
                    self.store.update_holiday(&stored).await?;
                    debug!(holiday = %key, fields = ?changes.fields, "Updated holiday");
                }
                let updated = changes.has_changes();
                (
                    stored,
                    ReconcileOutcome {
                        created: false,
                        updated,
                    },
                )
            }
        };

        self.attach_dimensions(&holiday, record).await?;
        Ok(outcome)
    }

    async fn attach_dimensions(&self, holiday: &Holiday, record: &CanonicalRecord) -> Result<()> {
        let Some(holiday_id) = holiday.id else {
            return Ok(());
        };

        for country in record.countries.values() {
            let stored = self
                .store
                .get_or_create_country(&Country::from_ref(country))
                .await?;
            if let Some(country_id) = stored.id {
                self.store.attach_country(holiday_id, country_id).await?;
            }
        }

        let default_category = [CATEGORY_PUBLIC.to_string()];
        let slugs: Vec<&String> = if record.categories.is_empty() {
            default_category.iter().collect()
        } else {
            record.categories.iter().collect()
        };
        for slug in slugs {
            let stored = self
                .store
                .get_or_create_category(&HolidayCategory::from_slug(slug))
                .await?;
            if let Some(category_id) = stored.id {
                self.store.attach_category(holiday_id, category_id).await?;
            }
        }
        Ok(())
    }

    /// Reconcile sequentially. A record that fails is logged and skipped.
    pub async fn reconcile_all(&self, records: &[CanonicalRecord]) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        for record in records {
            match self.reconcile(record).await {
                Ok(ReconcileOutcome { created: true, .. }) => {
                    summary.created += 1;
                    metrics::reconcile::created();
                }
                Ok(ReconcileOutcome { updated: true, .. }) => {
                    summary.updated += 1;
                    metrics::reconcile::updated();
                }
                Ok(_) => {
                    summary.unchanged += 1;
                    metrics::reconcile::unchanged();
                }
                Err(e) => {
                    if e.is_conflict() {
                        error!(
                            holiday = %record.identity_key(),
                            "Persistence conflict, skipping: {}", e
                        );
                    } else {
                        error!(holiday = %record.identity_key(), "Error saving holiday: {}", e);
                    }
                    summary.failed += 1;
                    metrics::reconcile::failed();
                }
            }
        }
        info!(
            "Reconciled {} holidays: {} created, {} updated, {} unchanged, {} failed",
            records.len(),
            summary.created,
            summary.updated,
            summary.unchanged,
            summary.failed
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IngestError;
    use crate::pipeline::storage::InMemoryStore;
    use crate::types::{CountryRef, IdentityKey, NormalizedRecord};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn canonical(name: &str, source: &str) -> CanonicalRecord {
        NormalizedRecord {
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 4, 22).unwrap(),
            description: None,
            country: None,
            is_public_holiday: false,
            is_global: false,
            categories: BTreeSet::new(),
            source: source.to_string(),
        }
        .into()
    }

    fn earth_day() -> CanonicalRecord {
        let mut record = canonical("Earth Day", "un");
        record.sources.insert("curated".to_string());
        record.is_global = true;
        record.description = Some("desc".to_string());
        record.categories.insert("international".to_string());
        record
    }

    #[tokio::test]
    async fn test_second_identical_run_is_a_no_op() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = Reconciler::new(store.clone());
        let records = vec![earth_day()];

        let first = reconciler.reconcile_all(&records).await;
        assert_eq!((first.created, first.updated), (1, 0));

        let second = reconciler.reconcile_all(&records).await;
        assert_eq!((second.created, second.updated), (0, 0));
        assert_eq!(second.unchanged, 1);
        assert_eq!(store.holiday_count(), 1);
    }

    #[tokio::test]
    async fn test_new_source_and_description_update_stored_row() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = Reconciler::new(store.clone());
        reconciler.reconcile(&canonical("Earth Day", "un")).await.unwrap();

        let mut incoming = canonical("Earth Day", "curated");
        incoming.description = Some("Environmental protection".to_string());
        let outcome = reconciler.reconcile(&incoming).await.unwrap();
        assert_eq!(
            outcome,
            ReconcileOutcome {
                created: false,
                updated: true
            }
        );

        let stored = store
            .find_holiday(&incoming.identity_key())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.sources, vec!["un", "curated"]);
        assert_eq!(stored.description.as_deref(), Some("Environmental protection"));
        assert!(stored.last_verified.is_some());
    }

    #[test]
    fn test_stored_values_are_never_downgraded() {
        let mut stored = Holiday::from_canonical(&earth_day(), Utc::now());
        stored.is_public_holiday = true;

        let mut incoming = canonical("Earth Day", "un");
        incoming.description = Some("another description".to_string());
        let changes = apply_incoming(&mut stored, &incoming);

        assert!(!changes.has_changes());
        assert!(stored.is_public_holiday);
        assert!(stored.is_global);
        assert_eq!(stored.description.as_deref(), Some("desc"));
    }

    #[test]
    fn test_empty_stored_text_is_filled() {
        let mut stored = Holiday::from_canonical(&canonical("Earth Day", "un"), Utc::now());
        stored.description = Some(String::new());
        stored.wikipedia_url = Some("  ".to_string());

        let mut incoming = canonical("Earth Day", "un");
        incoming.description = Some("Environmental protection".to_string());
        incoming.wikipedia_url = Some("https://en.wikipedia.org/wiki/Earth_Day".to_string());
        let changes = apply_incoming(&mut stored, &incoming);

        assert_eq!(changes.fields, vec!["description", "wikipedia_url"]);
        assert_eq!(stored.description.as_deref(), Some("Environmental protection"));
        assert_eq!(
            stored.wikipedia_url.as_deref(),
            Some("https://en.wikipedia.org/wiki/Earth_Day")
        );
    }

    #[test]
    fn test_blank_incoming_text_is_ignored() {
        let mut stored = Holiday::from_canonical(&canonical("Earth Day", "un"), Utc::now());
        let mut incoming = canonical("Earth Day", "un");
        incoming.description = Some("   ".to_string());

        let changes = apply_incoming(&mut stored, &incoming);
        assert!(!changes.has_changes());
        assert_eq!(stored.description, None);
    }

    #[test]
    fn test_flag_upgrade_counts_as_change() {
        let mut stored = Holiday::from_canonical(&canonical("Labour Day", "nager"), Utc::now());
        let mut incoming = canonical("Labour Day", "nager");
        incoming.is_public_holiday = true;

        let changes = apply_incoming(&mut stored, &incoming);
        assert_eq!(changes.fields, vec!["is_public_holiday"]);
        assert!(stored.is_public_holiday);
    }

    #[tokio::test]
    async fn test_dimensions_are_attached_once() {
        let store = Arc::new(InMemoryStore::new());
        let reconciler = Reconciler::new(store.clone());
        let mut record = canonical("Christmas Day", "nager");
        record.countries.insert(
            "US".to_string(),
            CountryRef::new("US", Some("United States".to_string())),
        );

        reconciler.reconcile(&record).await.unwrap();
        reconciler.reconcile(&record).await.unwrap();

        let stored = store
            .find_holiday(&record.identity_key())
            .await
            .unwrap()
            .unwrap();
        let id = stored.id.unwrap();
        let countries = store.holiday_countries(id).await.unwrap();
        assert_eq!(countries.len(), 1);
        assert_eq!(countries[0].name, "United States");
        // no categories supplied: falls back to public
        let categories = store.holiday_categories(id).await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].slug, "public");
    }

    /// Rejects inserts for one name, delegates everything else.
    struct FlakyStore {
        inner: InMemoryStore,
        reject: &'static str,
    }

    #[async_trait]
    impl HolidayStore for FlakyStore {
        async fn find_holiday(&self, key: &IdentityKey) -> Result<Option<Holiday>> {
            self.inner.find_holiday(key).await
        }
        async fn insert_holiday(&self, holiday: &mut Holiday) -> Result<()> {
            if holiday.name == self.reject {
                return Err(IngestError::PersistenceConflict("rejected".to_string()));
            }
            self.inner.insert_holiday(holiday).await
        }
        async fn update_holiday(&self, holiday: &Holiday) -> Result<()> {
            self.inner.update_holiday(holiday).await
        }
        async fn list_holidays(&self, year: Option<i32>) -> Result<Vec<Holiday>> {
            self.inner.list_holidays(year).await
        }
        async fn get_or_create_country(&self, country: &Country) -> Result<Country> {
            self.inner.get_or_create_country(country).await
        }
        async fn get_or_create_category(
            &self,
            category: &HolidayCategory,
        ) -> Result<HolidayCategory> {
            self.inner.get_or_create_category(category).await
        }
        async fn attach_country(&self, holiday_id: Uuid, country_id: Uuid) -> Result<()> {
            self.inner.attach_country(holiday_id, country_id).await
        }
        async fn attach_category(&self, holiday_id: Uuid, category_id: Uuid) -> Result<()> {
            self.inner.attach_category(holiday_id, category_id).await
        }
        async fn holiday_countries(&self, holiday_id: Uuid) -> Result<Vec<Country>> {
            self.inner.holiday_countries(holiday_id).await
        }
        async fn holiday_categories(&self, holiday_id: Uuid) -> Result<Vec<HolidayCategory>> {
            self.inner.holiday_categories(holiday_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_record_does_not_abort_batch() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryStore::new(),
            reject: "Pi Day",
        });
        let reconciler = Reconciler::new(store.clone());

        let summary = reconciler
            .reconcile_all(&[
                canonical("Star Wars Day", "curated"),
                canonical("Pi Day", "curated"),
                canonical("World Emoji Day", "curated"),
            ])
            .await;

        assert_eq!(summary.created, 2);
        assert_eq!(summary.updated, 0);
        assert_eq!(summary.failed, 1);
        assert_eq!(store.inner.holiday_count(), 2);
    }
}
