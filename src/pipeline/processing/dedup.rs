use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::DedupConfig;
use crate::observability::metrics;
use crate::pipeline::processing::merge::merge;
use crate::types::{CanonicalRecord, NormalizedRecord};

/// Similarity of two holiday names in [0, 1], case and surrounding whitespace ignored.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.trim().to_lowercase(), &b.trim().to_lowercase())
}

/// Collapses records from many sources into one record per real-world holiday.
///
/// Grouping is pivot based: the first unclaimed record of a date bucket pulls
/// in every later record similar to *it*, so similarity is not chained through
/// other members. Output order follows first appearance.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    threshold: f64,
    window_days: i64,
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(&DedupConfig::default())
    }
}

impl Deduplicator {
    pub fn new(config: &DedupConfig) -> Self {
        Self {
            threshold: config.name_similarity_threshold,
            window_days: config.date_window_days,
        }
    }

    /// Inclusive on both ends of the window.
    pub fn dates_close(&self, a: NaiveDate, b: NaiveDate) -> bool {
        (a - b).num_days().abs() <= self.window_days
    }

    pub fn are_similar(&self, a: &CanonicalRecord, b: &CanonicalRecord) -> bool {
        if a.name.trim().is_empty() || b.name.trim().is_empty() {
            return false;
        }
        name_similarity(&a.name, &b.name) >= self.threshold && self.dates_close(a.date, b.date)
    }

    pub fn deduplicate(&self, records: Vec<NormalizedRecord>) -> Vec<CanonicalRecord> {
        let input_len = records.len();
        if input_len == 0 {
            return Vec::new();
        }

        let mut per_date = Vec::new();
        for bucket in group_by_date(records) {
            per_date.extend(self.merge_bucket(bucket));
        }
        let result = self.merge_fuzzy_dates(per_date);

        info!(
            "Deduplicated {} holidays down to {} ({} duplicates removed)",
            input_len,
            result.len(),
            input_len - result.len()
        );
        metrics::dedup::canonical_records(result.len());
        result
    }

    fn merge_bucket(&self, bucket: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
        let mut claimed = vec![false; bucket.len()];
        let mut merged = Vec::new();

        for i in 0..bucket.len() {
            if claimed[i] {
                continue;
            }
            claimed[i] = true;
            let mut group = vec![bucket[i].clone()];
            for j in (i + 1)..bucket.len() {
                if !claimed[j] && self.are_similar(&bucket[i], &bucket[j]) {
                    claimed[j] = true;
                    group.push(bucket[j].clone());
                }
            }
            merged.extend(self.merge_group(group));
        }
        merged
    }

    /// Second pass over the already merged list: exact (case-folded) names whose
    /// dates fall within the window of the pivot.
    fn merge_fuzzy_dates(&self, records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
        let keys: Vec<String> = records
            .iter()
            .map(|r| r.name.trim().to_lowercase())
            .collect();
        let mut claimed = vec![false; records.len()];
        let mut result = Vec::with_capacity(records.len());

        for i in 0..records.len() {
            if claimed[i] {
                continue;
            }
            claimed[i] = true;
            let mut group = vec![records[i].clone()];
            for j in (i + 1)..records.len() {
                if !claimed[j]
                    && keys[i] == keys[j]
                    && self.dates_close(records[i].date, records[j].date)
                {
                    claimed[j] = true;
                    group.push(records[j].clone());
                }
            }
            result.extend(self.merge_group(group));
        }
        result
    }

    fn merge_group(&self, group: Vec<CanonicalRecord>) -> Option<CanonicalRecord> {
        if group.len() > 1 {
            debug!(
                name = %group[0].name,
                date = %group[0].date,
                size = group.len(),
                "Merging duplicate group"
            );
            metrics::dedup::group_merged();
        }
        merge(&group)
    }
}

/// Buckets keyed by exact date, in order of first appearance.
fn group_by_date(records: Vec<NormalizedRecord>) -> Vec<Vec<CanonicalRecord>> {
    let mut index: HashMap<NaiveDate, usize> = HashMap::new();
    let mut buckets: Vec<Vec<CanonicalRecord>> = Vec::new();
    for record in records {
        let slot = *index.entry(record.date).or_insert_with(|| {
            buckets.push(Vec::new());
            buckets.len() - 1
        });
        buckets[slot].push(record.into());
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeSet;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap() + Duration::days(offset)
    }

    fn record(name: &str, date: NaiveDate, source: &str) -> NormalizedRecord {
        NormalizedRecord {
            name: name.to_string(),
            date,
            description: None,
            country: None,
            is_public_holiday: false,
            is_global: false,
            categories: BTreeSet::new(),
            source: source.to_string(),
        }
    }

    #[test]
    fn test_name_similarity_bounds() {
        assert_eq!(name_similarity("Earth Day", " earth day "), 1.0);
        assert!(name_similarity("New Year's Day", "New Year Day") >= 0.85);
        assert!(name_similarity("Easter", "Diwali") < 0.85);
        assert_eq!(
            name_similarity("Pi Day", "Star Wars Day"),
            name_similarity("Star Wars Day", "Pi Day")
        );
    }

    #[test]
    fn test_fuzzy_names_on_same_date_merge() {
        let dedup = Deduplicator::default();
        let result = dedup.deduplicate(vec![
            record("New Year's Day", day(0), "nager"),
            record("New Year Day", day(0), "calendarific"),
        ]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].sources.len(), 2);
    }

    #[test]
    fn test_unrelated_names_on_same_date_stay_apart() {
        let dedup = Deduplicator::default();
        let result = dedup.deduplicate(vec![
            record("Easter", day(100), "nager"),
            record("Diwali", day(100), "calendarific"),
        ]);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].name, "Easter");
        assert_eq!(result[1].name, "Diwali");
    }

    #[test]
    fn test_date_window_is_inclusive_at_three_days() {
        let dedup = Deduplicator::default();

        let within = dedup.deduplicate(vec![
            record("Lunar Festival", day(10), "calendarific"),
            record("Lunar Festival", day(13), "abstract"),
        ]);
        assert_eq!(within.len(), 1);
        assert_eq!(within[0].date, day(10));

        let outside = dedup.deduplicate(vec![
            record("Lunar Festival", day(10), "calendarific"),
            record("lunar festival ", day(14), "abstract"),
        ]);
        assert_eq!(outside.len(), 2);
    }

    #[test]
    fn test_second_pass_needs_exact_names() {
        let dedup = Deduplicator::default();
        let result = dedup.deduplicate(vec![
            record("New Year's Day", day(0), "nager"),
            record("New Year Day", day(1), "calendarific"),
        ]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_grouping_is_pivot_based_not_transitive() {
        // a and b are close, a and c are not
        let dedup = Deduplicator::new(&DedupConfig {
            name_similarity_threshold: 0.75,
            date_window_days: 3,
        });
        let a = "abcdefghij";
        let b = "abcdefghxy";
        let c = "abcdefwxyz";
        assert!(name_similarity(a, b) >= 0.75);
        assert!(name_similarity(a, c) < 0.75);

        let result = dedup.deduplicate(vec![
            record(a, day(0), "nager"),
            record(b, day(0), "calendarific"),
            record(c, day(0), "abstract"),
        ]);
        // a claims b; c is left on its own
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].sources.len(), 2);
        assert_eq!(result[1].name, c);
    }

    #[test]
    fn test_empty_names_never_match() {
        let dedup = Deduplicator::default();
        let mut a: CanonicalRecord = record("", day(0), "nager").into();
        let b = a.clone();
        assert!(!dedup.are_similar(&a, &b));
        a.name = "Earth Day".to_string();
        assert!(!dedup.are_similar(&a, &b));
    }

    #[test]
    fn test_earth_day_scenario() {
        let mut un = record("Earth Day", day(111), "un");
        un.is_global = true;
        let mut curated = record("Earth Day", day(111), "curated");
        curated.description = Some("desc".to_string());

        let result = Deduplicator::default().deduplicate(vec![un, curated]);
        assert_eq!(result.len(), 1);
        let merged = &result[0];
        assert_eq!(
            merged.sources,
            BTreeSet::from(["un".to_string(), "curated".to_string()])
        );
        assert!(merged.is_global);
        assert_eq!(merged.description.as_deref(), Some("desc"));
    }

    #[test]
    fn test_output_follows_first_appearance() {
        let result = Deduplicator::default().deduplicate(vec![
            record("Christmas Day", day(358), "nager"),
            record("New Year's Day", day(0), "nager"),
            record("Christmas Day", day(358), "calendarific"),
        ]);
        let names: Vec<_> = result.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Christmas Day", "New Year's Day"]);
    }
}
