use crate::types::CanonicalRecord;

/// Merge records believed to denote the same holiday into one.
///
/// The most complete input (first one on ties) supplies name, date and any
/// text it has; the rest layer on top:
/// - sources, categories and countries are unioned
/// - description and wikipedia url fall back to the first non-empty one
/// - `is_public_holiday` / `is_global` are OR-ed
///
/// A single input is returned as-is. Returns `None` for an empty slice.
pub fn merge(records: &[CanonicalRecord]) -> Option<CanonicalRecord> {
    match records {
        [] => None,
        [only] => Some(only.clone()),
        _ => {
            let mut merged = most_complete(records).clone();

            for record in records {
                merged.sources.extend(record.sources.iter().cloned());
                merged.categories.extend(record.categories.iter().cloned());
                for (code, country) in &record.countries {
                    let entry = merged
                        .countries
                        .entry(code.clone())
                        .or_insert_with(|| country.clone());
                    if entry.name.is_none() {
                        entry.name = country.name.clone();
                    }
                    if entry.flag_emoji.is_none() {
                        entry.flag_emoji = country.flag_emoji.clone();
                    }
                }
                merged.is_public_holiday |= record.is_public_holiday;
                merged.is_global |= record.is_global;
            }

            if merged.description.is_none() {
                merged.description = records.iter().find_map(|r| r.description.clone());
            }
            if merged.wikipedia_url.is_none() {
                merged.wikipedia_url = records.iter().find_map(|r| r.wikipedia_url.clone());
            }
            Some(merged)
        }
    }
}

/// Highest completeness score; the earliest input wins ties.
fn most_complete(records: &[CanonicalRecord]) -> &CanonicalRecord {
    let mut best = &records[0];
    let mut best_score = best.completeness_score();
    for record in &records[1..] {
        let score = record.completeness_score();
        if score > best_score {
            best = record;
            best_score = score;
        }
    }
    best
}
