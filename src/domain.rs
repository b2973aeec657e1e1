use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants;
use crate::types::{CanonicalRecord, CountryRef, IdentityKey};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holiday {
    pub id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub year: i32,
    pub is_global: bool,
    pub is_public_holiday: bool,
    pub sources: Vec<String>,
    pub wikipedia_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_verified: Option<DateTime<Utc>>,
}

impl Holiday {
    /// A new, unsaved row seeded from a canonical record.
    pub fn from_canonical(record: &CanonicalRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: None,
            name: record.name.clone(),
            slug: slugify(&format!("{}-{}", record.name, record.date)),
            description: record.description.clone(),
            date: record.date,
            year: record.date.year(),
            is_global: record.is_global,
            is_public_holiday: record.is_public_holiday,
            sources: record.sources.iter().cloned().collect(),
            wikipedia_url: record.wikipedia_url.clone(),
            created_at: now,
            updated_at: now,
            last_verified: None,
        }
    }

    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            name: self.name.clone(),
            date: self.date,
            year: self.year,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub id: Option<Uuid>,
    pub code: String,
    pub name: String,
    pub flag_emoji: String,
}

impl Country {
    pub fn from_ref(country: &CountryRef) -> Self {
        Self {
            id: None,
            code: country.code.clone(),
            name: country.name.clone().unwrap_or_else(|| country.code.clone()),
            flag_emoji: country
                .flag_emoji
                .clone()
                .unwrap_or_else(|| constants::GLOBE_EMOJI.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolidayCategory {
    pub id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub category_type: String,
    pub color: String,
    pub icon: Option<String>,
}

impl HolidayCategory {
    pub fn from_slug(slug: &str) -> Self {
        let (color, icon) = constants::category_style(slug);
        Self {
            id: None,
            name: title_case(slug),
            slug: slug.to_string(),
            category_type: slug.to_string(),
            color: color.to_string(),
            icon: icon.map(str::to_string),
        }
    }
}

/// Lower-case ASCII slug: alphanumerics kept, runs of anything else become one `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '\'' {
            continue;
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn title_case(input: &str) -> String {
    input
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("New Year's Day-2025-01-01"), "new-years-day-2025-01-01");
        assert_eq!(slugify("  Pi Day!  "), "pi-day");
        assert_eq!(slugify("Día de Muertos"), "d-a-de-muertos");
    }

    #[test]
    fn test_category_from_slug_seeds_display_fields() {
        let category = HolidayCategory::from_slug("international");
        assert_eq!(category.name, "International");
        assert_eq!(category.category_type, "international");
        assert_eq!(category.color, "#10B981");
        assert!(category.icon.is_some());

        let unknown = HolidayCategory::from_slug("bank-holiday");
        assert_eq!(unknown.name, "Bank Holiday");
        assert_eq!(unknown.color, constants::DEFAULT_CATEGORY_COLOR);
        assert_eq!(unknown.icon, None);
    }

    #[test]
    fn test_country_from_ref_falls_back_to_code() {
        let country = Country::from_ref(&CountryRef::new("DE", None));
        assert_eq!(country.name, "DE");
        assert_eq!(country.flag_emoji, constants::GLOBE_EMOJI);
    }
}
