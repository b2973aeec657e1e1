/// Source identifiers. These double as the `source` attribution tag on every record.
pub const NAGER_SOURCE: &str = "nager";
pub const CALENDARIFIC_SOURCE: &str = "calendarific";
pub const ABSTRACT_SOURCE: &str = "abstract";
pub const UN_SOURCE: &str = "un";
pub const CURATED_SOURCE: &str = "curated";

pub const NAGER_BASE_URL: &str = "https://date.nager.at";
pub const CALENDARIFIC_BASE_URL: &str = "https://calendarific.com";
pub const ABSTRACT_BASE_URL: &str = "https://holidays.abstractapi.com";

pub const CALENDARIFIC_COUNTRIES: &[&str] =
    &["US", "GB", "CA", "AU", "IN", "DE", "FR", "IT", "ES", "BR"];
pub const ABSTRACT_COUNTRIES: &[&str] = &["US", "GB", "CA"];

/// Category slugs known to the classifier and the dimension table.
pub const CATEGORY_PUBLIC: &str = "public";
pub const CATEGORY_RELIGIOUS: &str = "religious";
pub const CATEGORY_INTERNATIONAL: &str = "international";
pub const CATEGORY_FUN: &str = "fun";
pub const CATEGORY_SEASONAL: &str = "seasonal";

pub const DEFAULT_CATEGORY_COLOR: &str = "#3B82F6";
pub const GLOBE_EMOJI: &str = "🌍";

/// All sources in adapter order. Record order downstream follows this order.
pub fn all_sources() -> &'static [&'static str] {
    &[
        NAGER_SOURCE,
        CALENDARIFIC_SOURCE,
        ABSTRACT_SOURCE,
        UN_SOURCE,
        CURATED_SOURCE,
    ]
}

/// Display colour and icon seeded into a new category row.
pub fn category_style(slug: &str) -> (&'static str, Option<&'static str>) {
    match slug {
        CATEGORY_PUBLIC => ("#3B82F6", Some("🏛️")),
        CATEGORY_RELIGIOUS => ("#8B5CF6", Some("🕊️")),
        CATEGORY_INTERNATIONAL => ("#10B981", Some("🌐")),
        CATEGORY_FUN => ("#F59E0B", Some("🎉")),
        CATEGORY_SEASONAL => ("#EF4444", Some("🍂")),
        _ => (DEFAULT_CATEGORY_COLOR, None),
    }
}
