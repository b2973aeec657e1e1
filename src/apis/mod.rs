// Holiday data sources. Each adapter maps one provider's payload to `RawRecord`s.

pub mod abstract_api;
pub mod base;
pub mod calendarific;
pub mod curated;
pub mod factory;
pub mod nager;
pub mod un;

pub use base::{FetchContext, FetchOutcome, HolidaySource, SourceError, SourceErrorKind};
pub use factory::create_sources;
