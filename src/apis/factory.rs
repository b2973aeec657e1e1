use tracing::warn;

use crate::apis::abstract_api::AbstractApiSource;
use crate::apis::base::HolidaySource;
use crate::apis::calendarific::CalendarificSource;
use crate::apis::curated::CuratedSource;
use crate::apis::nager::NagerSource;
use crate::apis::un::UnObservancesSource;
use crate::config::Config;
use crate::constants::{
    ABSTRACT_SOURCE, CALENDARIFIC_SOURCE, CURATED_SOURCE, NAGER_SOURCE, UN_SOURCE,
};

/// Build the enabled sources in adapter order. Keyed sources are built even
/// without a key; the run reports them as disabled.
pub fn create_sources(config: &Config) -> Vec<Box<dyn HolidaySource>> {
    let enabled = &config.pipeline.enabled_sources;
    let mut sources: Vec<Box<dyn HolidaySource>> = Vec::new();

    for id in crate::constants::all_sources() {
        if !enabled.iter().any(|e| e == id) {
            continue;
        }
        let source: Box<dyn HolidaySource> = match *id {
            NAGER_SOURCE => Box::new(NagerSource::new(&config.sources.nager)),
            CALENDARIFIC_SOURCE => Box::new(CalendarificSource::new(&config.sources.calendarific)),
            ABSTRACT_SOURCE => Box::new(AbstractApiSource::new(&config.sources.abstract_api)),
            UN_SOURCE => Box::new(UnObservancesSource),
            CURATED_SOURCE => Box::new(CuratedSource),
            other => {
                warn!("Unknown source id '{}', skipping", other);
                continue;
            }
        };
        sources.push(source);
    }
    sources
}
