// Pipeline ingestion: fanning out over sources under a shared rate limiter

pub mod rate_limiter;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::apis::base::{FetchContext, FetchOutcome, HolidaySource, SourceError, SourceErrorKind};
use crate::error::IngestError;
use crate::observability::metrics;
use crate::types::{FetchPeriod, RawRecord};

/// What one source contributed to a run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source_id: String,
    pub fetched: usize,
    pub errors: Vec<SourceError>,
    /// Set when the source was not invoked.
    pub disabled: Option<String>,
}

/// Records from every source in adapter order, plus one report per source.
#[derive(Debug, Default)]
pub struct FetchedBatch {
    pub records: Vec<RawRecord>,
    pub reports: Vec<SourceReport>,
}

impl FetchedBatch {
    pub fn all_disabled(&self) -> bool {
        self.reports.iter().all(|r| r.disabled.is_some())
    }
}

/// Run every source for `period`. Sources run concurrently; output keeps adapter
/// order. A source that fails or is disabled never affects its siblings.
pub async fn fetch_all(
    sources: &[Box<dyn HolidaySource>],
    period: FetchPeriod,
    ctx: &FetchContext,
) -> FetchedBatch {
    let outcomes: Vec<(&'static str, FetchOutcome)> = stream::iter(sources)
        .map(|source| fetch_one(source.as_ref(), period, ctx))
        .buffered(sources.len().max(1))
        .collect()
        .await;

    let mut batch = FetchedBatch::default();
    for (source_id, outcome) in outcomes {
        let disabled = match &outcome {
            FetchOutcome::Disabled { reason } => Some(reason.clone()),
            _ => None,
        };
        let (records, errors) = outcome.into_parts();
        metrics::sources::records_fetched(source_id, records.len());
        if !errors.is_empty() {
            metrics::sources::unit_errors(source_id, errors.len());
        }
        info!(
            source = source_id,
            fetched = records.len(),
            errors = errors.len(),
            "Source finished"
        );
        batch.reports.push(SourceReport {
            source_id: source_id.to_string(),
            fetched: records.len(),
            errors,
            disabled,
        });
        batch.records.extend(records);
    }
    batch
}

async fn fetch_one(
    source: &dyn HolidaySource,
    period: FetchPeriod,
    ctx: &FetchContext,
) -> (&'static str, FetchOutcome) {
    let source_id = source.source_id();
    if let Some(what) = source.missing_configuration() {
        let err = IngestError::ConfigurationMissing {
            source_id: source_id.to_string(),
            what,
        };
        warn!(source = source_id, "{}, skipping source", err);
        metrics::sources::disabled(source_id);
        return (
            source_id,
            FetchOutcome::Disabled {
                reason: err.to_string(),
            },
        );
    }
    if ctx.run.should_stop() {
        let err = SourceError::new(
            source_id,
            "*",
            SourceErrorKind::Skipped,
            "run stopped before source started",
        );
        return (source_id, FetchOutcome::from_parts(Vec::new(), vec![err]));
    }
    (source_id, source.fetch(period, ctx).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::base::test_support::{context, FakeHttp};
    use crate::apis::curated::CuratedSource;
    use crate::apis::un::UnObservancesSource;
    use crate::pipeline::run_context::{CancelHandle, RunContext};
    use async_trait::async_trait;

    struct KeylessSource;

    #[async_trait]
    impl HolidaySource for KeylessSource {
        fn source_id(&self) -> &'static str {
            "keyless"
        }

        fn missing_configuration(&self) -> Option<String> {
            Some("API key not configured".to_string())
        }

        async fn fetch(&self, _period: FetchPeriod, _ctx: &FetchContext) -> FetchOutcome {
            panic!("disabled sources must not be fetched");
        }
    }

    #[tokio::test]
    async fn test_records_keep_adapter_order() {
        let (ctx, _) = context(FakeHttp::new());
        let sources: Vec<Box<dyn HolidaySource>> = vec![
            Box::new(UnObservancesSource),
            Box::new(KeylessSource),
            Box::new(CuratedSource),
        ];

        let batch = fetch_all(&sources, FetchPeriod::year(2025), &ctx).await;

        assert_eq!(batch.reports.len(), 3);
        assert_eq!(
            batch.reports[1].disabled.as_deref(),
            Some("Configuration missing for keyless: API key not configured")
        );
        assert!(!batch.all_disabled());
        let first_curated = batch
            .records
            .iter()
            .position(|r| r.source == "curated")
            .unwrap();
        assert!(batch.records[..first_curated].iter().all(|r| r.source == "un"));
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_sources() {
        let (mut ctx, _) = context(FakeHttp::new());
        let handle = CancelHandle::new();
        handle.cancel();
        ctx.run = RunContext::new(handle, None);
        let sources: Vec<Box<dyn HolidaySource>> = vec![Box::new(UnObservancesSource)];

        let batch = fetch_all(&sources, FetchPeriod::year(2025), &ctx).await;
        assert!(batch.records.is_empty());
        assert_eq!(batch.reports[0].errors[0].kind, SourceErrorKind::Skipped);
    }
}
