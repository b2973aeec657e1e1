use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

use crate::apis::base::{FetchContext, HolidaySource, SourceError};
use crate::apis::factory::create_sources;
use crate::app::ports::HttpClientPort;
use crate::config::Config;
use crate::error::{IngestError, Result};
use crate::infra::http_client::ReqwestHttp;
use crate::observability::metrics;
use crate::pipeline::ingestion::fetch_all;
use crate::pipeline::ingestion::rate_limiter::{Limits, RateLimiter};
use crate::pipeline::processing::dedup::Deduplicator;
use crate::pipeline::processing::enrich::Enricher;
use crate::pipeline::processing::normalize::Normalizer;
use crate::pipeline::processing::reconcile::Reconciler;
use crate::pipeline::run_context::{CancelHandle, RunContext};
use crate::pipeline::storage::HolidayStore;
use crate::types::FetchPeriod;

/// Result of one `run_ingestion` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionSummary {
    pub year: i32,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub fetched: usize,
    pub rejected: usize,
    pub canonical: usize,
    pub source_errors: Vec<SourceError>,
    pub disabled_sources: Vec<String>,
    /// The run budget ran out while fetching; persisted data is partial.
    pub budget_exhausted: bool,
}

/// Totals across a multi-year refresh.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshSummary {
    pub created: usize,
    pub updated: usize,
    pub years: Vec<IngestionSummary>,
}

/// Fetch → normalize → deduplicate → enrich → reconcile, for one period at a time.
pub struct IngestionPipeline {
    sources: Vec<Box<dyn HolidaySource>>,
    http: Arc<dyn HttpClientPort>,
    limiter: RateLimiter,
    store: Arc<dyn HolidayStore>,
    deduplicator: Deduplicator,
    unit_concurrency: usize,
    run_budget: Option<Duration>,
    cancel: CancelHandle,
}

impl IngestionPipeline {
    pub fn new(
        config: &Config,
        sources: Vec<Box<dyn HolidaySource>>,
        http: Arc<dyn HttpClientPort>,
        store: Arc<dyn HolidayStore>,
    ) -> Self {
        let limiter = RateLimiter::new(Limits {
            requests_per_min: config.http.requests_per_min,
            concurrency: Some(config.http.max_concurrency),
        });
        let run_budget = match config.pipeline.run_budget_seconds {
            0 => None,
            _ => Some(config.pipeline.run_budget()),
        };
        Self {
            sources,
            http,
            limiter,
            store,
            deduplicator: Deduplicator::new(&config.dedup),
            unit_concurrency: config.http.max_concurrency.max(1) as usize,
            run_budget,
            cancel: CancelHandle::new(),
        }
    }

    /// Sources from the factory over a real HTTP client.
    pub fn from_config(config: &Config, store: Arc<dyn HolidayStore>) -> Result<Self> {
        let http = Arc::new(ReqwestHttp::new(&config.http)?);
        Ok(Self::new(config, create_sources(config), http, store))
    }

    /// Cancels the current and every later run of this pipeline.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn sources(&self) -> &[Box<dyn HolidaySource>] {
        &self.sources
    }

    #[instrument(skip(self), fields(year = period.year))]
    pub async fn run_ingestion(&self, period: FetchPeriod) -> Result<IngestionSummary> {
        if self.sources.is_empty() {
            return Err(IngestError::NoSourcesAvailable(
                "no sources are enabled".to_string(),
            ));
        }
        let started = Instant::now();
        let run = RunContext::new(self.cancel.clone(), self.run_budget);
        if run.is_cancelled() {
            return Err(IngestError::Cancelled);
        }

        info!("🚀 Starting holiday ingestion for {}", period);
        let ctx = FetchContext {
            http: self.http.clone(),
            limiter: self.limiter.clone(),
            run: run.clone(),
            unit_concurrency: self.unit_concurrency,
        };
        let fetched = fetch_all(&self.sources, period, &ctx).await;

        if fetched.all_disabled() {
            let reasons: Vec<String> = fetched
                .reports
                .iter()
                .map(|r| {
                    format!("{}: {}", r.source_id, r.disabled.as_deref().unwrap_or_default())
                })
                .collect();
            return Err(IngestError::NoSourcesAvailable(reasons.join("; ")));
        }
        if run.is_cancelled() {
            warn!("Run cancelled after fetching, nothing persisted");
            return Err(IngestError::Cancelled);
        }
        let budget_exhausted = run.is_expired();
        if budget_exhausted {
            warn!("Run budget exhausted while fetching, continuing with partial data");
        }

        let mut summary = IngestionSummary {
            year: period.year,
            fetched: fetched.records.len(),
            budget_exhausted,
            ..Default::default()
        };
        for report in fetched.reports {
            if report.disabled.is_some() {
                summary.disabled_sources.push(report.source_id);
            }
            summary.source_errors.extend(report.errors);
        }
        info!("✅ Fetched {} holidays for {}", summary.fetched, period);

        let normalized = Normalizer::new().normalize_all(fetched.records);
        summary.rejected = normalized.rejected.len();

        let mut canonical = self.deduplicator.deduplicate(normalized.records);
        Enricher::new().enrich_all(&mut canonical);
        summary.canonical = canonical.len();

        let reconciled = Reconciler::new(self.store.clone())
            .reconcile_all(&canonical)
            .await;
        summary.created = reconciled.created;
        summary.updated = reconciled.updated;
        summary.unchanged = reconciled.unchanged;
        summary.failed = reconciled.failed;

        let elapsed = started.elapsed().as_secs_f64();
        metrics::run::finished(elapsed);
        info!(
            "🎉 Year {}: {} created, {} updated ({} canonical from {} fetched, {} rejected) \
             in {:.1}s",
            period.year,
            summary.created,
            summary.updated,
            summary.canonical,
            summary.fetched,
            summary.rejected,
            elapsed
        );
        Ok(summary)
    }

    /// Ingest each year in order, summing created/updated.
    pub async fn refresh_years(&self, years: &[i32]) -> Result<RefreshSummary> {
        let mut total = RefreshSummary::default();
        for &year in years {
            let summary = self.run_ingestion(FetchPeriod::year(year)).await?;
            total.created += summary.created;
            total.updated += summary.updated;
            total.years.push(summary);
        }
        info!(
            "Holiday refresh complete: {} created, {} updated",
            total.created, total.updated
        );
        Ok(total)
    }
}

/// The current year followed by `years_ahead` more.
pub fn default_years(current_year: i32, years_ahead: u32) -> Vec<i32> {
    (0..=years_ahead as i32).map(|offset| current_year + offset).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::base::test_support::FakeHttp;
    use crate::apis::curated::CuratedSource;
    use crate::apis::un::UnObservancesSource;
    use crate::config::KeyedSourceConfig;
    use crate::apis::calendarific::CalendarificSource;
    use crate::pipeline::storage::InMemoryStore;

    fn pipeline(
        sources: Vec<Box<dyn HolidaySource>>,
        store: Arc<InMemoryStore>,
    ) -> IngestionPipeline {
        IngestionPipeline::new(&Config::default(), sources, Arc::new(FakeHttp::new()), store)
    }

    #[test]
    fn test_default_years() {
        assert_eq!(default_years(2025, 2), vec![2025, 2026, 2027]);
        assert_eq!(default_years(2025, 0), vec![2025]);
    }

    #[tokio::test]
    async fn test_no_sources_is_a_hard_failure() {
        let err = pipeline(Vec::new(), Arc::new(InMemoryStore::new()))
            .run_ingestion(FetchPeriod::year(2025))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::NoSourcesAvailable(_)));
    }

    #[tokio::test]
    async fn test_all_sources_disabled_is_a_hard_failure() {
        let sources: Vec<Box<dyn HolidaySource>> = vec![Box::new(CalendarificSource::new(
            &KeyedSourceConfig::default(),
        ))];
        let err = pipeline(sources, Arc::new(InMemoryStore::new()))
            .run_ingestion(FetchPeriod::year(2025))
            .await
            .unwrap_err();
        match err {
            IngestError::NoSourcesAvailable(reason) => assert!(reason.contains("calendarific")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled_pipeline_persists_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline(vec![Box::new(UnObservancesSource)], store.clone());
        pipeline.cancel_handle().cancel();

        let err = pipeline.run_ingestion(FetchPeriod::year(2025)).await.unwrap_err();
        assert!(matches!(err, IngestError::Cancelled));
        assert_eq!(store.holiday_count(), 0);
    }

    #[tokio::test]
    async fn test_refresh_years_sums_runs() {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = pipeline(
            vec![Box::new(UnObservancesSource), Box::new(CuratedSource)],
            store.clone(),
        );

        let total = pipeline.refresh_years(&[2025, 2026]).await.unwrap();
        assert_eq!(total.years.len(), 2);
        assert_eq!(total.created, 32);
        assert_eq!(total.updated, 0);
        assert_eq!(store.holiday_count(), 32);
    }
}
