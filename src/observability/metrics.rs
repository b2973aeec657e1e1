//! Metrics for the holiday ingestion pipeline
//!
//! Thin wrappers over the `metrics` facade so call sites never spell out
//! metric names. Nothing is exported unless a recorder is installed.

use std::fmt;
use std::net::SocketAddr;

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Sources
    SourcesRequestsSuccess,
    SourcesRequestsError,
    SourcesRequestDuration,
    SourcesRecordsFetched,
    SourcesUnitErrors,
    SourcesDisabled,

    // Normalize
    NormalizeRecordsAccepted,
    NormalizeRecordsRejected,

    // Dedup
    DedupGroupsMerged,
    DedupCanonicalRecords,

    // Reconcile
    ReconcileCreated,
    ReconcileUpdated,
    ReconcileUnchanged,
    ReconcileFailed,

    // Run
    RunsTotal,
    RunDuration,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::SourcesRequestsSuccess => "holiday_sources_requests_success_total",
            MetricName::SourcesRequestsError => "holiday_sources_requests_error_total",
            MetricName::SourcesRequestDuration => "holiday_sources_request_duration_seconds",
            MetricName::SourcesRecordsFetched => "holiday_sources_records_fetched_total",
            MetricName::SourcesUnitErrors => "holiday_sources_unit_errors_total",
            MetricName::SourcesDisabled => "holiday_sources_disabled_total",
            MetricName::NormalizeRecordsAccepted => "holiday_normalize_records_accepted_total",
            MetricName::NormalizeRecordsRejected => "holiday_normalize_records_rejected_total",
            MetricName::DedupGroupsMerged => "holiday_dedup_groups_merged_total",
            MetricName::DedupCanonicalRecords => "holiday_dedup_canonical_records_total",
            MetricName::ReconcileCreated => "holiday_reconcile_created_total",
            MetricName::ReconcileUpdated => "holiday_reconcile_updated_total",
            MetricName::ReconcileUnchanged => "holiday_reconcile_unchanged_total",
            MetricName::ReconcileFailed => "holiday_reconcile_failed_total",
            MetricName::RunsTotal => "holiday_runs_total",
            MetricName::RunDuration => "holiday_run_duration_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serve a Prometheus scrape endpoint on `addr`. Must be called inside a tokio runtime.
pub fn install_prometheus(addr: SocketAddr) -> anyhow::Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("Prometheus metrics listening on {}", addr);
    Ok(())
}

pub mod sources {
    use super::MetricName;

    pub fn request_success(source_id: &str, duration_secs: f64) {
        ::metrics::counter!(
            MetricName::SourcesRequestsSuccess.as_str(),
            "source" => source_id.to_string()
        )
        .increment(1);
        ::metrics::histogram!(
            MetricName::SourcesRequestDuration.as_str(),
            "source" => source_id.to_string()
        )
        .record(duration_secs);
    }

    pub fn request_error(source_id: &str) {
        ::metrics::counter!(
            MetricName::SourcesRequestsError.as_str(),
            "source" => source_id.to_string()
        )
        .increment(1);
    }

    pub fn records_fetched(source_id: &str, count: usize) {
        ::metrics::counter!(
            MetricName::SourcesRecordsFetched.as_str(),
            "source" => source_id.to_string()
        )
        .increment(count as u64);
    }

    pub fn unit_errors(source_id: &str, count: usize) {
        ::metrics::counter!(
            MetricName::SourcesUnitErrors.as_str(),
            "source" => source_id.to_string()
        )
        .increment(count as u64);
    }

    pub fn disabled(source_id: &str) {
        ::metrics::counter!(
            MetricName::SourcesDisabled.as_str(),
            "source" => source_id.to_string()
        )
        .increment(1);
    }
}

pub mod normalize {
    use super::MetricName;

    pub fn accepted(count: usize) {
        ::metrics::counter!(MetricName::NormalizeRecordsAccepted.as_str()).increment(count as u64);
    }

    pub fn rejected(source_id: &str) {
        ::metrics::counter!(
            MetricName::NormalizeRecordsRejected.as_str(),
            "source" => source_id.to_string()
        )
        .increment(1);
    }
}

pub mod dedup {
    use super::MetricName;

    pub fn group_merged() {
        ::metrics::counter!(MetricName::DedupGroupsMerged.as_str()).increment(1);
    }

    pub fn canonical_records(count: usize) {
        ::metrics::counter!(MetricName::DedupCanonicalRecords.as_str()).increment(count as u64);
    }
}

pub mod reconcile {
    use super::MetricName;

    pub fn created() {
        ::metrics::counter!(MetricName::ReconcileCreated.as_str()).increment(1);
    }

    pub fn updated() {
        ::metrics::counter!(MetricName::ReconcileUpdated.as_str()).increment(1);
    }

    pub fn unchanged() {
        ::metrics::counter!(MetricName::ReconcileUnchanged.as_str()).increment(1);
    }

    pub fn failed() {
        ::metrics::counter!(MetricName::ReconcileFailed.as_str()).increment(1);
    }
}

pub mod run {
    use super::MetricName;

    pub fn finished(duration_secs: f64) {
        ::metrics::counter!(MetricName::RunsTotal.as_str()).increment(1);
        ::metrics::histogram!(MetricName::RunDuration.as_str()).record(duration_secs);
    }
}
