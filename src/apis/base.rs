use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::app::ports::HttpClientPort;
use crate::error::IngestError;
use crate::observability::metrics;
use crate::pipeline::ingestion::rate_limiter::RateLimiter;
use crate::pipeline::run_context::RunContext;
use crate::types::{FetchPeriod, RawRecord};

/// Shared resources handed to every source for one run.
#[derive(Clone)]
pub struct FetchContext {
    pub http: Arc<dyn HttpClientPort>,
    pub limiter: RateLimiter,
    pub run: RunContext,
    /// Sub-units (countries, pages) a single source keeps in flight.
    pub unit_concurrency: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    /// Network failure, timeout or non-2xx response.
    Unavailable,
    /// The response arrived but did not have the expected shape.
    Malformed,
    /// Not attempted because the run was cancelled or ran out of time.
    Skipped,
}

/// Failure of one unit of work inside a source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceError {
    pub source_id: String,
    pub unit: String,
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceError {
    pub fn new(
        source_id: &str,
        unit: impl Into<String>,
        kind: SourceErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.to_string(),
            unit: unit.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}: {}", self.source_id, self.unit, self.message)
    }
}

impl From<SourceError> for IngestError {
    fn from(err: SourceError) -> Self {
        IngestError::SourceUnavailable {
            source_id: err.source_id,
            message: format!("{}: {}", err.unit, err.message),
        }
    }
}

/// What one source produced for a period.
#[derive(Debug)]
pub enum FetchOutcome {
    Complete(Vec<RawRecord>),
    Partial {
        records: Vec<RawRecord>,
        errors: Vec<SourceError>,
    },
    /// The source was not invoked, e.g. for a missing API key.
    Disabled { reason: String },
}

impl FetchOutcome {
    pub fn from_parts(records: Vec<RawRecord>, errors: Vec<SourceError>) -> Self {
        if errors.is_empty() {
            FetchOutcome::Complete(records)
        } else {
            FetchOutcome::Partial { records, errors }
        }
    }

    pub fn records(&self) -> &[RawRecord] {
        match self {
            FetchOutcome::Complete(records) | FetchOutcome::Partial { records, .. } => records,
            FetchOutcome::Disabled { .. } => &[],
        }
    }

    pub fn errors(&self) -> &[SourceError] {
        match self {
            FetchOutcome::Partial { errors, .. } => errors,
            _ => &[],
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, FetchOutcome::Disabled { .. })
    }

    pub fn into_parts(self) -> (Vec<RawRecord>, Vec<SourceError>) {
        match self {
            FetchOutcome::Complete(records) => (records, Vec::new()),
            FetchOutcome::Partial { records, errors } => (records, errors),
            FetchOutcome::Disabled { .. } => (Vec::new(), Vec::new()),
        }
    }
}

/// Core trait that all holiday data sources implement.
#[async_trait]
pub trait HolidaySource: Send + Sync {
    /// Unique identifier, also the attribution tag on emitted records
    fn source_id(&self) -> &'static str;

    /// Why the source cannot run, when required configuration is absent
    fn missing_configuration(&self) -> Option<String> {
        None
    }

    /// Fetch all records for `period`. Never fails as a whole; unit failures are
    /// reported inside the outcome next to whatever was collected.
    async fn fetch(&self, period: FetchPeriod, ctx: &FetchContext) -> FetchOutcome;
}

/// One rate-limited GET that must return 2xx JSON.
pub async fn fetch_json(
    ctx: &FetchContext,
    source_id: &str,
    unit: &str,
    url: &str,
    query: &[(&str, String)],
) -> Result<Value, SourceError> {
    if ctx.run.should_stop() {
        return Err(SourceError::new(
            source_id,
            unit,
            SourceErrorKind::Skipped,
            "run stopped before request",
        ));
    }

    let _permit = ctx.limiter.acquire().await;
    let started = Instant::now();
    let resp = match ctx.http.get(url, query).await {
        Ok(resp) => resp,
        Err(e) => {
            metrics::sources::request_error(source_id);
            return Err(SourceError::new(
                source_id,
                unit,
                SourceErrorKind::Unavailable,
                e,
            ));
        }
    };

    if !resp.is_success() {
        metrics::sources::request_error(source_id);
        return Err(SourceError::new(
            source_id,
            unit,
            SourceErrorKind::Unavailable,
            format!("HTTP status {}", resp.status),
        ));
    }
    metrics::sources::request_success(source_id, started.elapsed().as_secs_f64());

    serde_json::from_slice(&resp.bytes).map_err(|e| {
        SourceError::new(
            source_id,
            unit,
            SourceErrorKind::Malformed,
            format!("invalid JSON: {}", e),
        )
    })
}

/// Run `fetch_unit` over `units` with bounded, order-preserving concurrency.
///
/// A failing unit is logged and recorded; the other units still run. Units not
/// yet started when the run stops are reported as skipped.
pub async fn fetch_units<T, F, Fut>(
    ctx: &FetchContext,
    source_id: &str,
    units: Vec<T>,
    fetch_unit: F,
) -> (Vec<RawRecord>, Vec<SourceError>)
where
    T: fmt::Display,
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<Vec<RawRecord>, SourceError>>,
{
    let fetch_unit = &fetch_unit;
    let results: Vec<Result<Vec<RawRecord>, SourceError>> =
        stream::iter(units.into_iter().map(|unit| async move {
            if ctx.run.should_stop() {
                return Err(SourceError::new(
                    source_id,
                    unit.to_string(),
                    SourceErrorKind::Skipped,
                    "run stopped before unit started",
                ));
            }
            fetch_unit(unit).await
        }))
        .buffered(ctx.unit_concurrency.max(1))
        .collect()
        .await;

    let mut records = Vec::new();
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(batch) => records.extend(batch),
            Err(e) => {
                match e.kind {
                    SourceErrorKind::Skipped => {
                        debug!(source = source_id, unit = %e.unit, "{}", e.message)
                    }
                    _ => warn!(
                        source = source_id,
                        unit = %e.unit,
                        error = %e.message,
                        "Source unit failed, continuing"
                    ),
                }
                errors.push(e);
            }
        }
    }
    (records, errors)
}

/// Deserialize each element of a JSON array on its own, dropping the ones that
/// don't fit instead of failing the whole batch.
pub fn parse_items<T: serde::de::DeserializeOwned>(source_id: &str, items: &[Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(source = source_id, error = %e, "Skipping malformed item");
                None
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::app::ports::HttpGetResult;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Canned responses keyed by URL; unknown URLs answer 404.
    #[derive(Default)]
    pub struct FakeHttp {
        responses: HashMap<String, Result<(u16, String), String>>,
        pub requests: Mutex<Vec<String>>,
    }

    impl FakeHttp {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn json(mut self, url: &str, body: Value) -> Self {
            self.responses
                .insert(url.to_string(), Ok((200, body.to_string())));
            self
        }

        pub fn status(mut self, url: &str, status: u16) -> Self {
            self.responses
                .insert(url.to_string(), Ok((status, String::new())));
            self
        }

        pub fn transport_error(mut self, url: &str, message: &str) -> Self {
            self.responses
                .insert(url.to_string(), Err(message.to_string()));
            self
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpClientPort for FakeHttp {
        async fn get(&self, url: &str, _query: &[(&str, String)]) -> Result<HttpGetResult, String> {
            self.requests.lock().unwrap().push(url.to_string());
            match self.responses.get(url) {
                Some(Ok((status, body))) => Ok(HttpGetResult {
                    status: *status,
                    bytes: body.clone().into_bytes(),
                    content_type: "application/json".to_string(),
                }),
                Some(Err(e)) => Err(e.clone()),
                None => Ok(HttpGetResult {
                    status: 404,
                    bytes: Vec::new(),
                    content_type: "text/plain".to_string(),
                }),
            }
        }
    }

    pub fn context(http: FakeHttp) -> (FetchContext, Arc<FakeHttp>) {
        let http = Arc::new(http);
        let ctx = FetchContext {
            http: http.clone(),
            limiter: RateLimiter::unlimited(),
            run: RunContext::unbounded(),
            unit_concurrency: 4,
        };
        (ctx, http)
    }
}
