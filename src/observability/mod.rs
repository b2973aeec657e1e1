// Observability: Prometheus metrics per pipeline stage

pub mod metrics;
