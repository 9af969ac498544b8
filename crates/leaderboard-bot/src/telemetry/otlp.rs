//! OTLP/HTTP exporters for spans and metrics, installed at most once per
//! process.

use std::error::Error;
use std::sync::OnceLock;
use std::time::Duration;

use opentelemetry_otlp::{MetricExporter, SpanExporter};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::SdkTracerProvider;

/// Standard OTLP variable; export stays off unless it is set.
pub(super) const ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

pub(super) struct Providers {
    pub tracer: SdkTracerProvider,
    pub meter: SdkMeterProvider,
}

static INSTALLED: OnceLock<Providers> = OnceLock::new();

pub(super) fn endpoint_configured() -> bool {
    std::env::var_os(ENDPOINT_ENV).is_some_and(|v| !v.is_empty())
}

pub(super) fn build(resource: &Resource) -> Result<Providers, Box<dyn Error>> {
    let spans = SpanExporter::builder().with_http().build()?;
    let tracer = SdkTracerProvider::builder()
        .with_batch_exporter(spans)
        .with_resource(resource.clone())
        .build();

    let metrics = MetricExporter::builder().with_http().build()?;
    let reader = PeriodicReader::builder(metrics)
        .with_interval(METRIC_EXPORT_INTERVAL)
        .build();
    let meter = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource.clone())
        .build();

    Ok(Providers { tracer, meter })
}

/// Keep the providers alive for [`shutdown`]. False if already installed.
pub(super) fn install(providers: Providers) -> bool {
    INSTALLED.set(providers).is_ok()
}

/// Flush pending spans and metrics, then stop the exporters.
pub(super) fn shutdown() {
    let Some(providers) = INSTALLED.get() else {
        return;
    };
    if let Err(e) = providers.tracer.force_flush() {
        tracing::warn!(error = %e, "Failed to flush spans");
    }
    if let Err(e) = providers.meter.force_flush() {
        tracing::warn!(error = %e, "Failed to flush metrics");
    }
    if let Err(e) = providers.tracer.shutdown() {
        tracing::warn!(error = %e, "Failed to shut down tracer provider");
    }
    if let Err(e) = providers.meter.shutdown() {
        tracing::warn!(error = %e, "Failed to shut down meter provider");
    }
}
