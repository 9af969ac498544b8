//! Structured logging plus optional OTLP traces and metrics.
//!
//! Logs are always JSON on stderr. Spans and metrics are exported only when
//! `OTEL_EXPORTER_OTLP_ENDPOINT` is set; a failed exporter build downgrades
//! to logging only.

pub mod metrics;
mod otlp;

use opentelemetry::KeyValue;
use opentelemetry::metrics::Meter;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use metrics::Metrics;

pub const OTEL_SERVICE_NAME: &str = "leaderboard-bot";

const DEFAULT_FILTER: &str = "leaderboard_bot=debug,leaderboard_nats=debug,info";

enum OtlpStatus {
    Disabled,
    Enabled,
    Failed(String),
}

pub fn init_logger(environment: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .json();

    // Trace context crosses the bus in message headers either way.
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    let (otel_layer, status) = if otlp::endpoint_configured() {
        match otlp::build(&resource(environment)) {
            Ok(providers) => {
                opentelemetry::global::set_tracer_provider(providers.tracer.clone());
                opentelemetry::global::set_meter_provider(providers.meter.clone());
                let tracer = providers.tracer.tracer(OTEL_SERVICE_NAME);
                otlp::install(providers);
                (
                    Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                    OtlpStatus::Enabled,
                )
            }
            Err(e) => (None, OtlpStatus::Failed(e.to_string())),
        }
    } else {
        (None, OtlpStatus::Disabled)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(otel_layer)
        .init();

    match status {
        OtlpStatus::Enabled => tracing::info!(environment, "Logger initialized with OTLP export"),
        OtlpStatus::Disabled => tracing::info!(
            environment,
            "Logger initialized; {} not set, OTLP export off",
            otlp::ENDPOINT_ENV
        ),
        OtlpStatus::Failed(error) => tracing::warn!(
            environment,
            %error,
            "Logger initialized without OTLP export (exporter setup failed)"
        ),
    }
}

fn resource(environment: &str) -> Resource {
    Resource::builder()
        .with_service_name(OTEL_SERVICE_NAME)
        .with_attributes(vec![KeyValue::new("deployment.environment", environment.to_owned())])
        .build()
}

/// Meter backed by the global provider; a no-op unless OTLP export is on.
pub fn meter() -> Meter {
    opentelemetry::global::meter(OTEL_SERVICE_NAME)
}

pub fn shutdown_otel() {
    tracing::info!("Flushing telemetry");
    otlp::shutdown();
}
