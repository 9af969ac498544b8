//! W3C trace context propagation through message headers.

use async_nats::header::HeaderMap;
use opentelemetry::Context;
use opentelemetry::propagation::{Extractor, Injector};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::envelope::Metadata;

struct HeaderMapCarrier<'a>(&'a mut HeaderMap);

impl Injector for HeaderMapCarrier<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.0.insert(key, value.as_str());
    }
}

struct MetadataCarrier<'a>(&'a Metadata);

impl Extractor for MetadataCarrier<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

/// Write the current span's context into outbound headers.
pub fn inject_trace_context(headers: &mut HeaderMap) {
    let cx = Span::current().context();
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&cx, &mut HeaderMapCarrier(headers));
    });
}

/// Read the remote parent context from inbound metadata.
pub fn extract_trace_context(metadata: &Metadata) -> Context {
    opentelemetry::global::get_text_map_propagator(|propagator| {
        propagator.extract(&MetadataCarrier(metadata))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_carrier_exposes_keys() {
        let meta = Metadata::from([
            ("traceparent".to_string(), "00-abc-def-01".to_string()),
            ("guild_id".to_string(), "G1".to_string()),
        ]);
        let carrier = MetadataCarrier(&meta);
        assert_eq!(carrier.get("traceparent"), Some("00-abc-def-01"));
        assert_eq!(carrier.keys(), vec!["guild_id", "traceparent"]);
    }

    #[test]
    fn inject_without_propagator_leaves_headers_usable() {
        let mut headers = HeaderMap::new();
        inject_trace_context(&mut headers);
        headers.insert("correlation_id", "c-1");
        assert_eq!(
            headers.get("correlation_id").map(|v| v.as_str()),
            Some("c-1")
        );
    }
}
