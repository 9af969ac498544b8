use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram, Meter};

#[derive(Clone)]
pub struct Metrics {
    messages: Counter<u64>,
    handler_duration: Histogram<f64>,
    panics: Counter<u64>,
    poison_messages: Counter<u64>,
    store_saturation: Counter<u64>,
    store_expired: Counter<u64>,
    config_requests: Counter<u64>,
}

impl Metrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            messages: meter
                .u64_counter("leaderboard.dispatcher.messages")
                .with_description("Bus messages settled by the dispatcher, by topic and outcome")
                .build(),
            handler_duration: meter
                .f64_histogram("leaderboard.dispatcher.handler.duration")
                .with_description("Duration of handler invocations in seconds")
                .with_unit("s")
                .build(),
            panics: meter
                .u64_counter("leaderboard.dispatcher.panics")
                .with_description("Handler panics recovered by the dispatcher")
                .build(),
            poison_messages: meter
                .u64_counter("leaderboard.dispatcher.poison_messages")
                .with_description("Messages acked without processing because their payload did not decode")
                .build(),
            store_saturation: meter
                .u64_counter("leaderboard.interaction_store.saturation")
                .with_description("Interaction entries evicted because the store was full")
                .build(),
            store_expired: meter
                .u64_counter("leaderboard.interaction_store.expired")
                .with_description("Interaction entries removed by the TTL sweeper")
                .build(),
            config_requests: meter
                .u64_counter("leaderboard.guild_config.requests")
                .with_description("Guild config resolutions by outcome")
                .build(),
        }
    }

    pub fn record_message(&self, topic: &str, outcome: &'static str, duration: f64) {
        let attrs = &[
            KeyValue::new("topic", topic.to_owned()),
            KeyValue::new("outcome", outcome),
        ];
        self.messages.add(1, attrs);
        self.handler_duration.record(duration, attrs);
    }

    pub fn record_panic(&self, handler: &'static str) {
        self.panics.add(1, &[KeyValue::new("handler", handler)]);
    }

    pub fn record_poison(&self, topic: &str) {
        self.poison_messages
            .add(1, &[KeyValue::new("topic", topic.to_owned())]);
    }

    pub fn record_store_saturation(&self) {
        self.store_saturation.add(1, &[]);
    }

    pub fn record_store_expired(&self, purpose: &str) {
        self.store_expired
            .add(1, &[KeyValue::new("purpose", purpose.to_owned())]);
    }

    pub fn record_config_request(&self, outcome: &'static str) {
        self.config_requests
            .add(1, &[KeyValue::new("outcome", outcome)]);
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MetricsHarness;

    #[tokio::test]
    async fn message_outcomes_are_counted_per_topic() {
        let harness = MetricsHarness::new();

        harness.metrics.record_message("a", "ack", 0.1);
        harness.metrics.record_message("a", "nack", 0.2);
        harness.metrics.record_message("b", "ack", 0.3);

        assert_eq!(harness.counter("leaderboard.dispatcher.messages", None), 3);
        assert_eq!(
            harness.counter("leaderboard.dispatcher.messages", Some(("topic", "a"))),
            2
        );
        assert_eq!(
            harness.counter("leaderboard.dispatcher.messages", Some(("outcome", "nack"))),
            1
        );
    }

    #[tokio::test]
    async fn panic_and_poison_counters_are_separate() {
        let harness = MetricsHarness::new();

        harness.metrics.record_panic("handle_tag_assigned");
        harness.metrics.record_poison("leaderboard.tag.assigned");
        harness.metrics.record_poison("leaderboard.tag.assigned");

        assert_eq!(harness.counter("leaderboard.dispatcher.panics", None), 1);
        assert_eq!(
            harness.counter("leaderboard.dispatcher.poison_messages", None),
            2
        );
    }

    #[tokio::test]
    async fn store_and_config_counters() {
        let harness = MetricsHarness::new();

        harness.metrics.record_store_saturation();
        harness.metrics.record_store_expired("claim_tag");
        harness.metrics.record_config_request("timeout");

        assert_eq!(
            harness.counter("leaderboard.interaction_store.saturation", None),
            1
        );
        assert_eq!(
            harness.counter("leaderboard.interaction_store.expired", Some(("purpose", "claim_tag"))),
            1
        );
        assert_eq!(
            harness.counter("leaderboard.guild_config.requests", Some(("outcome", "timeout"))),
            1
        );
    }
}
