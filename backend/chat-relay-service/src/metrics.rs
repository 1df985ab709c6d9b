use actix_web::HttpResponse;
use prometheus::{Encoder, IntCounter, IntGauge, Opts, TextEncoder};
use tracing::warn;

const SERVICE: &str = "chat-relay-service";

#[derive(Clone)]
pub struct ChatMetrics {
    pub messages_persisted: IntCounter,
    pub sender_unknown: IntCounter,
    pub persistence_failures: IntCounter,
    pub publish_failures: IntCounter,
    pub broker_delivered: IntCounter,
    pub broker_dropped: IntCounter,
    pub topics_provisioned: IntCounter,
    pub live_sessions: IntGauge,
}

fn counter(name: &str, help: &str) -> IntCounter {
    IntCounter::with_opts(Opts::new(name, help).const_label("service", SERVICE))
        .expect("valid metric opts")
}

impl ChatMetrics {
    /// Build the metric set and register it with the default registry.
    ///
    /// A second instance in the same process (tests) keeps working; the
    /// duplicate registration is only logged.
    pub fn new() -> Self {
        let registry = prometheus::default_registry();

        let metrics = Self {
            messages_persisted: counter(
                "chat_messages_persisted_total",
                "Private messages durably stored",
            ),
            sender_unknown: counter(
                "chat_sender_unknown_total",
                "Private messages rejected because the sender had no registered name",
            ),
            persistence_failures: counter(
                "chat_persistence_failures_total",
                "Message store writes or queries that failed",
            ),
            publish_failures: counter(
                "chat_publish_failures_total",
                "Stored messages that could not be relayed through Kafka",
            ),
            broker_delivered: counter(
                "chat_broker_delivered_total",
                "Consumed Kafka records delivered to a local session",
            ),
            broker_dropped: counter(
                "chat_broker_dropped_total",
                "Consumed Kafka records whose receiver is not connected to this instance",
            ),
            topics_provisioned: counter(
                "chat_topics_provisioned_total",
                "Kafka topics created by the service",
            ),
            live_sessions: IntGauge::with_opts(
                Opts::new("chat_live_sessions", "Open client connections")
                    .const_label("service", SERVICE),
            )
            .expect("valid metric opts for chat_live_sessions"),
        };

        for metric in [
            Box::new(metrics.messages_persisted.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(metrics.sender_unknown.clone()),
            Box::new(metrics.persistence_failures.clone()),
            Box::new(metrics.publish_failures.clone()),
            Box::new(metrics.broker_delivered.clone()),
            Box::new(metrics.broker_dropped.clone()),
            Box::new(metrics.topics_provisioned.clone()),
            Box::new(metrics.live_sessions.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("Failed to register chat metric: {}", e);
            }
        }

        metrics
    }
}

impl Default for ChatMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the default registry in the Prometheus text format.
pub fn render() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub async fn serve_metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(render())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_rendered_output() {
        let metrics = ChatMetrics::new();
        metrics.messages_persisted.inc();

        let text = render();
        assert!(text.contains("chat_messages_persisted_total"));
    }
}
