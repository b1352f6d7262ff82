use std::sync::Arc;

use kafka_envelope::{
    Acknowledgment, ConsumerRecord, ConverterConfig, MessagingMessageConverter, Payload,
    RecordMessageConverter, TimestampType, Transport, headers, transport,
};
use tracing_error::ErrorLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

#[derive(Debug)]
struct LogAck {
    offset: i64,
}

impl Acknowledgment for LogAck {
    fn acknowledge(&self) {
        tracing::info!(offset = self.offset, "Acknowledged");
    }
}

#[tokio::main]
async fn main() {
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(EnvFilter::from_default_env())
        .with(ErrorLayer::default())
        .init();

    let config = ConverterConfig::default()
        .generate_message_id(true)
        .generate_timestamp(true);
    let converter = MessagingMessageConverter::new(config);

    let producer: transport::InMemory<String, String> = transport::InMemory::default();
    let mut transport = Transport::new(producer.clone(), converter.clone())
        .with_default_topic("orders.replies");

    for offset in 0..3 {
        let record = ConsumerRecord::new("orders", 0, offset)
            .with_timestamp(1_700_000_000_000 + offset, TimestampType::CreateTime)
            .with_key(format!("order-{offset}"))
            .with_value(format!("order #{offset} placed"));
        let ack: Arc<dyn Acknowledgment> = Arc::new(LogAck { offset });

        let envelope = converter.to_message(record, Some(ack), None);
        tracing::info!(
            id = %envelope.headers().id(),
            payload = ?envelope.message(),
            "Received"
        );

        let key = envelope
            .headers()
            .get(headers::RECEIVED_MESSAGE_KEY)
            .cloned()
            .unwrap_or(headers::HeaderValue::Null);
        if let Some(ack) = envelope.headers().acknowledgment() {
            ack.acknowledge();
        }

        let reply = envelope
            .with_header(headers::MESSAGE_KEY, key)
            .with_message(Payload::Value(format!("reply to order #{offset}")));
        transport.send(reply).await.expect("reply should be sent");
    }

    for record in producer.sent_records().await {
        tracing::info!(topic = %record.topic, key = ?record.key, value = ?record.value, "Produced");
    }
}
