use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
    message::{Message, Timestamp},
    producer::{FutureProducer, FutureRecord},
};

use crate::{
    record::{ConsumerRecord, ProducerRecord, TimestampType},
    transport::Sender,
};

/// Kafka producer backend.
///
/// Publishes byte records through a `FutureProducer`. Pair it with a
/// converter whose payload mapper produces `Vec<u8>` values, or with the
/// default passthrough converter for `Envelope<Vec<u8>>`.
#[derive(Clone)]
pub struct Kafka {
    /// Kafka producer handle
    producer: FutureProducer,
    /// Timeout for sending messages
    timeout: Duration,
}

impl Kafka {
    /// Create a new Kafka sender using the given `FutureProducer`.
    ///
    /// Default timeout is 5 seconds.
    pub fn new(producer: FutureProducer) -> Self {
        Self {
            producer,
            timeout: Duration::from_secs(5),
        }
    }

    /// Set a custom timeout for sending messages.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Sender for Kafka {
    type Key = Vec<u8>;
    type Value = Vec<u8>;
    type Error = rdkafka::error::KafkaError;

    /// Send a record to Kafka.
    ///
    /// Partition, timestamp and key are only set when the record carries
    /// them; a record without a value is sent as a tombstone.
    #[tracing::instrument(skip_all, fields(topic = %record.topic))]
    async fn send(&mut self, record: ProducerRecord<Vec<u8>, Vec<u8>>) -> Result<(), Self::Error> {
        let mut future_record: FutureRecord<'_, Vec<u8>, Vec<u8>> = FutureRecord::to(&record.topic);
        if let Some(partition) = record.partition {
            future_record = future_record.partition(partition);
        }
        if let Some(timestamp) = record.timestamp {
            future_record = future_record.timestamp(timestamp);
        }
        if let Some(key) = &record.key {
            future_record = future_record.key(key);
        }
        if let Some(value) = &record.value {
            future_record = future_record.payload(value);
        }

        self.producer
            .send(future_record, self.timeout)
            .await
            .map_err(|(e, _)| e)?;
        tracing::debug!("Record delivered");

        Ok(())
    }
}

impl ConsumerRecord<Vec<u8>, Vec<u8>> {
    /// Copy a message received by an `rdkafka` consumer.
    ///
    /// A message without a broker timestamp gets `-1` and
    /// [`TimestampType::NoTimestampType`].
    pub fn from_kafka_message<M: Message>(message: &M) -> Self {
        let (timestamp, timestamp_type) = timestamp_parts(message.timestamp());

        Self {
            topic: message.topic().to_owned(),
            partition: message.partition(),
            offset: message.offset(),
            timestamp,
            timestamp_type,
            key: message.key().map(<[u8]>::to_vec),
            value: message.payload().map(<[u8]>::to_vec),
        }
    }
}

fn timestamp_parts(timestamp: Timestamp) -> (i64, TimestampType) {
    match timestamp {
        Timestamp::NotAvailable => (-1, TimestampType::NoTimestampType),
        Timestamp::CreateTime(t) => (t, TimestampType::CreateTime),
        Timestamp::LogAppendTime(t) => (t, TimestampType::LogAppendTime),
    }
}
