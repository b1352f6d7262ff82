//! Broker-side record types.
//!
//! [`ConsumerRecord`] is what a consumer hands to the converter and
//! [`ProducerRecord`] is what the converter hands back to a producer. Both
//! are plain data: keys and values are whatever the client deserialized.

use serde::{Deserialize, Serialize};

/// How the broker assigned a record's timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimestampType {
    #[default]
    NoTimestampType,
    CreateTime,
    LogAppendTime,
}

impl TimestampType {
    /// Canonical name, as written to the `kafka_timestampType` header.
    pub fn name(&self) -> &'static str {
        match self {
            TimestampType::NoTimestampType => "NO_TIMESTAMP_TYPE",
            TimestampType::CreateTime => "CREATE_TIME",
            TimestampType::LogAppendTime => "LOG_APPEND_TIME",
        }
    }
}

impl std::fmt::Display for TimestampType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Record received from a topic partition.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerRecord<K, V> {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Milliseconds since the epoch, `-1` when the broker supplied none.
    pub timestamp: i64,
    pub timestamp_type: TimestampType,
    pub key: Option<K>,
    pub value: Option<V>,
}

impl<K, V> ConsumerRecord<K, V> {
    /// Create an unkeyed, empty record without a timestamp.
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            timestamp: -1,
            timestamp_type: TimestampType::NoTimestampType,
            key: None,
            value: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64, timestamp_type: TimestampType) -> Self {
        self.timestamp = timestamp;
        self.timestamp_type = timestamp_type;
        self
    }

    pub fn with_key(mut self, key: K) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_value(mut self, value: V) -> Self {
        self.value = Some(value);
        self
    }
}

/// Record to be sent to a topic.
///
/// `partition` and `timestamp` left as `None` are assigned by the producer
/// and the broker respectively.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerRecord<K, V> {
    pub topic: String,
    pub partition: Option<i32>,
    pub timestamp: Option<i64>,
    pub key: Option<K>,
    pub value: Option<V>,
}

impl<K, V> ProducerRecord<K, V> {
    /// Create an unkeyed record with no value.
    pub fn to(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            partition: None,
            timestamp: None,
            key: None,
            value: None,
        }
    }

    pub fn partition(mut self, partition: i32) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn key(mut self, key: K) -> Self {
        self.key = Some(key);
        self
    }

    pub fn value(mut self, value: V) -> Self {
        self.value = Some(value);
        self
    }
}
