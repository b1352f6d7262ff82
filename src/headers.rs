//! Header vocabulary and the header container carried by every [`Envelope`].
//!
//! The `kafka_received*` keys, [`OFFSET`], [`TIMESTAMP_TYPE`] and
//! [`ACKNOWLEDGMENT`] are set on inbound messages. [`TOPIC`],
//! [`PARTITION_ID`], [`MESSAGE_KEY`] and [`TIMESTAMP`] are read when an
//! outbound message is turned into a producer record.
//!
//! | Meaning | Constant | Key |
//! |---|---|---|
//! | received key | [`RECEIVED_MESSAGE_KEY`] | `kafka_receivedMessageKey` |
//! | received topic | [`RECEIVED_TOPIC`] | `kafka_receivedTopic` |
//! | received partition | [`RECEIVED_PARTITION_ID`] | `kafka_receivedPartitionId` |
//! | offset | [`OFFSET`] | `kafka_offset` |
//! | timestamp type | [`TIMESTAMP_TYPE`] | `kafka_timestampType` |
//! | received timestamp | [`RECEIVED_TIMESTAMP`] | `kafka_receivedTimestamp` |
//! | acknowledgment | [`ACKNOWLEDGMENT`] | `kafka_acknowledgment` |
//! | topic | [`TOPIC`] | `kafka_topic` |
//! | partition | [`PARTITION_ID`] | `kafka_partitionId` |
//! | key | [`MESSAGE_KEY`] | `kafka_messageKey` |
//! | timestamp | [`TIMESTAMP`] | `kafka_timestamp` |
//!
//! [`Envelope`]: crate::Envelope

mod value;

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use uuid::Uuid;

use crate::{Acknowledgment, ConversionError, ConverterConfig};

pub use value::{FromHeaderValue, HeaderValue, Opaque};

/// Prefix shared by every Kafka header key.
pub const PREFIX: &str = "kafka_";

/// Key of the consumed record.
pub const RECEIVED_MESSAGE_KEY: &str = "kafka_receivedMessageKey";

/// Topic the record was consumed from.
pub const RECEIVED_TOPIC: &str = "kafka_receivedTopic";

/// Partition the record was consumed from.
pub const RECEIVED_PARTITION_ID: &str = "kafka_receivedPartitionId";

/// Offset of the consumed record.
pub const OFFSET: &str = "kafka_offset";

/// Name of the broker timestamp type, e.g. `CREATE_TIME`.
pub const TIMESTAMP_TYPE: &str = "kafka_timestampType";

/// Broker timestamp of the consumed record.
pub const RECEIVED_TIMESTAMP: &str = "kafka_receivedTimestamp";

/// Acknowledgment handle, only present when one was supplied.
pub const ACKNOWLEDGMENT: &str = "kafka_acknowledgment";

/// Target topic of an outbound record.
pub const TOPIC: &str = "kafka_topic";

/// Target partition of an outbound record.
pub const PARTITION_ID: &str = "kafka_partitionId";

/// Key of an outbound record.
pub const MESSAGE_KEY: &str = "kafka_messageKey";

/// Timestamp of an outbound record.
pub const TIMESTAMP: &str = "kafka_timestamp";

/// Message metadata: an identity, a creation timestamp and a map of headers.
///
/// The identity and timestamp are fields of the container rather than map
/// entries. When they are not generated they hold the
/// [`ID_VALUE_NONE`](Self::ID_VALUE_NONE) and
/// [`TIMESTAMP_NONE`](Self::TIMESTAMP_NONE) sentinels, never an absent value.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageHeaders {
    id: Uuid,
    timestamp: i64,
    entries: HashMap<String, HeaderValue>,
}

impl MessageHeaders {
    /// Identity used when message ids are not generated.
    pub const ID_VALUE_NONE: Uuid = Uuid::nil();

    /// Timestamp used when timestamps are not generated.
    pub const TIMESTAMP_NONE: i64 = -1;

    /// Create headers with a freshly generated id and the current time.
    pub fn new(entries: HashMap<String, HeaderValue>) -> Self {
        Self::from_config(
            entries,
            &ConverterConfig::default()
                .generate_message_id(true)
                .generate_timestamp(true),
        )
    }

    /// Create headers whose id and timestamp follow `config`.
    pub fn from_config(entries: HashMap<String, HeaderValue>, config: &ConverterConfig) -> Self {
        let id = if config.generate_message_id {
            Uuid::new_v4()
        } else {
            Self::ID_VALUE_NONE
        };
        let timestamp = if config.generate_timestamp {
            Utc::now().timestamp_millis()
        } else {
            Self::TIMESTAMP_NONE
        };

        Self {
            id,
            timestamp,
            entries,
        }
    }

    /// Message identity.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Creation time in milliseconds since the epoch, or `-1`.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Raw header value, if present.
    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.entries.get(key)
    }

    /// Read a header as `T`.
    ///
    /// Returns `Ok(None)` when the header is absent or [`HeaderValue::Null`],
    /// and an error when it holds a value of another type.
    pub fn get_as<T: FromHeaderValue>(&self, key: &str) -> Result<Option<T>, ConversionError> {
        match self.entries.get(key) {
            None | Some(HeaderValue::Null) => Ok(None),
            Some(value) => T::from_header_value(value)
                .map(Some)
                .ok_or_else(|| ConversionError::header_type(key, T::EXPECTED, value.type_name())),
        }
    }

    /// Whether a header is present, even with a `Null` value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The acknowledgment handle attached on receipt, if any.
    pub fn acknowledgment(&self) -> Option<&Arc<dyn Acknowledgment>> {
        self.entries
            .get(ACKNOWLEDGMENT)
            .and_then(HeaderValue::as_acknowledgment)
    }

    /// Number of map entries; the id and timestamp are not counted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the map entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn with_entry(mut self, key: String, value: HeaderValue) -> Self {
        self.entries.insert(key, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> HashMap<String, HeaderValue> {
        HashMap::from([
            (TOPIC.to_owned(), HeaderValue::from("orders")),
            (PARTITION_ID.to_owned(), HeaderValue::Int(3)),
            (MESSAGE_KEY.to_owned(), HeaderValue::Null),
        ])
    }

    #[test]
    fn default_config_uses_sentinels() {
        let headers = MessageHeaders::from_config(entries(), &ConverterConfig::default());

        assert_eq!(headers.id(), MessageHeaders::ID_VALUE_NONE);
        assert_eq!(headers.timestamp(), MessageHeaders::TIMESTAMP_NONE);
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn new_generates_id_and_timestamp() {
        let before = Utc::now().timestamp_millis();
        let headers = MessageHeaders::new(HashMap::new());
        let after = Utc::now().timestamp_millis();

        assert_ne!(headers.id(), MessageHeaders::ID_VALUE_NONE);
        assert!((before..=after).contains(&headers.timestamp()));
        assert!(headers.is_empty());
    }

    #[test]
    fn typed_reads() {
        let headers = MessageHeaders::new(entries());

        assert_eq!(
            headers.get_as::<String>(TOPIC).unwrap(),
            Some("orders".to_owned())
        );
        assert_eq!(headers.get_as::<i32>(PARTITION_ID).unwrap(), Some(3));
        assert_eq!(headers.get_as::<HeaderValue>(MESSAGE_KEY).unwrap(), None);
        assert_eq!(headers.get_as::<i64>(TIMESTAMP).unwrap(), None);
        assert!(headers.get_as::<i32>(TOPIC).is_err());
    }

    #[test]
    fn acknowledgment_absent_by_default() {
        let headers = MessageHeaders::new(entries());
        assert!(headers.acknowledgment().is_none());
        assert!(!headers.contains_key(ACKNOWLEDGMENT));
    }
}
