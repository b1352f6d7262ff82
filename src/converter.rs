//! Conversion between broker records and [`Envelope`]s.
//!
//! [`RecordMessageConverter`] is the contract used by listener and producer
//! pipelines. [`MessagingMessageConverter`] is the stock implementation: it
//! copies record metadata into well-known headers on the way in, reads
//! routing headers on the way out, and leaves payloads to a
//! [`PayloadMapper`].
//!
//! ## Inbound
//!
//! Every converted message carries exactly these headers:
//!
//! - [`RECEIVED_MESSAGE_KEY`] (`Null` for unkeyed records)
//! - [`RECEIVED_TOPIC`], [`RECEIVED_PARTITION_ID`], [`OFFSET`]
//! - [`TIMESTAMP_TYPE`] as its name, e.g. `CREATE_TIME`
//! - [`RECEIVED_TIMESTAMP`]
//!
//! plus [`ACKNOWLEDGMENT`] when a handle is supplied. The message id and
//! timestamp follow [`ConverterConfig`].
//!
//! ## Outbound
//!
//! The target topic is the [`TOPIC`] header, falling back to the default
//! topic given by the caller. [`PARTITION_ID`], [`MESSAGE_KEY`] and
//! [`TIMESTAMP`] are optional.

use std::{collections::HashMap, sync::Arc};

use tracing_error::SpanTrace;

use crate::{
    Acknowledgment, ConverterConfig, Envelope, Payload,
    headers::{
        ACKNOWLEDGMENT, FromHeaderValue, HeaderValue, MESSAGE_KEY, MessageHeaders, OFFSET,
        PARTITION_ID, RECEIVED_MESSAGE_KEY, RECEIVED_PARTITION_ID, RECEIVED_TIMESTAMP,
        RECEIVED_TOPIC, TIMESTAMP, TIMESTAMP_TYPE, TOPIC,
    },
    record::{ConsumerRecord, ProducerRecord},
};

/// Converts records of key type `K` and value type `V` to envelopes and back.
///
/// The stock implementation stores keys as [`HeaderValue`]s, so `K` must be
/// one of the types with a dedicated variant (`String`, `Vec<u8>`, `bool`,
/// `i32`, `i64`). Wrap any other key type in [`Opaque`] to carry it as
/// [`HeaderValue::Other`].
///
/// [`Opaque`]: crate::headers::Opaque
pub trait RecordMessageConverter<K, V> {
    /// Payload type of the produced and accepted envelopes.
    type Payload;

    /// Convert a consumed record into an envelope.
    ///
    /// `acknowledgment` is attached under [`ACKNOWLEDGMENT`] when present.
    /// `target_type` is a hint for payload conversion and may be ignored.
    fn to_message(
        &self,
        record: ConsumerRecord<K, V>,
        acknowledgment: Option<Arc<dyn Acknowledgment>>,
        target_type: Option<&str>,
    ) -> Envelope<Self::Payload>;

    /// Convert an envelope into a record ready to be produced.
    ///
    /// `default_topic` is used when the envelope has no [`TOPIC`] header.
    fn from_message(
        &self,
        message: Envelope<Self::Payload>,
        default_topic: Option<&str>,
    ) -> Result<ProducerRecord<K, V>, ConversionError>;
}

/// Payload hook for both conversion directions.
///
/// Implementations must keep the null convention: an absent record value
/// maps to [`Payload::Null`] and [`Payload::Null`] maps back to an absent
/// value.
pub trait PayloadMapper<V>: Send + Sync {
    type Payload;

    /// Turn a consumed record value into the envelope payload.
    fn extract_and_convert_value(
        &self,
        value: Option<V>,
        target_type: Option<&str>,
    ) -> Payload<Self::Payload>;

    /// Turn an envelope payload into the value of an outbound record.
    fn convert_payload(&self, payload: Payload<Self::Payload>) -> Option<V>;
}

/// Mapper that hands payloads over unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl<V> PayloadMapper<V> for Passthrough {
    type Payload = V;

    fn extract_and_convert_value(&self, value: Option<V>, _target_type: Option<&str>) -> Payload<V> {
        Payload::from_option(value)
    }

    fn convert_payload(&self, payload: Payload<V>) -> Option<V> {
        payload.into_value()
    }
}

/// Stock [`RecordMessageConverter`].
///
/// Holds no mutable state; share it freely between threads.
///
/// ```rust
/// use kafka_envelope::{
///     ConsumerRecord, ConverterConfig, MessagingMessageConverter, Payload,
///     RecordMessageConverter, TimestampType,
/// };
///
/// let converter = MessagingMessageConverter::new(ConverterConfig::default());
/// let record = ConsumerRecord::new("orders", 2, 55)
///     .with_timestamp(1000, TimestampType::CreateTime)
///     .with_key("k1".to_owned())
///     .with_value("hello".to_owned());
///
/// let envelope = converter.to_message(record, None, None);
/// assert_eq!(envelope.message(), &Payload::Value("hello".to_owned()));
/// assert_eq!(envelope.headers().timestamp(), -1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessagingMessageConverter<P = Passthrough> {
    config: ConverterConfig,
    mapper: P,
}

impl MessagingMessageConverter {
    /// Create a converter that passes payloads through unchanged.
    pub fn new(config: ConverterConfig) -> Self {
        Self {
            config,
            mapper: Passthrough,
        }
    }
}

impl<P> MessagingMessageConverter<P> {
    /// Replace the payload mapper while keeping the configuration.
    pub fn with_mapper<P2>(self, mapper: P2) -> MessagingMessageConverter<P2> {
        MessagingMessageConverter {
            config: self.config,
            mapper,
        }
    }

    /// Settings used for inbound messages.
    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }
}

impl<K, V, P> RecordMessageConverter<K, V> for MessagingMessageConverter<P>
where
    K: Into<HeaderValue> + FromHeaderValue,
    P: PayloadMapper<V>,
{
    type Payload = P::Payload;

    fn to_message(
        &self,
        record: ConsumerRecord<K, V>,
        acknowledgment: Option<Arc<dyn Acknowledgment>>,
        target_type: Option<&str>,
    ) -> Envelope<Self::Payload> {
        let ConsumerRecord {
            topic,
            partition,
            offset,
            timestamp,
            timestamp_type,
            key,
            value,
        } = record;

        tracing::trace!(%topic, partition, offset, "Converting consumer record");

        let mut entries = HashMap::with_capacity(7);
        entries.insert(RECEIVED_MESSAGE_KEY.to_owned(), HeaderValue::from(key));
        entries.insert(RECEIVED_TOPIC.to_owned(), HeaderValue::String(topic));
        entries.insert(
            RECEIVED_PARTITION_ID.to_owned(),
            HeaderValue::Int(partition),
        );
        entries.insert(OFFSET.to_owned(), HeaderValue::Long(offset));
        entries.insert(
            TIMESTAMP_TYPE.to_owned(),
            HeaderValue::from(timestamp_type.name()),
        );
        entries.insert(RECEIVED_TIMESTAMP.to_owned(), HeaderValue::Long(timestamp));

        if let Some(ack) = acknowledgment {
            entries.insert(ACKNOWLEDGMENT.to_owned(), HeaderValue::Acknowledgment(ack));
        }

        let headers = MessageHeaders::from_config(entries, &self.config);
        let message = self.mapper.extract_and_convert_value(value, target_type);

        (headers, message).into()
    }

    fn from_message(
        &self,
        message: Envelope<Self::Payload>,
        default_topic: Option<&str>,
    ) -> Result<ProducerRecord<K, V>, ConversionError> {
        let headers = message.headers();

        let topic = headers
            .get_as::<String>(TOPIC)?
            .or_else(|| default_topic.map(str::to_owned))
            .ok_or_else(ConversionError::missing_topic)?;
        let partition = headers.get_as::<i32>(PARTITION_ID)?;
        let key = headers.get_as::<K>(MESSAGE_KEY)?;
        let timestamp = headers.get_as::<i64>(TIMESTAMP)?;

        let (_, payload) = message.into_parts();
        let value = self.mapper.convert_payload(payload);

        tracing::trace!(%topic, ?partition, "Converted message to producer record");

        Ok(ProducerRecord {
            topic,
            partition,
            timestamp,
            key,
            value,
        })
    }
}

/// Error returned when an envelope cannot be turned into a record.
///
/// Captures a tracing span backtrace for diagnostics.
#[derive(Debug)]
pub struct ConversionError {
    context: SpanTrace,
    kind: ConversionErrorKind,
}

/// Conversion error kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionErrorKind {
    /// Neither the envelope nor the caller named a target topic.
    MissingTopic,
    /// A header holds a value of an unexpected type.
    HeaderType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },
}

impl ConversionError {
    pub(crate) fn missing_topic() -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: ConversionErrorKind::MissingTopic,
        }
    }

    pub(crate) fn header_type(key: &str, expected: &'static str, found: &'static str) -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: ConversionErrorKind::HeaderType {
                key: key.to_owned(),
                expected,
                found,
            },
        }
    }

    /// Why the conversion failed.
    pub fn kind(&self) -> &ConversionErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for ConversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ConversionErrorKind::MissingTopic => {
                writeln!(f, "No topic header and no default topic")
            }
            ConversionErrorKind::HeaderType {
                key,
                expected,
                found,
            } => writeln!(f, "Header {key} should be {expected}, found {found}"),
        }?;
        self.context.fmt(f)
    }
}

impl std::error::Error for ConversionError {}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::{headers::Opaque, record::TimestampType};

    #[derive(Debug, Default)]
    struct CountingAck(AtomicUsize);

    impl Acknowledgment for CountingAck {
        fn acknowledge(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn orders_record() -> ConsumerRecord<String, String> {
        ConsumerRecord::new("orders", 2, 55)
            .with_timestamp(1000, TimestampType::CreateTime)
            .with_key("k1".to_owned())
            .with_value("hello".to_owned())
    }

    fn converter() -> MessagingMessageConverter {
        MessagingMessageConverter::new(ConverterConfig::default())
    }

    #[test]
    fn inbound_record_with_default_config() {
        let envelope = converter().to_message(orders_record(), None, None);
        let headers = envelope.headers();

        assert_eq!(envelope.message(), &Payload::Value("hello".to_owned()));
        assert_eq!(headers.len(), 6);
        assert_eq!(headers.get(RECEIVED_MESSAGE_KEY), Some(&HeaderValue::from("k1")));
        assert_eq!(headers.get(RECEIVED_TOPIC), Some(&HeaderValue::from("orders")));
        assert_eq!(headers.get(RECEIVED_PARTITION_ID), Some(&HeaderValue::Int(2)));
        assert_eq!(headers.get(OFFSET), Some(&HeaderValue::Long(55)));
        assert_eq!(headers.get(TIMESTAMP_TYPE), Some(&HeaderValue::from("CREATE_TIME")));
        assert_eq!(headers.get(RECEIVED_TIMESTAMP), Some(&HeaderValue::Long(1000)));
        assert_eq!(headers.id(), MessageHeaders::ID_VALUE_NONE);
        assert_eq!(headers.timestamp(), -1);
    }

    #[test]
    fn inbound_null_value_becomes_null_payload() {
        let record: ConsumerRecord<String, String> = ConsumerRecord::new("orders", 0, 1);
        let envelope = converter().to_message(record, None, None);

        assert!(envelope.message().is_null());
        assert_eq!(envelope.headers().len(), 6);
        assert_eq!(
            envelope.headers().get(RECEIVED_MESSAGE_KEY),
            Some(&HeaderValue::Null)
        );
        assert_eq!(
            envelope.headers().get(TIMESTAMP_TYPE),
            Some(&HeaderValue::from("NO_TIMESTAMP_TYPE"))
        );
    }

    #[test]
    fn acknowledgment_attached_only_when_supplied() {
        let ack = Arc::new(CountingAck::default());
        let handle: Arc<dyn Acknowledgment> = ack.clone();
        let envelope = converter().to_message(orders_record(), Some(handle), None);

        assert_eq!(envelope.headers().len(), 7);
        envelope
            .headers()
            .acknowledgment()
            .expect("acknowledgment header")
            .acknowledge();
        assert_eq!(ack.0.load(Ordering::SeqCst), 1);

        let envelope = converter().to_message(orders_record(), None, None);
        assert!(!envelope.headers().contains_key(ACKNOWLEDGMENT));
    }

    #[test]
    fn generated_ids_are_distinct() {
        let converter =
            MessagingMessageConverter::new(ConverterConfig::default().generate_message_id(true));

        let a = converter.to_message(orders_record(), None, None);
        let b = converter.to_message(orders_record(), None, None);

        assert_ne!(a.headers().id(), MessageHeaders::ID_VALUE_NONE);
        assert_ne!(a.headers().id(), b.headers().id());
        assert_eq!(a.headers().timestamp(), -1);
    }

    #[test]
    fn default_ids_are_shared() {
        let a = converter().to_message(orders_record(), None, None);
        let b = converter().to_message(orders_record(), None, None);

        assert_eq!(a.headers().id(), b.headers().id());
    }

    #[test]
    fn generated_timestamp_tracks_wall_clock() {
        let converter =
            MessagingMessageConverter::new(ConverterConfig::default().generate_timestamp(true));

        let before = Utc::now().timestamp_millis();
        let envelope = converter.to_message(orders_record(), None, None);
        let after = Utc::now().timestamp_millis();

        assert!((before..=after).contains(&envelope.headers().timestamp()));
        assert_eq!(envelope.headers().id(), MessageHeaders::ID_VALUE_NONE);
    }

    #[test]
    fn outbound_uses_routing_headers() {
        let envelope = Envelope::builder(Payload::Value("v".to_owned()))
            .header(TOPIC, "orders")
            .header(PARTITION_ID, 4_i32)
            .header(MESSAGE_KEY, "k1")
            .header(TIMESTAMP, 1234_i64)
            .build();

        let record: ProducerRecord<String, String> =
            converter().from_message(envelope, Some("fallback")).unwrap();

        assert_eq!(
            record,
            ProducerRecord::to("orders")
                .partition(4)
                .timestamp(1234)
                .key("k1".to_owned())
                .value("v".to_owned())
        );
    }

    #[test]
    fn outbound_null_payload_with_fallback() {
        let envelope = Envelope::builder(Payload::<String>::Null)
            .header(TOPIC, "orders")
            .header(MESSAGE_KEY, "k1")
            .build();

        let record: ProducerRecord<String, String> =
            converter().from_message(envelope, Some("fallback")).unwrap();

        assert_eq!(record.topic, "orders");
        assert_eq!(record.partition, None);
        assert_eq!(record.timestamp, None);
        assert_eq!(record.key, Some("k1".to_owned()));
        assert_eq!(record.value, None);
    }

    #[test]
    fn outbound_falls_back_to_default_topic() {
        let envelope = Envelope::builder(Payload::Value("v".to_owned())).build();

        let record: ProducerRecord<String, String> =
            converter().from_message(envelope, Some("fallback")).unwrap();

        assert_eq!(record.topic, "fallback");
        assert_eq!(record.key, None);
    }

    #[test]
    fn outbound_without_any_topic_fails() {
        let envelope = Envelope::builder(Payload::Value("v".to_owned())).build();

        let err = RecordMessageConverter::<String, String>::from_message(
            &converter(),
            envelope,
            None,
        )
        .unwrap_err();

        assert_eq!(err.kind(), &ConversionErrorKind::MissingTopic);
    }

    #[test]
    fn outbound_rejects_mistyped_partition() {
        let envelope = Envelope::builder(Payload::Value("v".to_owned()))
            .header(PARTITION_ID, "three")
            .build();

        let err = RecordMessageConverter::<String, String>::from_message(
            &converter(),
            envelope,
            Some("orders"),
        )
        .unwrap_err();

        assert_eq!(
            err.kind(),
            &ConversionErrorKind::HeaderType {
                key: PARTITION_ID.to_owned(),
                expected: "i32",
                found: "string",
            }
        );
    }

    #[test]
    fn received_headers_are_not_routing_headers() {
        let envelope = converter().to_message(orders_record(), None, None);

        let record: ProducerRecord<String, String> =
            converter().from_message(envelope, Some("replies")).unwrap();

        assert_eq!(record.topic, "replies");
        assert_eq!(record.key, None);
        assert_eq!(record.value, Some("hello".to_owned()));
    }

    /// Upper-cases text payloads and keeps the null convention.
    struct Shouting;

    impl PayloadMapper<Vec<u8>> for Shouting {
        type Payload = String;

        fn extract_and_convert_value(
            &self,
            value: Option<Vec<u8>>,
            _target_type: Option<&str>,
        ) -> Payload<String> {
            Payload::from_option(value)
                .map(|bytes| String::from_utf8_lossy(&bytes).to_uppercase())
        }

        fn convert_payload(&self, payload: Payload<String>) -> Option<Vec<u8>> {
            payload.into_value().map(String::into_bytes)
        }
    }

    #[test]
    fn custom_mapper_converts_both_directions() {
        let converter = converter().with_mapper(Shouting);

        let record: ConsumerRecord<Vec<u8>, Vec<u8>> =
            ConsumerRecord::new("raw", 0, 0).with_value(b"hi".to_vec());
        let envelope = converter.to_message(record, None, Some("text"));
        assert_eq!(envelope.message(), &Payload::Value("HI".to_owned()));

        let empty: ConsumerRecord<Vec<u8>, Vec<u8>> = ConsumerRecord::new("raw", 0, 1);
        assert!(converter.to_message(empty, None, None).message().is_null());

        let outbound = Envelope::builder(Payload::Value("bye".to_owned()))
            .header(MESSAGE_KEY, b"k".to_vec())
            .build();
        let record: ProducerRecord<Vec<u8>, Vec<u8>> =
            converter.from_message(outbound, Some("raw")).unwrap();
        assert_eq!(record.value, Some(b"bye".to_vec()));
        assert_eq!(record.key, Some(b"k".to_vec()));
    }

    #[derive(Debug, Clone, PartialEq)]
    struct OrderKey {
        id: u64,
    }

    #[test]
    fn opaque_keys_travel_both_directions() {
        let record: ConsumerRecord<Opaque<OrderKey>, String> = ConsumerRecord::new("orders", 0, 9)
            .with_key(Opaque(OrderKey { id: 7 }))
            .with_value("v".to_owned());
        let envelope = converter().to_message(record, None, None);
        assert_eq!(
            envelope
                .headers()
                .get(RECEIVED_MESSAGE_KEY)
                .and_then(HeaderValue::downcast_ref::<OrderKey>),
            Some(&OrderKey { id: 7 })
        );

        let outbound = Envelope::builder(Payload::Value("v".to_owned()))
            .header(MESSAGE_KEY, Opaque(OrderKey { id: 8 }))
            .build();
        let record: ProducerRecord<Opaque<OrderKey>, String> =
            converter().from_message(outbound, Some("orders")).unwrap();
        assert_eq!(record.key, Some(Opaque(OrderKey { id: 8 })));

        let mismatched = Envelope::builder(Payload::Value("v".to_owned()))
            .header(MESSAGE_KEY, Opaque(8_u64))
            .build();
        let err = RecordMessageConverter::<Opaque<OrderKey>, String>::from_message(
            &converter(),
            mismatched,
            Some("orders"),
        )
        .unwrap_err();
        assert_eq!(
            err.kind(),
            &ConversionErrorKind::HeaderType {
                key: MESSAGE_KEY.to_owned(),
                expected: "opaque",
                found: "opaque",
            }
        );
    }
}
