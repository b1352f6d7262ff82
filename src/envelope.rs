use std::collections::HashMap;

use crate::headers::{HeaderValue, MessageHeaders};

/// Message container exchanged with handler code.
///
/// `Envelope` bundles a message payload together with its [`MessageHeaders`].
/// It is intentionally generic and transport-agnostic: envelopes built from
/// consumed records and envelopes headed for a producer have the same shape.
///
/// Envelopes are immutable. [`with_header`](Envelope::with_header) and
/// [`with_message`](Envelope::with_message) consume the envelope and return a
/// new one.
///
/// ## Example
///
/// ```rust
/// use kafka_envelope::{Envelope, Payload, headers};
///
/// let envelope = Envelope::builder(Payload::Value("hello"))
///     .header(headers::TOPIC, "orders")
///     .build();
///
/// assert_eq!(envelope.message(), &Payload::Value("hello"));
/// assert_eq!(
///     envelope.headers().get(headers::TOPIC).and_then(|v| v.as_str()),
///     Some("orders")
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<M> {
    headers: MessageHeaders,
    message: Payload<M>,
}

impl<M> Envelope<M> {
    /// Start building an envelope for application-created messages.
    ///
    /// Built envelopes get a generated id and the current time.
    pub fn builder(message: Payload<M>) -> EnvelopeBuilder<M> {
        EnvelopeBuilder {
            message,
            entries: HashMap::new(),
        }
    }

    /// Message metadata.
    pub fn headers(&self) -> &MessageHeaders {
        &self.headers
    }

    /// Message payload.
    pub fn message(&self) -> &Payload<M> {
        &self.message
    }

    pub fn into_parts(self) -> (MessageHeaders, Payload<M>) {
        (self.headers, self.message)
    }

    /// Return a copy of this envelope with one header added or replaced.
    ///
    /// The id and timestamp are kept.
    pub fn with_header(self, key: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        Self {
            headers: self.headers.with_entry(key.into(), value.into()),
            message: self.message,
        }
    }

    /// Return an envelope with the same headers and a different payload.
    pub fn with_message<N>(self, message: Payload<N>) -> Envelope<N> {
        Envelope {
            headers: self.headers,
            message,
        }
    }
}

impl<M> From<(MessageHeaders, Payload<M>)> for Envelope<M> {
    fn from(value: (MessageHeaders, Payload<M>)) -> Self {
        Envelope {
            headers: value.0,
            message: value.1,
        }
    }
}

/// Message payload, or the explicit absence of one.
///
/// A record consumed without a value (a tombstone) becomes
/// [`Payload::Null`] rather than a missing payload, and an outbound
/// [`Payload::Null`] is sent as a record without a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Payload<M> {
    Value(M),
    Null,
}

impl<M> Payload<M> {
    /// `None` maps to [`Payload::Null`].
    pub fn from_option(value: Option<M>) -> Self {
        value.map_or(Payload::Null, Payload::Value)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Null)
    }

    pub fn as_value(&self) -> Option<&M> {
        match self {
            Payload::Value(value) => Some(value),
            Payload::Null => None,
        }
    }

    pub fn into_value(self) -> Option<M> {
        match self {
            Payload::Value(value) => Some(value),
            Payload::Null => None,
        }
    }

    pub fn map<N>(self, f: impl FnOnce(M) -> N) -> Payload<N> {
        match self {
            Payload::Value(value) => Payload::Value(f(value)),
            Payload::Null => Payload::Null,
        }
    }
}

/// Builder returned by [`Envelope::builder`].
#[derive(Debug)]
pub struct EnvelopeBuilder<M> {
    message: Payload<M>,
    entries: HashMap<String, HeaderValue>,
}

impl<M> EnvelopeBuilder<M> {
    pub fn header(mut self, key: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<HeaderValue>,
    {
        self.entries
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn build(self) -> Envelope<M> {
        Envelope {
            headers: MessageHeaders::new(self.entries),
            message: self.message,
        }
    }
}
