#![doc = include_str!("../README.md")]

mod acknowledgment;
mod config;
pub mod converter;
pub mod envelope;
pub mod headers;
pub mod record;
pub mod transport;

#[doc(inline)]
pub use acknowledgment::Acknowledgment;

#[doc(inline)]
pub use config::ConverterConfig;

#[doc(inline)]
pub use converter::{
    ConversionError, ConversionErrorKind, MessagingMessageConverter, Passthrough, PayloadMapper,
    RecordMessageConverter,
};

#[doc(inline)]
pub use envelope::{Envelope, EnvelopeBuilder, Payload};

#[doc(inline)]
pub use headers::{HeaderValue, MessageHeaders, Opaque};

#[doc(inline)]
pub use record::{ConsumerRecord, ProducerRecord, TimestampType};

#[doc(inline)]
pub use transport::{Transport, TransportError, TransportErrorKind};
