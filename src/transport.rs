//! Outbound transport for [`Envelope`]s.
//!
//! This module defines a Tower-compatible transport that converts envelopes
//! into [`ProducerRecord`]s with a [`RecordMessageConverter`] and hands them
//! to a producer backend (in-memory, Kafka).
//!
//! ## Key components
//!
//! - [`Transport`]: Public-facing wrapper implementing `tower::Service`
//! - [`SenderService`]: Converts envelopes and delegates to a [`Sender`]
//! - [`Sender`]: Trait implemented by concrete producer backends
//! - [`TransportError`]: Unified error type with tracing context

mod inmemory;

#[cfg(feature = "kafka")]
pub mod kafka;

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tower::Service;
use tracing_error::SpanTrace;

use crate::{ConversionError, Envelope, RecordMessageConverter, record::ProducerRecord};

pub use inmemory::InMemory;

/// Generic Tower-compatible transport wrapper.
///
/// `Transport` is the main entry point for sending envelopes. It wraps an
/// underlying Tower `Service` and:
///
/// - Normalizes errors into [`TransportError`]
/// - Supports Tower middleware via layers
/// - Provides a convenience [`send`](Transport::send) API
///
/// Typically constructed from a concrete [`Sender`] and a converter.
#[derive(Clone)]
pub struct Transport<S> {
    service: S,
}

impl<D, C> Transport<SenderService<D, C>> {
    /// Create a new transport from a producer backend and a converter.
    pub fn new(sender: D, converter: C) -> Self {
        Self {
            service: SenderService::new(sender, converter),
        }
    }

    /// Topic used for envelopes without a `kafka_topic` header.
    pub fn with_default_topic(self, topic: impl Into<String>) -> Self {
        Self {
            service: self.service.with_default_topic(topic),
        }
    }
}

impl<S> Transport<S> {
    /// Apply a Tower layer to the transport.
    ///
    /// This enables composition with middleware such as retries, timeouts,
    /// buffering, or tracing.
    pub fn layer<L>(self, layer: L) -> Transport<L::Service>
    where
        L: tower::Layer<S>,
    {
        Transport {
            service: layer.layer(self.service),
        }
    }
}

/// Tower `Service` implementation for `Transport`.
///
/// Delegates readiness and request handling to the inner service while mapping
/// all errors into [`TransportError`].
impl<R, S> Service<R> for Transport<S>
where
    S: Service<R> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<tower::BoxError>,
    R: Send + 'static,
{
    type Response = ();
    type Error = TransportError;
    type Future = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service
            .poll_ready(cx)
            .map_err(|e| TransportError::from_boxed(e.into()))
    }

    /// The service polled ready in `poll_ready` handles this request; a
    /// fresh clone is left in its place.
    fn call(&mut self, req: R) -> Self::Future {
        let clone = self.service.clone();
        let mut service = std::mem::replace(&mut self.service, clone);

        Box::pin(async move {
            service
                .call(req)
                .await
                .map_err(|e| TransportError::from_boxed(e.into()))?;
            Ok(())
        })
    }
}

impl<S> Transport<S> {
    /// Send an [`Envelope`] through the transport.
    ///
    /// This is a convenience method for users that do not need direct access
    /// to the `tower::Service` API. It waits for the service stack to be
    /// ready before sending.
    #[tracing::instrument(skip_all)]
    pub async fn send<M>(&mut self, envelope: Envelope<M>) -> Result<(), TransportError>
    where
        S: Service<Envelope<M>> + Clone + Send + 'static,
        S::Future: Send + 'static,
        S::Error: Into<tower::BoxError>,
    {
        let mut service = self.service.clone();
        std::future::poll_fn(|cx| service.poll_ready(cx))
            .await
            .map_err(|e| TransportError::from_boxed(e.into()))?;
        service
            .call(envelope)
            .await
            .map_err(|e| TransportError::from_boxed(e.into()))?;
        Ok(())
    }
}

/// Error returned by transport operations.
///
/// Each error captures:
/// - The underlying error kind
/// - A tracing span backtrace for improved diagnostics
#[derive(Debug)]
pub struct TransportError {
    context: SpanTrace,
    kind: TransportErrorKind,
}

/// Transport errors kind.
#[derive(Debug)]
pub enum TransportErrorKind {
    /// The envelope could not be turned into a record.
    Conversion(ConversionError),
    /// Errors originating from the producer backend.
    Sender(tower::BoxError),
}

impl TransportError {
    /// Create a sender-related transport error.
    pub fn sender(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: TransportErrorKind::Sender(err),
        }
    }

    /// Create a conversion-related transport error.
    pub fn conversion(err: ConversionError) -> Self {
        Self {
            context: SpanTrace::capture(),
            kind: TransportErrorKind::Conversion(err),
        }
    }

    /// Classify a boxed error coming out of the service stack.
    fn from_boxed(err: tower::BoxError) -> Self {
        match err.downcast::<ConversionError>() {
            Ok(err) => Self::conversion(*err),
            Err(err) => Self::sender(err),
        }
    }

    /// What went wrong.
    pub fn kind(&self) -> &TransportErrorKind {
        &self.kind
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            TransportErrorKind::Conversion(err) => writeln!(f, "Conversion error: {err}"),
            TransportErrorKind::Sender(err) => writeln!(f, "Sender error: {err}"),
        }?;
        self.context.fmt(f)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            TransportErrorKind::Conversion(err) => Some(err),
            TransportErrorKind::Sender(err) => Some(err.as_ref()),
        }
    }
}

/// Tower service adapter for a [`Sender`] backend.
///
/// Converts each envelope with the converter, then hands the resulting
/// record to the sender.
pub struct SenderService<D, C> {
    sender: D,
    converter: Arc<C>,
    default_topic: Option<Arc<str>>,
}

impl<D, C> SenderService<D, C> {
    /// Create a new sender service without a default topic.
    pub fn new(sender: D, converter: C) -> Self {
        Self {
            sender,
            converter: Arc::new(converter),
            default_topic: None,
        }
    }

    /// Topic used for envelopes without a `kafka_topic` header.
    pub fn with_default_topic(mut self, topic: impl Into<String>) -> Self {
        self.default_topic = Some(Arc::from(topic.into()));
        self
    }
}

impl<D: Clone, C> Clone for SenderService<D, C> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            converter: Arc::clone(&self.converter),
            default_topic: self.default_topic.clone(),
        }
    }
}

/// `tower::Service` implementation converting and delegating to a [`Sender`].
impl<M, D, C> Service<Envelope<M>> for SenderService<D, C>
where
    D: Sender + Clone + Send + 'static,
    D::Key: 'static,
    D::Value: 'static,
    C: RecordMessageConverter<D::Key, D::Value, Payload = M>,
{
    type Response = ();
    type Error = tower::BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Envelope<M>) -> Self::Future {
        let record = self
            .converter
            .from_message(req, self.default_topic.as_deref());
        let mut sender = self.sender.clone();

        Box::pin(async move {
            let record = record.inspect_err(|error| {
                tracing::debug!(%error, "Envelope could not be converted");
            })?;
            sender.send(record).await.map_err(Into::into)?;
            Ok(())
        })
    }
}

/// Trait implemented by concrete producer backends.
///
/// A sender is responsible for delivering a [`ProducerRecord`] to an
/// external system (e.g. Kafka or an in-memory queue).
#[async_trait::async_trait]
pub trait Sender {
    /// Record key type accepted by the backend.
    type Key: Send;
    /// Record value type accepted by the backend.
    type Value: Send;
    /// Backend-specific error type.
    type Error: Into<tower::BoxError>;

    /// Send a record using the underlying producer.
    async fn send(
        &mut self,
        record: ProducerRecord<Self::Key, Self::Value>,
    ) -> Result<(), Self::Error>;
}
