use std::{any::Any, sync::Arc};

use crate::Acknowledgment;

/// Opaque value stored in a [`MessageHeaders`](super::MessageHeaders) map.
///
/// Header values are deliberately loosely typed: the converter only needs to
/// carry record keys, routing information and the acknowledgment handle, and
/// application code is free to add its own entries. Values of any other type
/// travel as [`HeaderValue::Other`], usually through [`Opaque`].
#[derive(Debug, Clone)]
pub enum HeaderValue {
    /// Entry present with no value, e.g. the key of an unkeyed record.
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    String(String),
    Bytes(Vec<u8>),
    /// Acknowledgment handle attached to an inbound message.
    Acknowledgment(Arc<dyn Acknowledgment>),
    /// Any other value, e.g. a deserialized record key.
    Other(Arc<dyn Any + Send + Sync>),
}

impl HeaderValue {
    /// Return `true` for [`HeaderValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, HeaderValue::Null)
    }

    /// Name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            HeaderValue::Null => "null",
            HeaderValue::Bool(_) => "bool",
            HeaderValue::Int(_) => "i32",
            HeaderValue::Long(_) => "i64",
            HeaderValue::String(_) => "string",
            HeaderValue::Bytes(_) => "bytes",
            HeaderValue::Acknowledgment(_) => "acknowledgment",
            HeaderValue::Other(_) => "opaque",
        }
    }

    /// Borrow the value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow an [`HeaderValue::Other`] value as `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            HeaderValue::Other(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Borrow the acknowledgment handle, if this is one.
    pub fn as_acknowledgment(&self) -> Option<&Arc<dyn Acknowledgment>> {
        match self {
            HeaderValue::Acknowledgment(ack) => Some(ack),
            _ => None,
        }
    }
}

/// Acknowledgment handles and opaque values compare by identity.
impl PartialEq for HeaderValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HeaderValue::Null, HeaderValue::Null) => true,
            (HeaderValue::Bool(a), HeaderValue::Bool(b)) => a == b,
            (HeaderValue::Int(a), HeaderValue::Int(b)) => a == b,
            (HeaderValue::Long(a), HeaderValue::Long(b)) => a == b,
            (HeaderValue::String(a), HeaderValue::String(b)) => a == b,
            (HeaderValue::Bytes(a), HeaderValue::Bytes(b)) => a == b,
            (HeaderValue::Acknowledgment(a), HeaderValue::Acknowledgment(b)) => Arc::ptr_eq(a, b),
            (HeaderValue::Other(a), HeaderValue::Other(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for HeaderValue {
    fn from(value: bool) -> Self {
        HeaderValue::Bool(value)
    }
}

impl From<i32> for HeaderValue {
    fn from(value: i32) -> Self {
        HeaderValue::Int(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Long(value)
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::String(value)
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::String(value.to_owned())
    }
}

impl From<Vec<u8>> for HeaderValue {
    fn from(value: Vec<u8>) -> Self {
        HeaderValue::Bytes(value)
    }
}

impl From<&[u8]> for HeaderValue {
    fn from(value: &[u8]) -> Self {
        HeaderValue::Bytes(value.to_vec())
    }
}

impl From<Arc<dyn Acknowledgment>> for HeaderValue {
    fn from(value: Arc<dyn Acknowledgment>) -> Self {
        HeaderValue::Acknowledgment(value)
    }
}

/// Wrapper for keys and header values without a dedicated variant.
///
/// `Opaque<T>` converts into [`HeaderValue::Other`] and reads back by
/// downcasting, so any `Clone + Send + Sync` type can be used as a record key:
///
/// ```rust
/// use kafka_envelope::headers::{FromHeaderValue, HeaderValue, Opaque};
///
/// let value = HeaderValue::from(Opaque(42_u64));
/// assert_eq!(Opaque::<u64>::from_header_value(&value), Some(Opaque(42)));
/// assert_eq!(value.downcast_ref::<u64>(), Some(&42));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opaque<T>(pub T);

impl<T: Any + Send + Sync> From<Opaque<T>> for HeaderValue {
    fn from(value: Opaque<T>) -> Self {
        HeaderValue::Other(Arc::new(value.0))
    }
}

impl<T: Into<HeaderValue>> From<Option<T>> for HeaderValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(HeaderValue::Null, Into::into)
    }
}

/// Typed read of a [`HeaderValue`].
///
/// Implementations return `None` when the stored variant does not match the
/// requested type. [`HeaderValue::Null`] is handled by the caller and never
/// reaches `from_header_value`.
pub trait FromHeaderValue: Sized {
    /// Human readable name of the expected type.
    const EXPECTED: &'static str;

    fn from_header_value(value: &HeaderValue) -> Option<Self>;
}

impl FromHeaderValue for HeaderValue {
    const EXPECTED: &'static str = "any";

    fn from_header_value(value: &HeaderValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromHeaderValue for String {
    const EXPECTED: &'static str = "string";

    fn from_header_value(value: &HeaderValue) -> Option<Self> {
        value.as_str().map(str::to_owned)
    }
}

impl FromHeaderValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_header_value(value: &HeaderValue) -> Option<Self> {
        match value {
            HeaderValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromHeaderValue for i32 {
    const EXPECTED: &'static str = "i32";

    fn from_header_value(value: &HeaderValue) -> Option<Self> {
        match value {
            HeaderValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// Widens [`HeaderValue::Int`].
impl FromHeaderValue for i64 {
    const EXPECTED: &'static str = "i64";

    fn from_header_value(value: &HeaderValue) -> Option<Self> {
        match value {
            HeaderValue::Long(l) => Some(*l),
            HeaderValue::Int(i) => Some(i64::from(*i)),
            _ => None,
        }
    }
}

impl FromHeaderValue for Vec<u8> {
    const EXPECTED: &'static str = "bytes";

    fn from_header_value(value: &HeaderValue) -> Option<Self> {
        match value {
            HeaderValue::Bytes(b) => Some(b.clone()),
            _ => None,
        }
    }
}

impl<T: Any + Send + Sync + Clone> FromHeaderValue for Opaque<T> {
    const EXPECTED: &'static str = "opaque";

    fn from_header_value(value: &HeaderValue) -> Option<Self> {
        value.downcast_ref::<T>().cloned().map(Opaque)
    }
}
