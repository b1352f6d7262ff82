use serde::Deserialize;

/// Converter settings.
///
/// Both flags default to `false`, in which case inbound messages carry the
/// [`MessageHeaders::ID_VALUE_NONE`] identity and a `-1` timestamp.
///
/// The struct can be embedded in application configuration:
///
/// ```rust
/// # use kafka_envelope::ConverterConfig;
/// let config = ConverterConfig::default().generate_message_id(true);
/// assert!(config.generate_message_id);
/// assert!(!config.generate_timestamp);
/// ```
///
/// [`MessageHeaders::ID_VALUE_NONE`]: crate::MessageHeaders::ID_VALUE_NONE
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConverterConfig {
    /// Generate a random id for every inbound message.
    pub generate_message_id: bool,
    /// Stamp every inbound message with the current time.
    pub generate_timestamp: bool,
}

impl ConverterConfig {
    /// Set whether message ids are generated.
    pub fn generate_message_id(mut self, generate: bool) -> Self {
        self.generate_message_id = generate;
        self
    }

    /// Set whether message timestamps are generated.
    pub fn generate_timestamp(mut self, generate: bool) -> Self {
        self.generate_timestamp = generate;
        self
    }
}
