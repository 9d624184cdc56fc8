//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding wire events.
///
/// A decode failure is a per-message problem: the handler logs it and
/// drops the message, the connection lives on.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed bytes, a missing field, or an
    /// unknown event tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
