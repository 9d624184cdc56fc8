//! Codec trait and the JSON implementation.
//!
//! The table and the connection handlers never assume a byte format; they
//! go through [`Codec`]. JSON is the format the browser clients speak, so
//! [`JsonCodec`] is the default, but nothing outside this module would
//! change for a binary codec.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Converts wire values to and from bytes.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] speaking JSON via `serde_json`. Behind the `json` feature,
/// which is on by default.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::events::ClientEvent;

    #[test]
    fn test_json_codec_round_trips_client_events() {
        let codec = JsonCodec;
        let event = ClientEvent::ChangeName { new_name: "Brock".to_string() };

        let bytes = codec.encode(&event).unwrap();
        let back: ClientEvent = codec.decode(&bytes).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let codec = JsonCodec;
        let result: Result<ClientEvent, _> = codec.decode(b"\x00\x01\x02");
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_json_codec_rejects_wrong_shape() {
        let codec = JsonCodec;
        let result: Result<ClientEvent, _> = codec.decode(b"[1,2,3]");
        assert!(result.is_err());
    }
}
