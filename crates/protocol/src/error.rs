//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering encoding and decoding of wire messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Failed to serialize data.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// Failed to deserialize data.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_eof() || err.is_syntax() {
            ProtocolError::Deserialization(err.to_string())
        } else {
            ProtocolError::Serialization(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_maps_to_deserialization() {
        let err = serde_json::from_str::<u32>("{not json").unwrap_err();
        let protocol_err = ProtocolError::from(err);
        assert!(matches!(protocol_err, ProtocolError::Deserialization(_)));
        assert!(protocol_err.to_string().starts_with("deserialization failed"));
    }

    #[test]
    fn test_type_mismatch_maps_to_deserialization() {
        let err = serde_json::from_str::<u32>("\"text\"").unwrap_err();
        assert!(matches!(
            ProtocolError::from(err),
            ProtocolError::Deserialization(_)
        ));
    }
}
