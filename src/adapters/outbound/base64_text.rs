//! Base64 Text Codec
//!
//! Implements TextCodec with the standard padded base64 alphabet.

use crate::domain::errors::FormatError;
use crate::domain::ports::TextCodec;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Text;

impl TextCodec for Base64Text {
    fn encode(&self, data: &[u8]) -> String {
        STANDARD.encode(data)
    }

    fn decode(&self, text: &str) -> Result<Vec<u8>, FormatError> {
        STANDARD
            .decode(text.trim())
            .map_err(|e| FormatError::Text(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let encoded = Base64Text.encode(b"fintrack");
        assert_eq!(encoded, "ZmludHJhY2s=");
        assert_eq!(Base64Text.decode(&encoded).unwrap(), b"fintrack");
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(Base64Text.decode("@@@"), Err(FormatError::Text(_))));
    }
}
