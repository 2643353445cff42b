//! Byte Codec Ports
//!
//! Platform-neutral conversions injected into the payload codec.

use crate::domain::errors::FormatError;

/// Reversible `bytes ⇄ compact bytes` transformation.
pub trait ByteCompressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Vec<u8>;

    /// Fails on truncated or corrupt input.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, FormatError>;

    /// Like `decompress`, but fails when the output would exceed `limit` bytes.
    ///
    /// Implementations that know the output size up front should check it
    /// before allocating.
    fn decompress_bounded(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, FormatError> {
        let out = self.decompress(data)?;
        if out.len() > limit {
            return Err(FormatError::Decompress(format!(
                "decompressed size {} exceeds limit {}",
                out.len(),
                limit
            )));
        }
        Ok(out)
    }
}

/// Reversible `bytes ⇄ text-safe string` transformation.
pub trait TextCodec: Send + Sync {
    fn encode(&self, data: &[u8]) -> String;

    fn decode(&self, text: &str) -> Result<Vec<u8>, FormatError>;
}
