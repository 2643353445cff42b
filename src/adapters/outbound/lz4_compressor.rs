//! LZ4 Compressor
//!
//! Implements ByteCompressor using LZ4 block compression with a prepended
//! little-endian size header.

use crate::domain::errors::FormatError;
use crate::domain::ports::ByteCompressor;

/// Upper bound on the declared uncompressed size (64 MiB).
const MAX_DECOMPRESSED: usize = 64 * 1024 * 1024;

/// LZ4 block compressor.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Compressor;

impl ByteCompressor for Lz4Compressor {
    fn compress(&self, data: &[u8]) -> Vec<u8> {
        lz4_flex::compress_prepend_size(data)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, FormatError> {
        self.decompress_bounded(data, MAX_DECOMPRESSED)
    }

    fn decompress_bounded(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, FormatError> {
        let header: [u8; 4] = data
            .get(..4)
            .and_then(|h| h.try_into().ok())
            .ok_or_else(|| FormatError::Decompress("missing size header".into()))?;

        let declared = u32::from_le_bytes(header) as usize;
        if declared > limit.min(MAX_DECOMPRESSED) {
            return Err(FormatError::Decompress(format!(
                "declared size {} exceeds limit",
                declared
            )));
        }

        lz4_flex::decompress_size_prepended(data).map_err(|e| FormatError::Decompress(e.to_string()))
    }
}
