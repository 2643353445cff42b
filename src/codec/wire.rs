//! Payload Codec
//!
//! Converts a `SyncPayload` into a tagged, versioned wire string and back.
//! Decoding dispatches on the tag prefix to one parser per version and never
//! returns a partially built payload.

use crate::adapters::outbound::{Base64Text, Lz4Compressor};
use crate::codec::compact::CompactForm;
use crate::codec::legacy::LegacyPayload;
use crate::domain::entities::SyncPayload;
use crate::domain::errors::FormatError;
use crate::domain::ports::{ByteCompressor, TextCodec};
use std::collections::HashSet;
use std::sync::Arc;

/// Wire versions this build understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireVersion {
    /// `FINT_C_V1:` field-named JSON
    LegacyV1,
    /// `FINT_V2:` positional compact JSON
    CompactV2,
}

impl WireVersion {
    /// Version emitted by default.
    pub const CURRENT: WireVersion = WireVersion::CompactV2;

    const ALL: [WireVersion; 2] = [WireVersion::CompactV2, WireVersion::LegacyV1];

    /// Tag prefix including the trailing delimiter.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::LegacyV1 => "FINT_C_V1:",
            Self::CompactV2 => "FINT_V2:",
        }
    }

    /// Split a raw wire string into its version and body.
    pub fn detect(raw: &str) -> Option<(WireVersion, &str)> {
        Self::ALL
            .iter()
            .find_map(|v| raw.strip_prefix(v.tag()).map(|body| (*v, body)))
    }
}

impl std::fmt::Display for WireVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LegacyV1 => write!(f, "v1-legacy"),
            Self::CompactV2 => write!(f, "v2-compact"),
        }
    }
}

/// Versioned payload codec.
///
/// Compression and text encoding are injected so the codec itself makes no
/// platform assumptions.
#[derive(Clone)]
pub struct Codec {
    compressor: Arc<dyn ByteCompressor>,
    text: Arc<dyn TextCodec>,
    max_decoded: Option<usize>,
}

impl Codec {
    pub fn new(compressor: Arc<dyn ByteCompressor>, text: Arc<dyn TextCodec>) -> Self {
        Self {
            compressor,
            text,
            max_decoded: None,
        }
    }

    /// Refuse payloads whose decompressed JSON would exceed `limit` bytes.
    pub fn with_max_decoded(mut self, limit: usize) -> Self {
        self.max_decoded = Some(limit);
        self
    }

    pub fn max_decoded(&self) -> Option<usize> {
        self.max_decoded
    }

    /// LZ4 compression with standard base64 text encoding.
    pub fn standard() -> Self {
        Self::new(Arc::new(Lz4Compressor), Arc::new(Base64Text))
    }

    /// Encode with the current wire version.
    pub fn encode(&self, payload: &SyncPayload) -> Result<String, FormatError> {
        self.encode_as(payload, WireVersion::CURRENT)
    }

    /// Encode with a specific wire version.
    pub fn encode_as(&self, payload: &SyncPayload, version: WireVersion) -> Result<String, FormatError> {
        let json = match version {
            WireVersion::LegacyV1 => serde_json::to_vec(&LegacyPayload::from_payload(payload))?,
            WireVersion::CompactV2 => serde_json::to_vec(&CompactForm::from_payload(payload))?,
        };
        let compressed = self.compressor.compress(&json);
        let wire = format!("{}{}", version.tag(), self.text.encode(&compressed));

        tracing::debug!(
            "encoded payload version={} json_bytes={} wire_len={}",
            version,
            json.len(),
            wire.len()
        );
        Ok(wire)
    }

    /// Decode a tagged wire string.
    pub fn decode(&self, raw: &str) -> Result<SyncPayload, FormatError> {
        let (version, body) = WireVersion::detect(raw.trim()).ok_or(FormatError::UnknownTag)?;
        let compressed = self.text.decode(body)?;
        let json = self.inflate(&compressed)?;

        let payload = match version {
            WireVersion::LegacyV1 => serde_json::from_slice::<LegacyPayload>(&json)?.into_payload(),
            WireVersion::CompactV2 => serde_json::from_slice::<CompactForm>(&json)?.into_payload(),
        };
        validate(&payload)?;

        tracing::debug!(
            "decoded payload version={} identity={} transactions={} accounts={}",
            version,
            payload.identity.id,
            payload.snapshot.transactions.len(),
            payload.snapshot.accounts.len()
        );
        Ok(payload)
    }

    /// Untagged compressed compact bytes, used on dedicated peer channels.
    pub fn encode_bytes(&self, payload: &SyncPayload) -> Result<Vec<u8>, FormatError> {
        let json = serde_json::to_vec(&CompactForm::from_payload(payload))?;
        Ok(self.compressor.compress(&json))
    }

    pub fn decode_bytes(&self, data: &[u8]) -> Result<SyncPayload, FormatError> {
        let json = self.inflate(data)?;
        let payload = serde_json::from_slice::<CompactForm>(&json)?.into_payload();
        validate(&payload)?;
        Ok(payload)
    }

    fn inflate(&self, data: &[u8]) -> Result<Vec<u8>, FormatError> {
        match self.max_decoded {
            Some(limit) => self.compressor.decompress_bounded(data, limit),
            None => self.compressor.decompress(data),
        }
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("max_decoded", &self.max_decoded)
            .finish_non_exhaustive()
    }
}

/// Semantic checks that structural parsing cannot express.
fn validate(payload: &SyncPayload) -> Result<(), FormatError> {
    if payload.identity.id.is_empty() {
        return Err(FormatError::Invalid("empty identity id".into()));
    }

    let mut seen = HashSet::new();
    for tx in &payload.snapshot.transactions {
        if tx.id.is_empty() || !seen.insert(tx.id.as_str()) {
            return Err(FormatError::Invalid(format!("bad transaction id {:?}", tx.id)));
        }
    }

    seen.clear();
    for account in &payload.snapshot.accounts {
        if account.id.is_empty() || !seen.insert(account.id.as_str()) {
            return Err(FormatError::Invalid(format!("bad account id {:?}", account.id)));
        }
        let mut holding_ids = HashSet::new();
        for h in account.holdings.iter().flatten() {
            if !holding_ids.insert(h.id.as_str()) {
                return Err(FormatError::Invalid(format!(
                    "duplicate holding id {:?} in account {}",
                    h.id, account.id
                )));
            }
        }
    }

    Ok(())
}
