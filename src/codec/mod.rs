//! Payload Codec Module
//!
//! Versioned, compact serialization of sync payloads.
//!
//! ## Wire formats
//!
//! - **Legacy**: `FINT_C_V1:` + base64(compress(json(payload)))
//! - **Compact**: `FINT_V2:` + base64(compress(json(compact form)))
//!
//! Decoding is total: any unknown tag, bad encoding or malformed structure is
//! reported as a `FormatError`.

mod compact;
mod legacy;
mod wire;

pub use wire::{Codec, WireVersion};
