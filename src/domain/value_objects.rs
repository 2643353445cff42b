//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ephemeral token identifying one sync attempt.
///
/// Used both as the rendezvous identifier of a peer session and as the
/// multipart broadcast session id. Never contains `:` or `#`, so it is safe
/// inside frame headers and links.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Parse a session id, rejecting empty values and reserved delimiters.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || s.contains(':') || s.contains('#') || s.contains('/') {
            return None;
        }
        Some(Self(s.to_string()))
    }

    /// Random identifier for a rendezvous session.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Short time-derived identifier for a broadcast session.
    ///
    /// Millisecond clock in base 36 followed by four random hex digits.
    pub fn time_derived() -> Self {
        let millis = crate::domain::entities::now_millis().max(0) as u64;
        let salt: u16 = rand::random();
        Self(format!("{}{:04x}", to_base36(millis), salt))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Shareable link a client follows to join a host's peer session.
///
/// Rendered as `{origin}#/sync/{sessionId}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendezvousLink {
    pub origin: String,
    pub session_id: SessionId,
}

impl RendezvousLink {
    const MARKER: &'static str = "#/sync/";

    pub fn new(origin: impl Into<String>, session_id: SessionId) -> Self {
        Self {
            origin: origin.into(),
            session_id,
        }
    }

    /// Extract the session id from either a full link or a bare id.
    pub fn session_from(input: &str) -> Option<SessionId> {
        match input.find(Self::MARKER) {
            Some(pos) => SessionId::parse(&input[pos + Self::MARKER.len()..]),
            None => SessionId::parse(input),
        }
    }
}

impl fmt::Display for RendezvousLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.origin, Self::MARKER, self.session_id)
    }
}
