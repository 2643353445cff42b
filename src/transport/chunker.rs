//! Chunker and Reassembler
//!
//! Splits a wire string that does not fit in one visual frame into numbered
//! envelopes, and reassembles envelopes captured in any order.
//!
//! Envelope frame format (colon-delimited):
//!
//! ```text
//! FINT_M_V1:<sessionId>:<index>:<total>:<fragment>
//! ```
//!
//! `index` is 1-based. The fragment may itself contain colons; only the
//! first four delimiters are structural.

use crate::domain::errors::{FormatError, SyncError};
use crate::domain::value_objects::SessionId;
use std::collections::BTreeMap;
use std::fmt;

/// Tag of multipart frames.
pub const MULTIPART_TAG: &str = "FINT_M_V1";

/// One fragment of a wire string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEnvelope {
    pub session_id: SessionId,
    /// 1-based position
    pub index: u32,
    pub total: u32,
    pub fragment: String,
}

impl ChunkEnvelope {
    /// Whether a captured frame claims to be a multipart envelope.
    pub fn is_multipart(frame: &str) -> bool {
        frame
            .strip_prefix(MULTIPART_TAG)
            .is_some_and(|rest| rest.starts_with(':'))
    }

    /// Parse a frame into an envelope.
    pub fn parse(frame: &str) -> Result<Self, FormatError> {
        let mut parts = frame.splitn(5, ':');

        let tag = parts.next().unwrap_or_default();
        if tag != MULTIPART_TAG {
            return Err(FormatError::Envelope(format!("unexpected tag {:?}", tag)));
        }

        let (Some(sid), Some(index), Some(total), Some(fragment)) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(FormatError::Envelope("missing header fields".into()));
        };

        let session_id = SessionId::parse(sid)
            .ok_or_else(|| FormatError::Envelope(format!("bad session id {:?}", sid)))?;
        let index: u32 = index
            .parse()
            .map_err(|_| FormatError::Envelope(format!("bad index {:?}", index)))?;
        let total: u32 = total
            .parse()
            .map_err(|_| FormatError::Envelope(format!("bad total {:?}", total)))?;

        if total == 0 || index == 0 || index > total {
            return Err(FormatError::Envelope(format!("index {} out of range 1..={}", index, total)));
        }

        Ok(Self {
            session_id,
            index,
            total,
            fragment: fragment.to_string(),
        })
    }
}

impl fmt::Display for ChunkEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            MULTIPART_TAG, self.session_id, self.index, self.total, self.fragment
        )
    }
}

/// Splits wire strings into envelopes.
#[derive(Debug, Clone)]
pub struct Chunker {
    max_fragment_size: usize,
    max_fragments: usize,
}

impl Chunker {
    pub fn new(max_fragment_size: usize, max_fragments: usize) -> Self {
        Self {
            max_fragment_size: max_fragment_size.max(1),
            max_fragments,
        }
    }

    /// Whether the wire string fits in a single frame.
    pub fn fits_single_frame(&self, wire: &str) -> bool {
        wire.chars().count() <= self.max_fragment_size
    }

    /// Split under a fresh time-derived session id.
    pub fn split(&self, wire: &str) -> Result<Vec<ChunkEnvelope>, SyncError> {
        self.split_for_session(wire, SessionId::time_derived())
    }

    /// Split under a given session id.
    ///
    /// `total = ceil(len / max_fragment_size)`; an empty wire string yields
    /// one envelope with an empty fragment.
    pub fn split_for_session(
        &self,
        wire: &str,
        session_id: SessionId,
    ) -> Result<Vec<ChunkEnvelope>, SyncError> {
        let chars: Vec<char> = wire.chars().collect();
        let fragments: Vec<String> = if chars.is_empty() {
            vec![String::new()]
        } else {
            chars
                .chunks(self.max_fragment_size)
                .map(|c| c.iter().collect())
                .collect()
        };

        if fragments.len() > self.max_fragments {
            return Err(SyncError::Capacity {
                fragments: fragments.len(),
                limit: self.max_fragments,
            });
        }

        let total = fragments.len() as u32;
        let envelopes: Vec<ChunkEnvelope> = fragments
            .into_iter()
            .enumerate()
            .map(|(i, fragment)| ChunkEnvelope {
                session_id: session_id.clone(),
                index: i as u32 + 1,
                total,
                fragment,
            })
            .collect();

        tracing::debug!(
            "split wire into {} envelopes session={} wire_len={}",
            total,
            session_id,
            chars.len()
        );
        Ok(envelopes)
    }
}

/// Result of feeding one envelope to the reassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// A new distinct fragment was stored
    Accepted { received: usize, total: usize },
    /// The index was already collected; stored fragment overwritten
    Duplicate { received: usize, total: usize },
    /// Inconsistent with the tracked session; nothing changed
    Ignored,
    /// All fragments collected; concatenated in index order
    Complete(String),
}

impl IngestOutcome {
    pub fn is_pending(&self) -> bool {
        !matches!(self, IngestOutcome::Complete(_))
    }
}

#[derive(Debug)]
struct Collection {
    session_id: SessionId,
    total: u32,
    fragments: BTreeMap<u32, String>,
}

/// Pure accumulator of envelopes for a single broadcast session.
///
/// Tracking switches to whichever session the latest envelope belongs to;
/// fragments of the previous session are discarded. Envelopes of the session
/// that last completed are ignored until `reset`. Timeouts are owned by the
/// caller, who calls `reset` when the window expires.
#[derive(Debug, Default)]
pub struct Reassembler {
    current: Option<Collection>,
    completed: Option<SessionId>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one envelope.
    pub fn ingest(&mut self, envelope: ChunkEnvelope) -> IngestOutcome {
        if envelope.total == 0 || envelope.index == 0 || envelope.index > envelope.total {
            return IngestOutcome::Ignored;
        }
        if self.completed.as_ref() == Some(&envelope.session_id) {
            return IngestOutcome::Ignored;
        }

        let switch = match &self.current {
            Some(c) => c.session_id != envelope.session_id,
            None => true,
        };
        if switch {
            if let Some(old) = &self.current {
                tracing::debug!(
                    "new broadcast session {} replaces {} ({} fragments discarded)",
                    envelope.session_id,
                    old.session_id,
                    old.fragments.len()
                );
            }
            self.current = Some(Collection {
                session_id: envelope.session_id.clone(),
                total: envelope.total,
                fragments: BTreeMap::new(),
            });
        }

        let Some(collection) = self.current.as_mut() else {
            return IngestOutcome::Ignored;
        };

        if collection.total != envelope.total {
            tracing::debug!(
                "ignoring envelope with total={} for session {} (expected {})",
                envelope.total,
                collection.session_id,
                collection.total
            );
            return IngestOutcome::Ignored;
        }

        let is_new = collection
            .fragments
            .insert(envelope.index, envelope.fragment)
            .is_none();
        let received = collection.fragments.len();
        let total = collection.total as usize;

        if received == total {
            let wire: String = collection.fragments.values().map(String::as_str).collect();
            tracing::debug!(
                "reassembled session {} from {} fragments",
                collection.session_id,
                total
            );
            self.completed = self.current.take().map(|c| c.session_id);
            return IngestOutcome::Complete(wire);
        }

        if is_new {
            IngestOutcome::Accepted { received, total }
        } else {
            IngestOutcome::Duplicate { received, total }
        }
    }

    /// `(received, total)` of the tracked session.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.current
            .as_ref()
            .map(|c| (c.fragments.len(), c.total as usize))
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.current.as_ref().map(|c| &c.session_id)
    }

    /// Drop all collected fragments and forget the completed session.
    pub fn reset(&mut self) {
        self.current = None;
        self.completed = None;
    }
}
