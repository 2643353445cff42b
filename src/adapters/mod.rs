//! Adapters - Implementations of the domain ports
//!
//! Outbound adapters back the ports the sync engine depends on: byte and
//! text codecs, stores, frame surfaces and the peer rendezvous.

pub mod outbound;
