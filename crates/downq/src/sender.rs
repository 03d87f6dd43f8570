// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Narrow interfaces to the collaborators below this core.
//!
//! The queue core never touches the wire itself. Delivery goes through a
//! [`DownlinkSender`] (the transport binding, blocking) and peer endpoints
//! are resolved through a [`PeerDirectory`] (the registration/session
//! directory). Both are supplied by the hosting server.

use crate::request::Peer;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Live transport address of a registered peer.
pub type PeerAddress = SocketAddr;

/// Fault raised by the transport binding while delivering one request.
///
/// A send *timeout* is not an error: the sender signals it by returning
/// `Ok(None)` so the core can tell "unreachable this attempt" apart from
/// "errored" (the former is retried, the latter is terminal).
#[derive(Debug, Error)]
pub enum SendError {
    /// The peer answered with bytes the binding could not decode.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The peer answered with an explicit rejection.
    #[error("rejected by peer: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blocking downlink delivery through the transport binding.
///
/// Implementations perform the actual network send and wait up to `timeout`
/// for the peer's answer. Always invoked on a reactor worker thread, never
/// on the dispatch thread.
pub trait DownlinkSender: Send + Sync {
    /// Deliver `operation` to `addr`.
    ///
    /// Returns `Ok(Some(response))` on success, `Ok(None)` when the peer did
    /// not answer within `timeout` (it will be retried later), or an error
    /// for terminal delivery faults.
    fn send(
        &self,
        addr: &PeerAddress,
        operation: &[u8],
        timeout: Duration,
    ) -> std::result::Result<Option<Vec<u8>>, SendError>;
}

/// Lookup into the registration/session directory.
pub trait PeerDirectory: Send + Sync {
    /// Resolve a peer to its live transport address, or `None` when the
    /// peer is not (or no longer) registered.
    fn resolve(&self, peer: &Peer) -> Option<PeerAddress>;
}
