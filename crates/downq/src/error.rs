// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the downlink queue core.
//!
//! Two families:
//! - [`DownqError`]: internal faults (invariant violations, shutdown). These
//!   abort the offending task chain, never the whole reactor.
//! - [`DeliveryError`]: terminal outcomes handed to a caller's error
//!   callback exactly once.

use crate::request::{RequestId, RequestState};
use crate::sender::SendError;
use thiserror::Error;

/// Internal errors of the queue core.
#[derive(Debug, Error)]
pub enum DownqError {
    /// A state transition was requested that the queue cannot apply.
    /// Programming error: the task chain that produced it is aborted.
    #[error("invalid transition for {id}: {from} -> {to}")]
    InvalidTransition {
        id: RequestId,
        from: RequestState,
        to: RequestState,
    },

    /// The addressed request is no longer in the queue (already removed,
    /// purged, or never enqueued).
    #[error("{0} not found in queue")]
    RequestNotFound(RequestId),

    /// A request in a terminal state was found sitting in the queue.
    #[error("queue corrupted: {id} for peer '{peer}' is in state {state}")]
    QueueCorrupted {
        peer: String,
        id: RequestId,
        state: RequestState,
    },

    /// The reactor command channel is closed; no further tasks accepted.
    #[error("reactor is shut down")]
    ReactorShutDown,

    /// Rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DownqError>;

/// Terminal delivery outcome surfaced to the caller's error callback.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The peer answered, but delivery failed (malformed or rejected
    /// response, transport fault). Not retried.
    #[error("delivery failed: {0}")]
    Send(#[from] SendError),

    /// The session directory no longer resolves the peer.
    #[error("peer is no longer registered")]
    PeerNotRegistered,

    /// Send window or keep budget lapsed before the request was delivered.
    #[error("request expired before delivery")]
    Expired,

    /// The request was discarded by an explicit purge.
    #[error("request cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestId;

    #[test]
    fn error_messages_are_stable() {
        let err = DownqError::InvalidTransition {
            id: RequestId(7),
            from: RequestState::Executed,
            to: RequestState::Processing,
        };
        assert_eq!(
            err.to_string(),
            "invalid transition for req-7: EXECUTED -> PROCESSING"
        );

        let err = DownqError::RequestNotFound(RequestId(3));
        assert_eq!(err.to_string(), "req-3 not found in queue");
    }

    #[test]
    fn delivery_error_wraps_send_error() {
        let err = DeliveryError::from(SendError::Rejected("4.00".into()));
        assert!(err.to_string().contains("4.00"));
    }
}
