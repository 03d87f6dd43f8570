// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Queued downlink request and its lifecycle state machine.
//!
//! A [`QueueRequest`] is the value entity held by the per-peer request queue:
//! the opaque operation payload, the current lifecycle state, and the two
//! time budgets that govern delivery (send window and overall TTL).
//!
//! Requests are created in [`RequestState::Enqueued`] and only ever mutated
//! through state-transition tasks running on the reactor dispatch thread.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Endpoint identifier of a remote device. One logical queue per peer.
///
/// Owned by the registration directory; this crate only references it.
/// Cheap to clone (shared string).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Peer(Arc<str>);

impl Peer {
    pub fn new(endpoint: impl Into<Arc<str>>) -> Self {
        Self(endpoint.into())
    }

    /// The raw endpoint name as registered by the session directory.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Peer {
    fn from(endpoint: &str) -> Self {
        Self(Arc::from(endpoint))
    }
}

impl From<String> for Peer {
    fn from(endpoint: String) -> Self {
        Self(Arc::from(endpoint))
    }
}

/// Identifier of one queued request, unique per `DownlinkQueue` instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Correlation key into the response correlation table.
///
/// Allocated at enqueue time, consumed at most once when the response (or a
/// terminal error) is handed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseId(pub u64);

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rsp-{}", self.0)
    }
}

/// Lifecycle state of a queued request.
///
/// ```text
///  enqueue
///     |
///     v
///  Enqueued ---attempt---> Processing ---response/error---> Executed
///     |                     |      ^                           |
///     |             timeout |      | attempt                   |
///     |                     v      |                           |
///     |                    Deferred                            |
///     | send window over      | send window over               |
///     v                       v                                |
///  TtlElapsed <---------------+              keep budget over  |
///     |                                                        |
///     +-----keep budget over-----> Unknown (removed) <---------+
/// ```
///
/// `Enqueued` and `Deferred` entries also drop straight to `Unknown` when
/// the keep budget lapses; the keep check always runs before the send
/// window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Waiting for its first delivery attempt.
    Enqueued,
    /// A delivery attempt timed out; waiting for the peer to reappear.
    Deferred,
    /// A sending task is in flight for this request right now.
    Processing,
    /// The send window closed before the request could be delivered.
    TtlElapsed,
    /// Delivered (or terminally errored); kept until the TTL lapses.
    Executed,
    /// Terminal: the request is removed from the queue.
    Unknown,
}

impl RequestState {
    /// Terminal states are never stored in the queue.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Unknown)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestState::Enqueued => "ENQUEUED",
            RequestState::Deferred => "DEFERRED",
            RequestState::Processing => "PROCESSING",
            RequestState::TtlElapsed => "TTL_ELAPSED",
            RequestState::Executed => "EXECUTED",
            RequestState::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// One pending downlink operation addressed to a queue-mode peer.
#[derive(Debug, Clone)]
pub struct QueueRequest {
    /// Queue-local identity, used to address transitions.
    pub request_id: RequestId,
    /// Destination peer (one logical queue per peer).
    pub peer: Peer,
    /// Domain-specific downlink payload, opaque to this crate.
    pub operation: Arc<[u8]>,
    /// Current lifecycle state.
    pub state: RequestState,
    /// No delivery attempt may *start* after this instant.
    pub send_deadline: Instant,
    /// The request is discarded outright after this instant.
    ///
    /// Expected to be >= `send_deadline`, but a misconfigured caller may
    /// violate that; the TTL check always wins (see the processing pass).
    pub keep_deadline: Instant,
    /// Correlation key for the caller's callbacks.
    pub response_id: ResponseId,
}

impl QueueRequest {
    pub fn new(
        request_id: RequestId,
        peer: Peer,
        operation: Arc<[u8]>,
        send_deadline: Instant,
        keep_deadline: Instant,
        response_id: ResponseId,
    ) -> Self {
        Self {
            request_id,
            peer,
            operation,
            state: RequestState::Enqueued,
            send_deadline,
            keep_deadline,
            response_id,
        }
    }

    /// Deadlines expressed as budgets relative to now.
    pub fn with_budgets(
        request_id: RequestId,
        peer: Peer,
        operation: Arc<[u8]>,
        send_budget: Duration,
        keep_budget: Duration,
        response_id: ResponseId,
    ) -> Self {
        let now = Instant::now();
        Self::new(
            request_id,
            peer,
            operation,
            now + send_budget,
            now + keep_budget,
            response_id,
        )
    }

    /// Has the per-attempt send window closed?
    #[must_use]
    pub fn send_window_over(&self, now: Instant) -> bool {
        now >= self.send_deadline
    }

    /// Has the overall keep budget (TTL) lapsed?
    #[must_use]
    pub fn keep_budget_over(&self, now: Instant) -> bool {
        now >= self.keep_deadline
    }
}
