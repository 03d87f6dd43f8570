// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-peer, insertion-ordered request queue.
//!
//! The queue is shared by every task, but correctness does not come from the
//! internal mutex: all mutations are funneled through tasks running on the
//! reactor's single dispatch thread. The mutex only makes the structure
//! `Sync` so worker threads can hold references to it.

use crate::error::{DownqError, Result};
use crate::request::{Peer, QueueRequest, RequestId, RequestState};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Result of applying one state transition.
#[derive(Debug)]
pub struct TransitionOutcome {
    /// State the request was in before the transition.
    pub old: RequestState,
    /// Set when the transition removed the request from the queue
    /// (target [`RequestState::Unknown`]).
    pub removed: Option<QueueRequest>,
}

/// Ordered collection of pending requests, one logical queue per peer.
pub struct RequestQueue {
    inner: Mutex<HashMap<Peer, Vec<QueueRequest>>>,
}

impl RequestQueue {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Insert a request at the tail of its peer's queue.
    ///
    /// The request must be in state [`RequestState::Enqueued`] and its id
    /// must not already be queued for this peer.
    pub fn enqueue(&self, request: QueueRequest) -> Result<()> {
        let mut inner = self.inner.lock();
        let entries = inner.entry(request.peer.clone()).or_default();
        if let Some(existing) = entries.iter().find(|r| r.request_id == request.request_id) {
            return Err(DownqError::InvalidTransition {
                id: request.request_id,
                from: existing.state,
                to: RequestState::Enqueued,
            });
        }
        if request.state != RequestState::Enqueued {
            return Err(DownqError::InvalidTransition {
                id: request.request_id,
                from: request.state,
                to: RequestState::Enqueued,
            });
        }
        entries.push(request);
        Ok(())
    }

    /// Apply one transition to one request.
    ///
    /// `Unknown` removes the entry; any other target (except `Enqueued`,
    /// which is reserved for [`Self::enqueue`]) replaces the state. An
    /// unknown request id or an unusable target is an invariant violation
    /// surfaced as an error, not a recoverable condition.
    pub fn transition(
        &self,
        peer: &Peer,
        id: RequestId,
        target: RequestState,
    ) -> Result<TransitionOutcome> {
        let mut inner = self.inner.lock();
        let entries = inner.get_mut(peer).ok_or(DownqError::RequestNotFound(id))?;
        let pos = entries
            .iter()
            .position(|r| r.request_id == id)
            .ok_or(DownqError::RequestNotFound(id))?;

        let old = entries[pos].state;
        match target {
            RequestState::Enqueued => Err(DownqError::InvalidTransition {
                id,
                from: old,
                to: target,
            }),
            RequestState::Unknown => {
                let removed = entries.remove(pos);
                if entries.is_empty() {
                    inner.remove(peer);
                }
                Ok(TransitionOutcome {
                    old,
                    removed: Some(removed),
                })
            }
            _ => {
                entries[pos].state = target;
                Ok(TransitionOutcome { old, removed: None })
            }
        }
    }

    /// Snapshot of a peer's requests in insertion order.
    #[must_use]
    pub fn requests_for(&self, peer: &Peer) -> Vec<QueueRequest> {
        self.inner.lock().get(peer).cloned().unwrap_or_default()
    }

    /// Remove and return every request queued for `peer`, regardless of
    /// state. Idempotent: a second purge drains nothing.
    pub fn purge(&self, peer: &Peer) -> Vec<QueueRequest> {
        self.inner.lock().remove(peer).unwrap_or_default()
    }

    /// Peers that currently have at least one queued request.
    #[must_use]
    pub fn peers(&self) -> Vec<Peer> {
        self.inner.lock().keys().cloned().collect()
    }

    /// Number of requests queued for `peer`.
    #[must_use]
    pub fn pending(&self, peer: &Peer) -> usize {
        self.inner.lock().get(peer).map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}
