// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lifecycle edge application.

use crate::error::{DownqError, Result};
use crate::reactor::ReactorContext;
use crate::request::{Peer, QueueRequest, RequestId, RequestState};

#[derive(Debug)]
pub enum TransitionAction {
    /// Insert a freshly built request at the tail of its peer's queue.
    Enqueue(Box<QueueRequest>),
    /// Move an existing request to `target`; `Unknown` removes it.
    Apply {
        peer: Peer,
        request_id: RequestId,
        target: RequestState,
    },
}

/// Applies exactly one state edge. Runs inline on the dispatch thread, so
/// edges submitted in order are applied in order.
#[derive(Debug)]
pub struct StateTransitionTask {
    action: TransitionAction,
    tolerate_missing: bool,
}

impl StateTransitionTask {
    #[must_use]
    pub fn enqueue(request: QueueRequest) -> Self {
        Self {
            action: TransitionAction::Enqueue(Box::new(request)),
            tolerate_missing: false,
        }
    }

    #[must_use]
    pub fn to(peer: Peer, request_id: RequestId, target: RequestState) -> Self {
        Self {
            action: TransitionAction::Apply {
                peer,
                request_id,
                target,
            },
            tolerate_missing: false,
        }
    }

    /// Like [`to`](Self::to), but a request that vanished in the meantime
    /// (purged while its attempt was in flight) is not an error.
    #[must_use]
    pub fn settle(peer: Peer, request_id: RequestId, target: RequestState) -> Self {
        Self {
            action: TransitionAction::Apply {
                peer,
                request_id,
                target,
            },
            tolerate_missing: true,
        }
    }

    pub(crate) fn run(self, ctx: &ReactorContext) -> Result<()> {
        match self.action {
            TransitionAction::Enqueue(request) => {
                log::trace!(
                    "[QUEUE] {} enqueued for {} ({} bytes)",
                    request.request_id,
                    request.peer,
                    request.operation.len()
                );
                ctx.queue.enqueue(*request)
            }
            TransitionAction::Apply {
                peer,
                request_id,
                target,
            } => match ctx.queue.transition(&peer, request_id, target) {
                Ok(outcome) => {
                    let suffix = if outcome.removed.is_some() {
                        " (removed)"
                    } else {
                        ""
                    };
                    log::trace!(
                        "[QUEUE] {request_id} on {peer}: {} -> {target}{suffix}",
                        outcome.old
                    );
                    Ok(())
                }
                Err(DownqError::RequestNotFound(id)) if self.tolerate_missing => {
                    log::debug!("[QUEUE] {id} on {peer} gone before {target}, ignoring");
                    Ok(())
                }
                Err(e) => Err(e),
            },
        }
    }
}
