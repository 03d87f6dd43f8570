// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Application-facing facade over the reactor.

use crate::config::QueueConfig;
use crate::error::{DeliveryError, Result};
use crate::reactor::{MetricsSnapshot, QueueReactor, ReactorHandle};
use crate::request::{Peer, QueueRequest, RequestId};
use crate::sender::{DownlinkSender, PeerDirectory};
use crate::task::{ProcessingTask, PurgeTask, StateTransitionTask, Task};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Queue-mode downlink delivery service.
///
/// Owns a [`QueueReactor`] and exposes the four operations applications
/// need: enqueue a downlink operation, signal that a peer woke up, purge a
/// peer, and stop. Everything else (retry, deferral, expiration, response
/// correlation) happens inside the reactor.
///
/// ```no_run
/// use downq::{DownlinkQueue, Peer, QueueConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
/// # use downq::{DownlinkSender, PeerAddress, PeerDirectory, SendError};
/// # struct Udp;
/// # impl DownlinkSender for Udp {
/// #     fn send(&self, _: &PeerAddress, _: &[u8], _: Duration)
/// #         -> Result<Option<Vec<u8>>, SendError> { Ok(None) }
/// # }
/// # struct Registry;
/// # impl PeerDirectory for Registry {
/// #     fn resolve(&self, _: &Peer) -> Option<PeerAddress> { None }
/// # }
///
/// let queue = DownlinkQueue::start(
///     QueueConfig::default(),
///     Arc::new(Udp),
///     Arc::new(Registry),
/// )?;
///
/// queue.enqueue(
///     Peer::from("urn:dev:os:0023-7"),
///     &b"write /3/0/7"[..],
///     None,
///     None,
///     |response| println!("delivered: {} bytes", response.len()),
///     |err| eprintln!("failed: {err}"),
/// )?;
///
/// // Later, when the registration layer sees the device check in:
/// queue.peer_reachable(&Peer::from("urn:dev:os:0023-7"))?;
/// # Ok::<(), downq::DownqError>(())
/// ```
pub struct DownlinkQueue {
    reactor: QueueReactor,
    next_request: AtomicU64,
}

impl DownlinkQueue {
    /// Start the reactor with the given transport and peer directory.
    pub fn start(
        config: QueueConfig,
        sender: Arc<dyn DownlinkSender>,
        directory: Arc<dyn PeerDirectory>,
    ) -> Result<Self> {
        Ok(Self {
            reactor: QueueReactor::start(config, sender, directory)?,
            next_request: AtomicU64::new(0),
        })
    }

    /// Queue `operation` for `peer` and trigger a delivery attempt.
    ///
    /// `send_budget` bounds how long delivery attempts may keep starting,
    /// `keep_budget` how long the request may exist at all; `None` falls
    /// back to the configured defaults. Exactly one of the two callbacks
    /// fires, exactly once, from a worker thread.
    pub fn enqueue(
        &self,
        peer: Peer,
        operation: impl Into<Arc<[u8]>>,
        send_budget: Option<Duration>,
        keep_budget: Option<Duration>,
        on_success: impl FnOnce(Vec<u8>) + Send + 'static,
        on_error: impl FnOnce(DeliveryError) + Send + 'static,
    ) -> Result<RequestId> {
        let ctx = self.reactor.context();
        let response_id = ctx.correlation.allocate();
        ctx.correlation
            .register(response_id, Box::new(on_success), Box::new(on_error));

        let request_id = RequestId(self.next_request.fetch_add(1, Ordering::Relaxed) + 1);
        let request = QueueRequest::with_budgets(
            request_id,
            peer.clone(),
            operation.into(),
            send_budget.unwrap_or(ctx.config.send_budget),
            keep_budget.unwrap_or(ctx.config.keep_budget),
            response_id,
        );

        let submitted = self
            .reactor
            .submit(Task::StateTransition(StateTransitionTask::enqueue(request)))
            .and_then(|()| {
                self.reactor
                    .submit(Task::Processing(ProcessingTask::new(peer, true)))
            });
        if let Err(e) = submitted {
            // Never leave callbacks stranded in the correlation table.
            ctx.correlation.discard(response_id);
            return Err(e);
        }
        Ok(request_id)
    }

    /// Signal that `peer` is awake and reachable: triggers a queue walk
    /// that may start a delivery attempt.
    pub fn peer_reachable(&self, peer: &Peer) -> Result<()> {
        self.reactor
            .submit(Task::Processing(ProcessingTask::new(peer.clone(), true)))
    }

    /// Drop everything queued for `peer`. Pending requests fail with
    /// [`DeliveryError::Cancelled`]. Idempotent.
    pub fn purge(&self, peer: &Peer) -> Result<()> {
        self.reactor.submit(Task::Purge(PurgeTask::new(peer.clone())))
    }

    /// Number of requests currently queued for `peer`.
    #[must_use]
    pub fn pending(&self, peer: &Peer) -> usize {
        self.reactor.pending(peer)
    }

    /// Snapshot of a peer's queue, insertion-ordered.
    #[must_use]
    pub fn requests_for(&self, peer: &Peer) -> Vec<QueueRequest> {
        self.reactor.requests_for(peer)
    }

    /// Peers with at least one queued request.
    #[must_use]
    pub fn peers(&self) -> Vec<Peer> {
        self.reactor.peers()
    }

    /// True when no peer has queued requests.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.reactor.is_idle()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.reactor.metrics()
    }

    /// Cloneable submission endpoint for advanced integrations.
    #[must_use]
    pub fn handle(&self) -> ReactorHandle {
        self.reactor.handle()
    }

    /// Shut down, waiting up to `grace` for in-flight work.
    pub fn stop(self, grace: Duration) {
        self.reactor.stop(grace);
    }
}
