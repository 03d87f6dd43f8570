// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! One downlink attempt, executed on the worker pool.

use super::{ProcessingTask, ResponseDeliveryTask, StateTransitionTask, Task};
use crate::error::{DeliveryError, Result};
use crate::reactor::ReactorContext;
use crate::request::{Peer, QueueRequest, RequestId, RequestState, ResponseId};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

/// Carries everything the attempt needs, copied out of the queue entry, so
/// the worker never reads shared queue state. The outcome flows back as
/// submitted follow-up tasks, never as direct mutation.
#[derive(Debug)]
pub struct SendingTask {
    peer: Peer,
    request_id: RequestId,
    response_id: ResponseId,
    operation: Arc<[u8]>,
    timeout: Duration,
}

impl SendingTask {
    #[must_use]
    pub fn new(request: &QueueRequest, ctx: &ReactorContext) -> Self {
        Self {
            peer: request.peer.clone(),
            request_id: request.request_id,
            response_id: request.response_id,
            operation: Arc::clone(&request.operation),
            timeout: ctx.config.attempt_timeout,
        }
    }

    pub(crate) fn run(self, ctx: &ReactorContext) -> Result<()> {
        let Some(addr) = ctx.directory.resolve(&self.peer) else {
            // No address means delivery can never succeed, not that the
            // peer is merely asleep. Fail the request terminally.
            log::warn!(
                "[SEND] {} on {}: peer not registered, failing",
                self.request_id,
                self.peer
            );
            ctx.metrics.sends_errored.fetch_add(1, Ordering::Relaxed);
            ctx.submit(Task::StateTransition(StateTransitionTask::settle(
                self.peer.clone(),
                self.request_id,
                RequestState::Unknown,
            )))?;
            ctx.submit(Task::ResponseDelivery(ResponseDeliveryTask::error(
                self.response_id,
                DeliveryError::PeerNotRegistered,
            )))?;
            return ctx.submit(Task::Processing(ProcessingTask::new(self.peer, true)));
        };

        ctx.metrics.sends_attempted.fetch_add(1, Ordering::Relaxed);
        log::trace!(
            "[SEND] {} -> {} at {addr} ({} bytes, timeout {:?})",
            self.request_id,
            self.peer,
            self.operation.len(),
            self.timeout
        );

        match ctx.sender.send(&addr, &self.operation, self.timeout) {
            Ok(Some(response)) => {
                ctx.submit(Task::StateTransition(StateTransitionTask::settle(
                    self.peer.clone(),
                    self.request_id,
                    RequestState::Executed,
                )))?;
                ctx.submit(Task::ResponseDelivery(ResponseDeliveryTask::response(
                    self.response_id,
                    response,
                )))?;
                ctx.submit(Task::Processing(ProcessingTask::new(self.peer, true)))
            }
            Ok(None) => {
                // Timed out: the peer went back to sleep. Park the request
                // and keep a send-less walk alive for budget enforcement.
                log::debug!(
                    "[SEND] {} on {}: attempt timed out, deferring",
                    self.request_id,
                    self.peer
                );
                ctx.metrics.sends_deferred.fetch_add(1, Ordering::Relaxed);
                ctx.submit(Task::StateTransition(StateTransitionTask::settle(
                    self.peer.clone(),
                    self.request_id,
                    RequestState::Deferred,
                )))?;
                ctx.submit(Task::Processing(ProcessingTask::new(self.peer, false)))
            }
            Err(e) => {
                // A definitive transport error consumes the request: the
                // peer answered or the stack rejected the exchange, either
                // way retrying the same operation is not safe.
                log::debug!("[SEND] {} on {}: {e}", self.request_id, self.peer);
                ctx.metrics.sends_errored.fetch_add(1, Ordering::Relaxed);
                ctx.submit(Task::StateTransition(StateTransitionTask::settle(
                    self.peer.clone(),
                    self.request_id,
                    RequestState::Executed,
                )))?;
                ctx.submit(Task::ResponseDelivery(ResponseDeliveryTask::error(
                    self.response_id,
                    DeliveryError::Send(e),
                )))?;
                ctx.submit(Task::Processing(ProcessingTask::new(self.peer, true)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::DeliveryOutcome;
    use super::*;
    use crate::config::QueueConfig;
    use crate::reactor::testkit::{harness, loopback, next_task, StaticDirectory, StubSender};
    use crate::sender::SendError;

    fn request(peer: &Peer) -> QueueRequest {
        QueueRequest::with_budgets(
            RequestId(1),
            peer.clone(),
            Arc::from(&b"write 3/0/7"[..]),
            Duration::from_secs(60),
            Duration::from_secs(120),
            ResponseId(1),
        )
    }

    #[test]
    fn success_settles_executed_and_delivers_response() {
        let peer = Peer::from("dev-a");
        let sender = Arc::new(StubSender::scripted(vec![Ok(Some(b"2.05".to_vec()))]));
        let (ctx, rx) = harness(
            QueueConfig::default(),
            sender.clone(),
            Arc::new(StaticDirectory(Some(loopback()))),
        );
        let req = request(&peer);
        ctx.queue.enqueue(req.clone()).unwrap();

        SendingTask::new(&req, &ctx).run(&ctx).unwrap();

        assert_eq!(sender.sent.lock().len(), 1);
        assert!(matches!(next_task(&rx), Some(Task::StateTransition(_))));
        match next_task(&rx) {
            Some(Task::ResponseDelivery(t)) => {
                assert!(matches!(t.outcome(), DeliveryOutcome::Response(p) if p == b"2.05"));
            }
            other => panic!("expected response delivery, got {other:?}"),
        }
        assert!(matches!(next_task(&rx), Some(Task::Processing(_))));
        assert_eq!(ctx.metrics.snapshot().sends_attempted, 1);
    }

    #[test]
    fn timeout_defers_and_requeues_a_sendless_walk() {
        let peer = Peer::from("dev-b");
        let (ctx, rx) = harness(
            QueueConfig::default(),
            Arc::new(StubSender::scripted(vec![Ok(None)])),
            Arc::new(StaticDirectory(Some(loopback()))),
        );
        let req = request(&peer);
        ctx.queue.enqueue(req.clone()).unwrap();

        SendingTask::new(&req, &ctx).run(&ctx).unwrap();

        assert!(matches!(next_task(&rx), Some(Task::StateTransition(_))));
        match next_task(&rx) {
            Some(Task::Processing(walk)) => assert_eq!(walk.peer().endpoint(), "dev-b"),
            other => panic!("expected walk, got {other:?}"),
        }
        assert_eq!(ctx.metrics.snapshot().sends_deferred, 1);
    }

    #[test]
    fn transport_error_consumes_the_request() {
        let peer = Peer::from("dev-c");
        let (ctx, rx) = harness(
            QueueConfig::default(),
            Arc::new(StubSender::scripted(vec![Err(SendError::Rejected(
                "4.00".to_string(),
            ))])),
            Arc::new(StaticDirectory(Some(loopback()))),
        );
        let req = request(&peer);
        ctx.queue.enqueue(req.clone()).unwrap();

        SendingTask::new(&req, &ctx).run(&ctx).unwrap();

        assert!(matches!(next_task(&rx), Some(Task::StateTransition(_))));
        match next_task(&rx) {
            Some(Task::ResponseDelivery(t)) => {
                assert!(matches!(
                    t.outcome(),
                    DeliveryOutcome::Error(DeliveryError::Send(_))
                ));
            }
            other => panic!("expected error delivery, got {other:?}"),
        }
        assert!(matches!(next_task(&rx), Some(Task::Processing(_))));
        assert_eq!(ctx.metrics.snapshot().sends_errored, 1);
    }

    #[test]
    fn unregistered_peer_fails_terminally_without_an_attempt() {
        let peer = Peer::from("dev-d");
        let sender = Arc::new(StubSender::new());
        let (ctx, rx) = harness(
            QueueConfig::default(),
            sender.clone(),
            Arc::new(StaticDirectory(None)),
        );
        let req = request(&peer);
        ctx.queue.enqueue(req.clone()).unwrap();

        SendingTask::new(&req, &ctx).run(&ctx).unwrap();

        assert!(sender.sent.lock().is_empty());
        assert!(matches!(next_task(&rx), Some(Task::StateTransition(_))));
        match next_task(&rx) {
            Some(Task::ResponseDelivery(t)) => {
                assert!(matches!(
                    t.outcome(),
                    DeliveryOutcome::Error(DeliveryError::PeerNotRegistered)
                ));
            }
            other => panic!("expected error delivery, got {other:?}"),
        }
        assert_eq!(ctx.metrics.snapshot().sends_attempted, 0);
    }
}
