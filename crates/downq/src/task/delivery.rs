// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Callback delivery, executed on the worker pool.

use crate::error::{DeliveryError, Result};
use crate::reactor::ReactorContext;
use crate::request::ResponseId;
use std::sync::atomic::Ordering;

#[derive(Debug)]
pub enum DeliveryOutcome {
    Response(Vec<u8>),
    Error(DeliveryError),
}

/// Resolves a response id against the correlation table and invokes the
/// matching application callback.
///
/// Taking the table entry and invoking it are one atomic step from the
/// application's point of view: whoever takes the entry owns the only
/// invocation, so a response racing an expiry delivers exactly one of the
/// two callbacks, never both.
#[derive(Debug)]
pub struct ResponseDeliveryTask {
    response_id: ResponseId,
    outcome: DeliveryOutcome,
}

impl ResponseDeliveryTask {
    #[must_use]
    pub fn response(response_id: ResponseId, payload: Vec<u8>) -> Self {
        Self {
            response_id,
            outcome: DeliveryOutcome::Response(payload),
        }
    }

    #[must_use]
    pub fn error(response_id: ResponseId, error: DeliveryError) -> Self {
        Self {
            response_id,
            outcome: DeliveryOutcome::Error(error),
        }
    }

    #[must_use]
    pub fn expired(response_id: ResponseId) -> Self {
        Self::error(response_id, DeliveryError::Expired)
    }

    #[must_use]
    pub fn cancelled(response_id: ResponseId) -> Self {
        Self::error(response_id, DeliveryError::Cancelled)
    }

    #[must_use]
    pub fn outcome(&self) -> &DeliveryOutcome {
        &self.outcome
    }

    pub(crate) fn run(self, ctx: &ReactorContext) -> Result<()> {
        let Some(context) = ctx.correlation.take(self.response_id) else {
            // Already delivered (or never registered): a late duplicate.
            log::trace!("[DELIVERY] {} has no pending callbacks", self.response_id);
            return Ok(());
        };
        match self.outcome {
            DeliveryOutcome::Response(payload) => {
                log::trace!(
                    "[DELIVERY] {}: response, {} bytes",
                    self.response_id,
                    payload.len()
                );
                ctx.metrics
                    .responses_delivered
                    .fetch_add(1, Ordering::Relaxed);
                (context.on_success)(payload);
            }
            DeliveryOutcome::Error(error) => {
                log::trace!("[DELIVERY] {}: {error}", self.response_id);
                (context.on_error)(error);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::reactor::testkit::{harness, loopback, StaticDirectory, StubSender};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn response_invokes_success_exactly_once() {
        let (ctx, _rx) = harness(
            QueueConfig::default(),
            Arc::new(StubSender::new()),
            Arc::new(StaticDirectory(Some(loopback()))),
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let id = ctx.correlation.allocate();
        let h = Arc::clone(&hits);
        ctx.correlation.register(
            id,
            Box::new(move |payload| {
                assert_eq!(payload, b"done");
                h.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(|_| panic!("error path must not fire")),
        );

        ResponseDeliveryTask::response(id, b"done".to_vec())
            .run(&ctx)
            .unwrap();
        // Duplicate response for the same id is a silent no-op.
        ResponseDeliveryTask::response(id, b"done".to_vec())
            .run(&ctx)
            .unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.metrics.snapshot().responses_delivered, 1);
    }

    #[test]
    fn error_outcome_takes_the_error_callback() {
        let (ctx, _rx) = harness(
            QueueConfig::default(),
            Arc::new(StubSender::new()),
            Arc::new(StaticDirectory(Some(loopback()))),
        );
        let hits = Arc::new(AtomicUsize::new(0));
        let id = ctx.correlation.allocate();
        let h = Arc::clone(&hits);
        ctx.correlation.register(
            id,
            Box::new(|_| panic!("success path must not fire")),
            Box::new(move |e| {
                assert!(matches!(e, DeliveryError::Expired));
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );

        ResponseDeliveryTask::expired(id).run(&ctx).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.correlation.outstanding(), 0);
    }

    #[test]
    fn unregistered_id_is_a_no_op() {
        let (ctx, _rx) = harness(
            QueueConfig::default(),
            Arc::new(StubSender::new()),
            Arc::new(StaticDirectory(Some(loopback()))),
        );
        ResponseDeliveryTask::response(ResponseId(404), Vec::new())
            .run(&ctx)
            .unwrap();
    }
}
