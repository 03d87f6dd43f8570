// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Unit-of-work types executed by the reactor.
//!
//! Every mutation of queue state happens inside a task, and every task that
//! touches the queue runs inline on the dispatch thread. The two task kinds
//! that talk to the outside world (sending a request, delivering a response
//! to application callbacks) declare themselves blocking and run on the
//! worker pool instead; they never touch the queue directly, only submit
//! follow-up tasks.

mod deferred;
mod delivery;
mod processing;
mod purge;
mod sending;
mod transition;

pub use deferred::DeferredTask;
pub use delivery::{DeliveryOutcome, ResponseDeliveryTask};
pub use processing::ProcessingTask;
pub use purge::PurgeTask;
pub use sending::SendingTask;
pub use transition::{StateTransitionTask, TransitionAction};

use crate::error::Result;
use crate::reactor::ReactorContext;

#[derive(Debug)]
pub enum Task {
    /// Walk one peer's queue and decide what happens next.
    Processing(ProcessingTask),
    /// Apply a single lifecycle edge (or insert a new request).
    StateTransition(StateTransitionTask),
    /// Perform one downlink attempt. Blocking.
    Sending(SendingTask),
    /// Hand a response or a terminal error to application callbacks.
    /// Blocking, because callbacks are application code.
    ResponseDelivery(ResponseDeliveryTask),
    /// Drop everything queued for one peer.
    Purge(PurgeTask),
    /// Re-enter an inner task through the defer timer.
    Deferred(DeferredTask),
}

impl Task {
    /// Whether this task may stall the thread running it. Blocking tasks go
    /// to the worker pool; everything else runs inline on dispatch.
    #[must_use]
    pub fn would_block(&self) -> bool {
        matches!(self, Task::Sending(_) | Task::ResponseDelivery(_))
    }

    /// Short name for log lines.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Task::Processing(_) => "processing",
            Task::StateTransition(_) => "transition",
            Task::Sending(_) => "sending",
            Task::ResponseDelivery(_) => "delivery",
            Task::Purge(_) => "purge",
            Task::Deferred(_) => "deferred",
        }
    }

    pub(crate) fn run(self, ctx: &ReactorContext) -> Result<()> {
        match self {
            Task::Processing(t) => t.run(ctx),
            Task::StateTransition(t) => t.run(ctx),
            Task::Sending(t) => t.run(ctx),
            Task::ResponseDelivery(t) => t.run(ctx),
            Task::Purge(t) => t.run(ctx),
            Task::Deferred(t) => t.run(ctx),
        }
    }
}
