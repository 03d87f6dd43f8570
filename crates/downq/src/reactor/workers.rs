// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-size worker pool for blocking tasks.
//!
//! Workers share one feed channel; each runs tasks to completion and
//! reports failures through the reactor metrics. The pool never executes
//! non-blocking work, that stays on the dispatch thread. The feed is
//! unbounded: the dispatch thread must never block forwarding into it,
//! because workers in turn submit follow-ups back to dispatch. Its depth
//! is bounded by the one-attempt-per-peer invariant anyway.

use super::ReactorContext;
use crate::task::Task;
use crossbeam::channel::{self, Receiver, Sender};
use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) struct WorkerPool {
    feed: Sender<Task>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn start(size: usize, ctx: Arc<ReactorContext>) -> io::Result<Self> {
        let (feed, rx) = channel::unbounded::<Task>();
        let mut handles = Vec::with_capacity(size);
        for idx in 0..size {
            let rx = rx.clone();
            let ctx = Arc::clone(&ctx);
            let handle = std::thread::Builder::new()
                .name(format!("downq-worker-{idx}"))
                .spawn(move || worker_loop(idx, &rx, &ctx))?;
            handles.push(handle);
        }
        log::debug!("[REACTOR] worker pool up ({size} worker(s))");
        Ok(Self { feed, handles })
    }

    /// Clone of the feed endpoint for the dispatch thread. Sending never
    /// blocks; it fails only once every worker is gone.
    pub fn injector(&self) -> Sender<Task> {
        self.feed.clone()
    }

    /// Disconnect the feed and wait up to `grace` for the workers to drain.
    /// Workers still busy after the grace period are detached and logged,
    /// not failed: a blocking send may legitimately outlive shutdown.
    pub fn shutdown(self, grace: Duration) {
        drop(self.feed);
        let deadline = Instant::now() + grace;
        for handle in self.handles {
            while !handle.is_finished() && Instant::now() < deadline {
                std::thread::sleep(JOIN_POLL_INTERVAL);
            }
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                log::warn!(
                    "[REACTOR] worker '{}' still busy after grace period; detaching",
                    handle.thread().name().unwrap_or("downq-worker")
                );
            }
        }
    }
}

fn worker_loop(idx: usize, rx: &Receiver<Task>, ctx: &ReactorContext) {
    log::trace!("[REACTOR] worker {idx} up");
    while let Ok(task) = rx.recv() {
        let kind = task.kind();
        if let Err(e) = task.run(ctx) {
            ctx.metrics.tasks_failed.fetch_add(1, Ordering::Relaxed);
            log::error!("[REACTOR] {kind} task failed on worker {idx}: {e}");
        }
    }
    log::trace!("[REACTOR] worker {idx} exiting");
}
