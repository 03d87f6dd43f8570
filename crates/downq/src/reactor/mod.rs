// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Queue reactor: single dispatch thread plus a fixed-size worker pool.
//!
//! One command channel feeds one named dispatch thread. Non-blocking tasks
//! run inline on that thread, which is what gives them their total ordering
//! guarantee and serializes every queue mutation without locks. Tasks that
//! self-declare as blocking (`would_block()`) are handed to a fixed worker
//! pool and may run concurrently with each other and with dispatch work.
//!
//! Both channels are unbounded. Tasks running inline submit follow-ups into
//! the command channel and workers submit follow-ups while dispatch may be
//! forwarding to their feed, so a bounded channel on either side would let
//! the two loops fill each other up and block permanently. Depth stays small
//! in practice: at most one attempt per peer is in flight at a time.
//!
//! ```text
//!  submit()            +------------------+      would_block = false
//!  (any thread) ---->  | command channel  | ---> run inline, in order
//!                      +------------------+  \
//!        ^                                    \ would_block = true
//!        |                                     +--> worker pool (N threads)
//!  +-----------+                                         |
//!  | DeferTimer| <--- submit_after() ---- tasks ---------+
//!  +-----------+      (delayed re-entry through the same channel)
//! ```

mod metrics;
mod timer;
mod workers;

pub use metrics::{MetricsSnapshot, ReactorMetrics};
pub use timer::TimerHandle;

use crate::config::QueueConfig;
use crate::correlation::ResponseCorrelationTable;
use crate::error::{DownqError, Result};
use crate::queue::RequestQueue;
use crate::request::{Peer, QueueRequest};
use crate::sender::{DownlinkSender, PeerDirectory};
use crate::task::Task;
use crossbeam::channel::{self, Receiver, Sender};
use dashmap::DashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use timer::DeferTimer;
use workers::WorkerPool;

/// Grace period applied when the reactor is dropped without an explicit
/// `stop()`.
const DROP_STOP_GRACE: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub(crate) enum Command {
    Run(Task),
    Shutdown,
}

/// Cloneable submission endpoint, safe to use from any thread (including
/// from within a task running on the worker pool).
#[derive(Clone)]
pub struct ReactorHandle {
    tx: Sender<Command>,
    timer: TimerHandle,
}

impl ReactorHandle {
    /// Enqueue a task for dispatch. Never blocks; fails only after shutdown.
    pub fn submit(&self, task: Task) -> Result<()> {
        self.tx
            .send(Command::Run(task))
            .map_err(|_| DownqError::ReactorShutDown)
    }

    /// Re-enter `task` through the command channel after `delay`.
    pub fn submit_after(&self, delay: Duration, task: Task) -> Result<()> {
        self.timer.schedule(delay, task)
    }
}

/// Everything a task needs at run time: the shared state, the collaborator
/// interfaces, and the way back into the reactor. Constructed once per
/// reactor instance and passed by reference to every task execution.
pub struct ReactorContext {
    pub(crate) queue: RequestQueue,
    pub(crate) correlation: ResponseCorrelationTable,
    pub(crate) sender: Arc<dyn DownlinkSender>,
    pub(crate) directory: Arc<dyn PeerDirectory>,
    pub(crate) config: QueueConfig,
    pub(crate) metrics: Arc<ReactorMetrics>,
    /// Earliest fire time of the timer-driven revisit walk armed per peer.
    /// At most one outstanding revisit per peer; arming again only ever
    /// moves the fire time earlier.
    pub(crate) armed_walks: DashMap<Peer, Instant>,
    handle: ReactorHandle,
}

impl ReactorContext {
    pub(crate) fn submit(&self, task: Task) -> Result<()> {
        self.handle.submit(task)
    }

    pub(crate) fn submit_after(&self, delay: Duration, task: Task) -> Result<()> {
        self.handle.submit_after(delay, task)
    }
}

/// The scheduler owning the dispatch thread, the worker pool, and the defer
/// timer.
pub struct QueueReactor {
    ctx: Arc<ReactorContext>,
    tx: Sender<Command>,
    dispatch: Option<JoinHandle<()>>,
    workers: Option<WorkerPool>,
    timer: Option<DeferTimer>,
}

impl QueueReactor {
    /// Validate the configuration and spin up the dispatch thread, the
    /// worker pool and the defer timer.
    pub fn start(
        config: QueueConfig,
        sender: Arc<dyn DownlinkSender>,
        directory: Arc<dyn PeerDirectory>,
    ) -> Result<Self> {
        config.validate()?;

        let (tx, rx) = channel::unbounded();
        let timer = DeferTimer::start(tx.clone())?;
        let handle = ReactorHandle {
            tx: tx.clone(),
            timer: timer.handle(),
        };
        let ctx = Arc::new(ReactorContext {
            queue: RequestQueue::new(),
            correlation: ResponseCorrelationTable::new(),
            sender,
            directory,
            config: config.clone(),
            metrics: Arc::new(ReactorMetrics::new()),
            armed_walks: DashMap::new(),
            handle,
        });

        let workers = WorkerPool::start(config.workers, Arc::clone(&ctx))?;
        let feed = workers.injector();
        let dispatch_ctx = Arc::clone(&ctx);
        let dispatch = std::thread::Builder::new()
            .name("downq-dispatch".to_string())
            .spawn(move || dispatch_loop(&rx, &feed, &dispatch_ctx))?;

        log::debug!("[REACTOR] started ({} worker(s))", config.workers);
        Ok(Self {
            ctx,
            tx,
            dispatch: Some(dispatch),
            workers: Some(workers),
            timer: Some(timer),
        })
    }

    /// Submit a task from any thread.
    pub fn submit(&self, task: Task) -> Result<()> {
        self.ctx.handle.submit(task)
    }

    /// A cloneable submission endpoint that outlives borrows of the reactor.
    #[must_use]
    pub fn handle(&self) -> ReactorHandle {
        self.ctx.handle.clone()
    }

    /// Counter snapshot.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// Snapshot of a peer's queue, insertion-ordered.
    #[must_use]
    pub fn requests_for(&self, peer: &Peer) -> Vec<QueueRequest> {
        self.ctx.queue.requests_for(peer)
    }

    /// Number of requests currently queued for `peer`.
    #[must_use]
    pub fn pending(&self, peer: &Peer) -> usize {
        self.ctx.queue.pending(peer)
    }

    /// Peers with at least one queued request.
    #[must_use]
    pub fn peers(&self) -> Vec<Peer> {
        self.ctx.queue.peers()
    }

    /// True when no peer has queued requests.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.ctx.queue.is_empty()
    }

    pub(crate) fn context(&self) -> &Arc<ReactorContext> {
        &self.ctx
    }

    /// Stop the dispatch thread, then shut the timer and the worker pool
    /// down within `grace`. Workers still busy after the grace period are
    /// logged and detached, not failed.
    pub fn stop(mut self, grace: Duration) {
        log::debug!("[REACTOR] stop requested (grace {grace:?})");
        self.shutdown(grace);
    }

    fn shutdown(&mut self, grace: Duration) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(dispatch) = self.dispatch.take() {
            let _ = dispatch.join();
        }
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
        if let Some(workers) = self.workers.take() {
            workers.shutdown(grace);
        }
        let undelivered = self.ctx.correlation.outstanding();
        if undelivered > 0 {
            log::debug!("[REACTOR] {undelivered} callback pair(s) undelivered at shutdown");
        }
    }
}

impl Drop for QueueReactor {
    fn drop(&mut self) {
        if self.dispatch.is_some() {
            self.shutdown(DROP_STOP_GRACE);
        }
    }
}

fn dispatch_loop(rx: &Receiver<Command>, feed: &Sender<Task>, ctx: &Arc<ReactorContext>) {
    log::debug!("[REACTOR] dispatch thread up");
    while let Ok(command) = rx.recv() {
        match command {
            Command::Shutdown => break,
            Command::Run(task) => {
                if task.would_block() {
                    ctx.metrics.tasks_offloaded.fetch_add(1, Ordering::Relaxed);
                    if let Err(rejected) = feed.send(task) {
                        log::error!(
                            "[REACTOR] worker pool unavailable; dropping {} task",
                            rejected.into_inner().kind()
                        );
                    }
                } else {
                    ctx.metrics.tasks_inline.fetch_add(1, Ordering::Relaxed);
                    let kind = task.kind();
                    if let Err(e) = task.run(ctx) {
                        ctx.metrics.tasks_failed.fetch_add(1, Ordering::Relaxed);
                        log::error!("[REACTOR] {kind} task failed: {e}");
                    }
                }
            }
        }
    }
    log::debug!("[REACTOR] dispatch thread exiting");
}

#[cfg(test)]
pub(crate) mod testkit {
    //! Shared stubs for unit tests: a scriptable sender, a fixed directory,
    //! and a reactor context wired to a channel the test drains by hand.

    use super::*;
    use crate::sender::{PeerAddress, SendError};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    pub(crate) type SendOutcome = std::result::Result<Option<Vec<u8>>, SendError>;

    /// Sender that replays scripted outcomes; defaults to success with
    /// payload `b"ok"` once the script is exhausted.
    pub(crate) struct StubSender {
        pub outcomes: Mutex<VecDeque<SendOutcome>>,
        pub sent: Mutex<Vec<Vec<u8>>>,
    }

    impl StubSender {
        pub fn new() -> Self {
            Self {
                outcomes: Mutex::new(VecDeque::new()),
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn scripted(outcomes: Vec<SendOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl DownlinkSender for StubSender {
        fn send(&self, _addr: &PeerAddress, operation: &[u8], _timeout: Duration) -> SendOutcome {
            self.sent.lock().push(operation.to_vec());
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or(Ok(Some(b"ok".to_vec())))
        }
    }

    pub(crate) struct StaticDirectory(pub Option<PeerAddress>);

    impl PeerDirectory for StaticDirectory {
        fn resolve(&self, _peer: &Peer) -> Option<PeerAddress> {
            self.0
        }
    }

    pub(crate) fn loopback() -> PeerAddress {
        "127.0.0.1:5683".parse().expect("static addr")
    }

    /// Context wired to a channel the test drains itself: no threads, fully
    /// deterministic task execution.
    pub(crate) fn harness(
        config: QueueConfig,
        sender: Arc<dyn DownlinkSender>,
        directory: Arc<dyn PeerDirectory>,
    ) -> (Arc<ReactorContext>, Receiver<Command>) {
        let (tx, rx) = channel::unbounded();
        let ctx = Arc::new(ReactorContext {
            queue: RequestQueue::new(),
            correlation: ResponseCorrelationTable::new(),
            sender,
            directory,
            config,
            metrics: Arc::new(ReactorMetrics::new()),
            armed_walks: DashMap::new(),
            handle: ReactorHandle {
                tx,
                timer: TimerHandle::standalone(),
            },
        });
        (ctx, rx)
    }

    /// Pop the next submitted task, if any.
    pub(crate) fn next_task(rx: &Receiver<Command>) -> Option<Task> {
        match rx.try_recv() {
            Ok(Command::Run(task)) => Some(task),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testkit::{loopback, StaticDirectory, StubSender};
    use super::*;
    use crate::task::ProcessingTask;

    fn small_config() -> QueueConfig {
        QueueConfig::default().with_workers(2)
    }

    #[test]
    fn start_and_stop_is_clean() {
        let reactor = QueueReactor::start(
            small_config(),
            Arc::new(StubSender::new()),
            Arc::new(StaticDirectory(Some(loopback()))),
        )
        .unwrap();
        reactor.stop(Duration::from_secs(1));
    }

    #[test]
    fn context_is_shareable_across_reactor_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ReactorContext>();
    }

    #[test]
    fn invalid_config_refuses_to_start() {
        let err = QueueReactor::start(
            QueueConfig::default().with_workers(0),
            Arc::new(StubSender::new()),
            Arc::new(StaticDirectory(None)),
        )
        .err()
        .expect("zero workers must be rejected");
        assert!(matches!(err, DownqError::InvalidConfig(_)));
    }

    #[test]
    fn submit_after_stop_is_rejected() {
        let reactor = QueueReactor::start(
            small_config(),
            Arc::new(StubSender::new()),
            Arc::new(StaticDirectory(Some(loopback()))),
        )
        .unwrap();
        let handle = reactor.handle();
        reactor.stop(Duration::from_secs(1));

        // The dispatch thread is gone; the channel receiver was dropped
        // with it, so a late submission fails instead of queueing forever.
        let err = handle
            .submit(Task::Processing(ProcessingTask::new(
                Peer::from("dev-1"),
                true,
            )))
            .unwrap_err();
        assert!(matches!(err, DownqError::ReactorShutDown));
    }

    #[test]
    fn drop_without_stop_does_not_hang() {
        let reactor = QueueReactor::start(
            small_config(),
            Arc::new(StubSender::new()),
            Arc::new(StaticDirectory(Some(loopback()))),
        )
        .unwrap();
        drop(reactor);
    }
}
