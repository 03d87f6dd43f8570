// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Defer timer: delayed re-submission into the reactor's own queue.
//!
//! A dedicated thread holds a due-ordered heap of deferred tasks and, when
//! one comes due, pushes it back through the reactor command channel. The
//! deferred task therefore executes under the dispatch thread's usual
//! serialization instead of on the timer thread itself, which would race
//! with dispatch-thread work.

use super::Command;
use crate::error::{DownqError, Result};
use crate::task::Task;
use crossbeam::channel::Sender;
use parking_lot::{Condvar, Mutex};
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

struct DeferredEntry {
    due: Instant,
    /// Tie-breaker keeping equal-deadline entries in schedule order.
    seq: u64,
    task: Task,
}

impl PartialEq for DeferredEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for DeferredEntry {}

impl PartialOrd for DeferredEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for DeferredEntry {
    // Reversed so the BinaryHeap (a max-heap) pops the earliest deadline.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct TimerState {
    entries: BinaryHeap<DeferredEntry>,
    running: bool,
    seq: u64,
}

struct TimerShared {
    state: Mutex<TimerState>,
    condvar: Condvar,
}

/// Cloneable scheduling endpoint handed to tasks via the reactor handle.
#[derive(Clone)]
pub struct TimerHandle {
    shared: Arc<TimerShared>,
}

impl TimerHandle {
    /// Queue `task` for re-submission after `delay`.
    pub fn schedule(&self, delay: Duration, task: Task) -> Result<()> {
        let mut state = self.shared.state.lock();
        if !state.running {
            return Err(DownqError::ReactorShutDown);
        }
        state.seq += 1;
        let entry = DeferredEntry {
            due: Instant::now() + delay,
            seq: state.seq,
            task,
        };
        state.entries.push(entry);
        drop(state);
        self.shared.condvar.notify_one();
        Ok(())
    }

    /// Detached handle whose entries are never drained. Test seam only.
    #[cfg(test)]
    pub(crate) fn standalone() -> Self {
        Self {
            shared: new_shared(),
        }
    }

    /// Number of not-yet-due entries.
    #[cfg(test)]
    pub(crate) fn scheduled(&self) -> usize {
        self.shared.state.lock().entries.len()
    }
}

fn new_shared() -> Arc<TimerShared> {
    Arc::new(TimerShared {
        state: Mutex::new(TimerState {
            entries: BinaryHeap::new(),
            running: true,
            seq: 0,
        }),
        condvar: Condvar::new(),
    })
}

/// Owns the timer thread lifecycle.
pub(crate) struct DeferTimer {
    shared: Arc<TimerShared>,
    handle: Option<JoinHandle<()>>,
}

impl DeferTimer {
    pub fn start(reactor_tx: Sender<Command>) -> io::Result<Self> {
        let shared = new_shared();
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("downq-timer".to_string())
            .spawn(move || timer_loop(&thread_shared, &reactor_tx))?;
        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn handle(&self) -> TimerHandle {
        TimerHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Signal the thread to exit and join it. Pending entries are dropped;
    /// their count is logged for the curious.
    pub fn stop(&mut self) {
        let pending = {
            let mut state = self.shared.state.lock();
            state.running = false;
            state.entries.len()
        };
        self.condvar_wake();
        if pending > 0 {
            log::debug!("[TIMER] stopping with {pending} deferred task(s) dropped");
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn condvar_wake(&self) {
        self.shared.condvar.notify_one();
    }
}

impl Drop for DeferTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn timer_loop(shared: &TimerShared, reactor_tx: &Sender<Command>) {
    log::trace!("[TIMER] defer timer up");
    loop {
        let task = {
            let mut state = shared.state.lock();
            loop {
                if !state.running {
                    log::trace!("[TIMER] defer timer exiting");
                    return;
                }
                let now = Instant::now();
                match state.entries.peek().map(|e| e.due) {
                    None => {
                        shared.condvar.wait(&mut state);
                    }
                    Some(due) if due > now => {
                        shared.condvar.wait_until(&mut state, due);
                    }
                    Some(_) => {
                        if let Some(entry) = state.entries.pop() {
                            break entry.task;
                        }
                    }
                }
            }
        };
        if reactor_tx.send(Command::Run(task)).is_err() {
            log::debug!("[TIMER] reactor channel closed; dropping deferred task");
            return;
        }
    }
}
