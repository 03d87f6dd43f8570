// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared harness for the integration tests: a scriptable in-memory
//! transport, a fixed peer directory, and a polling helper.

// Not every test binary uses every helper.
#![allow(dead_code)]

use downq::{DownlinkSender, Peer, PeerAddress, PeerDirectory, SendError};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub type SendOutcome = Result<Option<Vec<u8>>, SendError>;

/// In-memory transport. Outcomes are replayed from a script; once the
/// script is exhausted every attempt succeeds with payload `b"ack"`.
/// Tracks payload order and concurrent attempts.
pub struct TestSender {
    script: Mutex<VecDeque<SendOutcome>>,
    pub sent: Mutex<Vec<Vec<u8>>>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl TestSender {
    pub fn new() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn scripted(outcomes: Vec<SendOutcome>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            sent: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Hold each attempt open for `delay`, making overlap observable.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl DownlinkSender for TestSender {
    fn send(&self, _addr: &PeerAddress, operation: &[u8], _timeout: Duration) -> SendOutcome {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.sent.lock().push(operation.to_vec());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or(Ok(Some(b"ack".to_vec())))
    }
}

/// Directory with a fixed peer -> address table.
pub struct TestDirectory {
    table: HashMap<String, PeerAddress>,
}

impl TestDirectory {
    pub fn with_peers(peers: &[&str]) -> Self {
        let table = peers
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let addr: PeerAddress = format!("127.0.0.1:{}", 40000 + i)
                    .parse()
                    .expect("static addr");
                ((*p).to_string(), addr)
            })
            .collect();
        Self { table }
    }

    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }
}

impl PeerDirectory for TestDirectory {
    fn resolve(&self, peer: &Peer) -> Option<PeerAddress> {
        self.table.get(peer.endpoint()).copied()
    }
}

/// Poll `cond` every 10ms until it holds or `timeout` lapses.
pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}
