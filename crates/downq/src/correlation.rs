// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Response correlation table.
//!
//! Decouples the caller's callbacks from the task objects that perform the
//! actual send: tasks carry only a [`ResponseId`], and the callbacks are
//! claimed from this table exactly once when the outcome is known.
//!
//! The table is shared between the dispatch thread and the worker pool
//! (response delivery runs on the pool), hence the mutex. The callbacks are
//! `FnOnce + Send` but not `Sync`, so a plain locked map is the right shape:
//! `remove` hands out ownership of the entry, which is what makes
//! exactly-once delivery hold even when a purge races a late response.

use crate::error::DeliveryError;
use crate::request::ResponseId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Callback invoked with the peer's response payload.
pub type SuccessCallback = Box<dyn FnOnce(Vec<u8>) + Send>;

/// Callback invoked with the terminal delivery error.
pub type ErrorCallback = Box<dyn FnOnce(DeliveryError) + Send>;

/// The caller's success/error callback pair for one outstanding request.
pub struct ResponseContext {
    pub on_success: SuccessCallback,
    pub on_error: ErrorCallback,
}

impl std::fmt::Debug for ResponseContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResponseContext { .. }")
    }
}

/// Maps a response id to the callbacks registered at enqueue time.
pub struct ResponseCorrelationTable {
    entries: Mutex<HashMap<ResponseId, ResponseContext>>,
    next_id: AtomicU64,
}

impl ResponseCorrelationTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Allocate a fresh, table-unique response id.
    pub fn allocate(&self) -> ResponseId {
        ResponseId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Register the callback pair for `id`. Overwrites nothing: an id is
    /// registered once, right after allocation.
    pub fn register(&self, id: ResponseId, on_success: SuccessCallback, on_error: ErrorCallback) {
        self.entries.lock().insert(
            id,
            ResponseContext {
                on_success,
                on_error,
            },
        );
    }

    /// Claim the entry for `id`, removing it from the table.
    ///
    /// Returns `None` when the entry was already claimed (late response
    /// after a purge, double delivery race) or never registered. Callers
    /// treat that as a silent no-op.
    pub fn take(&self, id: ResponseId) -> Option<ResponseContext> {
        self.entries.lock().remove(&id)
    }

    /// Drop the entry for `id` without invoking anything.
    ///
    /// Used to roll back a registration when enqueue fails after the entry
    /// was created.
    pub fn discard(&self, id: ResponseId) {
        self.entries.lock().remove(&id);
    }

    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Default for ResponseCorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}
