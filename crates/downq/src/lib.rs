// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # downq - Queue-mode downlink delivery
//!
//! Server-side delivery core for devices that sleep. Downlink operations
//! addressed to a peer are queued until the peer checks in, then delivered
//! one at a time with bounded time budgets, and the response (or a terminal
//! error) is handed back to the caller exactly once.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use downq::{DownlinkQueue, Peer, QueueConfig, Result};
//! use std::sync::Arc;
//!
//! fn main() -> Result<()> {
//!     let queue = DownlinkQueue::start(
//!         QueueConfig::from_env(),
//!         Arc::new(transport()),   // your DownlinkSender
//!         Arc::new(registry()),    // your PeerDirectory
//!     )?;
//!
//!     queue.enqueue(
//!         Peer::from("urn:dev:os:0023-7"),
//!         &b"write /3/0/7"[..],
//!         None,
//!         None,
//!         |response| println!("delivered, {} bytes back", response.len()),
//!         |err| eprintln!("gave up: {err}"),
//!     )?;
//!     Ok(())
//! }
//! # use downq::{DownlinkSender, PeerAddress, PeerDirectory, SendError};
//! # use std::time::Duration;
//! # struct T; struct R;
//! # impl DownlinkSender for T {
//! #     fn send(&self, _: &PeerAddress, _: &[u8], _: Duration)
//! #         -> std::result::Result<Option<Vec<u8>>, SendError> { Ok(None) }
//! # }
//! # impl PeerDirectory for R {
//! #     fn resolve(&self, _: &Peer) -> Option<PeerAddress> { None }
//! # }
//! # fn transport() -> T { T }
//! # fn registry() -> R { R }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                     DownlinkQueue (facade)                   |
//! |        enqueue | peer_reachable | purge | stop               |
//! +--------------------------------------------------------------+
//! |                        QueueReactor                          |
//! |  command channel -> dispatch thread (inline: queue walks,    |
//! |  state edges, purge) -> worker pool (blocking: send attempts,|
//! |  callback delivery)            defer timer (delayed re-entry)|
//! +--------------------------------------------------------------+
//! |   RequestQueue (per-peer FIFO) | ResponseCorrelationTable    |
//! +--------------------------------------------------------------+
//! |     DownlinkSender + PeerDirectory (application-provided)    |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DownlinkQueue`] | Entry point: start, enqueue, wake, purge, stop |
//! | [`QueueConfig`] | Worker count, time budgets, defer period |
//! | [`DownlinkSender`] | Transport hook performing one delivery attempt |
//! | [`PeerDirectory`] | Registration hook resolving a peer to an address |
//! | [`QueueRequest`] | A queued operation and its lifecycle state |
//!
//! ## Delivery guarantees
//!
//! - Per peer, at most one delivery attempt is in flight at a time, and
//!   attempts start in enqueue order.
//! - Exactly one of the two callbacks passed to
//!   [`enqueue`](DownlinkQueue::enqueue) fires, exactly once.
//! - A request past its keep budget is discarded even if its send window
//!   is still open.

// Clippy: No blanket suppressions. Fix issues properly or use inline #[allow] with justification.

/// Application-facing facade ([`DownlinkQueue`]).
mod api;
/// Runtime configuration and environment overrides.
pub mod config;
/// Response correlation table (callback registry).
mod correlation;
/// Error taxonomy.
mod error;
/// Per-peer request queue.
mod queue;
/// Reactor: dispatch thread, worker pool, defer timer, metrics.
pub mod reactor;
/// Request entity and lifecycle state machine.
mod request;
/// Transport and registration interfaces.
mod sender;
/// Unit-of-work types executed by the reactor.
pub mod task;

pub use api::DownlinkQueue;
pub use config::QueueConfig;
pub use error::{DeliveryError, DownqError, Result};
pub use reactor::{MetricsSnapshot, QueueReactor, ReactorHandle};
pub use request::{Peer, QueueRequest, RequestId, RequestState, ResponseId};
pub use sender::{DownlinkSender, PeerAddress, PeerDirectory, SendError};
