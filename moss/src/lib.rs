//! `moss` is a draft-09 (pre-RFC-7252) CoAP protocol engine for
//! constrained targets.
//!
//! The engine sits between an application that produces and consumes
//! logical CoAP messages and a datagram transport that moves opaque
//! packets. It owns all temporal protocol state:
//! - outstanding Confirmable messages and their exponential-backoff
//!   retransmission schedule,
//! - a short-TTL window of recently seen `(peer, message id)` pairs for
//!   duplicate suppression,
//! - partially transferred blockwise payloads, outbound and inbound.
//!
//! The host integrates it by calling three entry points from a single
//! execution context: [`Engine::send`], [`Engine::handle_rx`] and
//! [`Engine::tick`] (on whatever cadence suits the platform; a few
//! hundred milliseconds is typical). No call blocks; outbound I/O goes
//! through the host's [`Transport`](net::Transport) and the clock is
//! whatever [`embedded_time::Clock`] the host provides.
//!
//! The pure wire layer lives in [`moss_msg`], re-exported as [`msg`].

#![cfg_attr(not(test), no_std)]
#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
#![cfg_attr(not(test), deny(unsafe_code))]
#![cfg_attr(not(test), warn(unreachable_pub))]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]

extern crate alloc as std_alloc;

pub use moss_msg as msg;

/// blockwise transfer state, outbound and inbound
#[cfg(feature = "block")]
#[cfg_attr(any(docsrs, feature = "docs"), doc(cfg(feature = "block")))]
pub mod block;

/// engine configuration
pub mod config;

/// the engine itself
pub mod core;

/// the recently-seen window that suppresses duplicate deliveries
pub mod dedup;

/// peer addressing and the outbound transport seam
pub mod net;

/// retransmission of unacknowledged Confirmables
#[cfg(feature = "resend")]
#[cfg_attr(any(docsrs, feature = "docs"), doc(cfg(feature = "resend")))]
pub mod resend;

/// customizable retrying of fallible operations
pub mod retry;

/// clock plumbing
pub mod time;

#[doc(inline)]
pub use crate::config::Config;
#[doc(inline)]
pub use crate::core::{Engine, Error, Event};
#[doc(inline)]
pub use crate::net::{Addrd, Transport};
