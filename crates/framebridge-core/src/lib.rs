//! framebridge core: wire protocol primitives and the shared error type.
//!
//! This crate defines the envelope format exchanged between the two bridged
//! contexts and the error surface used by the engine. It carries no runtime
//! or transport dependencies so both sides of a bridge can share it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Malformed input
//! from the channel surfaces as `BridgeError::Malformed` instead of crashing
//! the listener loop.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{BridgeError, ErrorCode, Result};
