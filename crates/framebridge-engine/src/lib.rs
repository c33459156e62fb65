//! framebridge engine.
//!
//! Runtime half of the bridge: the channel adapter over a pluggable
//! transport, deferred results, the local/remote API registry, the two-way
//! handshake and the `Bridge` facade tying them together. Consumed by the
//! facade crate, the demo binary and integration tests.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod bridge;
pub mod channel;
pub mod config;
pub mod deferred;
pub mod diagnostics;
pub mod handshake;
pub mod pending;
pub mod registry;

use std::sync::Arc;

pub use bridge::{Bridge, BridgeBuilder};
pub use channel::{LoopbackTransport, RawMessage, Transport};
pub use deferred::{Deferred, Promise};
pub use diagnostics::{Diagnostics, TracingDiagnostics};
pub use registry::{extract_local_api, LocalApi, RemoteFunction, RemoteProxy, Reply};

/// Build a bridge with default handshake timing and tracing diagnostics.
/// Nothing is sent until [`Bridge::init`].
pub fn create(
    local_api: LocalApi,
    transport: Arc<dyn Transport>,
    target_domain: impl Into<String>,
) -> Bridge {
    Bridge::builder(local_api, transport, target_domain).build()
}

/// A fresh unsettled deferred, for local functions that answer later.
pub fn defer() -> Deferred {
    Deferred::new()
}
