//! Top-level facade crate for framebridge.
//!
//! Re-exports the protocol types and the bridge engine so users can depend
//! on a single crate. The common entry points are lifted to the root.

pub mod core {
    pub use framebridge_core::*;
}

pub mod engine {
    pub use framebridge_engine::*;
}

pub use framebridge_core::{BridgeError, ErrorCode, Result};
pub use framebridge_engine::{
    create, defer, Bridge, Deferred, LocalApi, LoopbackTransport, Promise, RawMessage,
    RemoteProxy, Reply, Transport,
};
