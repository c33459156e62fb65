//! API registry: what this context exposes, and what the remote exposes.
//!
//! The local side is an explicit, ordered registration list. The remote
//! side is a flat proxy built from the name list the remote sent during the
//! handshake; every proxy function forwards to the bridge.

pub mod local;
pub mod proxy;

pub use local::{extract_local_api, LocalApi, LocalFn, Reply};
pub use proxy::{build_remote_proxy, Invoker, RemoteFunction, RemoteProxy};
