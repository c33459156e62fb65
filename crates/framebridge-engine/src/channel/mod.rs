//! Channel layer.
//!
//! `Transport` is what the embedding code provides (a window's
//! `postMessage`, a socket, an in-process pipe). `ChannelAdapter` turns it
//! into an origin-filtered publish/subscribe surface over envelope events.

pub mod adapter;
pub mod loopback;
pub mod transport;

pub use adapter::{listener, ChannelAdapter, Listener};
pub use loopback::LoopbackTransport;
pub use transport::{RawMessage, Transport};
