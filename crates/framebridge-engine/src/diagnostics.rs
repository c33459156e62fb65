//! Diagnostics sink.
//!
//! Every anomaly the bridge tolerates (bad frames, local faults, stray
//! replies, panicking callbacks, exhausted handshakes) is reported here
//! instead of being raised. Origin mismatches are never reported.

use framebridge_core::protocol::{CallId, EventKind};
use framebridge_core::BridgeError;

pub trait Diagnostics: Send + Sync {
    /// An accepted message could not be parsed, or its payload did not match
    /// the record shape for its event.
    fn malformed(&self, err: &BridgeError);

    /// A local API function failed while serving a remote call.
    fn invocation_failed(&self, name: &str, call_id: &CallId, err: &BridgeError);

    /// A return/error arrived for a call id with no pending entry.
    fn unmatched_reply(&self, event: EventKind, call_id: &CallId);

    /// A message could not be handed to the transport.
    fn send_failed(&self, event: EventKind, err: &BridgeError);

    /// A listener callback (user code included) panicked while handling
    /// `event`. Dispatch carries on with the next listener.
    fn listener_panicked(&self, event: EventKind);

    /// The remote never answered `request-api` within the retry ceiling.
    fn handshake_exhausted(&self, attempts: u32);
}

/// Default sink: forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn malformed(&self, err: &BridgeError) {
        tracing::warn!(code = err.code().as_str(), "dropping message: {err}");
    }

    fn invocation_failed(&self, name: &str, call_id: &CallId, err: &BridgeError) {
        tracing::warn!(%name, %call_id, "local function failed: {err}");
    }

    fn unmatched_reply(&self, event: EventKind, call_id: &CallId) {
        tracing::warn!(%event, %call_id, "reply for unknown call id ignored");
    }

    fn send_failed(&self, event: EventKind, err: &BridgeError) {
        tracing::warn!(%event, "send failed: {err}");
    }

    fn listener_panicked(&self, event: EventKind) {
        tracing::error!(%event, "listener panicked; message handling continues");
    }

    fn handshake_exhausted(&self, attempts: u32) {
        tracing::warn!(attempts, "remote api never arrived; handshake retries exhausted");
    }
}
