//! Envelope (JSON text frame).
//!
//! Inbound envelopes keep `data` as `RawValue` so each listener parses only
//! the record shape it cares about.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{BridgeError, Result};

/// Fixed set of event kinds carried in `event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Init,
    /// Reserved, never emitted.
    ChildReady,
    RequestApi,
    Api,
    ApiReceived,
    CallFunction,
    ReturnValue,
    ReturnError,
}

impl EventKind {
    /// Wire name of the event.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Init => "init",
            EventKind::ChildReady => "child-ready",
            EventKind::RequestApi => "request-api",
            EventKind::Api => "api",
            EventKind::ApiReceived => "api-received",
            EventKind::CallFunction => "call-function",
            EventKind::ReturnValue => "return-value",
            EventKind::ReturnError => "return-error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub event: EventKind,
    /// Optional payload, stored as raw JSON (lazy parsing).
    #[serde(default)]
    pub data: Option<Box<RawValue>>,
}

impl Envelope {
    /// Parse a serialized envelope received from the channel.
    pub fn parse(s: &str) -> Result<Self> {
        serde_json::from_str(s)
            .map_err(|e| BridgeError::Malformed(format!("invalid envelope json: {e}")))
    }

    pub fn data(&self) -> Option<&RawValue> {
        self.data.as_deref()
    }
}

#[derive(Serialize)]
struct OutboundEnvelope<'a, T: Serialize> {
    event: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a T>,
}

/// Serialize an outbound envelope. `data` is omitted when `None`.
pub fn encode_envelope<T: Serialize>(event: EventKind, data: Option<&T>) -> Result<String> {
    serde_json::to_string(&OutboundEnvelope { event, data })
        .map_err(|e| BridgeError::Internal(format!("envelope encode failed: {e}")))
}

/// Decode an envelope payload into the record type expected for its event.
pub fn decode_data<T: DeserializeOwned>(event: EventKind, data: Option<&RawValue>) -> Result<T> {
    let raw = data.ok_or_else(|| BridgeError::Malformed(format!("{event} requires data")))?;
    serde_json::from_str(raw.get())
        .map_err(|e| BridgeError::Malformed(format!("{event} invalid data: {e}")))
}
