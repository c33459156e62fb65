#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use framebridge_core::protocol::{CallId, EventKind};
use framebridge_core::{BridgeError, Result};
use framebridge_engine::{Bridge, Diagnostics, LocalApi, LoopbackTransport, RawMessage, Transport};

pub const REMOTE: &str = "https://frame.example";

/// Records every post; never yields inbound messages. Tests feed the bridge
/// directly through `Bridge::receive`.
#[derive(Default)]
pub struct ScriptedTransport {
    sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl ScriptedTransport {
    /// Every posted envelope, parsed.
    pub fn envelopes(&self) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| serde_json::from_str(text).unwrap())
            .collect()
    }

    pub fn sent_with(&self, event: &str) -> Vec<Value> {
        self.envelopes()
            .into_iter()
            .filter(|env| env["event"] == event)
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.sent_with(event).len()
    }

    pub fn targets(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    fn post(&self, message: String, target_origin: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BridgeError::Transport("scripted failure".into()));
        }
        self.sent.lock().unwrap().push((message, target_origin.to_owned()));
        Ok(())
    }

    async fn recv(&self) -> Option<RawMessage> {
        std::future::pending().await
    }
}

/// Loopback end that also keeps a copy of everything it posts.
pub struct TapTransport {
    inner: LoopbackTransport,
    sent: Mutex<Vec<String>>,
}

impl TapTransport {
    pub fn new(inner: LoopbackTransport) -> Self {
        Self {
            inner,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn count(&self, event: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|text| serde_json::from_str::<Value>(text).unwrap())
            .filter(|env| env["event"] == event)
            .count()
    }
}

#[async_trait]
impl Transport for TapTransport {
    fn post(&self, message: String, target_origin: &str) -> Result<()> {
        self.sent.lock().unwrap().push(message.clone());
        self.inner.post(message, target_origin)
    }

    async fn recv(&self) -> Option<RawMessage> {
        self.inner.recv().await
    }
}

#[derive(Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<String>>,
}

impl RecordingDiagnostics {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, s: String) {
        self.events.lock().unwrap().push(s);
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn malformed(&self, err: &BridgeError) {
        self.push(format!("malformed:{}", err.code().as_str()));
    }

    fn invocation_failed(&self, name: &str, _call_id: &CallId, err: &BridgeError) {
        self.push(format!("invocation_failed:{name}:{}", err.code().as_str()));
    }

    fn unmatched_reply(&self, event: EventKind, call_id: &CallId) {
        self.push(format!("unmatched:{event}:{call_id}"));
    }

    fn send_failed(&self, event: EventKind, _err: &BridgeError) {
        self.push(format!("send_failed:{event}"));
    }

    fn listener_panicked(&self, event: EventKind) {
        self.push(format!("listener_panicked:{event}"));
    }

    fn handshake_exhausted(&self, attempts: u32) {
        self.push(format!("exhausted:{attempts}"));
    }
}

pub struct Harness {
    pub bridge: Bridge,
    pub transport: Arc<ScriptedTransport>,
    pub diagnostics: Arc<RecordingDiagnostics>,
}

impl Harness {
    pub fn new(local_api: LocalApi) -> Self {
        let transport = Arc::new(ScriptedTransport::default());
        let diagnostics = Arc::new(RecordingDiagnostics::default());
        let bridge = Bridge::builder(local_api, transport.clone(), REMOTE)
            .diagnostics(diagnostics.clone())
            .build();
        Self {
            bridge,
            transport,
            diagnostics,
        }
    }

    /// Deliver one envelope as if the remote had posted it.
    pub fn inject(&self, text: &str) {
        self.bridge.receive(&RawMessage::new(REMOTE, text));
    }

    /// Play the remote's side of a full handshake.
    pub fn complete_handshake(&self, remote_api: &[&str]) {
        let api = serde_json::to_string(remote_api).unwrap();
        self.inject(&format!(r#"{{"event":"api","data":{api}}}"#));
        self.inject(r#"{"event":"request-api"}"#);
        self.inject(r#"{"event":"api-received"}"#);
    }

    /// Call ids of every `call-function` posted so far, in order.
    pub fn call_ids(&self) -> Vec<String> {
        self.transport
            .sent_with("call-function")
            .iter()
            .map(|env| env["data"]["callId"].as_str().unwrap().to_owned())
            .collect()
    }
}
