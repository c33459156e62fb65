//! Channel adapter: envelope codec + origin filter + listener registry.
//!
//! Rules:
//! - A message whose origin differs from the target domain is dropped
//!   silently. This is the only security boundary.
//! - Parse failures are reported to diagnostics and never reach listeners.
//! - Listeners run in registration order against a snapshot taken when
//!   dispatch starts, so (un)registering from inside a callback only
//!   affects later messages.
//! - A panicking listener is reported and skipped; the rest still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use serde::Serialize;
use serde_json::value::RawValue;

use framebridge_core::protocol::{encode_envelope, Envelope, EventKind};
use framebridge_core::Result;

use crate::diagnostics::Diagnostics;

use super::transport::{RawMessage, Transport};

/// Event callback. Identity (for removal) is the `Arc` allocation.
pub type Listener = Arc<dyn Fn(Option<&RawValue>) + Send + Sync>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(Option<&RawValue>) + Send + Sync + 'static,
{
    Arc::new(f)
}

struct Registration {
    event: EventKind,
    callback: Listener,
}

pub struct ChannelAdapter {
    transport: Arc<dyn Transport>,
    target_domain: String,
    listeners: Mutex<Vec<Registration>>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl ChannelAdapter {
    pub fn new(
        transport: Arc<dyn Transport>,
        target_domain: impl Into<String>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            transport,
            target_domain: target_domain.into(),
            listeners: Mutex::new(Vec::new()),
            diagnostics,
        }
    }

    pub fn target_domain(&self) -> &str {
        &self.target_domain
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Serialize `{event, data}` and post it to the target domain.
    pub fn send_event<T: Serialize>(&self, event: EventKind, data: Option<&T>) -> Result<()> {
        let text = encode_envelope(event, data)?;
        tracing::trace!(%event, "send");
        self.transport.post(text, &self.target_domain)
    }

    /// Send an event that carries no data.
    pub fn send_bare(&self, event: EventKind) -> Result<()> {
        self.send_event::<()>(event, None)
    }

    /// Like `send_event`, but failures go to diagnostics instead of the caller.
    pub fn send_or_report<T: Serialize>(&self, event: EventKind, data: Option<&T>) {
        if let Err(e) = self.send_event(event, data) {
            self.diagnostics.send_failed(event, &e);
        }
    }

    /// Entry point for every inbound message.
    pub fn receive_event(&self, msg: &RawMessage) {
        if msg.origin != self.target_domain {
            return;
        }

        let env = match Envelope::parse(&msg.data) {
            Ok(env) => env,
            Err(e) => {
                self.diagnostics.malformed(&e);
                return;
            }
        };

        let matching: Vec<Listener> = {
            let guard = self.lock_listeners();
            guard
                .iter()
                .filter(|r| r.event == env.event)
                .map(|r| Arc::clone(&r.callback))
                .collect()
        };

        tracing::trace!(event = %env.event, listeners = matching.len(), "dispatch");
        for callback in matching {
            if catch_unwind(AssertUnwindSafe(|| callback(env.data()))).is_err() {
                self.diagnostics.listener_panicked(env.event);
            }
        }
    }

    pub fn add_listener(&self, event: EventKind, callback: Listener) {
        self.lock_listeners().push(Registration { event, callback });
    }

    /// Remove the first registration matching `(event, callback)`; no-op if absent.
    pub fn remove_listener(&self, event: EventKind, callback: &Listener) {
        let mut guard = self.lock_listeners();
        if let Some(pos) = guard
            .iter()
            .position(|r| r.event == event && Arc::ptr_eq(&r.callback, callback))
        {
            guard.remove(pos);
        }
    }

    /// Register a listener that removes itself the first time `f` returns
    /// `true`. Returning `false` keeps it registered for the next message.
    pub fn add_until<F>(self: &Arc<Self>, event: EventKind, f: F)
    where
        F: Fn(Option<&RawValue>) -> bool + Send + Sync + 'static,
    {
        let adapter = Arc::downgrade(self);
        let me: Arc<OnceLock<Weak<dyn Fn(Option<&RawValue>) + Send + Sync>>> =
            Arc::new(OnceLock::new());
        let done = AtomicBool::new(false);

        let cb = {
            let me = Arc::clone(&me);
            listener(move |data| {
                if done.load(Ordering::SeqCst) || !f(data) || done.swap(true, Ordering::SeqCst) {
                    return;
                }
                let handle = me.get().and_then(Weak::upgrade);
                if let (Some(adapter), Some(handle)) = (adapter.upgrade(), handle) {
                    adapter.remove_listener(event, &handle);
                }
            })
        };
        let _ = me.set(Arc::downgrade(&cb));
        self.add_listener(event, cb);
    }

    pub fn listener_count(&self, event: EventKind) -> usize {
        self.lock_listeners().iter().filter(|r| r.event == event).count()
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<Registration>> {
        // A panicking listener never runs under this lock, so poisoning only
        // means a panic elsewhere; the list itself is still consistent.
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::diagnostics::TracingDiagnostics;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Transport for Recorder {
        fn post(&self, message: String, target_origin: &str) -> Result<()> {
            self.sent.lock().unwrap().push((message, target_origin.to_owned()));
            Ok(())
        }

        async fn recv(&self) -> Option<RawMessage> {
            None
        }
    }

    const TARGET: &str = "https://frame.example";

    fn adapter() -> (Arc<Recorder>, ChannelAdapter) {
        let rec = Arc::new(Recorder::default());
        let adapter = ChannelAdapter::new(rec.clone(), TARGET, Arc::new(TracingDiagnostics));
        (rec, adapter)
    }

    fn counter(hits: &Arc<AtomicUsize>) -> Listener {
        let hits = Arc::clone(hits);
        listener(move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn send_addresses_target_domain() {
        let (rec, adapter) = adapter();
        adapter.send_bare(EventKind::RequestApi).unwrap();
        let sent = rec.sent.lock().unwrap();
        assert_eq!(sent[0], (r#"{"event":"request-api"}"#.to_owned(), TARGET.to_owned()));
    }

    #[test]
    fn foreign_origin_never_dispatches() {
        let (_rec, adapter) = adapter();
        let hits = Arc::new(AtomicUsize::new(0));
        let kinds = [
            EventKind::Init,
            EventKind::ChildReady,
            EventKind::RequestApi,
            EventKind::Api,
            EventKind::ApiReceived,
            EventKind::CallFunction,
            EventKind::ReturnValue,
            EventKind::ReturnError,
        ];
        for kind in kinds {
            adapter.add_listener(kind, counter(&hits));
        }
        for kind in kinds {
            let text = format!(r#"{{"event":"{kind}","data":{{"callId":"1"}}}}"#);
            adapter.receive_event(&RawMessage::new("https://evil.example", text.clone()));
            adapter.receive_event(&RawMessage::new("https://frame.example.evil", text));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn matching_listeners_run_in_order() {
        let (_rec, adapter) = adapter();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = Arc::clone(&order);
            adapter.add_listener(
                EventKind::Api,
                listener(move |data| {
                    let raw = data.map(|d| d.get().to_owned()).unwrap_or_default();
                    order.lock().unwrap().push(format!("{tag}:{raw}"));
                }),
            );
        }
        adapter.add_listener(EventKind::RequestApi, listener(|_| panic!("wrong event")));

        adapter.receive_event(&RawMessage::new(TARGET, r#"{"event":"api","data":["f"]}"#));
        assert_eq!(*order.lock().unwrap(), vec![r#"first:["f"]"#, r#"second:["f"]"#]);
    }

    #[test]
    fn malformed_message_does_not_stop_later_ones() {
        let (_rec, adapter) = adapter();
        let hits = Arc::new(AtomicUsize::new(0));
        adapter.add_listener(EventKind::ApiReceived, counter(&hits));

        adapter.receive_event(&RawMessage::new(TARGET, "{not json"));
        adapter.receive_event(&RawMessage::new(TARGET, r#"{"event":"api-received"}"#));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_listener_removes_first_exact_match_only() {
        let (_rec, adapter) = adapter();
        let hits = Arc::new(AtomicUsize::new(0));
        let cb = counter(&hits);
        adapter.add_listener(EventKind::Api, Arc::clone(&cb));
        adapter.add_listener(EventKind::Api, Arc::clone(&cb));

        // same callback under another event: no-op
        adapter.remove_listener(EventKind::RequestApi, &cb);
        assert_eq!(adapter.listener_count(EventKind::Api), 2);

        adapter.remove_listener(EventKind::Api, &cb);
        assert_eq!(adapter.listener_count(EventKind::Api), 1);

        adapter.receive_event(&RawMessage::new(TARGET, r#"{"event":"api","data":[]}"#));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn self_removal_during_dispatch_applies_to_next_message() {
        let (_rec, adapter) = adapter();
        let adapter = Arc::new(adapter);
        let hits = Arc::new(AtomicUsize::new(0));

        let slot: Arc<Mutex<Option<Listener>>> = Arc::new(Mutex::new(None));
        let cb: Listener = {
            let adapter = Arc::downgrade(&adapter);
            let slot = Arc::clone(&slot);
            let hits = Arc::clone(&hits);
            listener(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
                let me = slot.lock().unwrap().clone();
                if let (Some(adapter), Some(me)) = (adapter.upgrade(), me) {
                    adapter.remove_listener(EventKind::RequestApi, &me);
                }
            })
        };
        *slot.lock().unwrap() = Some(Arc::clone(&cb));
        adapter.add_listener(EventKind::RequestApi, cb);

        let msg = RawMessage::new(TARGET, r#"{"event":"request-api"}"#);
        adapter.receive_event(&msg);
        adapter.receive_event(&msg);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(adapter.listener_count(EventKind::RequestApi), 0);
    }

    #[test]
    fn add_until_stays_until_predicate_accepts() {
        let (_rec, adapter) = adapter();
        let adapter = Arc::new(adapter);
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let seen = Arc::clone(&seen);
            adapter.add_until(EventKind::Api, move |data| {
                seen.fetch_add(1, Ordering::SeqCst);
                data.is_some()
            });
        }

        adapter.receive_event(&RawMessage::new(TARGET, r#"{"event":"api"}"#));
        assert_eq!(adapter.listener_count(EventKind::Api), 1);

        adapter.receive_event(&RawMessage::new(TARGET, r#"{"event":"api","data":["f"]}"#));
        assert_eq!(adapter.listener_count(EventKind::Api), 0);

        adapter.receive_event(&RawMessage::new(TARGET, r#"{"event":"api","data":["g"]}"#));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_listener_does_not_stop_dispatch() {
        let (_rec, adapter) = adapter();
        let hits = Arc::new(AtomicUsize::new(0));
        adapter.add_listener(EventKind::ApiReceived, listener(|_| panic!("listener bug")));
        adapter.add_listener(EventKind::ApiReceived, counter(&hits));

        let msg = RawMessage::new(TARGET, r#"{"event":"api-received"}"#);
        adapter.receive_event(&msg);
        adapter.receive_event(&msg);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
