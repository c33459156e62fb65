//! Bridge facade.
//!
//! Wires the channel adapter, local registry, handshake and pending call
//! table together. All inbound work (listener callbacks, `on_ready`, reply
//! settlement) runs on the bridge's pump task, one message at a time.
//!
//! Proxies and listeners only hold weak references to the bridge: keep a
//! `Bridge` handle alive for as long as calls should be served.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::value::RawValue;
use serde_json::Value;
use tokio::task::JoinHandle;

use framebridge_core::protocol::envelope::decode_data;
use framebridge_core::protocol::{
    ApiDescriptor, CallId, CallRecord, ErrorRecord, EventKind, ReturnRecord,
};
use framebridge_core::{BridgeError, Result};

use crate::channel::{listener, ChannelAdapter, RawMessage, Transport};
use crate::config::{BridgeConfig, HandshakeSettings};
use crate::deferred::{Deferred, Promise};
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::handshake::HandshakeCoordinator;
use crate::pending::PendingCalls;
use crate::registry::{build_remote_proxy, extract_local_api, Invoker, LocalApi, RemoteProxy, Reply};

type ReadyCallback = Box<dyn FnOnce(RemoteProxy) + Send>;
type TimeoutCallback = Box<dyn FnOnce(u32) + Send>;

pub struct BridgeBuilder {
    local_api: LocalApi,
    transport: Arc<dyn Transport>,
    target_domain: String,
    settings: HandshakeSettings,
    diagnostics: Arc<dyn Diagnostics>,
    on_timeout: Option<TimeoutCallback>,
}

impl BridgeBuilder {
    pub fn settings(mut self, settings: HandshakeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Called once, with the number of attempts, if the remote never sends
    /// its API before the handshake ceiling. `on_ready` still never fires.
    pub fn on_handshake_timeout<F>(mut self, f: F) -> Self
    where
        F: FnOnce(u32) + Send + 'static,
    {
        self.on_timeout = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Bridge {
        let adapter = Arc::new(ChannelAdapter::new(
            self.transport,
            self.target_domain,
            Arc::clone(&self.diagnostics),
        ));
        let shared = Arc::new_cyclic(|weak| Shared {
            adapter,
            local_api: self.local_api,
            pending: PendingCalls::new(),
            handshake: Arc::new(HandshakeCoordinator::new(self.settings)),
            diagnostics: self.diagnostics,
            on_ready: Mutex::new(None),
            on_timeout: Mutex::new(self.on_timeout),
            started: AtomicBool::new(false),
            pump: Mutex::new(None),
            weak: weak.clone(),
        });
        Bridge { shared }
    }
}

/// One side of a bridge. Cloning yields another handle to the same bridge.
#[derive(Clone)]
pub struct Bridge {
    shared: Arc<Shared>,
}

impl Bridge {
    pub fn builder(
        local_api: LocalApi,
        transport: Arc<dyn Transport>,
        target_domain: impl Into<String>,
    ) -> BridgeBuilder {
        BridgeBuilder {
            local_api,
            transport,
            target_domain: target_domain.into(),
            settings: HandshakeSettings::default(),
            diagnostics: Arc::new(TracingDiagnostics),
            on_timeout: None,
        }
    }

    pub fn from_config(local_api: LocalApi, transport: Arc<dyn Transport>, cfg: &BridgeConfig) -> Self {
        Self::builder(local_api, transport, cfg.target_domain.clone())
            .settings(cfg.handshake.settings())
            .build()
    }

    /// Start the protocol: attach to the transport and begin the handshake.
    /// `on_ready` receives the remote proxy once both sides have exchanged
    /// their APIs. Must be called from within a tokio runtime. A second call
    /// is ignored.
    pub fn init<F>(&self, on_ready: F) -> Result<()>
    where
        F: FnOnce(RemoteProxy) + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| BridgeError::Internal("init requires a tokio runtime".into()))?;

        let s = &self.shared;
        if s.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("init called twice; ignored");
            return Ok(());
        }
        *lock(&s.on_ready) = Some(Box::new(on_ready));

        s.listen_for_remote_api();
        s.listen_for_api_request();

        let adapter = Arc::clone(&s.adapter);
        let pump = runtime.spawn(async move {
            let transport = Arc::clone(adapter.transport());
            while let Some(msg) = transport.recv().await {
                adapter.receive_event(&msg);
            }
            tracing::debug!("transport closed; pump stopped");
        });
        *lock(&s.pump) = Some(pump);

        let weak = s.weak.clone();
        s.handshake.start(Arc::clone(&s.adapter), move |attempts| {
            if let Some(s) = weak.upgrade() {
                s.handshake_exhausted(attempts);
            }
        });

        tracing::debug!(target_domain = %s.adapter.target_domain(), "bridge initialized");
        Ok(())
    }

    /// Call `name` on the remote. Returns immediately; the promise settles
    /// when the correlated reply arrives.
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Promise> {
        self.shared.invoke(name, args)
    }

    /// Call `name` on the remote and wait for the outcome.
    pub async fn invoke_async(&self, name: &str, args: Vec<Value>) -> Result<Option<Value>> {
        let outcome = self.shared.invoke_async(name, args)?;
        outcome.await
    }

    /// Feed one inbound message directly, bypassing the transport.
    pub fn receive(&self, msg: &RawMessage) {
        self.shared.adapter.receive_event(msg);
    }

    pub fn is_ready(&self) -> bool {
        self.shared.handshake.is_ready()
    }

    /// The remote proxy, once the remote API has arrived.
    pub fn remote_proxy(&self) -> Option<RemoteProxy> {
        self.shared.handshake.remote_proxy()
    }

    pub fn handshake(&self) -> &HandshakeCoordinator {
        &self.shared.handshake
    }

    pub fn pending_calls(&self) -> usize {
        self.shared.pending.len()
    }

    pub fn local_api(&self) -> ApiDescriptor {
        extract_local_api(&self.shared.local_api)
    }

    pub fn target_domain(&self) -> &str {
        self.shared.adapter.target_domain()
    }
}

struct Shared {
    adapter: Arc<ChannelAdapter>,
    local_api: LocalApi,
    pending: PendingCalls,
    handshake: Arc<HandshakeCoordinator>,
    diagnostics: Arc<dyn Diagnostics>,
    on_ready: Mutex<Option<ReadyCallback>>,
    on_timeout: Mutex<Option<TimeoutCallback>>,
    started: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
    weak: Weak<Shared>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.handshake.cancel();
        if let Some(pump) = lock(&self.pump).take() {
            pump.abort();
        }
    }
}

impl Shared {
    // ---- handshake, outbound half

    fn listen_for_remote_api(&self) {
        let weak = self.weak.clone();
        self.adapter.add_until(EventKind::Api, move |data| {
            weak.upgrade().map_or(true, |s| s.on_remote_api(data))
        });
    }

    /// Returns `true` once the listener is done.
    fn on_remote_api(&self, data: Option<&RawValue>) -> bool {
        let names: ApiDescriptor = match decode_data(EventKind::Api, data) {
            Ok(names) => names,
            Err(e) => {
                self.diagnostics.malformed(&e);
                return false;
            }
        };

        let invoker: Weak<dyn Invoker> = self.weak.clone();
        let proxy = build_remote_proxy(names, invoker);
        let ready = self.handshake.remote_api_received(proxy);

        self.listen_for_calls();
        self.adapter.send_or_report::<()>(EventKind::ApiReceived, None);

        if let Some(proxy) = ready {
            self.fire_ready(proxy);
        }
        true
    }

    // ---- handshake, inbound half

    fn listen_for_api_request(&self) {
        let weak = self.weak.clone();
        self.adapter.add_until(EventKind::RequestApi, move |_| {
            if let Some(s) = weak.upgrade() {
                s.on_api_request();
            }
            true
        });
    }

    fn on_api_request(&self) {
        if !self.handshake.serve_request() {
            return;
        }

        let weak = self.weak.clone();
        self.adapter.add_until(EventKind::ApiReceived, move |_| {
            if let Some(s) = weak.upgrade() {
                if let Some(proxy) = s.handshake.local_api_delivered() {
                    s.fire_ready(proxy);
                }
            }
            true
        });

        let names = extract_local_api(&self.local_api);
        self.adapter.send_or_report(EventKind::Api, Some(&names));
    }

    fn fire_ready(&self, proxy: RemoteProxy) {
        tracing::debug!(remote_api = ?proxy.names(), "bridge ready");
        let on_ready = lock(&self.on_ready).take();
        if let Some(on_ready) = on_ready {
            on_ready(proxy);
        }
    }

    fn handshake_exhausted(&self, attempts: u32) {
        self.diagnostics.handshake_exhausted(attempts);
        let on_timeout = lock(&self.on_timeout).take();
        if let Some(on_timeout) = on_timeout {
            on_timeout(attempts);
        }
    }

    // ---- steady state

    fn listen_for_calls(&self) {
        let weak = self.weak.clone();
        self.adapter.add_listener(
            EventKind::CallFunction,
            listener(move |data| {
                if let Some(s) = weak.upgrade() {
                    s.on_call(data);
                }
            }),
        );

        let weak = self.weak.clone();
        self.adapter.add_listener(
            EventKind::ReturnValue,
            listener(move |data| {
                if let Some(s) = weak.upgrade() {
                    s.on_return_value(data);
                }
            }),
        );

        let weak = self.weak.clone();
        self.adapter.add_listener(
            EventKind::ReturnError,
            listener(move |data| {
                if let Some(s) = weak.upgrade() {
                    s.on_return_error(data);
                }
            }),
        );
    }

    fn on_call(&self, data: Option<&RawValue>) {
        let call: CallRecord = match decode_data(EventKind::CallFunction, data) {
            Ok(call) => call,
            Err(e) => {
                self.diagnostics.malformed(&e);
                return;
            }
        };
        let CallRecord { name, args, call_id } = call;

        let reply = catch_unwind(AssertUnwindSafe(|| self.local_api.invoke(&name, args)))
            .unwrap_or_else(|_| Err(BridgeError::Invocation("local function panicked".into())));

        match reply {
            Ok(Reply::Immediate(result)) => send_return_value(&self.adapter, result, call_id),
            Ok(Reply::Async(promise)) => {
                let on_ok = Arc::clone(&self.adapter);
                let on_err = Arc::clone(&self.adapter);
                let ok_id = call_id.clone();
                promise
                    .success(move |result| send_return_value(&on_ok, result, ok_id))
                    .error(move |_| send_return_error(&on_err, call_id));
            }
            Err(e) => {
                self.diagnostics.invocation_failed(&name, &call_id, &e);
                send_return_error(&self.adapter, call_id);
            }
        }
    }

    fn on_return_value(&self, data: Option<&RawValue>) {
        let ret: ReturnRecord = match decode_data(EventKind::ReturnValue, data) {
            Ok(ret) => ret,
            Err(e) => {
                self.diagnostics.malformed(&e);
                return;
            }
        };
        match self.pending.take(&ret.call_id) {
            Some(deferred) => {
                deferred.resolve(ret.result);
            }
            None => self.diagnostics.unmatched_reply(EventKind::ReturnValue, &ret.call_id),
        }
    }

    fn on_return_error(&self, data: Option<&RawValue>) {
        let err: ErrorRecord = match decode_data(EventKind::ReturnError, data) {
            Ok(err) => err,
            Err(e) => {
                self.diagnostics.malformed(&e);
                return;
            }
        };
        match self.pending.take(&err.call_id) {
            Some(deferred) => {
                deferred.reject(None);
            }
            None => self.diagnostics.unmatched_reply(EventKind::ReturnError, &err.call_id),
        }
    }
}

impl Invoker for Shared {
    fn dispatch(&self, name: &str, args: Vec<Value>, deferred: Deferred) -> Result<()> {
        let call_id = deferred.id().clone();
        let record = CallRecord {
            name: name.to_owned(),
            args,
            call_id: call_id.clone(),
        };

        // tracked before sending so a fast reply always finds its entry
        self.pending.insert(deferred)?;
        if let Err(e) = self.adapter.send_event(EventKind::CallFunction, Some(&record)) {
            self.pending.take(&call_id);
            return Err(e);
        }
        tracing::trace!(%name, %call_id, "call sent");
        Ok(())
    }
}

fn send_return_value(adapter: &ChannelAdapter, result: Option<Value>, call_id: CallId) {
    let ret = ReturnRecord { result, call_id };
    adapter.send_or_report(EventKind::ReturnValue, Some(&ret));
}

fn send_return_error(adapter: &ChannelAdapter, call_id: CallId) {
    let err = ErrorRecord { call_id };
    adapter.send_or_report(EventKind::ReturnError, Some(&err));
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
