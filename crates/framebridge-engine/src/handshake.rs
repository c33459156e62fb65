//! Handshake coordinator.
//!
//! Two independent halves must both finish before the bridge is ready:
//! - outbound: ask for the remote API (`request-api`, retried every
//!   interval up to the ceiling) until an `api` event arrives.
//! - inbound: answer the first `request-api` with our `api`, then wait for
//!   the remote's `api-received`.
//!
//! Whichever half finishes last hands out the remote proxy, exactly once.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use framebridge_core::protocol::EventKind;

use crate::channel::ChannelAdapter;
use crate::config::HandshakeSettings;
use crate::registry::RemoteProxy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundPhase {
    AwaitingApi,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundPhase {
    AwaitingRequest,
    AwaitingAck,
    Done,
}

struct State {
    outbound: OutboundPhase,
    inbound: InboundPhase,
    attempts: u32,
    remote: Option<RemoteProxy>,
    ready_fired: bool,
    retry: Option<JoinHandle<()>>,
}

pub struct HandshakeCoordinator {
    settings: HandshakeSettings,
    state: Mutex<State>,
}

impl HandshakeCoordinator {
    pub fn new(settings: HandshakeSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(State {
                outbound: OutboundPhase::AwaitingApi,
                inbound: InboundPhase::AwaitingRequest,
                attempts: 0,
                remote: None,
                ready_fired: false,
                retry: None,
            }),
        }
    }

    pub fn settings(&self) -> HandshakeSettings {
        self.settings
    }

    pub fn outbound_phase(&self) -> OutboundPhase {
        self.lock().outbound
    }

    pub fn inbound_phase(&self) -> InboundPhase {
        self.lock().inbound
    }

    /// `request-api` sends so far.
    pub fn attempts(&self) -> u32 {
        self.lock().attempts
    }

    pub fn is_ready(&self) -> bool {
        self.lock().ready_fired
    }

    pub fn remote_proxy(&self) -> Option<RemoteProxy> {
        self.lock().remote.clone()
    }

    fn awaiting_api(&self) -> bool {
        self.lock().outbound == OutboundPhase::AwaitingApi
    }

    /// Send one `request-api` if we still need the remote API and the
    /// ceiling has not been reached. Returns whether a send happened.
    pub fn send_request(&self, adapter: &ChannelAdapter) -> bool {
        {
            let mut st = self.lock();
            if st.outbound != OutboundPhase::AwaitingApi
                || st.attempts >= self.settings.max_attempts()
            {
                return false;
            }
            st.attempts += 1;
        }
        adapter.send_or_report::<()>(EventKind::RequestApi, None);
        true
    }

    /// Start the outbound half: one immediate `request-api`, then a retry
    /// task that keeps asking every interval. `on_exhausted` runs once if
    /// the ceiling passes with no answer.
    pub fn start<F>(self: &Arc<Self>, adapter: Arc<ChannelAdapter>, on_exhausted: F)
    where
        F: FnOnce(u32) + Send + 'static,
    {
        self.send_request(&adapter);

        let me = Arc::clone(self);
        let interval = self.settings.retry_interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !me.awaiting_api() {
                    return;
                }
                if !me.send_request(&adapter) {
                    break;
                }
            }
            if me.awaiting_api() {
                on_exhausted(me.attempts());
            }
        });

        let mut st = self.lock();
        if st.outbound == OutboundPhase::AwaitingApi {
            st.retry = Some(handle);
        } else {
            handle.abort();
        }
    }

    /// Outbound half done. Cancels the retry timer. Returns the proxy if
    /// this completes the handshake.
    pub fn remote_api_received(&self, proxy: RemoteProxy) -> Option<RemoteProxy> {
        let mut st = self.lock();
        if st.outbound == OutboundPhase::Done {
            return None;
        }
        st.outbound = OutboundPhase::Done;
        if let Some(retry) = st.retry.take() {
            retry.abort();
        }
        st.remote = Some(proxy);
        tracing::debug!(inbound = ?st.inbound, "remote api received");
        Self::take_ready(&mut st)
    }

    /// First `request-api` seen. Returns `false` if it was already served.
    pub fn serve_request(&self) -> bool {
        let mut st = self.lock();
        if st.inbound != InboundPhase::AwaitingRequest {
            return false;
        }
        st.inbound = InboundPhase::AwaitingAck;
        true
    }

    /// Inbound half done. Returns the proxy if this completes the handshake.
    pub fn local_api_delivered(&self) -> Option<RemoteProxy> {
        let mut st = self.lock();
        if st.inbound != InboundPhase::AwaitingAck {
            return None;
        }
        st.inbound = InboundPhase::Done;
        tracing::debug!(outbound = ?st.outbound, "local api delivered");
        Self::take_ready(&mut st)
    }

    /// Abort the retry task, if any.
    pub fn cancel(&self) {
        if let Some(retry) = self.lock().retry.take() {
            retry.abort();
        }
    }

    fn take_ready(st: &mut State) -> Option<RemoteProxy> {
        if st.ready_fired
            || st.outbound != OutboundPhase::Done
            || st.inbound != InboundPhase::Done
        {
            return None;
        }
        st.ready_fired = true;
        st.remote.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
