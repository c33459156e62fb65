//! Deferred result: single-assignment async outcome with attachable callbacks.
//!
//! `Deferred` is the settling side, `Promise` the consuming side. A promise
//! settles at most once. Callbacks attached before settlement run at
//! settlement time; callbacks attached afterwards are dropped without
//! running. Attaching a second callback of the same kind before settlement
//! replaces the first.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::oneshot;

use framebridge_core::protocol::CallId;
use framebridge_core::{BridgeError, Result};

type Callback = Box<dyn FnOnce(Option<Value>) + Send>;

#[derive(Default)]
struct Slot {
    settled: bool,
    on_success: Option<Callback>,
    on_error: Option<Callback>,
}

/// Consumer handle. Cheap to clone; all clones observe the same outcome.
#[derive(Clone, Default)]
pub struct Promise {
    slot: Arc<Mutex<Slot>>,
}

impl Promise {
    /// Run `f` with the value when the promise resolves.
    pub fn success<F>(&self, f: F) -> &Self
    where
        F: FnOnce(Option<Value>) + Send + 'static,
    {
        let mut slot = self.lock();
        if !slot.settled {
            slot.on_success = Some(Box::new(f));
        }
        self
    }

    /// Run `f` with the reason when the promise is rejected.
    pub fn error<F>(&self, f: F) -> &Self
    where
        F: FnOnce(Option<Value>) + Send + 'static,
    {
        let mut slot = self.lock();
        if !slot.settled {
            slot.on_error = Some(Box::new(f));
        }
        self
    }

    pub fn is_settled(&self) -> bool {
        self.lock().settled
    }

    /// Attach both callbacks now and return a future for the outcome.
    ///
    /// A rejection maps to `BridgeError::Rejected` (the reason is dropped).
    /// If the promise had already settled, or its `Deferred` is dropped
    /// unsettled, the future yields `BridgeError::Internal`.
    pub fn outcome(&self) -> impl Future<Output = Result<Option<Value>>> {
        let (tx, rx) = oneshot::channel::<Result<Option<Value>>>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let on_err = Arc::clone(&tx);

        self.success(move |v| {
            if let Some(tx) = tx.lock().ok().and_then(|mut t| t.take()) {
                let _ = tx.send(Ok(v));
            }
        })
        .error(move |_| {
            if let Some(tx) = on_err.lock().ok().and_then(|mut t| t.take()) {
                let _ = tx.send(Err(BridgeError::Rejected));
            }
        });

        async move {
            rx.await
                .unwrap_or_else(|_| Err(BridgeError::Internal("promise abandoned".into())))
        }
    }

    fn settle(&self, value: Option<Value>, ok: bool) -> bool {
        let callback = {
            let mut slot = self.lock();
            if slot.settled {
                return false;
            }
            slot.settled = true;
            let success = slot.on_success.take();
            let error = slot.on_error.take();
            if ok {
                success
            } else {
                error
            }
        };
        // run outside the lock: callbacks may touch this promise again
        if let Some(cb) = callback {
            cb(value);
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Promise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Promise")
            .field("settled", &self.is_settled())
            .finish()
    }
}

/// Settling side of a promise.
#[derive(Debug)]
pub struct Deferred {
    id: CallId,
    promise: Promise,
}

impl Default for Deferred {
    fn default() -> Self {
        Self::new()
    }
}

impl Deferred {
    pub fn new() -> Self {
        Self {
            id: CallId::generate(),
            promise: Promise::default(),
        }
    }

    /// Fresh random id; the bridge uses it as the call id.
    pub fn id(&self) -> &CallId {
        &self.id
    }

    pub fn promise(&self) -> Promise {
        self.promise.clone()
    }

    /// Settle successfully. Returns `false` if already settled.
    pub fn resolve(&self, value: Option<Value>) -> bool {
        self.promise.settle(value, true)
    }

    /// Settle with an error. Returns `false` if already settled.
    pub fn reject(&self, reason: Option<Value>) -> bool {
        self.promise.settle(reason, false)
    }
}
