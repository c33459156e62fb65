use std::sync::Arc;

use serde_json::Value;

use framebridge_core::protocol::ApiDescriptor;
use framebridge_core::{BridgeError, Result};

use crate::deferred::Promise;

/// What a local API function hands back to the bridge.
#[derive(Debug)]
pub enum Reply {
    /// Result is available now. `None` means "returned nothing".
    Immediate(Option<Value>),
    /// Result arrives later through the promise.
    Async(Promise),
}

impl Reply {
    pub fn value(v: impl Into<Value>) -> Self {
        Reply::Immediate(Some(v.into()))
    }

    pub fn empty() -> Self {
        Reply::Immediate(None)
    }
}

impl From<Promise> for Reply {
    fn from(p: Promise) -> Self {
        Reply::Async(p)
    }
}

/// A callable entry in the local API. An `Err` is reported to the caller
/// as a bare `return-error`; its detail stays local.
pub type LocalFn = Arc<dyn Fn(Vec<Value>) -> Result<Reply> + Send + Sync>;

/// Ordered registry of locally callable functions.
#[derive(Clone, Default)]
pub struct LocalApi {
    entries: Vec<(String, LocalFn)>,
}

impl LocalApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn register<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Reply> + Send + Sync + 'static,
    {
        self.insert(name, f);
        self
    }

    /// Register `f` under `name`. Re-registering a name replaces the
    /// function but keeps its original position.
    pub fn insert<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>) -> Result<Reply> + Send + Sync + 'static,
    {
        let name = name.into();
        let f: LocalFn = Arc::new(f);
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = f,
            None => self.entries.push((name, f)),
        }
    }

    pub fn names(&self) -> ApiDescriptor {
        self.entries.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<LocalFn> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| Arc::clone(f))
    }

    /// Look up and run `name`.
    pub fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Reply> {
        let f = self
            .get(name)
            .ok_or_else(|| BridgeError::UnknownFunction(name.to_owned()))?;
        f(args)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for LocalApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter().map(|(n, _)| n)).finish()
    }
}

/// Names of every registered function, in registration order.
pub fn extract_local_api(api: &LocalApi) -> ApiDescriptor {
    api.names()
}
