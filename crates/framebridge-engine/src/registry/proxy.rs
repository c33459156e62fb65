use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use serde_json::Value;

use framebridge_core::protocol::ApiDescriptor;
use framebridge_core::{BridgeError, Result};

use crate::deferred::{Deferred, Promise};

/// Something that can put a call on the wire. Implemented by the bridge.
pub trait Invoker: Send + Sync {
    /// Send the call and settle `deferred` when its reply arrives.
    fn dispatch(&self, name: &str, args: Vec<Value>, deferred: Deferred) -> Result<()>;

    fn invoke(&self, name: &str, args: Vec<Value>) -> Result<Promise> {
        let deferred = Deferred::new();
        let promise = deferred.promise();
        self.dispatch(name, args, deferred)?;
        Ok(promise)
    }

    /// Like `invoke`, but the callbacks are attached before the call is
    /// sent, so no reply can slip past them.
    fn invoke_async(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Pin<Box<dyn Future<Output = Result<Option<Value>>> + Send>>> {
        let deferred = Deferred::new();
        let outcome = deferred.promise().outcome();
        self.dispatch(name, args, deferred)?;
        Ok(Box::pin(outcome))
    }
}

/// One remote-callable function.
#[derive(Clone)]
pub struct RemoteFunction {
    name: Arc<str>,
    invoker: Weak<dyn Invoker>,
}

impl RemoteFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Forward the call across the channel. Arguments are passed opaquely.
    pub fn call(&self, args: Vec<Value>) -> Result<Promise> {
        self.invoker()?.invoke(&self.name, args)
    }

    /// Forward the call and wait for its outcome.
    pub async fn call_async(&self, args: Vec<Value>) -> Result<Option<Value>> {
        let outcome = self.invoker()?.invoke_async(&self.name, args)?;
        outcome.await
    }

    fn invoker(&self) -> Result<Arc<dyn Invoker>> {
        self.invoker
            .upgrade()
            .ok_or_else(|| BridgeError::Internal("bridge dropped".into()))
    }
}

impl std::fmt::Debug for RemoteFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RemoteFunction").field(&self.name).finish()
    }
}

/// Flat name -> function mapping of what the remote advertised.
#[derive(Clone, Debug, Default)]
pub struct RemoteProxy {
    functions: Vec<RemoteFunction>,
}

impl RemoteProxy {
    pub fn names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&RemoteFunction> {
        self.functions.iter().find(|f| f.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Call `name` on the remote. Fails for names the remote never advertised.
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Promise> {
        self.get(name)
            .ok_or_else(|| BridgeError::UnknownFunction(name.to_owned()))?
            .call(args)
    }

    pub async fn call_async(&self, name: &str, args: Vec<Value>) -> Result<Option<Value>> {
        self.get(name)
            .ok_or_else(|| BridgeError::UnknownFunction(name.to_owned()))?
            .call_async(args)
            .await
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Build the proxy for a remote descriptor. Duplicate names collapse onto
/// their first position.
pub fn build_remote_proxy(names: ApiDescriptor, invoker: Weak<dyn Invoker>) -> RemoteProxy {
    let mut functions: Vec<RemoteFunction> = Vec::with_capacity(names.len());
    for name in names {
        if functions.iter().any(|f| *f.name == *name) {
            continue;
        }
        functions.push(RemoteFunction {
            name: Arc::from(name),
            invoker: Weak::clone(&invoker),
        });
    }
    RemoteProxy { functions }
}
