//! Pending call table: call id -> deferred result.
//!
//! Entries are inserted when a call is issued and removed exactly once, by
//! the reply that settles them. Only ever accessed by key.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use framebridge_core::protocol::CallId;
use framebridge_core::{BridgeError, Result};

use crate::deferred::Deferred;

#[derive(Default)]
pub struct PendingCalls {
    table: DashMap<CallId, Deferred>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    /// Track `deferred` under its own id. An id already in the table is refused.
    pub fn insert(&self, deferred: Deferred) -> Result<()> {
        match self.table.entry(deferred.id().clone()) {
            Entry::Occupied(e) => Err(BridgeError::Internal(format!(
                "duplicate call id: {}",
                e.key()
            ))),
            Entry::Vacant(e) => {
                e.insert(deferred);
                Ok(())
            }
        }
    }

    /// Erase-if-present. `None` means no call with this id is outstanding.
    pub fn take(&self, call_id: &CallId) -> Option<Deferred> {
        self.table.remove(call_id).map(|(_, d)| d)
    }

    pub fn contains(&self, call_id: &CallId) -> bool {
        self.table.contains_key(call_id)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_is_terminal() {
        let pending = PendingCalls::new();
        let d = Deferred::new();
        let id = d.id().clone();
        pending.insert(d).unwrap();

        assert!(pending.contains(&id));
        assert!(pending.take(&id).is_some());
        assert!(pending.take(&id).is_none());
        assert!(pending.is_empty());
    }

    #[test]
    fn unknown_id_is_none() {
        let pending = PendingCalls::new();
        assert!(pending.take(&CallId::from("nope")).is_none());
    }
}
