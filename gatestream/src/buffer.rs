//! Keyed store for responses awaiting acknowledgement.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::protocol::{CorrelationId, Response};

/// Mutex-guarded map from correlation id to buffered response.
///
/// The only shared mutable state between the drainer task and callers
/// polling for their response. The raw map is never handed out; all access
/// goes through the methods here, each holding the lock for a single map
/// operation.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    inner: Mutex<HashMap<CorrelationId, Response>>,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationId, Response>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("response buffer mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Store a response under its id, returning any displaced entry.
    ///
    /// A duplicate id overwrites the previous entry (last-write-wins). Known
    /// limitation: a worker that replies twice to the same request silently
    /// replaces the first response.
    pub fn insert(&self, response: Response) -> Option<Response> {
        self.lock().insert(response.id.clone(), response)
    }

    /// Remove and return the response for `id`, if buffered.
    pub fn take(&self, id: &CorrelationId) -> Option<Response> {
        self.lock().remove(id)
    }

    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.lock().contains_key(id)
    }

    /// Snapshot of currently buffered ids.
    pub fn snapshot_ids(&self) -> Vec<CorrelationId> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
