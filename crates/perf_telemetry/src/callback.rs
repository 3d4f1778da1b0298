//! Callback registry: subscribers that receive batches of finished events.
//!
//! Callbacks are stored in insertion order under generated IDs and invoked in
//! that order. Each invocation is isolated: a panicking callback is logged
//! and never prevents the remaining callbacks from running.

use std::panic::{catch_unwind, AssertUnwindSafe};

use uuid::Uuid;

use crate::event::PerformanceEvent;

/// A subscriber invoked with every emitted batch of events.
pub type PerformanceCallback = Box<dyn FnMut(&[PerformanceEvent])>;

struct CallbackEntry {
    id: String,
    callback: PerformanceCallback,
}

impl std::fmt::Debug for CallbackEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackEntry").field("id", &self.id).finish()
    }
}

/// Registry of performance callbacks.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    entries: Vec<CallbackEntry>,
}

impl CallbackRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback and return its generated ID.
    pub fn add(&mut self, callback: PerformanceCallback) -> String {
        let id = Uuid::new_v4().to_string();
        self.entries.push(CallbackEntry {
            id: id.clone(),
            callback,
        });
        id
    }

    /// Remove the callback stored under `id`.
    ///
    /// Returns `true` if an entry existed and was removed, `false` otherwise.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Get the number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Invoke every registered callback with the full event batch, in
    /// insertion order.
    ///
    /// A panic inside one callback is caught and logged; emission continues
    /// with the next callback and never propagates to the caller.
    pub fn emit(&mut self, events: &[PerformanceEvent]) {
        for entry in &mut self.entries {
            let result = catch_unwind(AssertUnwindSafe(|| (entry.callback)(events)));
            if result.is_err() {
                tracing::warn!(
                    target: "perf::emit",
                    callback_id = %entry.id,
                    event_count = events.len(),
                    "performance callback panicked"
                );
            }
        }
    }
}
