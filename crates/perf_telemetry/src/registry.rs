//! Measurement registry: bookkeeping for started-but-unfinished measurements.
//!
//! Pending entries are keyed by `(operation name, correlation ID)` with exact
//! equality. The registry owns an entry from `start` until it is completed,
//! drained, or replaced by a re-entrant start under the same key.

use std::collections::HashMap;

use crate::event::{EventDelta, PerformanceEvents};

/// Get the current wall clock as epoch milliseconds.
pub(crate) fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// Identity of one pending measurement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeasurementKey {
    /// Operation being measured
    pub name: PerformanceEvents,
    /// Correlation ID of the owning logical request
    pub correlation_id: String,
}

impl MeasurementKey {
    /// Create a key from an operation name and correlation ID.
    pub fn new(name: PerformanceEvents, correlation_id: impl Into<String>) -> Self {
        Self {
            name,
            correlation_id: correlation_id.into(),
        }
    }
}

/// A started measurement that has not yet been finalized.
#[derive(Debug, Clone)]
pub struct PendingMeasurement {
    /// Operation being measured
    pub name: PerformanceEvents,
    /// Correlation ID of the owning logical request
    pub correlation_id: String,
    /// Epoch milliseconds when the measurement started
    pub start_time_ms: u64,
    /// Visibility snapshot taken at start, if a source was available
    pub start_visibility: Option<String>,
    /// Partial event data accumulated before completion
    pub partial: EventDelta,
}

impl PendingMeasurement {
    /// Get the registry key of this measurement.
    pub fn key(&self) -> MeasurementKey {
        MeasurementKey::new(self.name, self.correlation_id.clone())
    }
}

/// Handle bound to exactly one started measurement.
///
/// Passing the handle back to the client always finalizes the measurement it
/// was created for; there is no way to end a different entry through it.
#[derive(Debug, Clone)]
pub struct MeasurementHandle {
    /// Operation being measured
    pub name: PerformanceEvents,
    /// Correlation ID bound at start
    pub correlation_id: String,
    /// Epoch milliseconds when the measurement started
    pub start_time_ms: u64,
}

impl MeasurementHandle {
    /// Get the registry key this handle is bound to.
    pub fn key(&self) -> MeasurementKey {
        MeasurementKey::new(self.name, self.correlation_id.clone())
    }
}

/// Registry of pending measurements.
///
/// Supports any number of simultaneously pending entries; entries under
/// different keys never share timing state.
#[derive(Debug, Default)]
pub struct MeasurementRegistry {
    pending: HashMap<MeasurementKey, PendingMeasurement>,
}

impl MeasurementRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a measurement, stamping it with the current time.
    ///
    /// Overwrite-wins: if an entry already exists under the same key, the new
    /// start replaces it and the prior entry is dropped without being counted.
    pub fn start(
        &mut self,
        name: PerformanceEvents,
        correlation_id: impl Into<String>,
        start_visibility: Option<String>,
    ) -> MeasurementHandle {
        let correlation_id = correlation_id.into();
        let entry = PendingMeasurement {
            name,
            correlation_id: correlation_id.clone(),
            start_time_ms: now_ms(),
            start_visibility,
            partial: EventDelta::default(),
        };
        let handle = MeasurementHandle {
            name,
            correlation_id,
            start_time_ms: entry.start_time_ms,
        };
        self.pending.insert(entry.key(), entry);
        handle
    }

    /// Merge partial event data into a pending entry.
    ///
    /// No-op when no entry exists under the key.
    pub fn add_data(&mut self, key: &MeasurementKey, delta: &EventDelta) {
        if let Some(entry) = self.pending.get_mut(key) {
            entry.partial.merge(delta);
        }
    }

    /// Remove and return the pending entry under `key`, if any.
    pub fn complete(&mut self, key: &MeasurementKey) -> Option<PendingMeasurement> {
        self.pending.remove(key)
    }

    /// Remove and return every pending entry with the given correlation ID.
    ///
    /// Entries belonging to other correlation IDs are untouched.
    pub fn drain_by_correlation(&mut self, correlation_id: &str) -> Vec<PendingMeasurement> {
        let keys: Vec<MeasurementKey> = self
            .pending
            .keys()
            .filter(|k| k.correlation_id == correlation_id)
            .cloned()
            .collect();

        keys.iter()
            .filter_map(|k| self.pending.remove(k))
            .collect()
    }

    /// Check whether an entry is pending under `key`.
    pub fn is_pending(&self, key: &MeasurementKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Get the number of pending entries.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
