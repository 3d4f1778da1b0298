//! High-level performance client: the facade call sites measure through.
//!
//! The client owns a measurement registry and a callback registry, and
//! orchestrates start, finalize, flush/discard, and emission. It is an
//! explicitly constructed instance; whoever builds it controls its lifetime
//! and sharing.

use uuid::Uuid;

use crate::callback::{CallbackRegistry, PerformanceCallback};
use crate::error::PerfResult;
use crate::event::{EventDelta, PerformanceEvent, PerformanceEvents};
use crate::registry::{now_ms, MeasurementHandle, MeasurementRegistry, PendingMeasurement};

/// Configuration for the performance client.
#[derive(Debug, Clone)]
pub struct PerfConfig {
    /// Client ID of the application
    pub client_id: String,
    /// Login authority used for requests
    pub authority: String,
    /// Name of the library performing the measured operations
    pub library_name: String,
    /// Version of the library performing the measured operations
    pub library_version: String,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            authority: String::new(),
            library_name: String::new(),
            library_version: "0.0.0".to_string(),
        }
    }
}

impl PerfConfig {
    /// Create a new config for the given application client ID.
    pub fn new(client_id: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            ..Default::default()
        }
    }

    /// Set the login authority.
    pub fn with_authority(mut self, authority: &str) -> Self {
        self.authority = authority.to_string();
        self
    }

    /// Set the identity of the emitting library.
    pub fn with_library(mut self, name: &str, version: &str) -> Self {
        self.library_name = name.to_string();
        self.library_version = version.to_string();
        self
    }
}

/// Collaborator that reads the current page/runtime visibility state.
///
/// Returning `None` means no visibility information is available; the
/// corresponding event fields are then omitted from the wire form.
pub trait VisibilitySource {
    /// Get the current visibility state (e.g. "visible", "hidden").
    fn visibility(&self) -> Option<String>;
}

/// Performance client tracking in-flight measurements and fanning finished
/// events out to subscribers.
pub struct PerfClient {
    config: PerfConfig,
    registry: MeasurementRegistry,
    callbacks: CallbackRegistry,
    visibility: Option<Box<dyn VisibilitySource>>,
}

impl std::fmt::Debug for PerfClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerfClient")
            .field("config", &self.config)
            .field("pending", &self.registry.pending_count())
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl PerfClient {
    /// Create a new performance client with the given configuration.
    pub fn new(config: PerfConfig) -> Self {
        Self {
            config,
            registry: MeasurementRegistry::new(),
            callbacks: CallbackRegistry::new(),
            visibility: None,
        }
    }

    /// Attach a visibility source, snapshotted at measurement start and end.
    pub fn with_visibility_source(mut self, source: Box<dyn VisibilitySource>) -> Self {
        self.visibility = Some(source);
        self
    }

    /// Generate a process-unique correlation ID.
    pub fn generate_correlation_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Start a measurement for `name`.
    ///
    /// A correlation ID is generated when the caller supplies none. The
    /// returned handle is bound to exactly this measurement; a re-entrant
    /// start under the same `(name, correlation ID)` pair replaces the prior
    /// pending entry (overwrite-wins).
    pub fn start_measurement(
        &mut self,
        name: PerformanceEvents,
        correlation_id: Option<&str>,
    ) -> MeasurementHandle {
        let correlation_id = correlation_id
            .map(str::to_string)
            .unwrap_or_else(|| self.generate_correlation_id());
        let start_visibility = self.snapshot_visibility();

        let handle = self.registry.start(name, correlation_id, start_visibility);

        tracing::trace!(
            target: "perf::measurement",
            name = %handle.name,
            correlation_id = %handle.correlation_id,
            "measurement started"
        );

        handle
    }

    /// Merge partial event data into the pending measurement bound to
    /// `handle`. No-op if the measurement already reached a terminal state.
    pub fn add_measurement_data(&mut self, handle: &MeasurementHandle, delta: &EventDelta) {
        self.registry.add_data(&handle.key(), delta);
    }

    /// Finalize the measurement bound to `handle` into an immutable event.
    ///
    /// Merges accumulated partial data with `additional` (`additional` wins
    /// on conflict) and computes the duration. When no matching pending
    /// entry exists (double-end, or end without start), a degraded event is
    /// returned instead: zero duration, unknown outcome. Never errors.
    ///
    /// The event is returned, not emitted; emission is the caller's explicit
    /// decision via [`PerfClient::emit_events`].
    pub fn end_measurement(
        &mut self,
        handle: &MeasurementHandle,
        additional: EventDelta,
    ) -> PerformanceEvent {
        let end_time_ms = now_ms();

        match self.registry.complete(&handle.key()) {
            Some(pending) => {
                let duration_ms = end_time_ms.saturating_sub(pending.start_time_ms);
                let event = self.build_event(&pending, additional, duration_ms);

                tracing::trace!(
                    target: "perf::measurement",
                    name = %event.name,
                    correlation_id = %handle.correlation_id,
                    duration_ms = event.duration_ms,
                    "measurement ended"
                );

                event
            }
            None => {
                tracing::trace!(
                    target: "perf::measurement",
                    name = %handle.name,
                    correlation_id = %handle.correlation_id,
                    "measurement ended without matching start"
                );

                let orphan = PendingMeasurement {
                    name: handle.name,
                    correlation_id: handle.correlation_id.clone(),
                    start_time_ms: handle.start_time_ms,
                    start_visibility: None,
                    partial: EventDelta::default(),
                };
                self.build_event(&orphan, additional, 0)
            }
        }
    }

    /// Force-finalize and emit every pending measurement for `correlation_id`.
    ///
    /// Each drained entry becomes an event with its duration measured at
    /// flush time and an unknown outcome (`success = None`): the operation
    /// was abandoned, not explicitly failed. No-op when nothing is pending.
    pub fn flush_measurements(&mut self, name: PerformanceEvents, correlation_id: &str) {
        let end_time_ms = now_ms();
        let drained = self.registry.drain_by_correlation(correlation_id);
        if drained.is_empty() {
            return;
        }

        tracing::trace!(
            target: "perf::measurement",
            name = %name,
            correlation_id = %correlation_id,
            count = drained.len(),
            "flushing pending measurements"
        );

        let events: Vec<PerformanceEvent> = drained
            .iter()
            .map(|pending| {
                let duration_ms = end_time_ms.saturating_sub(pending.start_time_ms);
                let mut event = self.build_event(pending, EventDelta::default(), duration_ms);
                event.success = None;
                event
            })
            .collect();

        self.emit_events(&events, Some(correlation_id));
    }

    /// Drop every pending measurement for `correlation_id` without producing
    /// or emitting any event. Used for explicitly cancelled operations.
    pub fn discard_measurements(&mut self, name: PerformanceEvents, correlation_id: &str) {
        let discarded = self.registry.drain_by_correlation(correlation_id);
        if !discarded.is_empty() {
            tracing::trace!(
                target: "perf::measurement",
                name = %name,
                correlation_id = %correlation_id,
                count = discarded.len(),
                "discarded pending measurements"
            );
        }
    }

    /// Register a callback invoked with every emitted batch of events.
    /// Returns the ID to pass to [`PerfClient::remove_performance_callback`].
    pub fn add_performance_callback<F>(&mut self, callback: F) -> String
    where
        F: FnMut(&[PerformanceEvent]) + 'static,
    {
        self.callbacks.add(Box::new(callback) as PerformanceCallback)
    }

    /// Remove a previously registered callback.
    ///
    /// Returns `true` if an entry existed and was removed; `false` for an
    /// unknown ID. Never fails.
    pub fn remove_performance_callback(&mut self, callback_id: &str) -> bool {
        self.callbacks.remove(callback_id)
    }

    /// Deliver a batch of finished events to every registered callback.
    ///
    /// A panicking callback is isolated and logged; emission always reaches
    /// the remaining callbacks and never propagates to the caller.
    pub fn emit_events(&mut self, events: &[PerformanceEvent], correlation_id: Option<&str>) {
        tracing::trace!(
            target: "perf::emit",
            correlation_id = correlation_id.unwrap_or(""),
            event_count = events.len(),
            callback_count = self.callbacks.len(),
            "emitting events"
        );

        self.callbacks.emit(events);
    }

    /// Serialize a batch of events to its JSON wire form, for handing to a
    /// transport collaborator.
    pub fn export_events(&self, events: &[PerformanceEvent]) -> PerfResult<String> {
        Ok(serde_json::to_string(events)?)
    }

    /// Get the number of measurements currently pending.
    pub fn pending_count(&self) -> usize {
        self.registry.pending_count()
    }

    /// Get the number of registered callbacks.
    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Get the client configuration.
    pub fn config(&self) -> &PerfConfig {
        &self.config
    }

    fn snapshot_visibility(&self) -> Option<String> {
        self.visibility.as_ref().and_then(|source| source.visibility())
    }

    fn build_event(
        &self,
        pending: &PendingMeasurement,
        additional: EventDelta,
        duration_ms: u64,
    ) -> PerformanceEvent {
        let mut merged = pending.partial.clone();
        merged.merge(&additional);

        let start_page_visibility = merged
            .start_page_visibility
            .or_else(|| pending.start_visibility.clone());
        let end_page_visibility = merged
            .end_page_visibility
            .or_else(|| self.snapshot_visibility());

        PerformanceEvent {
            name: pending.name,
            correlation_id: Some(pending.correlation_id.clone()),
            authority: self.config.authority.clone(),
            client_id: self.config.client_id.clone(),
            start_time_ms: pending.start_time_ms,
            duration_ms,
            start_page_visibility,
            end_page_visibility,
            success: merged.success,
            from_cache: merged.from_cache,
            library_name: self.config.library_name.clone(),
            library_version: self.config.library_version.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::thread::sleep;
    use std::time::Duration;

    const OP: PerformanceEvents = PerformanceEvents::AcquireTokenSilent;

    fn make_client() -> PerfClient {
        PerfClient::new(
            PerfConfig::new("client-abc")
                .with_authority("https://login.example.com/common")
                .with_library("auth-sdk", "1.0.0"),
        )
    }

    struct FixedVisibility(&'static str);

    impl VisibilitySource for FixedVisibility {
        fn visibility(&self) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn test_config_default() {
        let config = PerfConfig::default();
        assert!(config.client_id.is_empty());
        assert!(config.authority.is_empty());
        assert_eq!(config.library_version, "0.0.0");
    }

    #[test]
    fn test_config_builder() {
        let config = PerfConfig::new("client-abc")
            .with_authority("https://login.example.com/common")
            .with_library("auth-sdk", "2.1.0");

        assert_eq!(config.client_id, "client-abc");
        assert_eq!(config.authority, "https://login.example.com/common");
        assert_eq!(config.library_name, "auth-sdk");
        assert_eq!(config.library_version, "2.1.0");
    }

    #[test]
    fn test_start_generates_correlation_id_when_omitted() {
        let mut client = make_client();
        let handle1 = client.start_measurement(OP, None);
        let handle2 = client.start_measurement(OP, None);

        assert!(!handle1.correlation_id.is_empty());
        assert_ne!(handle1.correlation_id, handle2.correlation_id);
        assert_eq!(client.pending_count(), 2);
    }

    #[test]
    fn test_start_end_fills_context_from_config() {
        let mut client = make_client();
        let handle = client.start_measurement(OP, Some("corr-1"));
        let event = client.end_measurement(&handle, EventDelta::new().with_success(true));

        assert_eq!(event.name, OP);
        assert_eq!(event.correlation_id.as_deref(), Some("corr-1"));
        assert_eq!(event.client_id, "client-abc");
        assert_eq!(event.authority, "https://login.example.com/common");
        assert_eq!(event.library_name, "auth-sdk");
        assert_eq!(event.library_version, "1.0.0");
        assert_eq!(event.success, Some(true));
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn test_end_measures_elapsed_time() {
        let mut client = make_client();
        let handle = client.start_measurement(OP, Some("corr-1"));

        sleep(Duration::from_millis(20));
        let event = client.end_measurement(&handle, EventDelta::default());

        assert!(event.duration_ms >= 20);
        assert!(event.duration_ms < 2000);
        assert_eq!(event.start_time_ms, handle.start_time_ms);
    }

    #[test]
    fn test_double_end_returns_degraded_event() {
        let mut client = make_client();
        let handle = client.start_measurement(OP, Some("corr-1"));

        sleep(Duration::from_millis(5));
        let first = client.end_measurement(&handle, EventDelta::new().with_success(true));
        let second = client.end_measurement(&handle, EventDelta::default());

        assert!(first.duration_ms >= 5);
        assert_eq!(second.duration_ms, 0);
        assert_eq!(second.success, None);
        assert_eq!(second.correlation_id.as_deref(), Some("corr-1"));
    }

    #[test]
    fn test_additional_data_wins_over_partial() {
        let mut client = make_client();
        let handle = client.start_measurement(OP, Some("corr-1"));

        client.add_measurement_data(
            &handle,
            &EventDelta::new().with_success(false).with_from_cache(true),
        );
        let event = client.end_measurement(&handle, EventDelta::new().with_success(true));

        assert_eq!(event.success, Some(true));
        assert_eq!(event.from_cache, Some(true));
    }

    #[test]
    fn test_handle_is_bound_to_one_measurement() {
        let mut client = make_client();
        let silent = client.start_measurement(OP, Some("corr-1"));
        let cache = client.start_measurement(
            PerformanceEvents::SilentCacheClientAcquireToken,
            Some("corr-1"),
        );

        let event = client.end_measurement(&cache, EventDelta::default());

        assert_eq!(event.name, PerformanceEvents::SilentCacheClientAcquireToken);
        assert_eq!(client.pending_count(), 1);

        let event = client.end_measurement(&silent, EventDelta::default());
        assert_eq!(event.name, OP);
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn test_flush_emits_with_unknown_outcome() {
        let mut client = make_client();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        client.add_performance_callback(move |events| {
            sink.borrow_mut().extend(events.iter().cloned());
        });

        let handle = client.start_measurement(OP, Some("corr-1"));
        client.add_measurement_data(&handle, &EventDelta::new().with_success(true));
        client.start_measurement(
            PerformanceEvents::StandardInteractionClientGetDiscoveredAuthority,
            Some("corr-1"),
        );

        sleep(Duration::from_millis(5));
        client.flush_measurements(OP, "corr-1");

        let events = seen.borrow();
        assert_eq!(events.len(), 2);
        // Outcome forced unknown even where partial data claimed success
        assert!(events.iter().all(|e| e.success.is_none()));
        assert!(events.iter().all(|e| e.duration_ms >= 5));
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn test_flush_is_noop_when_nothing_pending() {
        let mut client = make_client();
        let calls = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&calls);
        client.add_performance_callback(move |_| *sink.borrow_mut() += 1);

        client.flush_measurements(OP, "corr-1");
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn test_discard_produces_no_events() {
        let mut client = make_client();
        let calls = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&calls);
        client.add_performance_callback(move |_| *sink.borrow_mut() += 1);

        client.start_measurement(OP, Some("corr-1"));
        client.start_measurement(PerformanceEvents::SsoSilent, Some("corr-1"));
        client.start_measurement(OP, Some("corr-2"));

        client.discard_measurements(OP, "corr-1");

        assert_eq!(*calls.borrow(), 0);
        assert_eq!(client.pending_count(), 1);
    }

    #[test]
    fn test_remove_callback() {
        let mut client = make_client();
        let id = client.add_performance_callback(|_| {});

        assert!(!client.remove_performance_callback("unknown-id"));
        assert!(client.remove_performance_callback(&id));
        assert!(!client.remove_performance_callback(&id));
        assert_eq!(client.callback_count(), 0);
    }

    #[test]
    fn test_emit_events_reaches_all_callbacks() {
        let mut client = make_client();
        let counts = Rc::new(RefCell::new((0, 0)));

        let sink = Rc::clone(&counts);
        client.add_performance_callback(move |events| sink.borrow_mut().0 += events.len());
        let sink = Rc::clone(&counts);
        client.add_performance_callback(move |events| sink.borrow_mut().1 += events.len());

        let handle = client.start_measurement(OP, Some("corr-1"));
        let event = client.end_measurement(&handle, EventDelta::default());
        client.emit_events(&[event], Some("corr-1"));

        assert_eq!(*counts.borrow(), (1, 1));
    }

    #[test]
    fn test_end_does_not_emit() {
        let mut client = make_client();
        let calls = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&calls);
        client.add_performance_callback(move |_| *sink.borrow_mut() += 1);

        let handle = client.start_measurement(OP, Some("corr-1"));
        client.end_measurement(&handle, EventDelta::default());

        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn test_visibility_snapshots() {
        let mut client = make_client().with_visibility_source(Box::new(FixedVisibility("visible")));

        let handle = client.start_measurement(OP, Some("corr-1"));
        let event = client.end_measurement(&handle, EventDelta::default());

        assert_eq!(event.start_page_visibility.as_deref(), Some("visible"));
        assert_eq!(event.end_page_visibility.as_deref(), Some("visible"));
    }

    #[test]
    fn test_visibility_absent_without_source() {
        let mut client = make_client();
        let handle = client.start_measurement(OP, Some("corr-1"));
        let event = client.end_measurement(&handle, EventDelta::default());

        assert!(event.start_page_visibility.is_none());
        assert!(event.end_page_visibility.is_none());
    }

    #[test]
    fn test_export_events() {
        let mut client = make_client();
        let handle = client.start_measurement(OP, Some("corr-1"));
        let event = client.end_measurement(&handle, EventDelta::new().with_from_cache(true));

        let json = client.export_events(&[event]).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains("\"fromCache\":true"));
        assert!(json.contains("\"correlationId\":\"corr-1\""));
    }

    #[test]
    fn test_generate_correlation_id_unique() {
        let client = make_client();
        assert_ne!(
            client.generate_correlation_id(),
            client.generate_correlation_id()
        );
    }
}
