//! Performance Telemetry Engine
//!
//! This crate provides the measurement lifecycle engine used to instrument
//! multi-step client operations such as token acquisition flows. It supports:
//!
//! - Starting and ending named measurements with millisecond durations
//! - Correlating nested sub-operations of one logical request
//! - Incremental partial event data merged at completion
//! - Fan-out of finished events to registered callbacks, with per-callback
//!   panic isolation
//! - Flushing abandoned measurements (emitted with unknown outcome) and
//!   discarding cancelled ones (no telemetry produced)
//!
//! All state is in-memory and transient. Shipping finished events to a
//! telemetry backend, and the lifecycle of the operations being measured,
//! belong to the embedding library.
//!
//! # Example
//!
//! ```rust
//! use perf_telemetry::{EventDelta, PerfClient, PerfConfig, PerformanceEvents};
//!
//! let mut client = PerfClient::new(
//!     PerfConfig::new("client-id")
//!         .with_authority("https://login.example.com/common")
//!         .with_library("auth-sdk", "1.0.0"),
//! );
//!
//! let callback_id = client.add_performance_callback(|events| {
//!     for event in events {
//!         println!("{} took {}ms", event.name, event.duration_ms);
//!     }
//! });
//!
//! let handle = client.start_measurement(PerformanceEvents::AcquireTokenSilent, None);
//! // ... perform the operation ...
//! let event = client.end_measurement(&handle, EventDelta::new().with_success(true));
//! client.emit_events(&[event], None);
//!
//! client.remove_performance_callback(&callback_id);
//! ```
//!
//! # Modules
//!
//! - [`event`] - Operation catalog, finished event record, partial data
//! - [`registry`] - Pending measurement bookkeeping and handles
//! - [`callback`] - Subscriber registration and isolated emission
//! - [`client`] - High-level performance client
//! - [`error`] - Error types

pub mod callback;
pub mod client;
mod error;
pub mod event;
pub mod registry;

pub use callback::{CallbackRegistry, PerformanceCallback};
pub use client::{PerfClient, PerfConfig, VisibilitySource};
pub use error::{PerfError, PerfResult};
pub use event::{EventDelta, PerformanceEvent, PerformanceEvents};
pub use registry::{MeasurementHandle, MeasurementKey, MeasurementRegistry, PendingMeasurement};
