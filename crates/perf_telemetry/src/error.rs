//! Error types for the performance telemetry engine.
//!
//! The measurement lifecycle surface itself never fails for misuse (an
//! unmatched end degrades, an unknown callback ID returns `false`); these
//! errors cover the serialization helpers.

use thiserror::Error;

/// Errors that can occur in the performance telemetry engine.
#[derive(Debug, Error)]
pub enum PerfError {
    /// Failed to serialize a performance event
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid event data
    #[error("Invalid event: {0}")]
    InvalidEvent(String),
}

/// Result type for performance telemetry operations.
pub type PerfResult<T> = Result<T, PerfError>;
