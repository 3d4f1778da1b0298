//! Performance event types: the operation catalog, the immutable finished
//! event record, and the partial-data shape merged into pending measurements.

use serde::{Deserialize, Serialize};

use crate::error::PerfResult;

/// Catalog of measurable client operations.
///
/// The wire name of each operation is its camelCase form (usually
/// `classNameFunctionName`). The measurement engine treats these as opaque
/// comparable tokens and never branches on specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PerformanceEvents {
    /// Token acquisition by trading an authorization code at the token endpoint.
    AcquireTokenByCode,
    /// Access token renewal using a refresh token.
    AcquireTokenByRefreshToken,
    /// Silent token acquisition, from the cache or the network.
    AcquireTokenSilent,
    /// Internal async path of the silent acquisition API.
    AcquireTokenSilentAsync,
    /// Keypair generation and public key thumbprint computation for PoP requests.
    CryptoOptsGetPublicKeyThumbprint,
    /// Signing of a PoP token.
    CryptoOptsSignJwt,
    /// Access token reads from the local cache.
    SilentCacheClientAcquireToken,
    /// Token acquisition from the authorize endpoint in a hidden frame.
    SilentIframeClientAcquireToken,
    /// Token acquisition from the token endpoint using a refresh token.
    SilentRefreshClientAcquireToken,
    /// Silent authorization code and token acquisition using a hidden frame.
    SsoSilent,
    /// Authority metadata discovery for a request.
    StandardInteractionClientGetDiscoveredAuthority,
}

impl PerformanceEvents {
    /// Get the wire name of this operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceEvents::AcquireTokenByCode => "acquireTokenByCode",
            PerformanceEvents::AcquireTokenByRefreshToken => "acquireTokenByRefreshToken",
            PerformanceEvents::AcquireTokenSilent => "acquireTokenSilent",
            PerformanceEvents::AcquireTokenSilentAsync => "acquireTokenSilentAsync",
            PerformanceEvents::CryptoOptsGetPublicKeyThumbprint => {
                "cryptoOptsGetPublicKeyThumbprint"
            }
            PerformanceEvents::CryptoOptsSignJwt => "cryptoOptsSignJwt",
            PerformanceEvents::SilentCacheClientAcquireToken => "silentCacheClientAcquireToken",
            PerformanceEvents::SilentIframeClientAcquireToken => "silentIframeClientAcquireToken",
            PerformanceEvents::SilentRefreshClientAcquireToken => {
                "silentRefreshClientAcquireToken"
            }
            PerformanceEvents::SsoSilent => "ssoSilent",
            PerformanceEvents::StandardInteractionClientGetDiscoveredAuthority => {
                "standardInteractionClientGetDiscoveredAuthority"
            }
        }
    }
}

impl std::fmt::Display for PerformanceEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished performance measurement.
///
/// Built exactly once by the client when a measurement ends (or is flushed)
/// and never mutated afterwards. Serializes with the exact field names that
/// downstream telemetry pipelines key on: optional fields are omitted when
/// absent, tri-state fields are emitted as `null` when unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEvent {
    /// Which operation was measured
    pub name: PerformanceEvents,
    /// Correlation ID grouping all measurements of one logical request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Login authority used for the request
    pub authority: String,
    /// Client ID of the application
    pub client_id: String,
    /// Epoch milliseconds when the measurement started
    pub start_time_ms: u64,
    /// End-to-end duration in milliseconds
    pub duration_ms: u64,
    /// Page visibility when the measurement started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_page_visibility: Option<String>,
    /// Page visibility when the measurement completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_page_visibility: Option<String>,
    /// Whether the operation succeeded; `None` when the outcome is unknown
    pub success: Option<bool>,
    /// Whether the result came from the cache; `None` when unknown
    pub from_cache: Option<bool>,
    /// Name of the library that performed the operation
    pub library_name: String,
    /// Version of the library that performed the operation
    pub library_version: String,
}

impl PerformanceEvent {
    /// Serialize this event to its JSON wire form.
    pub fn to_json(&self) -> PerfResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Partial event data supplied by call sites before or at completion.
///
/// Fields left as `None` are "not provided"; merging two deltas keeps the
/// later writer's value on conflict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDelta {
    /// Outcome of the operation, if the call site knows it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Whether the result was served from the cache
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_cache: Option<bool>,
    /// Override for the start visibility snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_page_visibility: Option<String>,
    /// Override for the end visibility snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_page_visibility: Option<String>,
}

impl EventDelta {
    /// Create an empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the operation outcome.
    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }

    /// Set whether the result came from the cache.
    pub fn with_from_cache(mut self, from_cache: bool) -> Self {
        self.from_cache = Some(from_cache);
        self
    }

    /// Set the end visibility snapshot.
    pub fn with_end_page_visibility(mut self, visibility: impl Into<String>) -> Self {
        self.end_page_visibility = Some(visibility.into());
        self
    }

    /// Merge `other` into this delta; `other` wins on conflict.
    pub fn merge(&mut self, other: &EventDelta) {
        if other.success.is_some() {
            self.success = other.success;
        }
        if other.from_cache.is_some() {
            self.from_cache = other.from_cache;
        }
        if other.start_page_visibility.is_some() {
            self.start_page_visibility = other.start_page_visibility.clone();
        }
        if other.end_page_visibility.is_some() {
            self.end_page_visibility = other.end_page_visibility.clone();
        }
    }

    /// Check whether no field has been provided.
    pub fn is_empty(&self) -> bool {
        self.success.is_none()
            && self.from_cache.is_none()
            && self.start_page_visibility.is_none()
            && self.end_page_visibility.is_none()
    }
}
