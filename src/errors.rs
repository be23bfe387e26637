// src/errors.rs
//
// Failure taxonomy. Everything here originates at an external-collaborator
// boundary (AI provider, geolocation, disk); the route state engine itself
// never fails a structurally valid mutation.

use thiserror::Error;

/// Transport-level failure talking to the AI provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Screenshot ingestion failed; the batch is discarded, no partial route.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Every extraction settled but the merged result had no stops.
    /// Distinct from a transport failure so the caller can word the
    /// "could not extract addresses" message accordingly.
    #[error("no delivery stops could be extracted from the screenshots")]
    NoStops,
}

/// Optimize call failed; the route is left unchanged.
#[derive(Debug, Error)]
pub enum OptimizationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The returned order is not a permutation of the current delivery
    /// stops. Applying it would corrupt the route, so it is rejected.
    #[error("optimized order mismatch: missing stops {missing:?}, unexpected stops {unexpected:?}")]
    SetMismatch {
        missing: Vec<u32>,
        unexpected: Vec<u32>,
    },
}

#[derive(Debug, Error)]
pub enum LocationError {
    /// User-actionable: the host must point at the permission setting.
    #[error("location permission denied")]
    PermissionDenied,

    #[error("timed out waiting for a location fix")]
    Timeout,

    #[error("location unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored snapshot did not parse. The store clears it on the way out
    /// so the next load does not hit the same failure.
    #[error("saved route is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
