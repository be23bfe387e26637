// src/geolocation.rs
//
// Geolocation seam. The host platform owns the actual positioning API;
// the core only needs a bounded way to ask "where are we" with two very
// different freshness requirements: route-start positioning demands a
// fresh fix, ambient lookups (weather) can live with an hour-old one.

use crate::errors::LocationError;
use crate::types::{GeoConfig, GeoPoint};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// How long to wait and how stale a cached fix may be.
#[derive(Debug, Clone, Copy)]
pub struct FixPolicy {
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl FixPolicy {
    /// Route-start positioning: bounded wait, no cached fixes.
    pub fn route_start(cfg: &GeoConfig) -> Self {
        Self {
            timeout: Duration::from_secs(cfg.fix_timeout_secs),
            maximum_age: Duration::from_secs(cfg.route_start_max_age_secs),
        }
    }

    /// Ambient lookups tolerate an older cached fix.
    pub fn ambient(cfg: &GeoConfig) -> Self {
        Self {
            timeout: Duration::from_secs(cfg.fix_timeout_secs),
            maximum_age: Duration::from_secs(cfg.ambient_max_age_secs),
        }
    }
}

#[async_trait]
pub trait LocationSource: Send + Sync {
    /// Produce a fix no older than `maximum_age`. A zero maximum age
    /// means a cached fix is never acceptable.
    async fn acquire(&self, maximum_age: Duration) -> Result<GeoPoint, LocationError>;
}

/// Ask the source for a fix under the policy's time bound. Expiry maps
/// to `LocationError::Timeout`; permission failures pass through so the
/// caller can word them separately.
pub async fn acquire_fix(
    source: &dyn LocationSource,
    policy: FixPolicy,
) -> Result<GeoPoint, LocationError> {
    debug!(
        "acquiring location fix (timeout {:?}, max age {:?})",
        policy.timeout, policy.maximum_age
    );
    match tokio::time::timeout(policy.timeout, source.acquire(policy.maximum_age)).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout),
    }
}
