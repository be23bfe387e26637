// src/ai_client.rs
//
// Async HTTP client for the AI provider backing this app.
//
// Every non-trivial inference is delegated: screenshot-to-stops
// extraction, route-order optimization, distance/time summaries, and
// traffic/weather briefs. This module owns the wire contracts and the
// transport; it holds no route state of its own.

use crate::errors::ProviderError;
use crate::ingestion::ExtractionBatch;
use crate::types::{
    AiConfig, GeoPoint, PackageType, Stop, StopKind, StopStatus, StopType, TrafficStatus,
    WeatherReport,
};
use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

// ============================================================================
// WIRE TYPES (must match the provider's JSON API)
// ============================================================================

/// Stop shape on the wire. Extraction produces these and optimization
/// echoes them back; routing state (status, current flag) never crosses
/// the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireStop {
    pub original_stop_number: u32,
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    pub package_type: PackageType,
    pub stop_type: StopType,
    #[serde(default)]
    pub tba: String,
    #[serde(default)]
    pub package_label: String,
    #[serde(default)]
    pub delivery_window_end: Option<String>,
    #[serde(default)]
    pub is_priority: Option<bool>,
}

impl From<WireStop> for Stop {
    fn from(w: WireStop) -> Self {
        Self {
            original_stop_number: w.original_stop_number,
            street: w.street,
            city: w.city,
            state: w.state,
            zip: w.zip,
            label: String::new(),
            package_type: w.package_type,
            stop_type: w.stop_type,
            tba: w.tba,
            package_label: w.package_label,
            delivery_window_end: w.delivery_window_end,
            is_priority: w.is_priority,
            kind: StopKind::Delivery,
            status: StopStatus::Pending,
            completed_at: None,
            is_current_stop: false,
            position: None,
        }
    }
}

impl From<&Stop> for WireStop {
    fn from(s: &Stop) -> Self {
        Self {
            original_stop_number: s.original_stop_number,
            street: s.street.clone(),
            city: s.city.clone(),
            state: s.state.clone(),
            zip: s.zip.clone(),
            package_type: s.package_type,
            stop_type: s.stop_type,
            tba: s.tba.clone(),
            package_label: s.package_label.clone(),
            delivery_window_end: s.delivery_window_end.clone(),
            is_priority: s.is_priority,
        }
    }
}

#[derive(Debug, Serialize)]
struct ExtractStopsRequest {
    image_base64: String,
}

#[derive(Debug, Deserialize)]
struct ExtractStopsResponse {
    stops: Vec<WireStop>,
    #[serde(default)]
    route_block_code: Option<String>,
}

#[derive(Debug, Serialize)]
struct OptimizeRouteRequest {
    stops: Vec<WireStop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_location: Option<GeoPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    avoid_left_turns: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct OptimizeRouteResponse {
    stops: Vec<WireStop>,
}

#[derive(Debug, Serialize)]
struct StopsPayload {
    stops: Vec<WireStop>,
}

/// Provider half of a route summary; the core adds the stop count.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryData {
    pub total_distance: String,
    pub total_time: String,
}

/// Provider half of a traffic brief; the core stamps the refresh time.
#[derive(Debug, Clone, Deserialize)]
pub struct TrafficData {
    pub status: TrafficStatus,
    pub summary: String,
}

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

/// Seam between the session logic and the hosted model. Production uses
/// the reqwest-backed `AiClient`; tests swap in an in-process fake.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn extract_stops(&self, image: &[u8]) -> Result<ExtractionBatch, ProviderError>;

    async fn optimize_route(
        &self,
        stops: &[Stop],
        start_location: Option<GeoPoint>,
        avoid_left_turns: bool,
    ) -> Result<Vec<WireStop>, ProviderError>;

    async fn summarize_route(&self, stops: &[Stop]) -> Result<SummaryData, ProviderError>;

    async fn traffic_conditions(&self, stops: &[Stop]) -> Result<TrafficData, ProviderError>;

    async fn weather(&self, point: GeoPoint) -> Result<WeatherReport, ProviderError>;
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct AiClient {
    server_url: String,
    http_client: reqwest::Client,
}

impl AiClient {
    pub fn new(config: &AiConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            server_url: config.server_url.clone(),
            http_client,
        }
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ProviderError> {
        let url = format!("{}{}", self.server_url, path);
        let resp = self.http_client.post(&url).json(body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            warn!("AI server error {} on {}: {}", status, path, body);
            return Err(ProviderError::Status { status, body });
        }

        resp.json::<R>().await.map_err(|e| {
            warn!("failed to parse AI response from {}: {}", path, e);
            ProviderError::Decode(e.to_string())
        })
    }

    fn wire_stops(stops: &[Stop]) -> Vec<WireStop> {
        stops.iter().map(WireStop::from).collect()
    }
}

#[async_trait]
impl AiProvider for AiClient {
    async fn extract_stops(&self, image: &[u8]) -> Result<ExtractionBatch, ProviderError> {
        let request = ExtractStopsRequest {
            image_base64: base64::engine::general_purpose::STANDARD.encode(image),
        };
        info!("sending extraction request ({} byte screenshot)", image.len());

        let resp: ExtractStopsResponse = self.post_json("/api/extract", &request).await?;
        info!(
            "extraction returned {} stops (block code: {:?})",
            resp.stops.len(),
            resp.route_block_code
        );
        Ok(ExtractionBatch {
            stops: resp.stops.into_iter().map(Stop::from).collect(),
            route_block_code: resp.route_block_code,
        })
    }

    async fn optimize_route(
        &self,
        stops: &[Stop],
        start_location: Option<GeoPoint>,
        avoid_left_turns: bool,
    ) -> Result<Vec<WireStop>, ProviderError> {
        let request = OptimizeRouteRequest {
            stops: Self::wire_stops(stops),
            start_location,
            avoid_left_turns: avoid_left_turns.then_some(true),
        };
        info!(
            "sending optimize request ({} stops, start: {})",
            stops.len(),
            start_location.is_some()
        );

        let resp: OptimizeRouteResponse = self.post_json("/api/optimize", &request).await?;
        info!("optimize returned {} stops", resp.stops.len());
        Ok(resp.stops)
    }

    async fn summarize_route(&self, stops: &[Stop]) -> Result<SummaryData, ProviderError> {
        let request = StopsPayload {
            stops: Self::wire_stops(stops),
        };
        self.post_json("/api/summary", &request).await
    }

    async fn traffic_conditions(&self, stops: &[Stop]) -> Result<TrafficData, ProviderError> {
        let request = StopsPayload {
            stops: Self::wire_stops(stops),
        };
        self.post_json("/api/traffic", &request).await
    }

    async fn weather(&self, point: GeoPoint) -> Result<WeatherReport, ProviderError> {
        self.post_json("/api/weather", &point).await
    }
}
