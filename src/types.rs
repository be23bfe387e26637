// src/types.rs
//
// Core data model and configuration for the stop-list companion.
//
// A Route is an ordered list of Stops: at most one synthetic Location
// stop (always the head) followed by the Delivery stops in planned
// visit order. The list order IS the route.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved `original_stop_number` for the synthetic location stop.
/// Never assigned to a delivery stop by extraction.
pub const LOCATION_STOP_NUMBER: u32 = 0;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub navigation: NavConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub geolocation: GeoConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub server_url: String,
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavConfig {
    /// Maximum stops a single navigation link may encode before chunking.
    /// Provider-dependent (10 on mobile handoff, 20 on desktop).
    pub waypoint_limit: usize,
}

impl Default for NavConfig {
    fn default() -> Self {
        Self { waypoint_limit: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Live traffic refresh cadence while the route has delivery stops.
    pub traffic_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            traffic_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoConfig {
    /// Bounded wait for a fresh fix when positioning the route start.
    pub fix_timeout_secs: u64,
    /// Route-start positioning never accepts a cached fix.
    pub route_start_max_age_secs: u64,
    /// Ambient lookups (weather) tolerate an older cached fix.
    pub ambient_max_age_secs: u64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            fix_timeout_secs: 10,
            route_start_max_age_secs: 0,
            ambient_max_age_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// STOP MODEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageType {
    Box,
    Envelope,
    PlasticBag,
    CustomSized,
    Unknown,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Envelope => "envelope",
            Self::PlasticBag => "plastic_bag",
            Self::CustomSized => "custom_sized",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopType {
    House,
    Apartment,
    Business,
    Locker,
    Unknown,
}

impl StopType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::House => "house",
            Self::Apartment => "apartment",
            Self::Business => "business",
            Self::Locker => "locker",
            Self::Unknown => "unknown",
        }
    }
}

/// Discriminates real deliveries from the synthetic "start from current
/// GPS position" entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopKind {
    Delivery,
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopStatus {
    Pending,
    Delivered,
    Attempted,
    Skipped,
}

impl StopStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Attempted => "attempted",
            Self::Skipped => "skipped",
        }
    }

    /// Resolved stops are out of the running for the current-stop pointer.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    /// Stop number printed in the source screenshot. Unique among the
    /// delivery stops of a route; the stable merge/reconciliation key.
    pub original_stop_number: u32,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    /// Free-text user note.
    #[serde(default)]
    pub label: String,
    pub package_type: PackageType,
    pub stop_type: StopType,
    #[serde(default)]
    pub tba: String,
    #[serde(default)]
    pub package_label: String,
    /// "HH:MM" deadline; absent means no deadline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_window_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_priority: Option<bool>,
    pub kind: StopKind,
    pub status: StopStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Derived: first pending delivery stop in list order. Recomputed by
    /// the route state engine on every mutation.
    #[serde(default)]
    pub is_current_stop: bool,
    /// GPS fix the location stop was built from; absent on deliveries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<GeoPoint>,
}

impl Stop {
    /// Bare delivery stop with everything defaulted except the identity
    /// and street address.
    pub fn delivery(original_stop_number: u32, street: &str) -> Self {
        Self {
            original_stop_number,
            street: street.to_string(),
            city: String::new(),
            state: String::new(),
            zip: String::new(),
            label: String::new(),
            package_type: PackageType::Unknown,
            stop_type: StopType::Unknown,
            tba: String::new(),
            package_label: String::new(),
            delivery_window_end: None,
            is_priority: None,
            kind: StopKind::Delivery,
            status: StopStatus::Pending,
            completed_at: None,
            is_current_stop: false,
            position: None,
        }
    }

    /// Synthetic "start from here" stop. Already resolved so it can never
    /// become the current stop.
    pub fn location(position: GeoPoint) -> Self {
        Self {
            original_stop_number: LOCATION_STOP_NUMBER,
            street: "Current Location".to_string(),
            city: String::new(),
            state: String::new(),
            zip: String::new(),
            label: String::new(),
            package_type: PackageType::Unknown,
            stop_type: StopType::Unknown,
            tba: String::new(),
            package_label: String::new(),
            delivery_window_end: None,
            is_priority: None,
            kind: StopKind::Location,
            status: StopStatus::Delivered,
            completed_at: None,
            is_current_stop: false,
            position: Some(position),
        }
    }

    pub fn is_delivery(&self) -> bool {
        self.kind == StopKind::Delivery
    }

    pub fn is_pending_delivery(&self) -> bool {
        self.kind == StopKind::Delivery && !self.status.is_resolved()
    }

    /// Single-line postal address for navigation queries.
    pub fn full_address(&self) -> String {
        let mut addr = String::new();
        if !self.street.is_empty() {
            addr.push_str(&self.street);
        }
        if !self.city.is_empty() {
            if !addr.is_empty() {
                addr.push_str(", ");
            }
            addr.push_str(&self.city);
        }
        let tail = format!("{} {}", self.state, self.zip);
        let tail = tail.trim();
        if !tail.is_empty() {
            if !addr.is_empty() {
                addr.push_str(", ");
            }
            addr.push_str(tail);
        }
        addr
    }
}

// ============================================================================
// ROUTE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub stops: Vec<Stop>,
}

impl Route {
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    pub fn location(&self) -> Option<&Stop> {
        self.stops.first().filter(|s| s.kind == StopKind::Location)
    }

    pub fn delivery_stops(&self) -> impl Iterator<Item = &Stop> {
        self.stops.iter().filter(|s| s.is_delivery())
    }

    pub fn delivery_count(&self) -> usize {
        self.delivery_stops().count()
    }

    pub fn current_stop(&self) -> Option<&Stop> {
        self.stops.iter().find(|s| s.is_current_stop)
    }
}

// ============================================================================
// DERIVED / EXTERNAL DATA
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub total_stops: usize,
    pub total_distance: String,
    pub total_time: String,
    /// Operator-assigned block/shift label read off the screenshots.
    /// Only the first successful extraction populates it; summary
    /// refreshes carry it forward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_block_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficStatus {
    Light,
    Moderate,
    Heavy,
    Unknown,
}

impl TrafficStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Heavy => "heavy",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficReport {
    pub status: TrafficStatus,
    pub summary: String,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub temperature: f32,
    pub condition: String,
    pub icon: String,
}
