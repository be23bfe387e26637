// src/lib.rs
//
// Courier stop-list companion core.
//
// A courier photographs the stop list in their delivery app; the AI
// provider extracts structured stops from the screenshots; this crate
// owns everything after that: merging per-screenshot batches into one
// canonical route, tracking per-stop delivery status and the current
// stop, applying manual and AI-optimized reorders, and producing
// chunked navigation links. The host UI embeds a RouteSession and
// renders from its state.

pub mod ai_client;
pub mod config;
pub mod errors;
pub mod geolocation;
pub mod ingestion;
pub mod nav_links;
pub mod persistence;
pub mod pipeline;
pub mod route_state;
pub mod session;
pub mod types;

pub use ai_client::{AiClient, AiProvider};
pub use errors::{
    ExtractionError, LocationError, OptimizationError, PersistenceError, ProviderError,
};
pub use ingestion::{merge_batches, ExtractionBatch, MergedIngestion};
pub use nav_links::{build_nav_links, NavLink};
pub use persistence::{RouteSnapshot, RouteStore};
pub use route_state::{MoveDirection, RouteState, StopEdit};
pub use session::{ApplyOutcome, RouteSession};
pub use types::{
    Config, GeoPoint, PackageType, Route, RouteSummary, Stop, StopKind, StopStatus, StopType,
    TrafficReport, TrafficStatus, WeatherReport,
};
