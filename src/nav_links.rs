// src/nav_links.rs
//
// Navigation link generator. Turns the delivery portion of the route
// into ready-to-open map URLs, chunking when the provider's waypoint
// limit is exceeded. Order is taken from the route exactly; this module
// never re-sorts anything.

use crate::types::{NavConfig, Route, Stop};
use tracing::debug;
use url::Url;

const SEARCH_BASE_URL: &str = "https://www.google.com/maps/search/";
const DIRECTIONS_BASE_URL: &str = "https://www.google.com/maps/dir/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLink {
    pub label: String,
    pub url: String,
}

/// Build map links for the route's delivery stops. The location
/// pseudo-stop is a start-point concept and never becomes a waypoint.
///
/// Shapes: zero stops produce nothing; a single stop produces a search
/// link; up to the limit produces one directions link; beyond the limit
/// the sequence is split into contiguous chunks, one link per chunk,
/// labelled with its 1-based stop range.
pub fn build_nav_links(route: &Route, cfg: &NavConfig) -> Vec<NavLink> {
    let deliveries: Vec<&Stop> = route.delivery_stops().collect();
    if deliveries.is_empty() {
        return Vec::new();
    }

    let limit = cfg.waypoint_limit.max(1);
    let mut links = Vec::with_capacity(deliveries.len().div_ceil(limit));

    for (chunk_idx, chunk) in deliveries.chunks(limit).enumerate() {
        let start = chunk_idx * limit + 1;
        let end = start + chunk.len() - 1;
        let label = range_label(start, end);
        let url = if chunk.len() == 1 {
            search_url(chunk[0])
        } else {
            directions_url(chunk)
        };
        links.push(NavLink { label, url });
    }

    debug!(
        "generated {} navigation link(s) for {} stops (limit {})",
        links.len(),
        deliveries.len(),
        limit
    );
    links
}

fn range_label(start: usize, end: usize) -> String {
    if start == end {
        format!("Stop {}", start)
    } else {
        format!("Stops {}-{}", start, end)
    }
}

fn search_url(stop: &Stop) -> String {
    let url = Url::parse_with_params(
        SEARCH_BASE_URL,
        &[("api", "1"), ("query", stop.full_address().as_str())],
    )
    .expect("provider search base URL is valid");
    url.to_string()
}

fn directions_url(chunk: &[&Stop]) -> String {
    let origin = chunk[0].full_address();
    let destination = chunk[chunk.len() - 1].full_address();
    let waypoints = chunk[1..chunk.len() - 1]
        .iter()
        .map(|s| s.full_address())
        .collect::<Vec<_>>()
        .join("|");

    let mut params: Vec<(&str, &str)> = vec![
        ("api", "1"),
        ("origin", origin.as_str()),
        ("destination", destination.as_str()),
    ];
    if !waypoints.is_empty() {
        params.push(("waypoints", waypoints.as_str()));
    }

    let url = Url::parse_with_params(DIRECTIONS_BASE_URL, &params)
        .expect("provider directions base URL is valid");
    url.to_string()
}
