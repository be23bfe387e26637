// src/session.rs
//
// Session context. One object owns the route state, the AI provider
// handle, the snapshot store, and the derived summary/traffic/weather
// data, so nothing about a route lives in ambient globals. The host UI
// calls mutators, then pumps the event bus; fetch decisions come from
// the refresh scheduler, never from rendering.

use crate::ai_client::AiProvider;
use crate::errors::{ExtractionError, LocationError, OptimizationError, PersistenceError};
use crate::geolocation::{acquire_fix, FixPolicy, LocationSource};
use crate::ingestion::merge_batches;
use crate::nav_links::{build_nav_links, NavLink};
use crate::persistence::{RouteSnapshot, RouteStore};
use crate::pipeline::{RefreshAction, RefreshScheduler, RouteEvent};
use crate::route_state::{MoveDirection, RouteState, StopEdit};
use crate::types::{
    Config, GeoPoint, Route, RouteSummary, Stop, StopStatus, TrafficReport, TrafficStatus,
    WeatherReport,
};
use chrono::Utc;
use futures::future::try_join_all;
use std::time::Duration;
use tracing::{info, warn};

/// What became of an optimize call once it settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// The route changed while the call was in flight; the response was
    /// discarded rather than overwrite newer state.
    StaleDiscarded,
    /// Nothing to optimize.
    EmptyRoute,
}

pub struct RouteSession<P: AiProvider> {
    config: Config,
    provider: P,
    store: RouteStore,
    state: RouteState,
    scheduler: RefreshScheduler,
    summary: Option<RouteSummary>,
    traffic: Option<TrafficReport>,
    weather: Option<WeatherReport>,
    route_block_code: Option<String>,
}

impl<P: AiProvider> RouteSession<P> {
    pub fn new(config: Config, provider: P, store: RouteStore) -> Self {
        let scheduler = RefreshScheduler::new(config.polling.traffic_interval_secs);
        Self {
            config,
            provider,
            store,
            state: RouteState::new(),
            scheduler,
            summary: None,
            traffic: None,
            weather: None,
            route_block_code: None,
        }
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    pub fn route(&self) -> &Route {
        self.state.route()
    }

    pub fn current_stop(&self) -> Option<&Stop> {
        self.state.current_stop()
    }

    pub fn summary(&self) -> Option<&RouteSummary> {
        self.summary.as_ref()
    }

    pub fn traffic(&self) -> Option<&TrafficReport> {
        self.traffic.as_ref()
    }

    pub fn weather(&self) -> Option<&WeatherReport> {
        self.weather.as_ref()
    }

    pub fn nav_links(&self) -> Vec<NavLink> {
        build_nav_links(self.state.route(), &self.config.navigation)
    }

    pub fn traffic_interval(&self) -> Duration {
        self.scheduler.traffic_interval()
    }

    // ------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------

    /// Extract every screenshot concurrently, merge, and replace the
    /// route. All-or-nothing: one failed extraction discards the batch.
    pub async fn ingest_screenshots(
        &mut self,
        images: &[Vec<u8>],
    ) -> Result<(), ExtractionError> {
        info!("ingesting {} screenshot(s)", images.len());
        let calls = images.iter().map(|img| self.provider.extract_stops(img));
        let batches = try_join_all(calls).await.map_err(ExtractionError::from)?;

        let merged = merge_batches(&batches)?;
        info!("ingestion produced {} stops", merged.stops.len());

        self.route_block_code = merged.route_block_code;
        self.state.set_route(Some(merged.stops));
        if let Err(e) = self.pump().await {
            warn!("autosave after ingestion failed: {}", e);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Optimization
    // ------------------------------------------------------------------

    /// Fresh fix for route-start positioning. Kept separate from
    /// `optimize_route` so a location failure can be messaged on its own
    /// and the user can retry optimization without a start point.
    pub async fn acquire_start_fix(
        &self,
        source: &dyn LocationSource,
    ) -> Result<GeoPoint, LocationError> {
        acquire_fix(source, FixPolicy::route_start(&self.config.geolocation)).await
    }

    pub async fn optimize_route(
        &mut self,
        start: Option<GeoPoint>,
        avoid_left_turns: bool,
    ) -> Result<ApplyOutcome, OptimizationError> {
        let stops: Vec<Stop> = self.state.route().delivery_stops().cloned().collect();
        if stops.is_empty() {
            return Ok(ApplyOutcome::EmptyRoute);
        }

        let dispatched = self.state.generation();
        let returned = self
            .provider
            .optimize_route(&stops, start, avoid_left_turns)
            .await?;

        if self.state.generation() != dispatched {
            warn!("optimize response arrived for a stale route, discarding");
            return Ok(ApplyOutcome::StaleDiscarded);
        }

        let order: Vec<u32> = returned.iter().map(|w| w.original_stop_number).collect();
        self.state.apply_optimized_order(&order, start)?;
        info!("applied optimized order for {} stops", order.len());
        if let Err(e) = self.pump().await {
            warn!("autosave after optimization failed: {}", e);
        }
        Ok(ApplyOutcome::Applied)
    }

    // ------------------------------------------------------------------
    // Derived data refreshes (non-fatal)
    // ------------------------------------------------------------------

    pub async fn refresh_summary(&mut self) {
        let stops: Vec<Stop> = self.state.route().delivery_stops().cloned().collect();
        if stops.is_empty() {
            self.summary = None;
            return;
        }

        let dispatched = self.state.generation();
        match self.provider.summarize_route(&stops).await {
            Ok(data) => {
                if self.state.generation() != dispatched {
                    warn!("summary response arrived for a stale route, discarding");
                    return;
                }
                self.summary = Some(RouteSummary {
                    total_stops: stops.len(),
                    total_distance: data.total_distance,
                    total_time: data.total_time,
                    route_block_code: self.route_block_code.clone(),
                });
            }
            Err(e) => {
                // Placeholder totals keep the rest of the UI usable.
                warn!("summary call failed, using placeholders: {}", e);
                self.summary = Some(RouteSummary {
                    total_stops: stops.len(),
                    total_distance: "N/A".to_string(),
                    total_time: "N/A".to_string(),
                    route_block_code: self.route_block_code.clone(),
                });
            }
        }
    }

    pub async fn refresh_traffic(&mut self) {
        let stops: Vec<Stop> = self.state.route().delivery_stops().cloned().collect();
        if stops.is_empty() {
            self.traffic = None;
            return;
        }

        let dispatched = self.state.generation();
        match self.provider.traffic_conditions(&stops).await {
            Ok(data) => {
                if self.state.generation() != dispatched {
                    warn!("traffic response arrived for a stale route, discarding");
                    return;
                }
                self.traffic = Some(TrafficReport {
                    status: data.status,
                    summary: data.summary,
                    last_updated: Utc::now(),
                });
            }
            Err(e) => {
                warn!("traffic call failed, reporting unknown: {}", e);
                self.traffic = Some(TrafficReport {
                    status: TrafficStatus::Unknown,
                    summary: "Traffic conditions unavailable".to_string(),
                    last_updated: Utc::now(),
                });
            }
        }
    }

    pub async fn refresh_weather(&mut self, point: GeoPoint) {
        match self.provider.weather(point).await {
            Ok(report) => self.weather = Some(report),
            Err(e) => {
                warn!("weather call failed: {}", e);
                self.weather = None;
            }
        }
    }

    /// One traffic poll cycle. The host drives this on
    /// `traffic_interval()`; a `false` return means the route has no
    /// delivery stops left and the interval must stop.
    pub async fn traffic_tick(&mut self) -> bool {
        if self.state.route().delivery_count() == 0 {
            return false;
        }
        self.refresh_traffic().await;
        true
    }

    // ------------------------------------------------------------------
    // Mutation passthroughs (host calls pump() after a burst)
    // ------------------------------------------------------------------

    pub fn edit_stop(&mut self, stop_id: u32, edit: StopEdit) {
        self.state.update_field(stop_id, edit);
    }

    pub fn reorder_stops(&mut self, from: usize, to: usize) {
        self.state.reorder(from, to);
    }

    pub fn move_stop(&mut self, stop_id: u32, direction: MoveDirection) {
        self.state.move_stop(stop_id, direction);
    }

    pub fn delete_stop(&mut self, stop_id: u32) {
        self.state.delete(stop_id);
    }

    pub fn set_stop_status(&mut self, stop_id: u32, status: StopStatus) {
        self.state.set_status(stop_id, status);
    }

    pub fn reset_to_original_order(&mut self) {
        self.state.reset_to_original_order();
    }

    // ------------------------------------------------------------------
    // Event pump
    // ------------------------------------------------------------------

    /// Drain route events, execute the scheduler's fetch plan, and
    /// autosave if the route shape changed. Returns the executed actions
    /// so the host can react (e.g. stop its traffic timer).
    pub async fn pump(&mut self) -> Result<Vec<RefreshAction>, PersistenceError> {
        let events = self.state.drain_events();
        if events.is_empty() {
            return Ok(Vec::new());
        }

        let shape_changed = events.iter().any(|e| {
            matches!(
                e,
                RouteEvent::RouteReplaced { .. }
                    | RouteEvent::RouteChanged { .. }
                    | RouteEvent::RouteCleared
            )
        });

        let has_deliveries = self.state.route().delivery_count() > 0;
        let actions = self.scheduler.plan(&events, has_deliveries);
        for action in &actions {
            match action {
                RefreshAction::FetchSummary => self.refresh_summary().await,
                RefreshAction::FetchTraffic => self.refresh_traffic().await,
                RefreshAction::StopTrafficPolling => {
                    self.traffic = None;
                    self.summary = None;
                }
            }
        }

        if shape_changed {
            self.save_snapshot()?;
        }
        Ok(actions)
    }

    // ------------------------------------------------------------------
    // Persistence / lifecycle
    // ------------------------------------------------------------------

    fn save_snapshot(&self) -> Result<(), PersistenceError> {
        if self.state.route().is_empty() {
            self.store.clear()
        } else {
            self.store.save(&RouteSnapshot {
                route: self.state.route().clone(),
                route_block_code: self.route_block_code.clone(),
            })
        }
    }

    /// Restore the persisted snapshot, if any. A corrupt snapshot has
    /// already been cleared by the store when the error surfaces.
    pub async fn load_saved(&mut self) -> Result<bool, PersistenceError> {
        let Some(snapshot) = self.store.load()? else {
            return Ok(false);
        };
        info!(
            "restoring saved route ({} stops)",
            snapshot.route.stops.len()
        );
        self.route_block_code = snapshot.route_block_code;
        self.state.set_route(Some(snapshot.route.stops));
        if let Err(e) = self.pump().await {
            warn!("autosave after load failed: {}", e);
        }
        Ok(true)
    }

    /// Start over: clear the route, the derived data, and the snapshot.
    /// The generation bump invalidates every in-flight response.
    pub fn reset(&mut self) -> Result<(), PersistenceError> {
        self.state.set_route(None);
        self.state.drain_events();
        self.summary = None;
        self.traffic = None;
        self.weather = None;
        self.route_block_code = None;
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_client::{SummaryData, TrafficData, WireStop};
    use crate::errors::ProviderError;
    use crate::ingestion::ExtractionBatch;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// In-process provider fake with programmable responses.
    struct FakeProvider {
        extractions: Mutex<VecDeque<Result<ExtractionBatch, ProviderError>>>,
        optimized: Mutex<Option<Result<Vec<WireStop>, ProviderError>>>,
        summary: Mutex<Option<Result<SummaryData, ProviderError>>>,
        traffic: Mutex<Option<Result<TrafficData, ProviderError>>>,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                extractions: Mutex::new(VecDeque::new()),
                optimized: Mutex::new(None),
                summary: Mutex::new(None),
                traffic: Mutex::new(None),
            }
        }

        fn push_extraction(&self, result: Result<ExtractionBatch, ProviderError>) {
            self.extractions.lock().unwrap().push_back(result);
        }

        fn server_error() -> ProviderError {
            ProviderError::Status {
                status: 500,
                body: "model overloaded".to_string(),
            }
        }
    }

    #[async_trait]
    impl AiProvider for FakeProvider {
        async fn extract_stops(&self, _image: &[u8]) -> Result<ExtractionBatch, ProviderError> {
            self.extractions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ExtractionBatch::default()))
        }

        async fn optimize_route(
            &self,
            _stops: &[Stop],
            _start_location: Option<GeoPoint>,
            _avoid_left_turns: bool,
        ) -> Result<Vec<WireStop>, ProviderError> {
            self.optimized
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(Self::server_error()))
        }

        async fn summarize_route(&self, _stops: &[Stop]) -> Result<SummaryData, ProviderError> {
            self.summary
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(Self::server_error()))
        }

        async fn traffic_conditions(&self, _stops: &[Stop]) -> Result<TrafficData, ProviderError> {
            self.traffic
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(Self::server_error()))
        }

        async fn weather(&self, _point: GeoPoint) -> Result<WeatherReport, ProviderError> {
            Ok(WeatherReport {
                temperature: 71.0,
                condition: "Clear".to_string(),
                icon: "01d".to_string(),
            })
        }
    }

    fn session_in(dir: &tempfile::TempDir) -> RouteSession<FakeProvider> {
        let store = RouteStore::new(dir.path().join("route.json"));
        RouteSession::new(Config::default(), FakeProvider::new(), store)
    }

    fn batch(stops: Vec<Stop>, code: Option<&str>) -> ExtractionBatch {
        ExtractionBatch {
            stops,
            route_block_code: code.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_ingest_merges_and_sets_route() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        session.provider.push_extraction(Ok(batch(
            vec![Stop::delivery(3, "A St"), Stop::delivery(1, "B St")],
            Some("CX-14"),
        )));
        session.provider.push_extraction(Ok(batch(
            vec![Stop::delivery(1, "B St dup"), Stop::delivery(2, "C St")],
            None,
        )));

        session
            .ingest_screenshots(&[vec![0u8; 4], vec![1u8; 4]])
            .await
            .unwrap();

        let numbers: Vec<u32> = session
            .route()
            .delivery_stops()
            .map(|s| s.original_stop_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(session.route().stops[0].street, "B St");
        assert_eq!(session.current_stop().unwrap().original_stop_number, 1);

        // Provider summary failed (unprogrammed), so placeholders stand in.
        let summary = session.summary().unwrap();
        assert_eq!(summary.total_stops, 3);
        assert_eq!(summary.total_distance, "N/A");
        assert_eq!(summary.route_block_code.as_deref(), Some("CX-14"));

        // Traffic fell back to unknown rather than blocking the UI.
        assert_eq!(session.traffic().unwrap().status, TrafficStatus::Unknown);
    }

    #[tokio::test]
    async fn test_ingest_autosaves_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        session
            .provider
            .push_extraction(Ok(batch(vec![Stop::delivery(1, "A")], None)));

        session.ingest_screenshots(&[vec![0u8; 4]]).await.unwrap();

        let store = RouteStore::new(dir.path().join("route.json"));
        let snapshot = store.load().unwrap().unwrap();
        assert_eq!(snapshot.route.stops.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_single_failure_discards_batch() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        session
            .provider
            .push_extraction(Ok(batch(vec![Stop::delivery(1, "A")], None)));
        session
            .provider
            .push_extraction(Err(FakeProvider::server_error()));

        let err = session
            .ingest_screenshots(&[vec![0u8; 4], vec![1u8; 4]])
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Provider(_)));
        assert!(session.route().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_empty_extraction_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        session.provider.push_extraction(Ok(batch(vec![], None)));

        let err = session.ingest_screenshots(&[vec![0u8; 4]]).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NoStops));
    }

    #[tokio::test]
    async fn test_optimize_applies_order_and_start() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        session.provider.push_extraction(Ok(batch(
            vec![
                Stop::delivery(1, "A"),
                Stop::delivery(2, "B"),
                Stop::delivery(3, "C"),
            ],
            None,
        )));
        session.ingest_screenshots(&[vec![0u8; 4]]).await.unwrap();

        let permuted = vec![
            WireStop::from(&Stop::delivery(2, "B")),
            WireStop::from(&Stop::delivery(3, "C")),
            WireStop::from(&Stop::delivery(1, "A")),
        ];
        *session.provider.optimized.lock().unwrap() = Some(Ok(permuted));

        let start = GeoPoint { lat: 40.7, lon: -74.0 };
        let outcome = session.optimize_route(Some(start), false).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Applied);

        assert!(session.route().location().is_some());
        let numbers: Vec<u32> = session
            .route()
            .delivery_stops()
            .map(|s| s.original_stop_number)
            .collect();
        assert_eq!(numbers, vec![2, 3, 1]);
        assert_eq!(session.current_stop().unwrap().original_stop_number, 2);
    }

    #[tokio::test]
    async fn test_optimize_mismatch_leaves_route_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        session.provider.push_extraction(Ok(batch(
            vec![Stop::delivery(1, "A"), Stop::delivery(2, "B")],
            None,
        )));
        session.ingest_screenshots(&[vec![0u8; 4]]).await.unwrap();
        let before: Vec<u32> = session
            .route()
            .delivery_stops()
            .map(|s| s.original_stop_number)
            .collect();

        // Provider dropped stop 2 and invented stop 9.
        let bad = vec![
            WireStop::from(&Stop::delivery(1, "A")),
            WireStop::from(&Stop::delivery(9, "X")),
        ];
        *session.provider.optimized.lock().unwrap() = Some(Ok(bad));

        let err = session.optimize_route(None, false).await.unwrap_err();
        assert!(matches!(err, OptimizationError::SetMismatch { .. }));

        let after: Vec<u32> = session
            .route()
            .delivery_stops()
            .map(|s| s.original_stop_number)
            .collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_optimize_empty_route() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        let outcome = session.optimize_route(None, false).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::EmptyRoute);
    }

    #[tokio::test]
    async fn test_summary_success_carries_block_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        session.provider.push_extraction(Ok(batch(
            vec![Stop::delivery(1, "A")],
            Some("CX-14"),
        )));
        session.ingest_screenshots(&[vec![0u8; 4]]).await.unwrap();

        *session.provider.summary.lock().unwrap() = Some(Ok(SummaryData {
            total_distance: "12.5 mi".to_string(),
            total_time: "1 hr 10 min".to_string(),
        }));
        session.refresh_summary().await;

        let summary = session.summary().unwrap();
        assert_eq!(summary.total_distance, "12.5 mi");
        assert_eq!(summary.total_stops, 1);
        // Only extraction populates the block code; refreshes carry it.
        assert_eq!(summary.route_block_code.as_deref(), Some("CX-14"));
    }

    #[tokio::test]
    async fn test_traffic_success_and_tick() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        assert!(!session.traffic_tick().await, "empty route must stop polling");

        session
            .provider
            .push_extraction(Ok(batch(vec![Stop::delivery(1, "A")], None)));
        session.ingest_screenshots(&[vec![0u8; 4]]).await.unwrap();

        *session.provider.traffic.lock().unwrap() = Some(Ok(TrafficData {
            status: TrafficStatus::Heavy,
            summary: "Congestion on I-5".to_string(),
        }));
        assert!(session.traffic_tick().await);
        assert_eq!(session.traffic().unwrap().status, TrafficStatus::Heavy);
    }

    #[tokio::test]
    async fn test_delete_last_stop_stops_polling_and_clears_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        session
            .provider
            .push_extraction(Ok(batch(vec![Stop::delivery(1, "A")], None)));
        session.ingest_screenshots(&[vec![0u8; 4]]).await.unwrap();

        session.delete_stop(1);
        let actions = session.pump().await.unwrap();
        assert!(actions.contains(&RefreshAction::StopTrafficPolling));
        assert!(session.traffic().is_none());

        let store = RouteStore::new(dir.path().join("route.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_load_saved_restores_route_and_block_code() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut session = session_in(&dir);
            session.provider.push_extraction(Ok(batch(
                vec![Stop::delivery(5, "E"), Stop::delivery(4, "D")],
                Some("CX-2"),
            )));
            session.ingest_screenshots(&[vec![0u8; 4]]).await.unwrap();
        }

        let mut session = session_in(&dir);
        assert!(session.load_saved().await.unwrap());
        let numbers: Vec<u32> = session
            .route()
            .delivery_stops()
            .map(|s| s.original_stop_number)
            .collect();
        assert_eq!(numbers, vec![4, 5]);
        assert_eq!(session.current_stop().unwrap().original_stop_number, 4);
        assert_eq!(
            session.summary().unwrap().route_block_code.as_deref(),
            Some("CX-2")
        );
    }

    #[tokio::test]
    async fn test_load_saved_without_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        assert!(!session.load_saved().await.unwrap());
    }

    #[tokio::test]
    async fn test_reset_clears_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        session.provider.push_extraction(Ok(batch(
            vec![Stop::delivery(1, "A")],
            Some("CX-9"),
        )));
        session.ingest_screenshots(&[vec![0u8; 4]]).await.unwrap();

        session.reset().unwrap();
        assert!(session.route().is_empty());
        assert!(session.summary().is_none());
        assert!(session.traffic().is_none());

        let store = RouteStore::new(dir.path().join("route.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_nav_links_follow_session_route() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_in(&dir);
        session.provider.push_extraction(Ok(batch(
            vec![Stop::delivery(1, "A St"), Stop::delivery(2, "B St")],
            None,
        )));
        session.ingest_screenshots(&[vec![0u8; 4]]).await.unwrap();

        let links = session.nav_links();
        assert_eq!(links.len(), 1);
        assert!(links[0].url.contains("origin=A+St"));
        assert!(links[0].url.contains("destination=B+St"));
    }
}
