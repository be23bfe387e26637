// src/pipeline/refresh_scheduler.rs
//
// Decides when the derived route data (summary, traffic) is refetched.
// Route mutations publish events; this component turns them into fetch
// actions, so the state engine never schedules I/O on its own.

use crate::pipeline::event_bus::RouteEvent;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshAction {
    /// Re-run the summary call (totals changed with the route shape).
    FetchSummary,

    /// Re-run the traffic call outside the regular poll cadence.
    FetchTraffic,

    /// Route has no delivery stops left; the poll interval must stop.
    StopTrafficPolling,
}

/// Turns route events into refresh decisions and owns the traffic poll
/// cadence. Pure decision logic; the session executes the actions.
pub struct RefreshScheduler {
    traffic_interval: Duration,
    summaries_scheduled: u64,
    traffic_scheduled: u64,
}

impl RefreshScheduler {
    pub fn new(traffic_interval_secs: u64) -> Self {
        Self {
            traffic_interval: Duration::from_secs(traffic_interval_secs),
            summaries_scheduled: 0,
            traffic_scheduled: 0,
        }
    }

    /// Poll cadence for the host's traffic timer.
    pub fn traffic_interval(&self) -> Duration {
        self.traffic_interval
    }

    /// Map a drained batch of route events to fetch actions.
    ///
    /// Shape changes (replace, reorder, delete, status) invalidate the
    /// summary and traffic; pure field edits invalidate nothing. An empty
    /// route cancels traffic polling instead of fetching into the void.
    pub fn plan(&mut self, events: &[RouteEvent], has_deliveries: bool) -> Vec<RefreshAction> {
        let mut shape_changed = false;
        let mut cleared = false;

        for event in events {
            match event {
                RouteEvent::RouteReplaced { .. } | RouteEvent::RouteChanged { .. } => {
                    shape_changed = true;
                }
                RouteEvent::RouteCleared => cleared = true,
                RouteEvent::StopEdited { .. } => {}
            }
        }

        let mut actions = Vec::new();
        if cleared || !has_deliveries {
            if cleared || shape_changed {
                actions.push(RefreshAction::StopTrafficPolling);
            }
            return actions;
        }

        if shape_changed {
            self.summaries_scheduled += 1;
            self.traffic_scheduled += 1;
            actions.push(RefreshAction::FetchSummary);
            actions.push(RefreshAction::FetchTraffic);
            debug!(
                "route shape changed, scheduling refresh (summary #{}, traffic #{})",
                self.summaries_scheduled, self.traffic_scheduled
            );
        }
        actions
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            summaries_scheduled: self.summaries_scheduled,
            traffic_scheduled: self.traffic_scheduled,
        }
    }
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        Self::new(60)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerStats {
    pub summaries_scheduled: u64,
    pub traffic_scheduled: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_change_schedules_summary_and_traffic() {
        let mut sched = RefreshScheduler::default();
        let actions = sched.plan(&[RouteEvent::RouteChanged { generation: 2 }], true);
        assert_eq!(
            actions,
            vec![RefreshAction::FetchSummary, RefreshAction::FetchTraffic]
        );
    }

    #[test]
    fn test_field_edit_schedules_nothing() {
        let mut sched = RefreshScheduler::default();
        let actions = sched.plan(&[RouteEvent::StopEdited { stop_id: 7 }], true);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_cleared_route_stops_polling() {
        let mut sched = RefreshScheduler::default();
        let actions = sched.plan(&[RouteEvent::RouteCleared], false);
        assert_eq!(actions, vec![RefreshAction::StopTrafficPolling]);
    }

    #[test]
    fn test_no_deliveries_never_fetches() {
        let mut sched = RefreshScheduler::default();
        let actions = sched.plan(&[RouteEvent::RouteChanged { generation: 9 }], false);
        assert_eq!(actions, vec![RefreshAction::StopTrafficPolling]);
    }

    #[test]
    fn test_interval_from_config_value() {
        let sched = RefreshScheduler::new(45);
        assert_eq!(sched.traffic_interval(), Duration::from_secs(45));
    }
}
