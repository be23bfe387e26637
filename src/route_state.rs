// src/route_state.rs
//
// Route state engine. Sole owner of the authoritative Route: every
// mutation funnels through here so two invariants can never break:
//
//   1. The location pseudo-stop, when present, is the head of the list.
//   2. Exactly the first pending delivery stop (in list order) carries
//      the current-stop flag; zero stops carry it when none are pending.
//
// Mutators are total: an unknown stop id or out-of-range index is a
// defined no-op, never a panic. The UI derives those from this same
// state, so a miss means a stale view, not a bug worth crashing for.

use crate::errors::OptimizationError;
use crate::pipeline::event_bus::{RouteEvent, RouteEventBus};
use crate::types::{GeoPoint, PackageType, Route, Stop, StopKind, StopStatus, StopType};
use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Closed set of editable fields. One variant per field keeps edits
/// exhaustively matched instead of keyed by name strings.
#[derive(Debug, Clone, PartialEq)]
pub enum StopEdit {
    Label(String),
    PackageType(PackageType),
    PackageLabel(String),
    Tba(String),
    StopType(StopType),
    DeliveryWindowEnd(Option<String>),
    Priority(Option<bool>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
}

pub struct RouteState {
    route: Route,
    /// Bumped by every mutation. Async responses dispatched against an
    /// older generation are stale and must be discarded by the caller.
    generation: u64,
    bus: RouteEventBus,
}

impl RouteState {
    pub fn new() -> Self {
        Self {
            route: Route::default(),
            generation: 0,
            bus: RouteEventBus::default(),
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current_stop(&self) -> Option<&Stop> {
        self.route.current_stop()
    }

    pub fn drain_events(&mut self) -> Vec<RouteEvent> {
        self.bus.drain()
    }

    // ------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------

    /// Replace the route wholesale (after ingestion, load, or reset).
    /// `None` clears it. Any location stop in the input is normalized to
    /// the head position; extras beyond the first are dropped.
    pub fn set_route(&mut self, stops: Option<Vec<Stop>>) {
        self.generation += 1;
        match stops {
            None => {
                self.route = Route::default();
                self.bus.publish(RouteEvent::RouteCleared);
            }
            Some(stops) => {
                let mut location: Option<Stop> = None;
                let mut deliveries: Vec<Stop> = Vec::with_capacity(stops.len());
                for stop in stops {
                    match stop.kind {
                        StopKind::Location => {
                            if location.is_some() {
                                warn!("route had more than one location stop, dropping extra");
                            } else {
                                location = Some(stop);
                            }
                        }
                        StopKind::Delivery => deliveries.push(stop),
                    }
                }

                let mut ordered = Vec::with_capacity(deliveries.len() + 1);
                if let Some(loc) = location {
                    ordered.push(loc);
                }
                ordered.extend(deliveries);
                self.route = Route { stops: ordered };
                self.recompute_current_stop();
                self.bus.publish(RouteEvent::RouteReplaced {
                    generation: self.generation,
                });
            }
        }
    }

    /// Edit one field of a delivery stop. Order and the current-stop flag
    /// are untouched; unknown id is a no-op.
    pub fn update_field(&mut self, stop_id: u32, edit: StopEdit) {
        let Some(stop) = self.delivery_mut(stop_id) else {
            debug!("update_field: stop {} not in route, ignoring", stop_id);
            return;
        };
        match edit {
            StopEdit::Label(v) => stop.label = v,
            StopEdit::PackageType(v) => stop.package_type = v,
            StopEdit::PackageLabel(v) => stop.package_label = v,
            StopEdit::Tba(v) => stop.tba = v,
            StopEdit::StopType(v) => stop.stop_type = v,
            StopEdit::DeliveryWindowEnd(v) => stop.delivery_window_end = v,
            StopEdit::Priority(v) => stop.is_priority = v,
        }
        self.generation += 1;
        self.bus.publish(RouteEvent::StopEdited { stop_id });
    }

    /// Relocate one delivery stop. Indices address the delivery
    /// sub-sequence only; the location stop sits outside them.
    pub fn reorder(&mut self, from: usize, to: usize) {
        let offset = self.delivery_offset();
        let count = self.route.stops.len() - offset;
        if from >= count || to >= count {
            debug!(
                "reorder: index out of range (from {}, to {}, {} stops), ignoring",
                from, to, count
            );
            return;
        }
        if from == to {
            return;
        }
        let stop = self.route.stops.remove(offset + from);
        self.route.stops.insert(offset + to, stop);
        self.finish_structural_change();
    }

    /// Swap a delivery stop with its neighbor. Edges and unknown ids are
    /// no-ops.
    pub fn move_stop(&mut self, stop_id: u32, direction: MoveDirection) {
        let offset = self.delivery_offset();
        let Some(pos) = self
            .route
            .stops
            .iter()
            .position(|s| s.is_delivery() && s.original_stop_number == stop_id)
        else {
            debug!("move_stop: stop {} not in route, ignoring", stop_id);
            return;
        };
        let target = match direction {
            MoveDirection::Up if pos > offset => pos - 1,
            MoveDirection::Down if pos + 1 < self.route.stops.len() => pos + 1,
            _ => return,
        };
        self.route.stops.swap(pos, target);
        self.finish_structural_change();
    }

    /// Remove one delivery stop. The location stop is not reachable from
    /// this path.
    pub fn delete(&mut self, stop_id: u32) {
        let before = self.route.stops.len();
        self.route
            .stops
            .retain(|s| !(s.is_delivery() && s.original_stop_number == stop_id));
        if self.route.stops.len() == before {
            debug!("delete: stop {} not in route, ignoring", stop_id);
            return;
        }
        self.finish_structural_change();
        if self.route.delivery_count() == 0 {
            self.bus.publish(RouteEvent::RouteCleared);
        }
    }

    /// Drive the per-stop status machine. Leaving `Pending` stamps the
    /// completion time; returning to `Pending` clears it and restores
    /// current-stop eligibility.
    pub fn set_status(&mut self, stop_id: u32, status: StopStatus) {
        let Some(stop) = self.delivery_mut(stop_id) else {
            debug!("set_status: stop {} not in route, ignoring", stop_id);
            return;
        };
        if stop.status == status {
            return;
        }
        let was_pending = !stop.status.is_resolved();
        stop.status = status;
        if status.is_resolved() {
            if was_pending {
                stop.completed_at = Some(Utc::now());
            }
        } else {
            stop.completed_at = None;
        }
        debug!("stop {} status -> {}", stop_id, status.as_str());
        self.finish_structural_change();
    }

    /// Re-sort the delivery sub-sequence by the numbers printed in the
    /// source screenshots. Edits and statuses stay put.
    pub fn reset_to_original_order(&mut self) {
        let offset = self.delivery_offset();
        self.route.stops[offset..].sort_by_key(|s| s.original_stop_number);
        self.finish_structural_change();
    }

    /// Replace the delivery order with an externally optimized
    /// permutation, given as stop ids. The ids must be exactly the
    /// current delivery set; anything else leaves the route untouched
    /// and reports the mismatch instead of silently truncating.
    ///
    /// The engine re-sequences its own stops rather than adopting the
    /// provider's echoed bodies, so local edits and statuses survive.
    pub fn apply_optimized_order(
        &mut self,
        ordered_ids: &[u32],
        start: Option<GeoPoint>,
    ) -> Result<(), OptimizationError> {
        let current: HashSet<u32> = self
            .route
            .delivery_stops()
            .map(|s| s.original_stop_number)
            .collect();
        let returned: HashSet<u32> = ordered_ids.iter().copied().collect();

        if returned != current || ordered_ids.len() != current.len() {
            let mut missing: Vec<u32> = current.difference(&returned).copied().collect();
            let mut unexpected: Vec<u32> = returned.difference(&current).copied().collect();
            missing.sort_unstable();
            unexpected.sort_unstable();
            if missing.is_empty() && unexpected.is_empty() {
                // Set-equal but wrong length: duplicates in the returned order.
                unexpected = ordered_ids.to_vec();
            }
            warn!(
                "optimized order is not a permutation (missing {:?}, unexpected {:?})",
                missing, unexpected
            );
            return Err(OptimizationError::SetMismatch {
                missing,
                unexpected,
            });
        }

        let offset = self.delivery_offset();
        let mut pool: Vec<Stop> = self.route.stops.split_off(offset);
        let mut reordered = Vec::with_capacity(pool.len());
        for id in ordered_ids {
            let pos = pool
                .iter()
                .position(|s| s.original_stop_number == *id)
                .expect("validated permutation");
            reordered.push(pool.swap_remove(pos));
        }
        self.route.stops.extend(reordered);

        if let Some(point) = start {
            let location = Stop::location(point);
            if self.route.location().is_some() {
                self.route.stops[0] = location;
            } else {
                self.route.stops.insert(0, location);
            }
        }

        self.generation += 1;
        self.recompute_current_stop();
        self.bus.publish(RouteEvent::RouteReplaced {
            generation: self.generation,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn finish_structural_change(&mut self) {
        self.generation += 1;
        self.recompute_current_stop();
        self.bus.publish(RouteEvent::RouteChanged {
            generation: self.generation,
        });
    }

    /// Single pass: the first pending delivery stop gets the flag, every
    /// other stop loses it.
    fn recompute_current_stop(&mut self) {
        let mut found = false;
        for stop in &mut self.route.stops {
            if !found && stop.is_pending_delivery() {
                stop.is_current_stop = true;
                found = true;
            } else {
                stop.is_current_stop = false;
            }
        }
    }

    fn delivery_offset(&self) -> usize {
        usize::from(self.route.location().is_some())
    }

    fn delivery_mut(&mut self, stop_id: u32) -> Option<&mut Stop> {
        self.route
            .stops
            .iter_mut()
            .find(|s| s.is_delivery() && s.original_stop_number == stop_id)
    }
}

impl Default for RouteState {
    fn default() -> Self {
        Self::new()
    }
}
