// src/ingestion.rs
//
// Deduplication & ingestion merger.
//
// Each screenshot is extracted independently and in parallel; overlapping
// screenshots routinely report the same stop twice. This module folds the
// per-screenshot batches into one canonical delivery list: first-wins
// dedup on the printed stop number, then ascending sort by that number.
// The printed numbers are taken as ground truth for the initial sequence.

use crate::errors::ExtractionError;
use crate::types::{Stop, StopKind, StopStatus, LOCATION_STOP_NUMBER};
use std::collections::HashSet;
use tracing::{debug, warn};

/// One screenshot's extraction result, in dispatch order.
#[derive(Debug, Clone, Default)]
pub struct ExtractionBatch {
    pub stops: Vec<Stop>,
    pub route_block_code: Option<String>,
}

/// Canonical merge output: ordered delivery list, no location stop.
#[derive(Debug, Clone)]
pub struct MergedIngestion {
    pub stops: Vec<Stop>,
    pub route_block_code: Option<String>,
}

/// Merge per-screenshot batches into the canonical delivery list.
///
/// Batches must arrive in dispatch order; when the same stop number shows
/// up twice the earlier-dispatched screenshot wins and later copies are
/// dropped. An empty combined result is an extraction failure, not an
/// empty route.
pub fn merge_batches(batches: &[ExtractionBatch]) -> Result<MergedIngestion, ExtractionError> {
    let mut seen: HashSet<u32> = HashSet::new();
    let mut stops: Vec<Stop> = Vec::new();

    for (batch_idx, batch) in batches.iter().enumerate() {
        for raw in &batch.stops {
            if raw.original_stop_number == LOCATION_STOP_NUMBER {
                warn!(
                    "screenshot {} reported a stop with the reserved number {}, dropping",
                    batch_idx, LOCATION_STOP_NUMBER
                );
                continue;
            }
            if !seen.insert(raw.original_stop_number) {
                debug!(
                    "duplicate stop {} in screenshot {}, keeping first occurrence",
                    raw.original_stop_number, batch_idx
                );
                continue;
            }
            stops.push(normalize(raw.clone()));
        }
    }

    if stops.is_empty() {
        return Err(ExtractionError::NoStops);
    }

    // The only place this ordering policy applies: the numbers printed in
    // the screenshots define the initial delivery sequence.
    stops.sort_by_key(|s| s.original_stop_number);

    let route_block_code = batches
        .iter()
        .filter_map(|b| b.route_block_code.as_deref())
        .find(|code| !code.is_empty())
        .map(str::to_string);

    debug!(
        "merged {} screenshots into {} stops (block code: {:?})",
        batches.len(),
        stops.len(),
        route_block_code
    );

    Ok(MergedIngestion {
        stops,
        route_block_code,
    })
}

/// Freshly ingested stops always start pending, regardless of what the
/// extractor guessed.
fn normalize(mut stop: Stop) -> Stop {
    stop.kind = StopKind::Delivery;
    stop.status = StopStatus::Pending;
    stop.completed_at = None;
    stop.is_current_stop = false;
    stop
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(stops: Vec<Stop>) -> ExtractionBatch {
        ExtractionBatch {
            stops,
            route_block_code: None,
        }
    }

    #[test]
    fn test_single_screenshot_sorted_by_stop_number() {
        let merged = merge_batches(&[batch(vec![
            Stop::delivery(3, "A St"),
            Stop::delivery(1, "B St"),
            Stop::delivery(2, "C St"),
        ])])
        .unwrap();

        let numbers: Vec<u32> = merged.stops.iter().map(|s| s.original_stop_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(merged.stops[0].street, "B St");
        assert_eq!(merged.stops[1].street, "C St");
        assert_eq!(merged.stops[2].street, "A St");
    }

    #[test]
    fn test_first_wins_across_screenshots() {
        let merged = merge_batches(&[
            batch(vec![Stop::delivery(5, "X")]),
            batch(vec![Stop::delivery(5, "Y")]),
        ])
        .unwrap();

        assert_eq!(merged.stops.len(), 1);
        assert_eq!(merged.stops[0].street, "X");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let batches = vec![
            batch(vec![Stop::delivery(2, "A"), Stop::delivery(7, "B")]),
            batch(vec![Stop::delivery(7, "B dup"), Stop::delivery(4, "C")]),
        ];
        let once = merge_batches(&batches).unwrap();

        // Concatenating the already-deduplicated result with itself must
        // not change the set of stop numbers.
        let twice = merge_batches(&[batch(once.stops.clone()), batch(once.stops.clone())]).unwrap();

        let first: Vec<u32> = once.stops.iter().map(|s| s.original_stop_number).collect();
        let second: Vec<u32> = twice.stops.iter().map(|s| s.original_stop_number).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sorted_strictly_ascending() {
        let merged = merge_batches(&[
            batch(vec![Stop::delivery(9, "a"), Stop::delivery(4, "b")]),
            batch(vec![Stop::delivery(12, "c"), Stop::delivery(4, "dup")]),
        ])
        .unwrap();

        for pair in merged.stops.windows(2) {
            assert!(pair[0].original_stop_number < pair[1].original_stop_number);
        }
    }

    #[test]
    fn test_statuses_reset_to_pending() {
        let mut delivered = Stop::delivery(1, "A");
        delivered.status = StopStatus::Delivered;
        delivered.is_current_stop = true;

        let merged = merge_batches(&[batch(vec![delivered])]).unwrap();
        assert_eq!(merged.stops[0].status, StopStatus::Pending);
        assert!(!merged.stops[0].is_current_stop);
        assert!(merged.stops[0].completed_at.is_none());
    }

    #[test]
    fn test_reserved_location_number_dropped() {
        let result = merge_batches(&[batch(vec![
            Stop::delivery(LOCATION_STOP_NUMBER, "bogus"),
            Stop::delivery(1, "real"),
        ])])
        .unwrap();

        assert_eq!(result.stops.len(), 1);
        assert_eq!(result.stops[0].original_stop_number, 1);
    }

    #[test]
    fn test_empty_result_is_extraction_failure() {
        let err = merge_batches(&[batch(vec![]), batch(vec![])]).unwrap_err();
        assert!(matches!(err, ExtractionError::NoStops));

        let err = merge_batches(&[]).unwrap_err();
        assert!(matches!(err, ExtractionError::NoStops));
    }

    #[test]
    fn test_block_code_first_non_empty_wins() {
        let merged = merge_batches(&[
            ExtractionBatch {
                stops: vec![Stop::delivery(1, "A")],
                route_block_code: Some(String::new()),
            },
            ExtractionBatch {
                stops: vec![Stop::delivery(2, "B")],
                route_block_code: Some("CX-14".to_string()),
            },
            ExtractionBatch {
                stops: vec![Stop::delivery(3, "C")],
                route_block_code: Some("CX-99".to_string()),
            },
        ])
        .unwrap();

        assert_eq!(merged.route_block_code.as_deref(), Some("CX-14"));
    }

    #[test]
    fn test_block_code_absent_when_never_reported() {
        let merged = merge_batches(&[batch(vec![Stop::delivery(1, "A")])]).unwrap();
        assert!(merged.route_block_code.is_none());
    }
}
