//! Per-partition range planning.
//!
//! The global limit is split evenly across the requested partitions with
//! truncating division; the remainder is dropped, never redistributed.

use kview_common::Offset;
use serde::{Serialize, Serializer};

use crate::model::ReadMode;
use crate::offsets::PartitionOffsets;

/// Inclusive offset range a partition worker reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadingPlan {
    pub start: Offset,
    /// Last offset to deliver, `None` for live reads. Serialised as
    /// [`ReadingPlan::UNBOUNDED`] when absent.
    #[serde(serialize_with = "serialize_end")]
    pub end: Option<Offset>,
}

fn serialize_end<S: Serializer>(end: &Option<Offset>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(end.unwrap_or(ReadingPlan::UNBOUNDED))
}

impl ReadingPlan {
    /// End offset reported for live plans.
    pub const UNBOUNDED: Offset = -1;

    pub fn bounded(start: Offset, end: Offset) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn live(start: Offset) -> Self {
        Self { start, end: None }
    }

    pub fn is_bounded(&self) -> bool {
        self.end.is_some()
    }

    /// End offset for logs and display, [`ReadingPlan::UNBOUNDED`] when live.
    pub fn end_offset(&self) -> Offset {
        self.end.unwrap_or(Self::UNBOUNDED)
    }

    /// A bounded plan with nothing to deliver. Workers for such a plan stop
    /// right after opening instead of waiting for data.
    pub fn is_empty(&self) -> bool {
        self.end.is_some_and(|end| end < self.start)
    }
}

/// Per-partition share of `limit`.
pub fn share(limit: u64, partition_count: usize) -> i64 {
    let share = limit.checked_div(partition_count as u64).unwrap_or(0);
    i64::try_from(share).unwrap_or(i64::MAX)
}

/// Whether a partition has anything to read under `mode`. Live partitions
/// are always readable since they wait for future writes.
pub fn is_readable(mode: ReadMode, offsets: &PartitionOffsets) -> bool {
    mode == ReadMode::Live || offsets.first_available != offsets.oldest
}

/// Compute the reading plan of one partition.
pub fn plan(
    mode: ReadMode,
    limit: u64,
    partition_count: usize,
    offsets: &PartitionOffsets,
) -> ReadingPlan {
    let share = share(limit, partition_count);
    let newest = offsets.newest();

    match mode {
        ReadMode::Live => ReadingPlan::live(offsets.first_available),
        ReadMode::Beginning => {
            let start = offsets.oldest;
            let end = if start.saturating_add(share) < newest {
                start + share - 1
            } else {
                newest
            };
            ReadingPlan::bounded(start, end)
        }
        ReadMode::MostRecent => {
            let candidate = newest.saturating_sub(share);
            let start = if candidate < 0 || candidate < offsets.oldest {
                offsets.oldest
            } else {
                candidate
            };
            ReadingPlan::bounded(start, newest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(oldest: Offset, first_available: Offset) -> PartitionOffsets {
        PartitionOffsets::new(oldest, first_available)
    }

    #[test]
    fn test_share_truncates() {
        assert_eq!(share(50, 1), 50);
        assert_eq!(share(50, 5), 10);
        assert_eq!(share(52, 5), 10);
        assert_eq!(share(3, 5), 0);
        assert_eq!(share(10, 0), 0);
    }

    #[test]
    fn test_beginning_single_partition() {
        let plan = plan(ReadMode::Beginning, 50, 1, &offsets(1, 291));
        assert_eq!(plan, ReadingPlan::bounded(1, 50));
    }

    #[test]
    fn test_beginning_split_across_partitions() {
        let plan = plan(ReadMode::Beginning, 50, 5, &offsets(1, 291));
        assert_eq!(plan, ReadingPlan::bounded(1, 10));
    }

    #[test]
    fn test_beginning_fewer_than_share_available() {
        let plan = plan(ReadMode::Beginning, 50, 1, &offsets(55, 76));
        assert_eq!(plan, ReadingPlan::bounded(55, 75));
    }

    #[test]
    fn test_most_recent_single_partition() {
        let plan = plan(ReadMode::MostRecent, 50, 1, &offsets(1, 291));
        assert_eq!(plan, ReadingPlan::bounded(240, 290));
    }

    #[test]
    fn test_most_recent_clamped_to_oldest() {
        let plan = plan(ReadMode::MostRecent, 50, 1, &offsets(278, 291));
        assert_eq!(plan, ReadingPlan::bounded(278, 290));
    }

    #[test]
    fn test_most_recent_clamps_negative_start() {
        let plan = plan(ReadMode::MostRecent, 50, 1, &offsets(0, 10));
        assert_eq!(plan, ReadingPlan::bounded(0, 9));
    }

    #[test]
    fn test_live_ignores_limit_and_partitions() {
        for (limit, count) in [(0, 1), (50, 1), (50, 7), (u64::MAX, 3)] {
            let plan = plan(ReadMode::Live, limit, count, &offsets(12, 300));
            assert_eq!(plan, ReadingPlan::live(300));
            assert!(!plan.is_bounded());
            assert!(!plan.is_empty());
        }
    }

    #[test]
    fn test_formulas_hold_across_ranges() {
        for oldest in [0, 1, 17, 100] {
            for len in [1, 2, 9, 10, 11, 250] {
                for (limit, count) in [(10, 1), (10, 3), (100, 4), (7, 2)] {
                    let o = offsets(oldest, oldest + len);
                    let share = share(limit, count);

                    let beginning = plan(ReadMode::Beginning, limit, count, &o);
                    assert_eq!(beginning.start, o.oldest);
                    if o.oldest + share < o.newest() {
                        assert_eq!(beginning.end, Some(o.oldest + share - 1));
                    } else {
                        // share reaching exactly the newest record takes everything
                        assert_eq!(beginning.end, Some(o.newest()));
                    }

                    let recent = plan(ReadMode::MostRecent, limit, count, &o);
                    assert_eq!(recent.end, Some(o.newest()));
                    assert_eq!(recent.start, o.oldest.max(o.newest() - share));
                }
            }
        }
    }

    #[test]
    fn test_empty_partition_yields_empty_plan() {
        let empty = offsets(40, 40);
        assert!(!is_readable(ReadMode::Beginning, &empty));
        assert!(!is_readable(ReadMode::MostRecent, &empty));
        assert!(is_readable(ReadMode::Live, &empty));

        for mode in [ReadMode::Beginning, ReadMode::MostRecent] {
            let plan = plan(mode, 50, 1, &empty);
            assert_eq!(plan.start, 40);
            assert!(plan.is_empty());
        }
    }

    #[test]
    fn test_zero_share_plans_nothing_from_beginning() {
        let plan = plan(ReadMode::Beginning, 2, 5, &offsets(0, 100));
        assert_eq!(plan, ReadingPlan::bounded(0, -1));
        assert!(plan.is_bounded());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_empty_partition_at_offset_zero_stays_bounded() {
        let empty = offsets(0, 0);
        for mode in [ReadMode::Beginning, ReadMode::MostRecent] {
            let plan = plan(mode, 50, 3, &empty);
            assert_eq!(plan.end, Some(-1));
            assert!(plan.is_bounded());
            assert!(plan.is_empty());
        }
    }

    #[test]
    fn test_plan_serialises_live_end_as_unbounded() {
        let live = serde_json::to_value(ReadingPlan::live(7)).unwrap();
        assert_eq!(live, serde_json::json!({"start": 7, "end": -1}));
        let bounded = serde_json::to_value(ReadingPlan::bounded(1, 10)).unwrap();
        assert_eq!(bounded, serde_json::json!({"start": 1, "end": 10}));
        assert_eq!(ReadingPlan::live(7).end_offset(), ReadingPlan::UNBOUNDED);
    }
}
