//! Side-by-side lane assignment for simultaneous schedules.
//!
//! Schedules in one cell are grouped into overlap clusters and each cluster
//! is coloured greedily: a schedule reuses the first lane that is free at its
//! start time, otherwise opens a new one. Every member of a cluster reports
//! the cluster's lane count so blocks in the same cluster share a width.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::conflict::ranges_overlap;
use crate::models::{Schedule, ScheduleId};
use crate::segment::{segments_for_date, ScheduleSegment};

/// A time range to lay out within one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutItem {
    pub id: ScheduleId,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl From<&ScheduleSegment> for LayoutItem {
    fn from(segment: &ScheduleSegment) -> Self {
        Self {
            id: segment.schedule_id.clone(),
            start: segment.start_time,
            end: segment.end_time,
        }
    }
}

impl LayoutItem {
    fn overlaps(&self, other: &Self) -> bool {
        ranges_overlap(self.start, self.end, other.start, other.end)
    }
}

/// Lane of one schedule within its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneAssignment {
    /// Zero-based lane index
    pub column: usize,
    /// Lanes used by the schedule's cluster
    pub total_columns: usize,
}

/// Assign lanes to same-cell items.
///
/// Sorting is stable on start time, so items with equal starts keep their
/// input order and the result is deterministic for a given input.
pub fn assign_layout(items: &[LayoutItem]) -> HashMap<ScheduleId, LaneAssignment> {
    let mut layout = HashMap::with_capacity(items.len());
    for cluster in overlap_clusters(items) {
        let (columns, total) = lane_columns(&cluster);
        for (item, column) in cluster.iter().zip(columns) {
            layout.insert(
                item.id.clone(),
                LaneAssignment {
                    column,
                    total_columns: total,
                },
            );
        }
    }
    layout
}

/// Lay out the segments every schedule has on `date`.
pub fn assign_layout_for_date(
    schedules: &[Schedule],
    date: NaiveDate,
) -> HashMap<ScheduleId, LaneAssignment> {
    let items: Vec<LayoutItem> = segments_for_date(schedules, date)
        .iter()
        .map(LayoutItem::from)
        .collect();
    assign_layout(&items)
}

/// Group items into clusters of transitively overlapping ranges.
///
/// A new item joins the open cluster when it overlaps any member, not only
/// the most recent one.
fn overlap_clusters(items: &[LayoutItem]) -> Vec<Vec<&LayoutItem>> {
    let mut sorted: Vec<&LayoutItem> = items.iter().collect();
    sorted.sort_by_key(|item| item.start);

    let mut clusters: Vec<Vec<&LayoutItem>> = Vec::new();
    for item in sorted {
        match clusters.last_mut() {
            Some(cluster) if cluster.iter().any(|member| member.overlaps(item)) => {
                cluster.push(item);
            }
            _ => clusters.push(vec![item]),
        }
    }
    clusters
}

/// Greedy interval colouring of one cluster.
///
/// Returns the lane of each item (in the cluster's order) and the number of
/// lanes opened.
pub fn lane_columns(cluster: &[&LayoutItem]) -> (Vec<usize>, usize) {
    let mut order: Vec<usize> = (0..cluster.len()).collect();
    order.sort_by_key(|index| cluster[*index].start);

    let mut lane_ends: Vec<NaiveTime> = Vec::new();
    let mut columns = vec![0; cluster.len()];

    for index in order {
        let item = cluster[index];
        let free = lane_ends.iter().position(|end| *end <= item.start);
        let column = free.unwrap_or_else(|| {
            lane_ends.push(item.end);
            lane_ends.len() - 1
        });
        lane_ends[column] = item.end;
        columns[index] = column;
    }

    (columns, lane_ends.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use pretty_assertions::assert_eq;

    fn time(value: &str) -> NaiveTime {
        NaiveTime::parse_from_str(value, "%H:%M").unwrap()
    }

    fn item(id: &str, start: &str, end: &str) -> LayoutItem {
        LayoutItem {
            id: id.into(),
            start: time(start),
            end: time(end),
        }
    }

    fn lane(layout: &HashMap<ScheduleId, LaneAssignment>, id: &str) -> (usize, usize) {
        let assignment = layout[&ScheduleId::from(id)];
        (assignment.column, assignment.total_columns)
    }

    #[test]
    fn non_overlapping_items_share_single_lane() {
        let layout = assign_layout(&[
            item("a", "09:00", "10:00"),
            item("b", "10:00", "11:00"),
            item("c", "13:00", "14:00"),
        ]);
        assert_eq!(lane(&layout, "a"), (0, 1));
        assert_eq!(lane(&layout, "b"), (0, 1));
        assert_eq!(lane(&layout, "c"), (0, 1));
    }

    #[test]
    fn overlapping_items_get_distinct_lanes() {
        let layout = assign_layout(&[
            item("a", "09:00", "11:00"),
            item("b", "10:00", "12:00"),
            item("c", "10:30", "11:30"),
        ]);
        assert_eq!(lane(&layout, "a"), (0, 3));
        assert_eq!(lane(&layout, "b"), (1, 3));
        assert_eq!(lane(&layout, "c"), (2, 3));
    }

    #[test]
    fn lanes_are_reused_once_free() {
        // a and c never overlap, b bridges them so all three share a cluster
        let layout = assign_layout(&[
            item("a", "09:00", "10:00"),
            item("b", "09:30", "11:00"),
            item("c", "10:00", "10:30"),
        ]);
        assert_eq!(lane(&layout, "a"), (0, 2));
        assert_eq!(lane(&layout, "b"), (1, 2));
        assert_eq!(lane(&layout, "c"), (0, 2));
    }

    #[test]
    fn cluster_joins_on_any_member_not_just_last() {
        // c overlaps a (long) but not b
        let layout = assign_layout(&[
            item("a", "09:00", "15:00"),
            item("b", "09:30", "10:00"),
            item("c", "12:00", "13:00"),
        ]);
        assert_eq!(lane(&layout, "c").1, 2);
        assert_eq!(lane(&layout, "a").1, 2);
    }

    #[test]
    fn separate_clusters_report_own_width() {
        let layout = assign_layout(&[
            item("a", "09:00", "10:00"),
            item("b", "09:00", "10:00"),
            item("c", "14:00", "15:00"),
        ]);
        assert_eq!(lane(&layout, "a"), (0, 2));
        assert_eq!(lane(&layout, "b"), (1, 2));
        assert_eq!(lane(&layout, "c"), (0, 1));
    }

    #[test]
    fn overlapping_members_never_share_lane() {
        let items = vec![
            item("a", "08:00", "12:00"),
            item("b", "09:00", "10:00"),
            item("c", "09:30", "11:00"),
            item("d", "10:00", "13:00"),
            item("e", "11:00", "11:30"),
            item("f", "12:30", "14:00"),
        ];
        let layout = assign_layout(&items);

        for left in &items {
            for right in &items {
                if left.id != right.id && left.overlaps(right) {
                    assert_ne!(layout[&left.id].column, layout[&right.id].column);
                }
            }
        }
        // a, c and d are all running at 10:30
        assert!(layout[&ScheduleId::from("a")].total_columns >= 3);
    }

    #[test]
    fn equal_starts_keep_input_order() {
        let first = assign_layout(&[item("x", "09:00", "10:00"), item("y", "09:00", "10:00")]);
        let second = assign_layout(&[item("y", "09:00", "10:00"), item("x", "09:00", "10:00")]);
        assert_eq!(lane(&first, "x"), (0, 2));
        assert_eq!(lane(&second, "x"), (1, 2));
    }

    #[test]
    fn layout_for_date_uses_segments() {
        let at = |value: &str| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").unwrap();
        let overnight = Schedule::new(at("2025-01-09 22:00"), at("2025-01-10 02:00"))
            .unwrap()
            .with_id("night");
        let morning = Schedule::new(at("2025-01-10 01:00"), at("2025-01-10 03:00"))
            .unwrap()
            .with_id("morning");
        let other_day = Schedule::new(at("2025-01-11 01:00"), at("2025-01-11 03:00"))
            .unwrap()
            .with_id("later");

        let layout =
            assign_layout_for_date(&[overnight, morning, other_day], at("2025-01-10 00:00").date());
        assert_eq!(layout.len(), 2);
        assert_eq!(lane(&layout, "night"), (0, 2));
        assert_eq!(lane(&layout, "morning"), (1, 2));
    }
}
