use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use crate::model::{Interval, SetpointEvent, ZoneTimeline};
use crate::time::DayWindow;

/// Everything the downstream classifiers need to know about one zone's day:
/// the reconstructed timeline plus the evidence it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneDay {
    pub timeline: ZoneTimeline,
    /// Normalized events that fell inside the day window.
    pub day_event_count: usize,
    /// Whether any event exists strictly before the window start.
    pub has_history: bool,
    /// Most recent event at or before the window end, across history and
    /// day-of events.
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Groups normalized events per zone, preserving input order within a zone so
/// that later rows supersede earlier ones at identical timestamps.
pub fn group_by_zone(events: Vec<SetpointEvent>) -> BTreeMap<String, Vec<SetpointEvent>> {
    let mut by_zone: BTreeMap<String, Vec<SetpointEvent>> = BTreeMap::new();
    for event in events {
        by_zone.entry(event.zone.clone()).or_default().push(event);
    }
    by_zone
}

/// Builds one zone's day from its events (any order).
///
/// The setpoint in effect at the window start is taken from the first day-of
/// event when it lands within `midnight_grace` of the start (a schedule push
/// aimed at midnight often arrives a few minutes late), otherwise from the
/// last event before the day. A zone with no known state anywhere in or
/// before the day gets an empty timeline, not a zero-setpoint one.
pub fn build_zone_day(
    events: &[SetpointEvent],
    window: &DayWindow,
    midnight_grace: Duration,
) -> ZoneDay {
    let mut history: Vec<&SetpointEvent> = Vec::new();
    let mut day_of: Vec<&SetpointEvent> = Vec::new();
    for event in events {
        if event.timestamp < window.start {
            history.push(event);
        } else if event.timestamp < window.end {
            day_of.push(event);
        }
    }
    // Stable sorts: ties keep input order, so the last recorded event wins.
    history.sort_by_key(|e| e.timestamp);
    day_of.sort_by_key(|e| e.timestamp);

    let carried = history.last().map(|e| e.setpoint);
    let effective_at_start = match day_of.first() {
        Some(first) if first.timestamp - window.start <= midnight_grace => Some(first.setpoint),
        _ => carried,
    };

    let mut intervals: ZoneTimeline = Vec::new();
    let mut cursor = window.start;
    let mut current = effective_at_start;
    for event in &day_of {
        match current {
            Some(setpoint) if setpoint == event.setpoint => {}
            Some(setpoint) => {
                if event.timestamp > cursor {
                    intervals.push(Interval {
                        from: cursor,
                        to: event.timestamp,
                        setpoint,
                    });
                }
                cursor = event.timestamp;
                current = Some(event.setpoint);
            }
            None => {
                cursor = event.timestamp;
                current = Some(event.setpoint);
            }
        }
    }
    if let Some(setpoint) = current {
        if window.end > cursor {
            intervals.push(Interval {
                from: cursor,
                to: window.end,
                setpoint,
            });
        }
    }

    let last_event_at = day_of
        .last()
        .map(|e| e.timestamp)
        .or_else(|| history.last().map(|e| e.timestamp));

    ZoneDay {
        timeline: intervals,
        day_event_count: day_of.len(),
        has_history: !history.is_empty(),
        last_event_at,
    }
}

/// Builds every zone's day in one pass.
pub fn build_day(
    events_by_zone: &BTreeMap<String, Vec<SetpointEvent>>,
    window: &DayWindow,
    midnight_grace: Duration,
) -> BTreeMap<String, ZoneDay> {
    events_by_zone
        .iter()
        .map(|(zone, events)| {
            (
                zone.clone(),
                build_zone_day(events, window, midnight_grace),
            )
        })
        .collect()
}
