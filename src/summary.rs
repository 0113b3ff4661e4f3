use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use crate::normalize::{parse_number, parse_timestamp, resolve_zone, RawEventRow};
use crate::time::DayWindow;

const TRACE_ID_LIMIT: usize = 25;

const MISSING_ENERGY_NOTE: &str = "kWh note: One or more zones have no kWh for this date. \
This is expected if energy meters were added after the target date, \
or if recorder history is missing for the daily energy sensors.";

/// How a single event changed the zone relative to its previous setpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TransitionKind {
    SetpointChange,
    TurnedOff,
    TurnedOnRestore,
    Unknown,
}

impl TransitionKind {
    fn label(self) -> &'static str {
        match self {
            TransitionKind::SetpointChange => "setpoint",
            TransitionKind::TurnedOff => "off",
            TransitionKind::TurnedOnRestore => "on_restore",
            TransitionKind::Unknown => "unknown",
        }
    }
}

/// Classifies a transition from the event's previous and new setpoints.
/// Zero is the off-equivalent, so 0 -> x is a restore and x -> 0 a shut-off.
pub fn classify_transition(new_setpoint: Option<f64>, previous: Option<f64>) -> TransitionKind {
    let (Some(new_v), Some(prev_v)) = (new_setpoint, previous) else {
        return TransitionKind::Unknown;
    };
    if new_v == 0.0 && prev_v > 0.0 {
        return TransitionKind::TurnedOff;
    }
    if prev_v == 0.0 && new_v > 0.0 {
        return TransitionKind::TurnedOnRestore;
    }
    if new_v != prev_v && new_v != 0.0 && prev_v != 0.0 {
        return TransitionKind::SetpointChange;
    }
    TransitionKind::Unknown
}

#[derive(Debug, Default, Clone)]
struct ZoneCounts {
    setpoint_changes: usize,
    turned_off: usize,
    turned_on_restore: usize,
    unknown: usize,
    trace_ids: Vec<String>,
}

impl ZoneCounts {
    fn add(&mut self, kind: TransitionKind, id: Option<&str>) {
        match kind {
            TransitionKind::SetpointChange => self.setpoint_changes += 1,
            TransitionKind::TurnedOff => self.turned_off += 1,
            TransitionKind::TurnedOnRestore => self.turned_on_restore += 1,
            TransitionKind::Unknown => self.unknown += 1,
        }
        if let Some(id) = id {
            self.trace_ids.push(id.to_string());
        }
    }

    fn total(&self) -> usize {
        self.setpoint_changes + self.turned_off + self.turned_on_restore + self.unknown
    }
}

/// Renders the human-readable daily activity rollup: event totals, active
/// zones in roster order (unknown zones appended alphabetically), per-zone
/// transition counts and truncated trace-ID lists, plus a fixed note when any
/// roster zone is missing its energy reading.
pub fn build_daily_summary(
    date: NaiveDate,
    rows: &[RawEventRow],
    window: &DayWindow,
    zone_roster: &[String],
    energy_kwh: &BTreeMap<String, f64>,
    tz: Tz,
) -> String {
    let mut totals: BTreeMap<TransitionKind, usize> = BTreeMap::new();
    let mut per_zone: BTreeMap<String, ZoneCounts> = BTreeMap::new();
    let mut active_zones: BTreeSet<String> = BTreeSet::new();
    let mut day_events = 0usize;

    for row in rows {
        let Some(timestamp) = parse_timestamp(row.timestamp.as_ref(), tz) else {
            continue;
        };
        if !window.contains(timestamp) {
            continue;
        }
        day_events += 1;
        let kind = classify_transition(
            parse_number(row.new_setpoint.as_ref()),
            parse_number(row.previous_setpoint.as_ref()),
        );
        *totals.entry(kind).or_default() += 1;
        if let Some(zone) = resolve_zone(row) {
            active_zones.insert(zone.to_string());
            per_zone
                .entry(zone.to_string())
                .or_default()
                .add(kind, row.id.as_deref());
        }
    }

    // Roster order first, any zones outside the roster appended sorted.
    let mut ordered_active: Vec<&str> = zone_roster
        .iter()
        .map(String::as_str)
        .filter(|z| active_zones.contains(*z))
        .collect();
    for zone in &active_zones {
        if !zone_roster.iter().any(|r| r == zone) {
            ordered_active.push(zone);
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "Thermostat activity for {date}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Total events: {day_events}");
    let _ = writeln!(
        out,
        "Zones active: {}",
        if ordered_active.is_empty() {
            "(none)".to_string()
        } else {
            ordered_active.join(", ")
        }
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Event breakdown:");
    let count = |kind: TransitionKind| totals.get(&kind).copied().unwrap_or(0);
    let _ = writeln!(
        out,
        "- Setpoint changes: {}",
        count(TransitionKind::SetpointChange)
    );
    let _ = writeln!(
        out,
        "- Turned OFF (New=0): {}",
        count(TransitionKind::TurnedOff)
    );
    let _ = writeln!(
        out,
        "- Turned ON restore (Prev=0): {}",
        count(TransitionKind::TurnedOnRestore)
    );
    if count(TransitionKind::Unknown) > 0 {
        let _ = writeln!(out, "- Unknown: {}", count(TransitionKind::Unknown));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Per-zone rollup (counts):");
    for zone in &ordered_active {
        let Some(counts) = per_zone.get(*zone) else {
            continue;
        };
        if counts.total() == 0 {
            continue;
        }
        let mut line = format!(
            "- {zone}: setpoint={}, off={}, on_restore={}",
            counts.setpoint_changes, counts.turned_off, counts.turned_on_restore
        );
        if counts.unknown > 0 {
            let _ = write!(line, ", unknown={}", counts.unknown);
        }
        let _ = writeln!(out, "{line}");

        if !counts.trace_ids.is_empty() {
            let shown = &counts.trace_ids[..counts.trace_ids.len().min(TRACE_ID_LIMIT)];
            let more = counts.trace_ids.len() - shown.len();
            let suffix = if more > 0 {
                format!(" (+{more} more)")
            } else {
                String::new()
            };
            let _ = writeln!(out, "  Trace IDs: {}{suffix}", shown.join(", "));
        }
    }

    let any_roster_energy_missing = zone_roster
        .iter()
        .any(|zone| !energy_kwh.contains_key(zone));
    if any_roster_energy_missing {
        let _ = writeln!(out);
        let _ = writeln!(out, "{MISSING_ENERGY_NOTE}");
    }

    out.trim_end().to_string()
}
