use chrono_tz::Tz;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{DqStatus, DqVerdict};
use crate::normalize::{parse_timestamp, resolve_zone, RawEventRow};
use crate::time::DayWindow;

const MISSING_ENERGY_PENALTY: u32 = 25;
const NEGATIVE_ENERGY_PENALTY: u32 = 60;

/// Scores the day's evidence directly from the raw event log.
///
/// Only zones that actually produced an event that day are required to carry
/// an energy reading; an inactive zone with a blank energy field is correct,
/// not a failure. A day with zero events cannot distinguish a logging outage
/// from a legitimately idle house, so it is WARN and never scored.
pub fn evaluate(
    rows: &[RawEventRow],
    window: &DayWindow,
    energy_kwh: &BTreeMap<String, f64>,
    excluded_zones: &BTreeSet<String>,
    tz: Tz,
) -> DqVerdict {
    let mut events_count = 0usize;
    let mut required_zones: BTreeSet<String> = BTreeSet::new();
    for row in rows {
        let Some(timestamp) = parse_timestamp(row.timestamp.as_ref(), tz) else {
            continue;
        };
        if !window.contains(timestamp) {
            continue;
        }
        events_count += 1;
        if let Some(zone) = resolve_zone(row) {
            if !excluded_zones.contains(zone) {
                required_zones.insert(zone.to_string());
            }
        }
    }

    if events_count == 0 {
        return DqVerdict {
            status: DqStatus::Warn,
            score: None,
            events_count,
            required_zones,
            missing_zones: Vec::new(),
            negative_zones: Vec::new(),
        };
    }

    let mut missing_zones: Vec<String> = Vec::new();
    let mut negative_zones: Vec<String> = Vec::new();
    for zone in &required_zones {
        match energy_kwh.get(zone) {
            None => missing_zones.push(zone.clone()),
            Some(value) if *value < 0.0 => negative_zones.push(zone.clone()),
            Some(_) => {}
        }
    }

    let penalty = missing_zones.len() as u32 * MISSING_ENERGY_PENALTY
        + negative_zones.len() as u32 * NEGATIVE_ENERGY_PENALTY;
    let score = 100u32.saturating_sub(penalty);
    let status = if missing_zones.is_empty() && negative_zones.is_empty() {
        DqStatus::Pass
    } else {
        DqStatus::Fail
    };

    DqVerdict {
        status,
        score: Some(score),
        events_count,
        required_zones,
        missing_zones,
        negative_zones,
    }
}
