use std::collections::BTreeMap;

use crate::model::{setpoint_key, FreshnessSource, ZoneDailyMetrics, ZoneTimeline};
use crate::timeline::ZoneDay;

/// Rounds to three decimals. Applied once, at external emission; every
/// accumulation below runs at full precision.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Accumulation {
    total_hours: f64,
    setpoint_hours: f64,
    hours_by_setpoint: BTreeMap<String, f64>,
    degree_hours: Option<f64>,
    degree_hours_by_setpoint: Option<BTreeMap<String, f64>>,
}

/// Integrates a timeline against time and against the day's mean outdoor
/// temperature. Degree-hours measure implied heating demand: an interval
/// whose setpoint sits at or below the outdoor temperature contributes zero,
/// never a negative amount. With no outdoor reading the degree-hour side is
/// unknown, not zero.
fn accumulate(timeline: &ZoneTimeline, outdoor_temp_c: Option<f64>) -> Accumulation {
    let mut acc = Accumulation::default();
    if outdoor_temp_c.is_some() {
        acc.degree_hours = Some(0.0);
        acc.degree_hours_by_setpoint = Some(BTreeMap::new());
    }
    for interval in timeline {
        let hours = interval.duration_hours();
        let key = setpoint_key(interval.setpoint);
        acc.total_hours += hours;
        acc.setpoint_hours += hours * interval.setpoint;
        *acc.hours_by_setpoint.entry(key.clone()).or_default() += hours;
        if let Some(outdoor) = outdoor_temp_c {
            let demand = (interval.setpoint - outdoor).max(0.0) * hours;
            if let Some(total) = acc.degree_hours.as_mut() {
                *total += demand;
            }
            if let Some(by_setpoint) = acc.degree_hours_by_setpoint.as_mut() {
                *by_setpoint.entry(key).or_default() += demand;
            }
        }
    }
    acc
}

/// Energy divided by degree-hours, computed only when the freshness gate
/// allows it, the energy is actually known, and there is demand to divide by.
pub fn efficiency_index(
    energy_kwh: Option<f64>,
    degree_hours: Option<f64>,
    source: FreshnessSource,
) -> Option<f64> {
    if source == FreshnessSource::Stale {
        return None;
    }
    let energy = energy_kwh?;
    let degree_hours = degree_hours?;
    if degree_hours > 0.0 {
        Some(energy / degree_hours)
    } else {
        None
    }
}

/// Assembles the externally-visible per-zone aggregate, rounding here and
/// only here.
pub fn zone_daily_metrics(
    zone_day: &ZoneDay,
    outdoor_temp_c: Option<f64>,
    energy_kwh: Option<f64>,
    source: FreshnessSource,
) -> ZoneDailyMetrics {
    let acc = accumulate(&zone_day.timeline, outdoor_temp_c);
    let efficiency = efficiency_index(energy_kwh, acc.degree_hours, source);
    ZoneDailyMetrics {
        total_hours: round3(acc.total_hours),
        setpoint_hours: round3(acc.setpoint_hours),
        hours_by_setpoint: acc
            .hours_by_setpoint
            .into_iter()
            .map(|(k, v)| (k, round3(v)))
            .collect(),
        degree_hours: acc.degree_hours.map(round3),
        degree_hours_by_setpoint: acc.degree_hours_by_setpoint.map(|m| {
            m.into_iter().map(|(k, v)| (k, round3(v))).collect()
        }),
        efficiency_index: efficiency.map(round3),
        source,
        changes_count: zone_day.day_event_count,
    }
}
