use chrono::Duration;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::FreshnessSource;
use crate::time::DayWindow;
use crate::timeline::ZoneDay;

/// Labels a zone's day by the recency of its evidence.
///
/// Observed when the day itself produced events, CarriedForward when the
/// timeline is inherited from pre-day history, Stale when nothing is known.
/// Regardless of the base label, evidence older than `staleness` relative to
/// the day end forces Stale; a stale zone keeps its timeline for display but
/// loses its efficiency index.
pub fn classify(zone_day: &ZoneDay, window: &DayWindow, staleness: Duration) -> FreshnessSource {
    let Some(last_event_at) = zone_day.last_event_at else {
        return FreshnessSource::Stale;
    };
    if window.end - last_event_at > staleness {
        return FreshnessSource::Stale;
    }
    if zone_day.day_event_count > 0 {
        FreshnessSource::Observed
    } else if zone_day.has_history {
        FreshnessSource::CarriedForward
    } else {
        FreshnessSource::Stale
    }
}

pub fn classify_all(
    zone_days: &BTreeMap<String, ZoneDay>,
    window: &DayWindow,
    staleness: Duration,
) -> BTreeMap<String, FreshnessSource> {
    zone_days
        .iter()
        .map(|(zone, day)| (zone.clone(), classify(day, window, staleness)))
        .collect()
}

/// Stale zones collected for diagnostic visibility.
pub fn stale_zones(sources: &BTreeMap<String, FreshnessSource>) -> BTreeSet<String> {
    sources
        .iter()
        .filter(|(_, source)| **source == FreshnessSource::Stale)
        .map(|(zone, _)| zone.clone())
        .collect()
}
