use std::collections::BTreeMap;

use crate::model::{UsageLabel, ZoneTimeline};

/// Tunables for the daily occupancy label.
///
/// `off_threshold` treats low-hold setpoints as off: the source systems used
/// both "above zero" and "above 7" over time, and 7 is the documented choice
/// here. `energy_epsilon` separates "armed but the weather did the work" from
/// real consumption.
#[derive(Debug, Clone, PartialEq)]
pub struct UsagePolicy {
    pub off_threshold: f64,
    pub energy_epsilon: f64,
    pub guest_zone: String,
    pub primary_zones: [String; 2],
}

/// Whether the zone was commanded above the off threshold at any point.
/// Absence of a timeline is conservatively off.
fn zone_is_on(timeline: Option<&ZoneTimeline>, off_threshold: f64) -> bool {
    timeline
        .map(|intervals| {
            intervals
                .iter()
                .any(|interval| interval.setpoint > off_threshold)
        })
        .unwrap_or(false)
}

/// Picks the single daily label by strict precedence:
///
/// 1. nothing on anywhere (or nothing known) — system off;
/// 2. something on but total measured energy at most epsilon — enabled, no
///    heat needed;
/// 3. the guest zone on at any point;
/// 4. both primaries on / exactly one / neither but some other zone active.
///
/// `total_energy_kwh` is the sum over zones with a known reading, `None` when
/// no reading exists at all; rule 2 needs a measured total and is skipped
/// otherwise. Returns `None` when no rule matched, which callers surface as
/// an unclassified day rather than writing a default.
pub fn classify_day(
    timelines: &BTreeMap<String, ZoneTimeline>,
    total_energy_kwh: Option<f64>,
    policy: &UsagePolicy,
) -> Option<UsageLabel> {
    let on_zones: Vec<&str> = timelines
        .iter()
        .filter(|(_, timeline)| zone_is_on(Some(timeline), policy.off_threshold))
        .map(|(zone, _)| zone.as_str())
        .collect();

    if on_zones.is_empty() {
        return Some(UsageLabel::SystemOff);
    }
    if let Some(total) = total_energy_kwh {
        if total <= policy.energy_epsilon {
            return Some(UsageLabel::EnabledNoHeatNeeded);
        }
    }
    if on_zones.iter().any(|z| *z == policy.guest_zone) {
        return Some(UsageLabel::GuestInUse);
    }

    let first = policy.primary_zones[0].as_str();
    let second = policy.primary_zones[1].as_str();
    let first_on = on_zones.iter().any(|z| *z == first);
    let second_on = on_zones.iter().any(|z| *z == second);
    match (first_on, second_on) {
        (true, true) => Some(UsageLabel::BothPrimaries),
        (true, false) | (false, true) => Some(UsageLabel::SinglePrimary),
        (false, false) => on_zones
            .iter()
            .any(|z| *z != first && *z != second)
            .then_some(UsageLabel::SecondaryZonesOnly),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Interval;
    use chrono::{Duration, TimeZone, Utc};

    fn policy() -> UsagePolicy {
        UsagePolicy {
            off_threshold: 7.0,
            energy_epsilon: 0.001,
            guest_zone: "Guest Room".to_string(),
            primary_zones: ["Master".to_string(), "LR".to_string()],
        }
    }

    fn timeline(setpoints: &[f64]) -> ZoneTimeline {
        let base = Utc
            .with_ymd_and_hms(2026, 1, 15, 5, 0, 0)
            .single()
            .expect("base");
        setpoints
            .iter()
            .enumerate()
            .map(|(i, sp)| Interval {
                from: base + Duration::hours(i as i64),
                to: base + Duration::hours(i as i64 + 1),
                setpoint: *sp,
            })
            .collect()
    }

    fn day(zones: &[(&str, &[f64])]) -> BTreeMap<String, ZoneTimeline> {
        zones
            .iter()
            .map(|(zone, sps)| (zone.to_string(), timeline(sps)))
            .collect()
    }

    #[test]
    fn all_zones_at_or_below_threshold_is_system_off() {
        let timelines = day(&[("Master", &[7.0, 0.0]), ("Den", &[5.0])]);
        assert_eq!(
            classify_day(&timelines, Some(3.0), &policy()),
            Some(UsageLabel::SystemOff)
        );
    }

    #[test]
    fn empty_day_is_system_off() {
        let timelines = BTreeMap::new();
        assert_eq!(
            classify_day(&timelines, None, &policy()),
            Some(UsageLabel::SystemOff)
        );
    }

    #[test]
    fn armed_without_consumption_is_no_heat_needed() {
        let timelines = day(&[("Master", &[18.0])]);
        assert_eq!(
            classify_day(&timelines, Some(0.0), &policy()),
            Some(UsageLabel::EnabledNoHeatNeeded)
        );
    }

    #[test]
    fn unknown_energy_skips_the_no_heat_rule() {
        let timelines = day(&[("Master", &[18.0]), ("LR", &[17.0])]);
        assert_eq!(
            classify_day(&timelines, None, &policy()),
            Some(UsageLabel::BothPrimaries)
        );
    }

    #[test]
    fn guest_zone_takes_precedence_over_primaries() {
        let timelines = day(&[("Guest Room", &[18.0]), ("Master", &[19.0])]);
        assert_eq!(
            classify_day(&timelines, Some(5.0), &policy()),
            Some(UsageLabel::GuestInUse)
        );
    }

    #[test]
    fn primary_combinations_collapse_to_three_labels() {
        let both = day(&[("Master", &[18.0]), ("LR", &[17.0])]);
        assert_eq!(
            classify_day(&both, Some(5.0), &policy()),
            Some(UsageLabel::BothPrimaries)
        );

        let one = day(&[("Master", &[18.0]), ("LR", &[5.0])]);
        assert_eq!(
            classify_day(&one, Some(5.0), &policy()),
            Some(UsageLabel::SinglePrimary)
        );

        let neither = day(&[("Den", &[18.0]), ("Master", &[0.0])]);
        assert_eq!(
            classify_day(&neither, Some(5.0), &policy()),
            Some(UsageLabel::SecondaryZonesOnly)
        );
    }

    #[test]
    fn low_hold_setpoints_count_as_off() {
        // Every zone parked at 7 or below reads as a shut-down system even
        // though the raw setpoints are nonzero.
        let timelines = day(&[
            ("Master", &[7.0]),
            ("Den", &[6.5]),
            ("Guest Room", &[4.0]),
        ]);
        assert_eq!(
            classify_day(&timelines, Some(1.2), &policy()),
            Some(UsageLabel::SystemOff)
        );
    }
}
