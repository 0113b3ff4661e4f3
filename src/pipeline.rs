use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::RollupConfig;
use crate::model::{DqVerdict, UsageLabel, ZoneDailyMetrics, ZoneDayRow, ZoneTimeline};
use crate::snapshot::DaySnapshot;
use crate::{freshness, metrics, normalize, projection, quality, summary, time, timeline, usage};

/// Everything one run derives for its day. Recomputed from scratch on every
/// run and overwritten in place; holds no history of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayOutputs {
    pub date: NaiveDate,
    pub timelines: BTreeMap<String, ZoneTimeline>,
    pub metrics: BTreeMap<String, ZoneDailyMetrics>,
    pub stale_zones: BTreeSet<String>,
    pub usage_label: Option<UsageLabel>,
    pub dq: DqVerdict,
    pub rows: Vec<ZoneDayRow>,
    pub summary: String,
    pub notes: Vec<String>,
}

/// Runs the whole derivation for one day, synchronously: normalize, rebuild
/// timelines, aggregate, classify, score, project. Nothing is written until
/// every step has succeeded; the only fatal input condition is a snapshot
/// without a day record, since there is nothing to key the output against.
pub fn run_day(snapshot: &DaySnapshot, config: &RollupConfig) -> Result<DayOutputs> {
    let record = snapshot
        .day
        .as_ref()
        .context("snapshot has no day record; nothing to key derived output against")?;
    let window = time::local_day_window(config.timezone, record.date)
        .with_context(|| format!("failed to resolve local day window for {}", record.date))?;

    let energy = record.known_energy();
    let events = normalize::normalize_events(&snapshot.events, &config.excluded_zones, config.timezone);
    tracing::info!(
        date = %record.date,
        raw_rows = snapshot.events.len(),
        normalized = events.len(),
        "normalized event log"
    );

    let events_by_zone = timeline::group_by_zone(events);
    let zone_days = timeline::build_day(&events_by_zone, &window, config.midnight_grace());
    let sources = freshness::classify_all(&zone_days, &window, config.staleness());
    let stale_zones = freshness::stale_zones(&sources);

    let mut timelines: BTreeMap<String, ZoneTimeline> = BTreeMap::new();
    let mut zone_metrics: BTreeMap<String, ZoneDailyMetrics> = BTreeMap::new();
    for (zone, zone_day) in &zone_days {
        let source = sources[zone];
        let aggregated = metrics::zone_daily_metrics(
            zone_day,
            record.outdoor_temp_c,
            energy.get(zone).copied(),
            source,
        );
        timelines.insert(zone.clone(), zone_day.timeline.clone());
        zone_metrics.insert(zone.clone(), aggregated);
    }

    let total_energy = if energy.is_empty() {
        None
    } else {
        Some(energy.values().sum())
    };
    let usage_label = usage::classify_day(&timelines, total_energy, &config.usage_policy());

    let dq = quality::evaluate(
        &snapshot.events,
        &window,
        &energy,
        &config.excluded_zones,
        config.timezone,
    );

    let summary_text = summary::build_daily_summary(
        record.date,
        &snapshot.events,
        &window,
        &config.zone_roster,
        &energy,
        config.timezone,
    );

    let notes = collect_notes(record.outdoor_temp_c, usage_label, &stale_zones, &dq);
    let rows = projection::project_rows(
        record.date,
        &config.zone_roster,
        &timelines,
        &zone_metrics,
        &energy,
        usage_label,
        &dq,
    );

    Ok(DayOutputs {
        date: record.date,
        timelines,
        metrics: zone_metrics,
        stale_zones,
        usage_label,
        dq,
        rows,
        summary: summary_text,
        notes,
    })
}

/// Degraded-but-nonfatal conditions, attached to the day's output instead of
/// being raised as failures.
fn collect_notes(
    outdoor_temp_c: Option<f64>,
    usage_label: Option<UsageLabel>,
    stale_zones: &BTreeSet<String>,
    dq: &DqVerdict,
) -> Vec<String> {
    let mut notes = Vec::new();
    if outdoor_temp_c.is_none() {
        notes.push(
            "outdoor temperature unavailable; degree-hours and efficiency are unknown".to_string(),
        );
    }
    if usage_label.is_none() {
        notes.push("no usage rule matched; day left unclassified".to_string());
    }
    if !stale_zones.is_empty() {
        notes.push(format!(
            "stale zones (efficiency suppressed): {}",
            stale_zones.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
    }
    if !dq.missing_zones.is_empty() {
        notes.push(format!(
            "active zones missing energy: {}",
            dq.missing_zones.join(", ")
        ));
    }
    if !dq.negative_zones.is_empty() {
        notes.push(format!(
            "active zones with negative energy: {}",
            dq.negative_zones.join(", ")
        ));
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DqStatus, FreshnessSource};
    use crate::snapshot::DayRecord;
    use serde_json::json;

    fn config() -> RollupConfig {
        RollupConfig::default()
    }

    fn raw_row(zone: &str, local_ts: &str, setpoint: f64) -> crate::normalize::RawEventRow {
        serde_json::from_value(json!({
            "id": format!("rec-{zone}-{local_ts}"),
            "thermostat": zone,
            "timestamp": local_ts,
            "new_setpoint": setpoint,
            "previous_setpoint": 0.0
        }))
        .expect("row")
    }

    fn record(outdoor: Option<f64>, energy: &[(&str, Option<f64>)]) -> DayRecord {
        DayRecord {
            date: NaiveDate::from_ymd_opt(2026, 1, 15).expect("date"),
            outdoor_temp_c: outdoor,
            energy_kwh: energy
                .iter()
                .map(|(zone, kwh)| (zone.to_string(), *kwh))
                .collect(),
        }
    }

    #[test]
    fn missing_day_record_aborts_without_output() {
        let snapshot = DaySnapshot {
            events: vec![raw_row("Master", "2026-01-15T06:00:00", 18.0)],
            day: None,
        };
        let err = run_day(&snapshot, &config()).unwrap_err();
        assert!(err.to_string().contains("no day record"));
    }

    #[test]
    fn worked_example_master_day() {
        // Two events on an otherwise unknown day, outdoor 5 degrees: morning
        // is unknown, so 16h at 18 plus 2h at 14 gives 226 degree-hours.
        let snapshot = DaySnapshot {
            events: vec![
                raw_row("Master", "2026-01-15T06:00:00", 18.0),
                raw_row("Master", "2026-01-15T22:00:00", 14.0),
            ],
            day: Some(record(Some(5.0), &[("Master", Some(4.52))])),
        };
        let outputs = run_day(&snapshot, &config()).expect("outputs");

        let timeline = &outputs.timelines["Master"];
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].setpoint, 18.0);
        assert_eq!(timeline[1].setpoint, 14.0);

        let metrics = &outputs.metrics["Master"];
        assert_eq!(metrics.degree_hours, Some(226.0));
        assert_eq!(metrics.total_hours, 18.0);
        assert_eq!(metrics.source, FreshnessSource::Observed);
        assert_eq!(metrics.changes_count, 2);
        assert_eq!(metrics.efficiency_index, Some(metrics::round3(4.52 / 226.0)));

        assert_eq!(outputs.dq.status, DqStatus::Pass);
        assert_eq!(outputs.usage_label, Some(UsageLabel::SinglePrimary));
    }

    #[test]
    fn all_low_setpoints_label_system_off_but_dq_still_requires_zones() {
        let events: Vec<_> = crate::config::DEFAULT_ZONE_ROSTER
            .iter()
            .map(|zone| raw_row(zone, "2026-01-15T06:00:00", 5.0))
            .collect();
        let energy: Vec<(&str, Option<f64>)> = crate::config::DEFAULT_ZONE_ROSTER
            .iter()
            .map(|zone| (*zone, Some(0.2)))
            .collect();
        let snapshot = DaySnapshot {
            events,
            day: Some(record(Some(2.0), &energy)),
        };
        let outputs = run_day(&snapshot, &config()).expect("outputs");
        assert_eq!(outputs.usage_label, Some(UsageLabel::SystemOff));
        assert_eq!(outputs.dq.required_zones.len(), 12);
        assert_eq!(outputs.dq.status, DqStatus::Pass);
    }

    #[test]
    fn zero_events_day_is_warn_with_empty_required_set() {
        let snapshot = DaySnapshot {
            events: vec![],
            day: Some(record(Some(5.0), &[("Master", Some(3.0))])),
        };
        let outputs = run_day(&snapshot, &config()).expect("outputs");
        assert_eq!(outputs.dq.status, DqStatus::Warn);
        assert_eq!(outputs.dq.score, None);
        assert!(outputs.dq.required_zones.is_empty());
        // Nothing known about any zone: the day reads as shut down.
        assert_eq!(outputs.usage_label, Some(UsageLabel::SystemOff));
    }

    #[test]
    fn stale_zone_suppresses_efficiency_despite_valid_inputs() {
        // One event 40 hours before day end and none during the day.
        let snapshot = DaySnapshot {
            events: vec![raw_row("Den", "2026-01-14T09:00:00", 18.0)],
            day: Some(record(Some(3.0), &[("Den", Some(2.5))])),
        };
        let outputs = run_day(&snapshot, &config()).expect("outputs");
        let metrics = &outputs.metrics["Den"];
        assert_eq!(metrics.source, FreshnessSource::Stale);
        assert!(metrics.degree_hours.unwrap() > 0.0);
        assert_eq!(metrics.efficiency_index, None);
        assert!(outputs.stale_zones.contains("Den"));
    }

    #[test]
    fn missing_outdoor_temperature_propagates_null_and_a_note() {
        let snapshot = DaySnapshot {
            events: vec![raw_row("Master", "2026-01-15T06:00:00", 18.0)],
            day: Some(record(None, &[("Master", Some(3.0))])),
        };
        let outputs = run_day(&snapshot, &config()).expect("outputs");
        let metrics = &outputs.metrics["Master"];
        assert_eq!(metrics.degree_hours, None);
        assert_eq!(metrics.efficiency_index, None);
        assert!(outputs
            .notes
            .iter()
            .any(|n| n.contains("outdoor temperature unavailable")));
    }

    #[test]
    fn excluded_zone_appears_nowhere_in_outputs() {
        let snapshot = DaySnapshot {
            events: vec![
                raw_row("Hallway", "2026-01-15T06:00:00", 18.0),
                raw_row("Master", "2026-01-15T07:00:00", 18.0),
            ],
            day: Some(record(Some(5.0), &[("Master", Some(3.0))])),
        };
        let outputs = run_day(&snapshot, &config()).expect("outputs");
        assert!(!outputs.timelines.contains_key("Hallway"));
        assert!(!outputs.dq.required_zones.contains("Hallway"));
    }

    #[test]
    fn rerunning_identical_inputs_is_byte_identical() {
        let snapshot = DaySnapshot {
            events: vec![
                raw_row("Master", "2026-01-15T06:00:00", 18.0),
                raw_row("Den", "2026-01-15T08:30:00", 17.5),
                raw_row("Master", "2026-01-15T22:00:00", 14.0),
            ],
            day: Some(record(Some(5.0), &[("Master", Some(4.5)), ("Den", None)])),
        };
        let cfg = config();
        let first = serde_json::to_string(&run_day(&snapshot, &cfg).expect("first")).expect("json");
        let second =
            serde_json::to_string(&run_day(&snapshot, &cfg).expect("second")).expect("json");
        assert_eq!(first, second);
    }

    #[test]
    fn projection_emits_one_row_per_roster_zone() {
        let snapshot = DaySnapshot {
            events: vec![raw_row("Master", "2026-01-15T06:00:00", 18.0)],
            day: Some(record(Some(5.0), &[("Master", Some(3.0))])),
        };
        let outputs = run_day(&snapshot, &config()).expect("outputs");
        assert_eq!(outputs.rows.len(), 12);
        let kitchen = outputs
            .rows
            .iter()
            .find(|r| r.zone == "Kitchen")
            .expect("row");
        assert_eq!(kitchen.total_hours, None);
        assert_eq!(kitchen.energy_kwh, None);
        assert_eq!(kitchen.dq_status, DqStatus::Pass);
        assert_eq!(kitchen.usage_label, Some(UsageLabel::SinglePrimary));
    }
}
