use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::model::{DqVerdict, UsageLabel, ZoneDailyMetrics, ZoneDayRow, ZoneTimeline};

/// Flattens the day's per-zone maps into one row per (day, zone) over the
/// fixed roster. A zone absent from a map projects to null fields, never to
/// zeros; the day-level usage label and DQ status are repeated on every row.
pub fn project_rows(
    day: NaiveDate,
    zone_roster: &[String],
    timelines: &BTreeMap<String, ZoneTimeline>,
    metrics: &BTreeMap<String, ZoneDailyMetrics>,
    energy_kwh: &BTreeMap<String, f64>,
    usage_label: Option<UsageLabel>,
    dq: &DqVerdict,
) -> Vec<ZoneDayRow> {
    zone_roster
        .iter()
        .map(|zone| {
            let m = metrics.get(zone);
            ZoneDayRow {
                day,
                zone: zone.clone(),
                timeline: timelines.get(zone).cloned(),
                total_hours: m.map(|m| m.total_hours),
                setpoint_hours: m.map(|m| m.setpoint_hours),
                degree_hours: m.and_then(|m| m.degree_hours),
                efficiency_index: m.and_then(|m| m.efficiency_index),
                source: m.map(|m| m.source),
                changes_count: m.map(|m| m.changes_count),
                energy_kwh: energy_kwh.get(zone).copied(),
                usage_label,
                dq_status: dq.status,
            }
        })
        .collect()
}

/// In-memory (day, zone)-keyed sink with upsert semantics: an existing row is
/// overwritten field-for-field, a new key is inserted, nothing is deleted.
#[derive(Debug, Default, Clone)]
pub struct ZoneDayTable {
    rows: BTreeMap<(NaiveDate, String), ZoneDayRow>,
}

impl ZoneDayTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, row: ZoneDayRow) {
        self.rows.insert((row.day, row.zone.clone()), row);
    }

    pub fn upsert_all(&mut self, rows: impl IntoIterator<Item = ZoneDayRow>) {
        for row in rows {
            self.upsert(row);
        }
    }

    pub fn get(&self, day: NaiveDate, zone: &str) -> Option<&ZoneDayRow> {
        self.rows.get(&(day, zone.to_string()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = &ZoneDayRow> {
        self.rows.values()
    }
}
