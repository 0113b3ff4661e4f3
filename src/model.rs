use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One normalized setpoint-change fact. Append-only upstream; never mutated
/// here. A setpoint of 0 means heating disabled for the zone from this instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetpointEvent {
    pub zone: String,
    pub timestamp: DateTime<Utc>,
    pub setpoint: f64,
}

/// Half-open slice of a zone's day at a constant setpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub setpoint: f64,
}

impl Interval {
    pub fn duration_hours(&self) -> f64 {
        (self.to - self.from).num_seconds() as f64 / 3600.0
    }
}

/// Ordered, non-overlapping intervals covering the day wherever a setpoint is
/// known. Legitimately empty when the zone has no known state at all.
pub type ZoneTimeline = Vec<Interval>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessSource {
    Observed,
    CarriedForward,
    Stale,
}

/// Coarse one-per-day occupancy label, chosen by strict precedence over all
/// zones' timelines. The absence of a label (no rule matched) is a detectable
/// gap carried as `Option<UsageLabel>`, never a silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageLabel {
    SystemOff,
    EnabledNoHeatNeeded,
    GuestInUse,
    BothPrimaries,
    SinglePrimary,
    SecondaryZonesOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DqStatus {
    Pass,
    Warn,
    Fail,
}

/// Day-level data-quality verdict, restricted to zones that actually produced
/// events that day. `score` is absent when the day had zero events and the
/// verdict degrades to WARN without being scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqVerdict {
    pub status: DqStatus,
    pub score: Option<u32>,
    pub events_count: usize,
    pub required_zones: BTreeSet<String>,
    pub missing_zones: Vec<String>,
    pub negative_zones: Vec<String>,
}

/// Derived per-(zone, day) aggregate. All numeric fields are rounded to three
/// decimals at construction; accumulation happens unrounded upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDailyMetrics {
    pub total_hours: f64,
    pub setpoint_hours: f64,
    pub hours_by_setpoint: BTreeMap<String, f64>,
    pub degree_hours: Option<f64>,
    pub degree_hours_by_setpoint: Option<BTreeMap<String, f64>>,
    pub efficiency_index: Option<f64>,
    pub source: FreshnessSource,
    pub changes_count: usize,
}

/// Flattened (day, zone) row for downstream consumption. Every field that can
/// be unknown is `Option`: a missing map entry projects to null, never zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneDayRow {
    pub day: NaiveDate,
    pub zone: String,
    pub timeline: Option<ZoneTimeline>,
    pub total_hours: Option<f64>,
    pub setpoint_hours: Option<f64>,
    pub degree_hours: Option<f64>,
    pub efficiency_index: Option<f64>,
    pub source: Option<FreshnessSource>,
    pub changes_count: Option<usize>,
    pub energy_kwh: Option<f64>,
    pub usage_label: Option<UsageLabel>,
    pub dq_status: DqStatus,
}

/// Map keys must be strings for the JSON-shaped per-setpoint maps. The shortest
/// round-trip formatting keeps distinct setpoints distinct without rounding.
pub fn setpoint_key(setpoint: f64) -> String {
    format!("{setpoint}")
}
