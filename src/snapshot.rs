use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::normalize::RawEventRow;
use crate::pipeline::DayOutputs;

/// The day record the external producers fill in before a run: the target
/// date, the day's mean outdoor temperature, and per-zone energy readings.
/// Explicit nulls and absent entries both mean "unknown"; `known_energy`
/// collapses the two. A reading of 0 is a known value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub outdoor_temp_c: Option<f64>,
    #[serde(default)]
    pub energy_kwh: BTreeMap<String, Option<f64>>,
}

impl DayRecord {
    pub fn known_energy(&self) -> BTreeMap<String, f64> {
        self.energy_kwh
            .iter()
            .filter_map(|(zone, value)| {
                value
                    .filter(|v| v.is_finite())
                    .map(|v| (zone.clone(), v))
            })
            .collect()
    }
}

/// One run's worth of input: the raw event log slice and the day record.
/// A snapshot without a day record is unusable; the run aborts rather than
/// writing derived output with nothing to key it against.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaySnapshot {
    #[serde(default)]
    pub events: Vec<RawEventRow>,
    #[serde(default)]
    pub day: Option<DayRecord>,
}

pub fn load(path: &Path) -> Result<DaySnapshot> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse snapshot {}", path.display()))
}

/// Serializes first, writes a sibling temp file, then renames into place: the
/// output either fully replaces the previous run's file or is not written at
/// all, matching the no-partial-writes contract of a run.
pub fn write_outputs(path: &Path, outputs: &DayOutputs) -> Result<()> {
    let body = serde_json::to_string_pretty(outputs).context("failed to serialize day outputs")?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body.as_bytes())
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move outputs into place at {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_energy_distinguishes_null_from_zero() {
        let record: DayRecord = serde_json::from_str(
            r#"{
                "date": "2026-01-15",
                "outdoor_temp_c": 5.0,
                "energy_kwh": {"Master": 0.0, "Den": null, "LR": 3.25}
            }"#,
        )
        .expect("record");
        let known = record.known_energy();
        assert_eq!(known.get("Master"), Some(&0.0));
        assert_eq!(known.get("LR"), Some(&3.25));
        assert!(!known.contains_key("Den"));
    }

    #[test]
    fn snapshot_tolerates_missing_sections() {
        let snapshot: DaySnapshot = serde_json::from_str("{}").expect("snapshot");
        assert!(snapshot.events.is_empty());
        assert!(snapshot.day.is_none());
    }

    #[test]
    fn snapshot_parses_loose_event_rows() {
        let snapshot: DaySnapshot = serde_json::from_str(
            r#"{
                "events": [
                    {"id": "rec1", "thermostat": "Master",
                     "timestamp": "2026-01-15T06:00:00", "new_setpoint": 18},
                    {"zone": "Den", "timestamp": 1768540800, "new_setpoint": "17.5"},
                    {"timestamp": "garbage"}
                ],
                "day": {"date": "2026-01-15"}
            }"#,
        )
        .expect("snapshot");
        assert_eq!(snapshot.events.len(), 3);
        assert_eq!(snapshot.day.expect("day").outdoor_temp_c, None);
    }
}
