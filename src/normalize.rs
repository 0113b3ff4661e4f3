use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

use crate::model::SetpointEvent;

/// One row as recorded by the telemetry bridge. Everything is optional and
/// loosely typed: event logs are expected to contain noise, and unusable rows
/// are dropped rather than rejected.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEventRow {
    #[serde(default)]
    pub id: Option<String>,
    /// Primary zone identifier.
    #[serde(default)]
    pub thermostat: Option<String>,
    /// Secondary name, used when the primary is absent.
    #[serde(default)]
    pub zone: Option<String>,
    /// Either a numeric unix timestamp or an ISO-like string.
    #[serde(default)]
    pub timestamp: Option<JsonValue>,
    #[serde(default)]
    pub new_setpoint: Option<JsonValue>,
    #[serde(default)]
    pub previous_setpoint: Option<JsonValue>,
}

/// Zone identity for a raw row: the primary field, else the secondary name.
/// Blank strings count as absent.
pub fn resolve_zone(row: &RawEventRow) -> Option<&str> {
    row.thermostat
        .as_deref()
        .map(str::trim)
        .filter(|z| !z.is_empty())
        .or_else(|| {
            row.zone
                .as_deref()
                .map(str::trim)
                .filter(|z| !z.is_empty())
        })
}

/// Accepts JSON numbers and numeric strings; anything else is noise.
pub fn parse_number(value: Option<&JsonValue>) -> Option<f64> {
    match value? {
        JsonValue::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

/// Accepts a numeric unix timestamp (seconds) or an ISO-like string. Strings
/// without an offset are interpreted as local wall time in `tz`.
pub fn parse_timestamp(value: Option<&JsonValue>, tz: Tz) -> Option<DateTime<Utc>> {
    match value? {
        JsonValue::Number(n) => {
            let seconds = n.as_f64().filter(|v| v.is_finite())?;
            DateTime::<Utc>::from_timestamp(
                seconds.trunc() as i64,
                (seconds.fract() * 1e9) as u32,
            )
        }
        JsonValue::String(s) => parse_timestamp_str(s.trim(), tz),
        _ => None,
    }
}

fn parse_timestamp_str(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return crate::time::resolve_local(tz, naive);
        }
    }
    None
}

/// Turns raw rows into normalized events, silently dropping rows with an
/// unresolvable zone, an unparseable timestamp, or a non-numeric setpoint, and
/// removing permanently-excluded zones. Output order follows input order and
/// is not time-sorted; callers sort per zone as needed.
pub fn normalize_events(
    rows: &[RawEventRow],
    excluded_zones: &BTreeSet<String>,
    tz: Tz,
) -> Vec<SetpointEvent> {
    let mut events = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;
    for row in rows {
        let Some(zone) = resolve_zone(row) else {
            dropped += 1;
            continue;
        };
        if excluded_zones.contains(zone) {
            continue;
        }
        let Some(timestamp) = parse_timestamp(row.timestamp.as_ref(), tz) else {
            dropped += 1;
            continue;
        };
        let Some(setpoint) = parse_number(row.new_setpoint.as_ref()) else {
            dropped += 1;
            continue;
        };
        events.push(SetpointEvent {
            zone: zone.to_string(),
            timestamp,
            setpoint,
        });
    }
    if dropped > 0 {
        tracing::debug!(dropped, total = rows.len(), "dropped unusable event rows");
    }
    events
}
