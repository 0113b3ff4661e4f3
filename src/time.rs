use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// A local calendar day resolved to an absolute half-open instant range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// Resolves the local day `[midnight, next midnight)` to UTC instants.
///
/// Midnight itself can be skipped or repeated by a DST transition, so each
/// boundary is anchored at local noon of its day (noon is never affected by
/// a transition in any zone we care about) and then resolved backwards to the
/// first valid instant of that day rather than by subtracting raw durations.
pub fn local_day_window(tz: Tz, date: NaiveDate) -> Result<DayWindow> {
    let next = date
        .succ_opt()
        .with_context(|| format!("no successor for date {date}"))?;
    let start = first_instant_of_day(tz, date)?;
    let end = first_instant_of_day(tz, next)?;
    if end <= start {
        anyhow::bail!("resolved day window for {date} is empty or inverted");
    }
    Ok(DayWindow { date, start, end })
}

/// Today's date minus one in the given zone. The default target day for a run.
pub fn yesterday_local(tz: Tz, now: DateTime<Utc>) -> Result<NaiveDate> {
    now.with_timezone(&tz)
        .date_naive()
        .pred_opt()
        .context("no predecessor for current local date")
}

fn first_instant_of_day(tz: Tz, date: NaiveDate) -> Result<DateTime<Utc>> {
    let noon = date
        .and_hms_opt(12, 0, 0)
        .with_context(|| format!("invalid noon construction for {date}"))?;
    // Sanity anchor: if noon itself does not resolve the zone data is unusable.
    resolve_local(tz, noon)
        .with_context(|| format!("local noon of {date} does not resolve in {tz}"))?;

    let midnight = date
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("invalid midnight construction for {date}"))?;
    resolve_local(tz, midnight)
        .with_context(|| format!("no valid instant found at start of {date} in {tz}"))
}

/// Maps a naive local datetime to UTC. Ambiguous wall times (fall-back)
/// resolve to the earlier instant; nonexistent wall times (spring-forward)
/// resolve to the first valid local time after the gap.
pub(crate) fn resolve_local(tz: Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        chrono::LocalResult::Ambiguous(a, b) => {
            let (a, b) = (a.with_timezone(&Utc), b.with_timezone(&Utc));
            Some(a.min(b))
        }
        chrono::LocalResult::None => next_valid_local(tz, naive, 180),
    }
}

fn next_valid_local(tz: Tz, naive: NaiveDateTime, max_minutes: i64) -> Option<DateTime<Utc>> {
    for minutes in 1..=max_minutes {
        let candidate = naive + Duration::minutes(minutes);
        match tz.from_local_datetime(&candidate) {
            chrono::LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
            chrono::LocalResult::Ambiguous(a, b) => {
                let (a, b) = (a.with_timezone(&Utc), b.with_timezone(&Utc));
                return Some(a.min(b));
            }
            chrono::LocalResult::None => continue,
        }
    }
    None
}
