//! Timestamp parsing at the CLI edge and the text format used in the database.
//!
//! - [`parse_ts_to_utc`]: RFC 3339 with an explicit offset, to UTC.
//! - [`from_local_naive`]: a wall-clock time in an IANA zone (e.g.
//!   "Asia/Shanghai"), to UTC. DST gaps and ambiguous fall-back times are errors.
//! - [`parse_cli_ts`]: what `--start`/`--end` accept; either of the above.
//! - [`to_rfc3339_millis`]: the stored form, `2024-01-01T00:00:00.000Z`.
//!
//! All database text and all window math is UTC. Local time is only accepted
//! on the command line and must resolve to exactly one instant.

use anyhow::Context;
use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];

/// RFC-3339 with offset -> UTC.
///
/// Example:
/// - "2024-03-10T09:30:00-05:00" -> "2024-03-10T14:30:00Z"
pub fn parse_ts_to_utc(s: &str) -> anyhow::Result<DateTime<Utc>> {
    let dt = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad rfc3339: {s}"))?;
    Ok(dt.with_timezone(&Utc))
}

/// Wall-clock time in `tz_name` -> UTC, rejecting times that don't exist or occur twice.
pub fn from_local_naive(naive: NaiveDateTime, tz_name: &str) -> anyhow::Result<DateTime<Utc>> {
    let tz: Tz = tz_name
        .parse()
        .map_err(|_| anyhow::anyhow!("bad tz: {tz_name}"))?;
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(..) => anyhow::bail!("ambiguous local time {naive} in {tz_name}"),
        LocalResult::None => anyhow::bail!("nonexistent local time {naive} in {tz_name}"),
    }
}

/// Parses a `--start`/`--end` value.
///
/// RFC 3339 strings carry their own offset and ignore `tz_name`. Anything else
/// is read as a naive date-time (or a bare date, meaning midnight) in
/// `tz_name`, defaulting to UTC.
pub fn parse_cli_ts(s: &str, tz_name: Option<&str>) -> anyhow::Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = parse_ts_to_utc(s) {
        return Ok(dt);
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .with_context(|| format!("unrecognised timestamp: {s}"))?;

    from_local_naive(naive, tz_name.unwrap_or("UTC"))
}

/// Format a UTC datetime as an RFC-3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
