//! Filter-template token substitution.
//!
//! `$filter` templates may carry `{TODAY}`, `{TOMORROW}`, `{TODAY+N}`,
//! `{MONTH_START}`, `{NEXT_MONTH_START}` and `{USERID}` placeholders.
//! Substitution is a pure function of the template, the caller's user id
//! and the supplied instant, and is idempotent: substituted output
//! contains no further placeholders.

use chrono::{DateTime, Datelike, Duration, Months, SecondsFormat, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static TODAY_OFFSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{TODAY\+(\d+)\}").expect("valid regex"));

/// Replaces all date/user placeholders in a filter template.
#[must_use]
pub fn replace_tokens(template: &str, user_id: &str, now: DateTime<Utc>) -> String {
    let mut out = template
        .replace("{TODAY}", &start_of_day(now, 0))
        .replace("{TOMORROW}", &start_of_day(now, 1))
        .replace("{MONTH_START}", &start_of_month(now, 0))
        .replace("{NEXT_MONTH_START}", &start_of_month(now, 1))
        .replace("{USERID}", user_id);

    if TODAY_OFFSET.is_match(&out) {
        out = TODAY_OFFSET
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                let days: i64 = caps[1].parse().unwrap_or(0);
                start_of_day(now, days)
            })
            .into_owned();
    }
    out
}

/// UTC midnight `offset_days` from the given instant, ISO-8601.
fn start_of_day(now: DateTime<Utc>, offset_days: i64) -> String {
    let day = (now + Duration::days(offset_days)).date_naive();
    let midnight = day.and_hms_opt(0, 0, 0).expect("midnight is valid");
    Utc.from_utc_datetime(&midnight)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// UTC midnight on the first day of the month `offset_months` ahead.
fn start_of_month(now: DateTime<Utc>, offset_months: u32) -> String {
    let first = now
        .date_naive()
        .with_day(1)
        .expect("day 1 is valid")
        .checked_add_months(Months::new(offset_months))
        .expect("month arithmetic in range");
    let midnight = first.and_hms_opt(0, 0, 0).expect("midnight is valid");
    Utc.from_utc_datetime(&midnight)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}
