//! Human date expressions.
//!
//! Converts strings such as `tomorrow`, `fri`, `2020-01-07T10:00` or
//! `1y 2mo 3rmo 5d` into an absolute [`NaiveDateTime`] relative to a
//! reference point. Forms are tried in this order:
//!
//! 1. Weekday names (`mon`, `tuesday`, ...) - next such day strictly after the
//!    reference, a full week ahead if the reference already is that weekday.
//! 2. `YYYY-MM-DDTHH:MM`
//! 3. `YYYY-MM-DD` (any single character separator), at midnight.
//! 4. `now`, `today`, `tomorrow`, `yesterday`.
//! 5. Offsets: whitespace separated `<n><unit>` groups, units `s`, `m`, `h`,
//!    `d`, `w`, `mo`, `y` and `rmo` (relative month). Groups may be glued
//!    together (`1d1mo1y`); every delta is accumulated and applied once.

use crate::error::{TaskError, TaskResult};
use chrono::{Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex_lite::Regex;
use std::sync::LazyLock;

static ISO_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})[Tt](\d{2}):(\d{2})$").expect("static regex")
});

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}).(\d{2}).(\d{2})$").expect("static regex"));

static OFFSET_ELEMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[0-9]+[a-z]+)+$").expect("static regex"));

static OFFSET_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9]+)([a-z]+)").expect("static regex"));

const WEEKDAYS: [(&str, Weekday); 7] = [
    ("monday", Weekday::Mon),
    ("tuesday", Weekday::Tue),
    ("wednesday", Weekday::Wed),
    ("thursday", Weekday::Thu),
    ("friday", Weekday::Fri),
    ("saturday", Weekday::Sat),
    ("sunday", Weekday::Sun),
];

/// Current local wall-clock time, the implicit reference of every expression.
pub fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Evaluate `expression` against the current time.
pub fn evaluate_now(expression: &str) -> TaskResult<NaiveDateTime> {
    evaluate(expression, now())
}

/// Evaluate a human date expression relative to `reference`.
pub fn evaluate(expression: &str, reference: NaiveDateTime) -> TaskResult<NaiveDateTime> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(TaskError::date_parse(trimmed));
    }
    let lowered = trimmed.to_lowercase();

    if let Some(weekday) = parse_weekday(&lowered) {
        return next_weekday(weekday, reference);
    }

    // ISO forms are matched on the input as typed
    if let Some(caps) = ISO_DATETIME.captures(trimmed) {
        let date = calendar_date(trimmed, &caps[1], &caps[2], &caps[3])?;
        let time = caps[4]
            .parse()
            .ok()
            .zip(caps[5].parse().ok())
            .and_then(|(hour, minute)| NaiveTime::from_hms_opt(hour, minute, 0))
            .ok_or_else(|| TaskError::date_parse(trimmed))?;
        return Ok(date.and_time(time));
    }

    if let Some(caps) = ISO_DATE.captures(trimmed) {
        let date = calendar_date(trimmed, &caps[1], &caps[2], &caps[3])?;
        return Ok(date.and_time(NaiveTime::MIN));
    }

    let expression = lowered;
    match expression.as_str() {
        "now" | "today" => Ok(reference),
        "tomorrow" => shift(reference, Duration::days(1), &expression),
        "yesterday" => shift(reference, Duration::days(-1), &expression),
        _ => apply_offsets(&expression, reference),
    }
}

/// At least three letters, all of them a prefix of the full day name.
fn parse_weekday(expression: &str) -> Option<Weekday> {
    if expression.len() < 3 {
        return None;
    }
    WEEKDAYS
        .iter()
        .find(|(name, _)| name.starts_with(expression))
        .map(|(_, weekday)| *weekday)
}

fn calendar_date(expression: &str, year: &str, month: &str, day: &str) -> TaskResult<NaiveDate> {
    let year: i32 = year.parse().map_err(|_| TaskError::date_parse(expression))?;
    let month: u32 = month.parse().map_err(|_| TaskError::date_parse(expression))?;
    let day: u32 = day.parse().map_err(|_| TaskError::date_parse(expression))?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| TaskError::date_parse(expression))
}

fn shift(date: NaiveDateTime, delta: Duration, expression: &str) -> TaskResult<NaiveDateTime> {
    date.checked_add_signed(delta)
        .ok_or_else(|| TaskError::date_parse(expression))
}

/// Next `target` weekday strictly after the reference day.
fn next_weekday(target: Weekday, reference: NaiveDateTime) -> TaskResult<NaiveDateTime> {
    let mut start = reference;
    if start.weekday() == target {
        start = shift(start, Duration::days(1), "weekday")?;
    }
    let ahead = (7 + target.num_days_from_monday() - start.weekday().num_days_from_monday()) % 7;
    shift(start, Duration::days(i64::from(ahead)), "weekday")
}

/// First day on or after `date` that falls on `weekday`.
fn first_on_or_after(date: NaiveDate, weekday: Weekday) -> NaiveDate {
    let ahead = (7 + weekday.num_days_from_monday() - date.weekday().num_days_from_monday()) % 7;
    date + Duration::days(i64::from(ahead))
}

/// Same ordinal weekday of the month, `months` months later.
///
/// A reference on the 2nd Wednesday lands on the 2nd Wednesday of the target
/// month. The count starts on day one of the target month, so a 5th
/// occurrence that the target month lacks rolls into the first week of the
/// month after it.
fn next_monthday(months: u32, reference: NaiveDateTime) -> Option<NaiveDateTime> {
    let weekday = reference.weekday();
    let month_start = reference.date().with_day(1)?;
    let first = first_on_or_after(month_start, weekday);
    let ordinal = (reference.day() - first.day()) / 7;

    let target_start = month_start.checked_add_months(Months::new(months))?;
    let date = first_on_or_after(target_start, weekday)
        .checked_add_signed(Duration::weeks(i64::from(ordinal)))?;
    Some(date.and_time(reference.time()))
}

#[derive(Debug, Default)]
struct DateDelta {
    months: u32,
    duration: Duration,
}

impl DateDelta {
    fn add_months(&mut self, months: u32) -> Option<()> {
        self.months = self.months.checked_add(months)?;
        Some(())
    }

    fn add_duration(&mut self, duration: Option<Duration>) -> Option<()> {
        self.duration = self.duration.checked_add(&duration?)?;
        Some(())
    }
}

fn apply_offsets(expression: &str, reference: NaiveDateTime) -> TaskResult<NaiveDateTime> {
    let mut delta = DateDelta::default();

    for element in expression.split_whitespace() {
        if !OFFSET_ELEMENT.is_match(element) {
            return Err(TaskError::date_parse(element));
        }
        for caps in OFFSET_GROUP.captures_iter(element) {
            let group = &caps[0];
            let value: u32 = caps[1].parse().map_err(|_| TaskError::date_parse(group))?;
            let amount = i64::from(value);
            let applied = match &caps[2] {
                "s" => delta.add_duration(Duration::try_seconds(amount)),
                "m" => delta.add_duration(Duration::try_minutes(amount)),
                "h" => delta.add_duration(Duration::try_hours(amount)),
                "d" => delta.add_duration(Duration::try_days(amount)),
                "w" => delta.add_duration(Duration::try_weeks(amount)),
                "mo" => delta.add_months(value),
                "y" => value.checked_mul(12).and_then(|months| delta.add_months(months)),
                "rmo" => {
                    let target = next_monthday(value, reference)
                        .ok_or_else(|| TaskError::date_parse(group))?;
                    delta.add_duration(Some(target.signed_duration_since(reference)))
                }
                _ => return Err(TaskError::date_parse(group)),
            };
            applied.ok_or_else(|| TaskError::date_parse(group))?;
        }
    }

    reference
        .checked_add_months(Months::new(delta.months))
        .and_then(|date| date.checked_add_signed(delta.duration))
        .ok_or_else(|| TaskError::date_parse(expression))
}
