use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::error::SchedulerError;

/// A five-field cron expression (minute, hour, day-of-month, month,
/// day-of-week) with standard Unix semantics: when both day fields are
/// restricted, a day matching either fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self, SchedulerError> {
        let invalid = |reason: &str| SchedulerError::InvalidCron {
            expr: expr.to_owned(),
            reason: reason.to_owned(),
        };

        let fields: Vec<&str> = expr.split_whitespace().collect();

        if fields.len() != 5 {
            return Err(invalid("expected 5 fields"));
        }

        let minutes = parse_field(fields[0], 0, 59).map_err(|e| invalid(&e))?;
        let hours = parse_field(fields[1], 0, 23).map_err(|e| invalid(&e))?;
        let days_of_month = parse_field(fields[2], 1, 31).map_err(|e| invalid(&e))?;
        let months = parse_field(fields[3], 1, 12).map_err(|e| invalid(&e))?;
        // 7 is an alias for Sunday
        let days_of_week: Vec<u32> = {
            let mut days: Vec<u32> = parse_field(fields[4], 0, 7)
                .map_err(|e| invalid(&e))?
                .into_iter()
                .map(|d| d % 7)
                .collect();
            days.sort_unstable();
            days.dedup();
            days
        };

        Ok(Self {
            source: expr.to_owned(),
            minutes,
            hours,
            days_of_month,
            months,
            days_of_week,
            dom_restricted: fields[2] != "*",
            dow_restricted: fields[4] != "*",
        })
    }

    /// The next matching instant strictly after `after`, at minute
    /// resolution. `None` only for expressions that can never fire again
    /// within four years (e.g. Feb 30).
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let floor = after
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(after);
        let from = floor + Duration::minutes(1);
        let mut date = from.date_naive();

        for _ in 0..(366 * 4) {
            if self.months.contains(&date.month()) && self.day_matches(date) {
                for &hour in &self.hours {
                    for &minute in &self.minutes {
                        let candidate = date.and_hms_opt(hour, minute, 0)?.and_utc();

                        if candidate >= from {
                            return Some(candidate);
                        }
                    }
                }
            }

            date = date + Duration::days(1);
        }

        None
    }

    fn day_matches(&self, date: chrono::NaiveDate) -> bool {
        let dom = self.days_of_month.contains(&date.day());
        let dow = self
            .days_of_week
            .contains(&date.weekday().num_days_from_sunday());

        match (self.dom_restricted, self.dow_restricted) {
            (true, true) => dom || dow,
            (true, false) => dom,
            (false, true) => dow,
            (false, false) => true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for CronExpr {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parses one field: `*`, `*/step`, values, ranges, and comma lists of
/// either, e.g. `0`, `1-5`, `*/15`, `0,30`, `1-5/2`.
fn parse_field(field: &str, min: u32, max: u32) -> Result<Vec<u32>, String> {
    let mut values = Vec::new();

    for part in field.split(',') {
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("bad step in `{part}`"))?;

                if step == 0 {
                    return Err(format!("zero step in `{part}`"));
                }

                (range, step)
            }
            None => (part, 1),
        };

        let (lo, hi) = if range == "*" {
            (min, max)
        } else if let Some((lo, hi)) = range.split_once('-') {
            (
                lo.parse().map_err(|_| format!("bad value in `{part}`"))?,
                hi.parse().map_err(|_| format!("bad value in `{part}`"))?,
            )
        } else {
            let value: u32 = range.parse().map_err(|_| format!("bad value in `{part}`"))?;
            (value, value)
        };

        if lo < min || hi > max || lo > hi {
            return Err(format!("`{part}` out of range {min}-{max}"));
        }

        values.extend((lo..=hi).step_by(step as usize));
    }

    values.sort_unstable();
    values.dedup();

    Ok(values)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn rejects_malformed_expressions() {
        for expr in ["", "* * * *", "60 * * * *", "* 24 * * *", "a * * * *", "*/0 * * * *"] {
            assert!(CronExpr::parse(expr).is_err(), "{expr} should be invalid");
        }
    }

    #[test]
    fn daily_at_two() {
        let cron = CronExpr::parse("0 2 * * *").unwrap();

        assert_eq!(
            cron.next_after(at(2025, 11, 3, 1, 30)),
            Some(at(2025, 11, 3, 2, 0))
        );
        assert_eq!(
            cron.next_after(at(2025, 11, 3, 2, 0)),
            Some(at(2025, 11, 4, 2, 0))
        );
    }

    #[test]
    fn monthly_on_the_first() {
        let cron = CronExpr::parse("0 1 1 * *").unwrap();

        assert_eq!(
            cron.next_after(at(2025, 11, 15, 9, 0)),
            Some(at(2025, 12, 1, 1, 0))
        );
        assert_eq!(
            cron.next_after(at(2025, 12, 1, 1, 0)),
            Some(at(2026, 1, 1, 1, 0))
        );
    }

    #[test]
    fn weekly_on_sunday() {
        let cron = CronExpr::parse("0 0 * * 0").unwrap();

        // 2025-11-03 is a Monday; next Sunday is the 9th
        assert_eq!(
            cron.next_after(at(2025, 11, 3, 12, 0)),
            Some(at(2025, 11, 9, 0, 0))
        );
    }

    #[test]
    fn seven_aliases_sunday() {
        let on_seven = CronExpr::parse("0 0 * * 7").unwrap();
        let on_zero = CronExpr::parse("0 0 * * 0").unwrap();

        assert_eq!(
            on_seven.next_after(at(2025, 11, 3, 12, 0)),
            on_zero.next_after(at(2025, 11, 3, 12, 0))
        );
    }

    #[test]
    fn steps_ranges_and_lists() {
        let cron = CronExpr::parse("*/15 9-17 * * 1-5").unwrap();

        // Friday 17:45 -> next slot is Monday 09:00
        assert_eq!(
            cron.next_after(at(2025, 11, 7, 17, 45)),
            Some(at(2025, 11, 10, 9, 0))
        );
        assert_eq!(
            cron.next_after(at(2025, 11, 10, 9, 0)),
            Some(at(2025, 11, 10, 9, 15))
        );

        let halves = CronExpr::parse("0,30 * * * *").unwrap();
        assert_eq!(
            halves.next_after(at(2025, 11, 3, 10, 1)),
            Some(at(2025, 11, 3, 10, 30))
        );
    }

    #[test]
    fn restricted_dom_and_dow_fire_on_either() {
        // the 13th or any Friday
        let cron = CronExpr::parse("0 0 13 * 5").unwrap();

        // from Nov 3 2025 (Monday): Friday the 7th comes before the 13th
        assert_eq!(
            cron.next_after(at(2025, 11, 3, 0, 0)),
            Some(at(2025, 11, 7, 0, 0))
        );
        // from the 8th: the 13th (a Thursday) beats the next Friday only if
        // sooner; Nov 13 2025 is a Thursday, Nov 14 a Friday
        assert_eq!(
            cron.next_after(at(2025, 11, 8, 0, 0)),
            Some(at(2025, 11, 13, 0, 0))
        );
    }

    #[test]
    fn leap_day_resolves_to_the_next_leap_year() {
        let cron = CronExpr::parse("0 0 29 2 *").unwrap();

        assert_eq!(
            cron.next_after(at(2025, 3, 1, 0, 0)),
            Some(at(2028, 2, 29, 0, 0))
        );
    }
}
