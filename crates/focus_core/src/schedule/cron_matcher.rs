//! Cron schedule matching against calendar dates.
//!
//! # Responsibility
//! - Validate template schedules at write time.
//! - Answer "does schedule S fire on date D in timezone Z?" for generation.
//!
//! # Invariants
//! - A schedule matches `date` iff its first occurrence at-or-after local
//!   midnight of `date` (as an absolute instant) falls on `date` in the same
//!   timezone. An occurrence whose wall-clock time falls inside a DST gap
//!   at the start of `date` counts for `date`.
//! - Parsing failures are reported as `InvalidSchedule`, never panics.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use croner::Cron;
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Named schedules accepted in addition to cron syntax.
const SCHEDULE_ALIASES: &[(&str, &str)] = &[
    ("daily", "0 0 * * *"),
    ("weekdays", "0 0 * * 1-5"),
    ("weekends", "0 0 * * 0,6"),
    ("monthly", "0 0 1 * *"),
    ("monday", "0 0 * * 1"),
    ("tuesday", "0 0 * * 2"),
    ("wednesday", "0 0 * * 3"),
    ("thursday", "0 0 * * 4"),
    ("friday", "0 0 * * 5"),
    ("saturday", "0 0 * * 6"),
    ("sunday", "0 0 * * 0"),
];

/// Longest DST gap we step over when local midnight does not exist.
const MAX_MIDNIGHT_GAP_MINUTES: i64 = 180;
const MIDNIGHT_GAP_STEP_MINUTES: i64 = 15;

/// Schedule text that cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSchedule {
    pub schedule: String,
    pub reason: String,
}

impl Display for InvalidSchedule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid schedule `{}`: {}", self.schedule, self.reason)
    }
}

impl Error for InvalidSchedule {}

/// Cron evaluation capability used by generation and template validation.
pub trait CronMatcher {
    /// Rejects schedules that would never parse during generation.
    fn validate(&self, schedule: &str) -> Result<(), InvalidSchedule>;

    /// Returns whether `schedule` fires on `date` in `timezone`.
    fn matches(
        &self,
        schedule: &str,
        date: NaiveDate,
        timezone: Tz,
    ) -> Result<bool, InvalidSchedule>;
}

impl<M: CronMatcher + ?Sized> CronMatcher for &M {
    fn validate(&self, schedule: &str) -> Result<(), InvalidSchedule> {
        (**self).validate(schedule)
    }

    fn matches(
        &self,
        schedule: &str,
        date: NaiveDate,
        timezone: Tz,
    ) -> Result<bool, InvalidSchedule> {
        (**self).matches(schedule, date, timezone)
    }
}

/// `croner`-backed matcher for 5-field (optionally 6-field, seconds first)
/// cron expressions, `@daily`-style nicknames and the names in
/// `SCHEDULE_ALIASES`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CronScheduleMatcher;

impl CronScheduleMatcher {
    pub fn new() -> Self {
        Self
    }

    fn parse(&self, schedule: &str) -> Result<Cron, InvalidSchedule> {
        let expression = resolve_alias(schedule);
        Cron::new(expression)
            .with_seconds_optional()
            .parse()
            .map_err(|err| InvalidSchedule {
                schedule: schedule.to_string(),
                reason: err.to_string(),
            })
    }
}

impl CronMatcher for CronScheduleMatcher {
    fn validate(&self, schedule: &str) -> Result<(), InvalidSchedule> {
        if schedule.trim().is_empty() {
            return Err(InvalidSchedule {
                schedule: schedule.to_string(),
                reason: "schedule is blank".to_string(),
            });
        }
        self.parse(schedule).map(|_| ())
    }

    fn matches(
        &self,
        schedule: &str,
        date: NaiveDate,
        timezone: Tz,
    ) -> Result<bool, InvalidSchedule> {
        let cron = self.parse(schedule)?;
        let Some(start) = local_day_start(date, timezone) else {
            debug!(
                "event=cron_match module=schedule status=skip reason=no_local_day_start date={date}"
            );
            return Ok(false);
        };
        if fires_in_midnight_gap(&cron, date, &start) {
            return Ok(true);
        }

        match cron.find_next_occurrence(&start, true) {
            Ok(occurrence) => Ok(occurrence.with_timezone(&timezone).date_naive() == date),
            Err(err) => {
                // Patterns like `0 0 30 2 *` parse but never fire.
                debug!(
                    "event=cron_match module=schedule status=no_occurrence date={date} error={err}"
                );
                Ok(false)
            }
        }
    }
}

/// Whether `cron` has a wall-clock occurrence between local midnight of
/// `date` and `start`, the first instant that exists after a DST gap.
fn fires_in_midnight_gap(cron: &Cron, date: NaiveDate, start: &DateTime<Tz>) -> bool {
    let midnight = date.and_time(NaiveTime::MIN);
    let first_local = start.naive_local();
    if first_local == midnight {
        return false;
    }
    // Evaluated on a zone without transitions so the skipped times exist.
    cron.find_next_occurrence(&Utc.from_utc_datetime(&midnight), true)
        .is_ok_and(|occurrence| occurrence.naive_utc() < first_local)
}

/// Maps a schedule alias to its cron expression; other input is returned trimmed.
pub fn resolve_alias(schedule: &str) -> &str {
    let trimmed = schedule.trim();
    let singular = trimmed
        .strip_suffix('s')
        .filter(|stem| !stem.is_empty())
        .unwrap_or(trimmed);
    SCHEDULE_ALIASES
        .iter()
        .find(|(alias, _)| {
            alias.eq_ignore_ascii_case(trimmed) || alias.eq_ignore_ascii_case(singular)
        })
        .map_or(trimmed, |(_, expression)| *expression)
}

/// First instant of `date` in `timezone`.
///
/// Where local midnight is skipped by a DST transition, the first existing
/// local time after it is used.
pub fn local_day_start(date: NaiveDate, timezone: Tz) -> Option<DateTime<Tz>> {
    let midnight = date.and_time(NaiveTime::MIN);
    let mut offset = 0;
    while offset <= MAX_MIDNIGHT_GAP_MINUTES {
        let candidate = midnight + Duration::minutes(offset);
        if let Some(start) = timezone.from_local_datetime(&candidate).earliest() {
            return Some(start);
        }
        offset += MIDNIGHT_GAP_STEP_MINUTES;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{local_day_start, resolve_alias};
    use chrono::{NaiveDate, Timelike};
    use chrono_tz::Tz;

    #[test]
    fn aliases_are_case_insensitive_and_accept_plural_day_names() {
        assert_eq!(resolve_alias("Weekdays"), "0 0 * * 1-5");
        assert_eq!(resolve_alias(" mondays "), "0 0 * * 1");
        assert_eq!(resolve_alias("DAILY"), "0 0 * * *");
        assert_eq!(resolve_alias("0 9 * * 1"), "0 9 * * 1");
        assert_eq!(resolve_alias("s"), "s");
    }

    #[test]
    fn local_day_start_skips_dst_gap_at_midnight() {
        // Santiago moved clocks from 00:00 to 01:00 on 2024-09-08.
        let date = NaiveDate::from_ymd_opt(2024, 9, 8).unwrap();
        let start = local_day_start(date, Tz::America__Santiago).unwrap();
        assert_eq!(start.date_naive(), date);
        assert_eq!(start.hour(), 1);
    }
}
