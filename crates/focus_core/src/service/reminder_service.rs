//! Worry-time reminders.
//!
//! # Responsibility
//! - Keep exactly one pending reminder per day record that has worries.
//! - Define the `Notifier` seam that delivers due reminders.
//!
//! # Invariants
//! - Every sync cancels first, then schedules at most one task
//!   (`worry-reminder-{day id}`).
//! - No reminder is kept for a day without worries text or for a reminder
//!   time already in the past.

use crate::model::day::{DayRecord, DayRecordId};
use crate::scheduler::{worry_reminder_task_id, ScheduledTask, TaskScheduler};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use log::{debug, info};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Reminder time used when a day has worries but no explicit time.
pub const DEFAULT_WORRY_TIME: NaiveTime = match NaiveTime::from_hms_opt(19, 0, 0) {
    Some(time) => time,
    None => NaiveTime::MIN,
};

const DST_GAP_STEP_MINUTES: i64 = 15;
const DST_GAP_STEPS: i64 = 12;

/// Payload handed to a notifier when a worry reminder is due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorryNotification {
    pub day_id: DayRecordId,
    pub date: NaiveDate,
    pub worry_time: NaiveTime,
}

/// Delivery failure reported by a notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError(pub String);

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification failed: {}", self.0)
    }
}

impl Error for NotifyError {}

/// Notification delivery channel.
pub trait Notifier {
    fn notify(&self, notification: &WorryNotification) -> Result<(), NotifyError>;
}

impl<N: Notifier + ?Sized> Notifier for &N {
    fn notify(&self, notification: &WorryNotification) -> Result<(), NotifyError> {
        (**self).notify(notification)
    }
}

/// Notifier that only writes a log line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &WorryNotification) -> Result<(), NotifyError> {
        info!(
            "event=worry_reminder module=reminder status=sent day_id={} date={} worry_time={}",
            notification.day_id,
            notification.date,
            notification.worry_time.format("%H:%M")
        );
        Ok(())
    }
}

/// What a reminder sync left behind for one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReminderOutcome {
    Scheduled {
        task_id: String,
        run_at: DateTime<Utc>,
    },
    Cleared {
        task_id: String,
        reason: ClearReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    NoWorries,
    TimeInPast,
    /// Local date/time does not exist in the configured timezone.
    UnresolvableTime,
}

/// Cancel-and-reschedule policy for worry reminders.
pub struct ReminderService<S: TaskScheduler> {
    scheduler: S,
    timezone: Tz,
    default_worry_time: NaiveTime,
}

impl<S: TaskScheduler> ReminderService<S> {
    pub fn new(scheduler: S, timezone: Tz) -> Self {
        Self {
            scheduler,
            timezone,
            default_worry_time: DEFAULT_WORRY_TIME,
        }
    }

    /// Overrides the time used for days without an explicit worry time.
    pub fn with_default_worry_time(mut self, worry_time: NaiveTime) -> Self {
        self.default_worry_time = worry_time;
        self
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Re-derives the pending reminder of `day` relative to `now`.
    pub fn sync_worry_reminder(&self, day: &DayRecord, now: DateTime<Utc>) -> ReminderOutcome {
        let task_id = worry_reminder_task_id(day.id);
        self.scheduler.cancel(&task_id);

        let has_worries = day
            .journal
            .worries
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty());
        if !has_worries {
            return cleared(task_id, ClearReason::NoWorries);
        }

        let worry_time = day.journal.worry_time.unwrap_or(self.default_worry_time);
        let Some(run_at) = self.reminder_instant(day.date, worry_time) else {
            return cleared(task_id, ClearReason::UnresolvableTime);
        };
        if run_at <= now {
            return cleared(task_id, ClearReason::TimeInPast);
        }

        self.scheduler.schedule_at(
            &task_id,
            run_at,
            ScheduledTask::WorryReminder {
                day_id: day.id,
                date: day.date,
                worry_time,
            },
        );
        info!(
            "event=worry_reminder module=reminder status=scheduled day_id={} run_at={}",
            day.id,
            run_at.to_rfc3339()
        );
        ReminderOutcome::Scheduled { task_id, run_at }
    }

    /// Worry time on `date` in the configured zone; a time inside a DST gap
    /// moves forward to the first existing local time.
    fn reminder_instant(&self, date: NaiveDate, worry_time: NaiveTime) -> Option<DateTime<Utc>> {
        let local = date.and_time(worry_time);
        (0..=DST_GAP_STEPS).find_map(|step| {
            let candidate = local + Duration::minutes(step * DST_GAP_STEP_MINUTES);
            self.timezone
                .from_local_datetime(&candidate)
                .earliest()
                .map(|instant| instant.with_timezone(&Utc))
        })
    }
}

fn cleared(task_id: String, reason: ClearReason) -> ReminderOutcome {
    debug!(
        "event=worry_reminder module=reminder status=cleared task_id={} reason={:?}",
        task_id, reason
    );
    ReminderOutcome::Cleared { task_id, reason }
}
