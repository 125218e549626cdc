//! Deferred task scheduling.
//!
//! # Responsibility
//! - Keep one pending task per task id, to run at or after an instant.
//! - Hand due tasks to the caller that drives execution (`DailyRunner`).
//!
//! # Invariants
//! - `schedule_at` replaces any pending task with the same id.
//! - `cancel` of an unknown id is a no-op that returns `false`.
//! - Due tasks are returned ordered by (run time, task id) and removed.

use crate::model::day::DayRecordId;
use crate::schedule::cron_matcher::local_day_start;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Task id of the daily generation run.
pub const GENERATION_TASK_ID: &str = "recurring-generation-daily";

const WORRY_REMINDER_TASK_PREFIX: &str = "worry-reminder-";

/// Work a scheduled task performs when due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduledTask {
    /// Materialize recurring templates for one date.
    GenerateForDate { date: NaiveDate },
    WorryReminder {
        day_id: DayRecordId,
        date: NaiveDate,
        worry_time: NaiveTime,
    },
}

/// Task waiting in a scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTask {
    pub id: String,
    pub run_at: DateTime<Utc>,
    pub task: ScheduledTask,
}

/// Deferred execution capability.
pub trait TaskScheduler {
    /// Schedules `task` under `task_id`, replacing a pending task with that id.
    fn schedule_at(&self, task_id: &str, run_at: DateTime<Utc>, task: ScheduledTask);

    /// Removes the pending task with `task_id`; returns whether one existed.
    fn cancel(&self, task_id: &str) -> bool;

    /// Removes and returns every task with `run_at <= now`.
    fn take_due(&self, now: DateTime<Utc>) -> Vec<PendingTask>;

    /// Snapshot of pending tasks ordered by run time.
    fn pending(&self) -> Vec<PendingTask>;
}

impl<S: TaskScheduler + ?Sized> TaskScheduler for &S {
    fn schedule_at(&self, task_id: &str, run_at: DateTime<Utc>, task: ScheduledTask) {
        (**self).schedule_at(task_id, run_at, task)
    }

    fn cancel(&self, task_id: &str) -> bool {
        (**self).cancel(task_id)
    }

    fn take_due(&self, now: DateTime<Utc>) -> Vec<PendingTask> {
        (**self).take_due(now)
    }

    fn pending(&self) -> Vec<PendingTask> {
        (**self).pending()
    }
}

/// Process-local scheduler; pending tasks do not survive a restart.
#[derive(Debug, Default)]
pub struct InMemoryTaskScheduler {
    tasks: Mutex<BTreeMap<String, PendingTask>>,
}

impl InMemoryTaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, PendingTask>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskScheduler for InMemoryTaskScheduler {
    fn schedule_at(&self, task_id: &str, run_at: DateTime<Utc>, task: ScheduledTask) {
        let replaced = self
            .lock()
            .insert(
                task_id.to_string(),
                PendingTask {
                    id: task_id.to_string(),
                    run_at,
                    task,
                },
            )
            .is_some();
        debug!(
            "event=task_schedule module=scheduler status=ok task_id={} run_at={} replaced={}",
            task_id,
            run_at.to_rfc3339(),
            replaced
        );
    }

    fn cancel(&self, task_id: &str) -> bool {
        let removed = self.lock().remove(task_id).is_some();
        debug!(
            "event=task_cancel module=scheduler status=ok task_id={} removed={}",
            task_id, removed
        );
        removed
    }

    fn take_due(&self, now: DateTime<Utc>) -> Vec<PendingTask> {
        let mut tasks = self.lock();
        let due_ids: Vec<String> = tasks
            .values()
            .filter(|pending| pending.run_at <= now)
            .map(|pending| pending.id.clone())
            .collect();
        let mut due: Vec<PendingTask> = due_ids
            .iter()
            .filter_map(|task_id| tasks.remove(task_id))
            .collect();
        due.sort_by(|left, right| {
            left.run_at
                .cmp(&right.run_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        due
    }

    fn pending(&self) -> Vec<PendingTask> {
        let mut pending: Vec<PendingTask> = self.lock().values().cloned().collect();
        pending.sort_by(|left, right| {
            left.run_at
                .cmp(&right.run_at)
                .then_with(|| left.id.cmp(&right.id))
        });
        pending
    }
}

/// Task id of the worry reminder of one day record.
pub fn worry_reminder_task_id(day_id: DayRecordId) -> String {
    format!("{WORRY_REMINDER_TASK_PREFIX}{day_id}")
}

/// Start of the local day after the one containing `now`, as UTC.
pub fn next_local_midnight(now: DateTime<Utc>, timezone: Tz) -> Option<(NaiveDate, DateTime<Utc>)> {
    let today = now.with_timezone(&timezone).date_naive();
    let tomorrow = today.checked_add_days(Days::new(1))?;
    let start = local_day_start(tomorrow, timezone)?;
    Some((tomorrow, start.with_timezone(&Utc)))
}
