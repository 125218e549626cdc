//! Periodic trigger for generation and reminder delivery.
//!
//! # Responsibility
//! - Keep one pending "generate at next local midnight" task.
//! - Execute due tasks when ticked by the host process.
//!
//! # Invariants
//! - After every generation task, the next midnight task is registered again,
//!   even when the run failed.
//! - A failed task is logged and reported; it never aborts the other due tasks.

use crate::repo::day_repo::DayRepository;
use crate::repo::template_repo::TemplateRepository;
use crate::schedule::cron_matcher::CronMatcher;
use crate::scheduler::{next_local_midnight, ScheduledTask, TaskScheduler, GENERATION_TASK_ID};
use crate::service::recurrence_engine::{GenerationReport, RecurrenceEngine};
use crate::service::reminder_service::{Notifier, WorryNotification};
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;

/// Task that could not complete during `run_due`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskFailure {
    pub task_id: String,
    pub reason: String,
}

/// Result of one `run_due` tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub generated: Vec<GenerationReport>,
    pub reminders_sent: usize,
    pub failures: Vec<TaskFailure>,
}

pub struct DailyRunner<T, D, M, S, N>
where
    T: TemplateRepository,
    D: DayRepository,
    M: CronMatcher,
    S: TaskScheduler,
    N: Notifier,
{
    engine: RecurrenceEngine<T, D, M>,
    scheduler: S,
    notifier: N,
}

impl<T, D, M, S, N> DailyRunner<T, D, M, S, N>
where
    T: TemplateRepository,
    D: DayRepository,
    M: CronMatcher,
    S: TaskScheduler,
    N: Notifier,
{
    pub fn new(engine: RecurrenceEngine<T, D, M>, scheduler: S, notifier: N) -> Self {
        Self {
            engine,
            scheduler,
            notifier,
        }
    }

    /// Schedules generation for the local day after `now`; returns the run
    /// instant, or `None` when it cannot be represented.
    pub fn register(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let Some((date, run_at)) = next_local_midnight(now, self.engine.timezone()) else {
            error!(
                "event=daily_register module=runner status=error reason=no_next_midnight now={}",
                now.to_rfc3339()
            );
            return None;
        };
        self.scheduler.schedule_at(
            GENERATION_TASK_ID,
            run_at,
            ScheduledTask::GenerateForDate { date },
        );
        info!(
            "event=daily_register module=runner status=ok date={} run_at={}",
            date,
            run_at.to_rfc3339()
        );
        Some(run_at)
    }

    /// Runs every task due at `now`.
    pub fn run_due(&self, now: DateTime<Utc>) -> RunSummary {
        let mut summary = RunSummary::default();
        for pending in self.scheduler.take_due(now) {
            match pending.task {
                ScheduledTask::GenerateForDate { date } => {
                    match self.engine.generate_for_date(date) {
                        Ok(report) => summary.generated.push(report),
                        Err(err) => {
                            error!(
                                "event=daily_generation module=runner status=error date={} error={}",
                                date, err
                            );
                            summary.failures.push(TaskFailure {
                                task_id: pending.id.clone(),
                                reason: err.to_string(),
                            });
                        }
                    }
                    self.register(now);
                }
                ScheduledTask::WorryReminder {
                    day_id,
                    date,
                    worry_time,
                } => {
                    let notification = WorryNotification {
                        day_id,
                        date,
                        worry_time,
                    };
                    match self.notifier.notify(&notification) {
                        Ok(()) => summary.reminders_sent += 1,
                        Err(err) => {
                            error!(
                                "event=worry_reminder module=runner status=error task_id={} error={}",
                                pending.id, err
                            );
                            summary.failures.push(TaskFailure {
                                task_id: pending.id.clone(),
                                reason: err.to_string(),
                            });
                        }
                    }
                }
            }
        }
        summary
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }
}
