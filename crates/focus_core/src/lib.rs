//! Core domain logic for Focus: daily priorities, recurring templates and
//! relocation. This crate is the single source of truth for business
//! invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schedule;
pub mod scheduler;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::day::{DayJournal, DayRecord, DayRecordId, PriorityEntry, PriorityId};
pub use model::rank::Rank;
pub use model::template::{RecurringTemplate, TemplateDraft, TemplateId};
pub use repo::day_repo::{DayRepository, SqliteDayRepository};
pub use repo::template_repo::{SqliteTemplateRepository, TemplateRepository};
pub use repo::{RepoError, RepoResult};
pub use schedule::clock::{Clock, FixedClock, SystemClock};
pub use schedule::cron_matcher::{CronMatcher, CronScheduleMatcher, InvalidSchedule};
pub use scheduler::{InMemoryTaskScheduler, ScheduledTask, TaskScheduler};
pub use service::daily_runner::DailyRunner;
pub use service::day_service::{DayInput, DayService, DayServiceError, PriorityInput};
pub use service::recurrence_engine::{GenerationReport, RecurrenceEngine};
pub use service::relocation_service::{
    Relocation, RelocationError, RelocationOptions, RelocationPlanner,
};
pub use service::reminder_service::{LogNotifier, Notifier, ReminderService};
pub use service::template_service::{TemplateChange, TemplateService, TemplateServiceError};

/// Minimal health-check API for wiring checks.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
