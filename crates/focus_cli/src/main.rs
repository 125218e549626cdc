//! Command-line front end over `focus_core`.
//!
//! # Responsibility
//! - Act as the external periodic trigger (`focus generate`) or the
//!   long-running host (`focus daemon`) for generation and worry reminders.
//! - Run direct user requests (templates, days, relocation) against the
//!   configured database.
//! - Print results as JSON on stdout, errors on stderr.
//!
//! # Invariants
//! - Every command opens its own connection; writes go through the core
//!   services, never raw SQL.

use chrono::{NaiveDate, Utc};
use focus_core::db::open_db;
use focus_core::{
    init_logging, Clock, CoreConfig, CronScheduleMatcher, DailyRunner, DayInput, DayRepository,
    DayService, InMemoryTaskScheduler, LogNotifier, RecurrenceEngine, ReminderService,
    RelocationPlanner, SqliteDayRepository, SqliteTemplateRepository, SystemClock, TemplateDraft,
    TemplateRepository, TemplateService,
};
use log::{error, info};
use serde_json::json;
use std::error::Error;
use std::process::ExitCode;
use std::time::Duration;
use uuid::Uuid;

const USAGE: &str = "usage: focus <command>
  ping
  generate [YYYY-MM-DD]
  relocate <priority-uuid>
  templates
  template add <name> <schedule> <rank>
  template update <template-uuid> <name> <schedule> <rank>
  template toggle <template-uuid>
  template deactivate <template-uuid>
  day <YYYY-MM-DD>
  day save <day-json>
  daemon";

const DAEMON_TICK: Duration = Duration::from_secs(30);

type CliResult<T> = Result<T, Box<dyn Error>>;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> CliResult<String> {
    if args.first().map(String::as_str) == Some("ping") {
        let body = json!({
            "ping": focus_core::ping(),
            "version": focus_core::core_version(),
        });
        return Ok(body.to_string());
    }

    let config = CoreConfig::from_env()?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }
    if args.first().map(String::as_str) == Some("daemon") {
        return run_daemon(&config);
    }
    execute(args, &config)
}

fn execute(args: &[String], config: &CoreConfig) -> CliResult<String> {
    let conn = open_db(&config.db_path)?;
    let templates = SqliteTemplateRepository::try_new(&conn)?;
    let days = SqliteDayRepository::try_new(&conn)?;
    let words: Vec<&str> = args.iter().map(String::as_str).collect();

    let body = match words.as_slice() {
        ["generate"] | ["generate", _] => {
            let date = match words.get(1) {
                Some(raw) => parse_date(raw)?,
                None => SystemClock.today(config.timezone),
            };
            let engine =
                RecurrenceEngine::new(&templates, &days, CronScheduleMatcher::new(), config.timezone);
            serde_json::to_value(engine.generate_for_date(date)?)?
        }
        ["relocate", raw] => {
            let planner = RelocationPlanner::with_horizon(&days, config.relocation_horizon_days);
            serde_json::to_value(planner.relocate(Uuid::parse_str(raw)?)?)?
        }
        ["templates"] => serde_json::to_value(templates.list_templates(false)?)?,
        ["template", rest @ ..] => {
            let service = TemplateService::new(
                &templates,
                &days,
                CronScheduleMatcher::new(),
                SystemClock,
                config.timezone,
            );
            let change = match rest {
                ["add", name, schedule, rank] => {
                    service.create_template(&TemplateDraft::new(*name, *schedule, parse_rank(rank)?))?
                }
                ["update", id, name, schedule, rank] => service.update_template(
                    Uuid::parse_str(id)?,
                    &TemplateDraft::new(*name, *schedule, parse_rank(rank)?),
                )?,
                ["toggle", id] => service.toggle_template(Uuid::parse_str(id)?)?,
                ["deactivate", id] => service.deactivate_template(Uuid::parse_str(id)?)?,
                _ => return Err(USAGE.into()),
            };
            serde_json::to_value(change)?
        }
        ["day", "save", raw] => {
            let input: DayInput = serde_json::from_str(raw)?;
            let scheduler = InMemoryTaskScheduler::new();
            let reminders = ReminderService::new(&scheduler, config.timezone)
                .with_default_worry_time(config.default_worry_time);
            let service = DayService::new(&days, reminders, SystemClock);
            serde_json::to_value(service.save_day(&input)?)?
        }
        ["day", raw] => serde_json::to_value(days.get_day(parse_date(raw)?)?)?,
        _ => return Err(USAGE.into()),
    };
    Ok(serde_json::to_string_pretty(&body)?)
}

/// Generates today, then keeps the generation task and today's worry
/// reminder scheduled until the process is stopped.
fn run_daemon(config: &CoreConfig) -> CliResult<String> {
    let conn = open_db(&config.db_path)?;
    let templates = SqliteTemplateRepository::try_new(&conn)?;
    let days = SqliteDayRepository::try_new(&conn)?;
    let scheduler = InMemoryTaskScheduler::new();
    let reminders = ReminderService::new(&scheduler, config.timezone)
        .with_default_worry_time(config.default_worry_time);

    let today = SystemClock.today(config.timezone);
    let startup = RecurrenceEngine::new(&templates, &days, CronScheduleMatcher::new(), config.timezone)
        .generate_for_date(today)?;
    info!(
        "event=daemon_start module=cli status=ok date={} created={}",
        today,
        startup.created.len()
    );

    let runner = DailyRunner::new(
        RecurrenceEngine::new(&templates, &days, CronScheduleMatcher::new(), config.timezone),
        &scheduler,
        LogNotifier,
    );
    runner.register(Utc::now());

    loop {
        let now = Utc::now();
        let summary = runner.run_due(now);
        for failure in &summary.failures {
            error!(
                "event=daemon_tick module=cli status=task_failed task={} reason={}",
                failure.task_id, failure.reason
            );
        }
        // Days are edited by other processes; pick up today's worry time.
        if let Some(day) = days.get_day(SystemClock.today(config.timezone))? {
            reminders.sync_worry_reminder(&day, now);
        }
        std::thread::sleep(DAEMON_TICK);
    }
}

fn parse_date(raw: &str) -> CliResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|err| format!("invalid date `{raw}`: {err}").into())
}

fn parse_rank(raw: &str) -> CliResult<u8> {
    raw.parse::<u8>()
        .map_err(|err| format!("invalid rank `{raw}`: {err}").into())
}
