use chrono::NaiveDate;
use chrono_tz::Tz;
use focus_core::db::{open_db, open_db_in_memory};
use focus_core::repo::day_repo::DayEdit;
use focus_core::{
    CronScheduleMatcher, DayRecord, DayRepository, PriorityEntry, Rank, RecurrenceEngine,
    RecurringTemplate, SqliteDayRepository, SqliteTemplateRepository, TemplateRepository,
};
use rusqlite::Connection;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn saturday() -> NaiveDate {
    date(2025, 1, 4)
}

fn monday() -> NaiveDate {
    date(2025, 1, 6)
}

fn create_template(conn: &Connection, name: &str, schedule: &str, rank: Rank) -> RecurringTemplate {
    let repo = SqliteTemplateRepository::try_new(conn).unwrap();
    let template = RecurringTemplate::new(name, schedule, rank);
    repo.create_template(&template).unwrap();
    template
}

fn add_user_entries(days: &SqliteDayRepository<'_>, day: NaiveDate, entries: &[(&str, Rank)]) {
    days.modify_day(day, &mut |record: &mut DayRecord| {
        for (name, rank) in entries {
            record.push_entry(PriorityEntry::new(*name, *rank)).unwrap();
        }
        DayEdit::Commit
    })
    .unwrap();
}

fn engine<'a>(
    templates: &'a SqliteTemplateRepository<'a>,
    days: &'a SqliteDayRepository<'a>,
) -> RecurrenceEngine<
    &'a SqliteTemplateRepository<'a>,
    &'a SqliteDayRepository<'a>,
    CronScheduleMatcher,
> {
    RecurrenceEngine::new(templates, days, CronScheduleMatcher::new(), Tz::UTC)
}

#[test]
fn weekday_template_fires_on_monday_but_not_saturday() {
    let conn = open_db_in_memory().unwrap();
    let template = create_template(&conn, "Standup", "weekdays", Rank::FIRST);
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let engine = engine(&templates, &days);

    let report = engine.generate_for_date(saturday()).unwrap();
    assert!(report.created.is_empty());
    assert!(days.get_day(saturday()).unwrap().is_none());

    let report = engine.generate_for_date(monday()).unwrap();
    assert_eq!(report.created.len(), 1);
    let day = days.get_day(monday()).unwrap().unwrap();
    assert_eq!(day.entries.len(), 1);
    let entry = &day.entries[0];
    assert_eq!(entry.name, "Standup");
    assert_eq!(entry.rank, Rank::FIRST);
    assert!(!entry.completed);
    assert_eq!(entry.template_id, Some(template.id));
}

#[test]
fn generation_is_idempotent_per_template_and_date() {
    let conn = open_db_in_memory().unwrap();
    let template = create_template(&conn, "Standup", "weekdays", Rank::FIRST);
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let engine = engine(&templates, &days);

    engine.generate_for_date(monday()).unwrap();
    let second = engine.generate_for_date(monday()).unwrap();

    assert!(second.created.is_empty());
    assert_eq!(second.skipped_existing, vec![template.id]);
    assert_eq!(days.get_day(monday()).unwrap().unwrap().entries.len(), 1);
}

#[test]
fn full_day_drops_matching_templates_and_keeps_user_entries() {
    let conn = open_db_in_memory().unwrap();
    let template = create_template(&conn, "Standup", "daily", Rank::FIRST);
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    add_user_entries(
        &days,
        monday(),
        &[("a", Rank::FIRST), ("b", Rank::SECOND), ("c", Rank::THIRD)],
    );

    let report = engine(&templates, &days).generate_for_date(monday()).unwrap();

    assert!(report.created.is_empty());
    assert_eq!(report.dropped_for_capacity, vec![template.id]);
    let day = days.get_day(monday()).unwrap().unwrap();
    let names: Vec<&str> = day.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn surplus_templates_beyond_capacity_are_dropped_in_rank_order() {
    let conn = open_db_in_memory().unwrap();
    let gym = create_template(&conn, "Gym", "daily", Rank::SECOND);
    let read = create_template(&conn, "Read", "daily", Rank::THIRD);
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    add_user_entries(&days, monday(), &[("a", Rank::FIRST), ("b", Rank::THIRD)]);

    let report = engine(&templates, &days).generate_for_date(monday()).unwrap();

    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].template_id, Some(gym.id));
    assert_eq!(report.created[0].rank, Rank::SECOND);
    assert_eq!(report.dropped_for_capacity, vec![read.id]);
    assert_eq!(days.get_day(monday()).unwrap().unwrap().entries.len(), 3);
}

#[test]
fn taken_rank_hint_falls_back_to_lowest_free_rank() {
    let conn = open_db_in_memory().unwrap();
    create_template(&conn, "Standup", "daily", Rank::FIRST);
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    add_user_entries(&days, monday(), &[("mine", Rank::FIRST)]);

    let report = engine(&templates, &days).generate_for_date(monday()).unwrap();

    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].rank, Rank::SECOND);
    let day = days.get_day(monday()).unwrap().unwrap();
    assert_eq!(day.entries[0].name, "mine");
    assert_eq!(day.entries[1].name, "Standup");
}

#[test]
fn removed_generated_entry_is_not_resurrected() {
    let conn = open_db_in_memory().unwrap();
    let template = create_template(&conn, "Standup", "daily", Rank::FIRST);
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let engine = engine(&templates, &days);

    let created = engine.generate_for_date(monday()).unwrap().created;
    let entry_id = created[0].id;
    days.modify_day(monday(), &mut |record: &mut DayRecord| {
        record.remove_entry(entry_id);
        DayEdit::Commit
    })
    .unwrap();

    let report = engine.generate_for_date(monday()).unwrap();
    assert!(report.created.is_empty());
    assert_eq!(report.skipped_existing, vec![template.id]);
    let day = days.get_day(monday()).unwrap().unwrap();
    assert!(day.entries.is_empty());
    assert!(day.dismissed_templates.contains(&template.id));
}

#[test]
fn invalid_schedule_is_reported_and_other_templates_still_generate() {
    let conn = open_db_in_memory().unwrap();
    let broken = create_template(&conn, "Broken", "every other blue moon", Rank::FIRST);
    let valid = create_template(&conn, "Read", "daily", Rank::SECOND);
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();

    let report = engine(&templates, &days).generate_for_date(monday()).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].template_id, broken.id);
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].template_id, Some(valid.id));
}

#[test]
fn inactive_templates_and_completed_entries_are_left_alone() {
    let conn = open_db_in_memory().unwrap();
    let active = create_template(&conn, "Standup", "daily", Rank::FIRST);
    let paused = create_template(&conn, "Paused", "daily", Rank::SECOND);
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    templates.set_active(paused.id, false).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let engine = engine(&templates, &days);

    engine.generate_for_date(monday()).unwrap();
    days.modify_day(monday(), &mut |record: &mut DayRecord| {
        if let Some(entry) = record.entry_at_rank_mut(Rank::FIRST) {
            entry.completed = true;
        }
        DayEdit::Commit
    })
    .unwrap();
    engine.generate_for_date(monday()).unwrap();

    let day = days.get_day(monday()).unwrap().unwrap();
    assert_eq!(day.entries.len(), 1);
    assert_eq!(day.entries[0].template_id, Some(active.id));
    assert!(day.entries[0].completed);
}

#[test]
fn generate_with_ignores_store_and_uses_given_templates() {
    let conn = open_db_in_memory().unwrap();
    let stored = create_template(&conn, "Stored", "daily", Rank::FIRST);
    let other = create_template(&conn, "Other", "daily", Rank::SECOND);
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();

    let report = engine(&templates, &days)
        .generate_with(monday(), &[stored.clone()])
        .unwrap();

    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].template_id, Some(stored.id));
    let day = days.get_day(monday()).unwrap().unwrap();
    assert!(!day.has_template_entry(other.id));
}

#[test]
fn concurrent_generation_from_two_connections_creates_one_entry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("focus.sqlite3");
    let setup = open_db(&path).unwrap();
    let template = create_template(&setup, "Standup", "daily", Rank::FIRST);
    drop(setup);

    std::thread::scope(|scope| {
        for _ in 0..2 {
            let path = path.clone();
            scope.spawn(move || {
                let conn = open_db(&path).unwrap();
                let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
                let days = SqliteDayRepository::try_new(&conn).unwrap();
                engine(&templates, &days).generate_for_date(monday()).unwrap();
            });
        }
    });

    let conn = open_db(&path).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let day = days.get_day(monday()).unwrap().unwrap();
    assert_eq!(day.entries.len(), 1);
    assert_eq!(day.entries[0].template_id, Some(template.id));
}
