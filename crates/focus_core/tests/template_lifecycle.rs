use chrono::NaiveDate;
use chrono_tz::Tz;
use focus_core::db::open_db_in_memory;
use focus_core::repo::day_repo::DayEdit;
use focus_core::{
    CronScheduleMatcher, DayRecord, DayRepository, FixedClock, Rank, RecurrenceEngine,
    SqliteDayRepository, SqliteTemplateRepository, TemplateDraft, TemplateService,
    TemplateServiceError,
};
use uuid::Uuid;

type Service<'a> = TemplateService<
    &'a SqliteTemplateRepository<'a>,
    &'a SqliteDayRepository<'a>,
    CronScheduleMatcher,
    FixedClock,
>;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2025, 1, 6)
}

fn service<'a>(
    templates: &'a SqliteTemplateRepository<'a>,
    days: &'a SqliteDayRepository<'a>,
) -> Service<'a> {
    TemplateService::new(
        templates,
        days,
        CronScheduleMatcher::new(),
        FixedClock::on_date(today()),
        Tz::UTC,
    )
}

#[test]
fn creating_active_template_generates_today() {
    let conn = open_db_in_memory().unwrap();
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let service = service(&templates, &days);

    let change = service
        .create_template(&TemplateDraft::new("Standup", "weekdays", 1))
        .unwrap();

    let report = change.generation.unwrap();
    assert_eq!(report.date, today());
    assert_eq!(report.created.len(), 1);
    let day = days.get_day(today()).unwrap().unwrap();
    assert_eq!(day.entries[0].template_id, Some(change.template.id));
}

#[test]
fn creating_inactive_template_does_not_generate() {
    let conn = open_db_in_memory().unwrap();
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let service = service(&templates, &days);

    let change = service
        .create_template(&TemplateDraft::new("Standup", "daily", 1).inactive())
        .unwrap();

    assert!(change.generation.is_none());
    assert!(days.get_day(today()).unwrap().is_none());
}

#[test]
fn invalid_input_persists_nothing() {
    let conn = open_db_in_memory().unwrap();
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let service = service(&templates, &days);

    let err = service
        .create_template(&TemplateDraft::new("Gym", "not a schedule", 1))
        .unwrap_err();
    assert!(matches!(err, TemplateServiceError::InvalidSchedule(_)));

    let err = service
        .create_template(&TemplateDraft::new("  ", "daily", 1))
        .unwrap_err();
    assert!(matches!(err, TemplateServiceError::InvalidInput(_)));

    let err = service
        .create_template(&TemplateDraft::new("Gym", "daily", 0))
        .unwrap_err();
    assert!(matches!(err, TemplateServiceError::InvalidInput(_)));

    assert!(service.list_templates(false).unwrap().is_empty());
}

#[test]
fn deactivation_prunes_today_and_later_but_keeps_past_entries() {
    let conn = open_db_in_memory().unwrap();
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let service = service(&templates, &days);

    let template = service
        .create_template(&TemplateDraft::new("Standup", "daily", 1))
        .unwrap()
        .template;
    let engine = RecurrenceEngine::new(&templates, &days, CronScheduleMatcher::new(), Tz::UTC);
    let past = date(2025, 1, 3);
    let future = date(2025, 1, 8);
    engine.generate_for_date(past).unwrap();
    engine.generate_for_date(future).unwrap();
    for day in [past, future] {
        days.modify_day(day, &mut |record: &mut DayRecord| {
            record.entries[0].completed = true;
            DayEdit::Commit
        })
        .unwrap();
    }

    let change = service.deactivate_template(template.id).unwrap();

    assert!(!change.template.active);
    assert_eq!(change.pruned, 2);
    let past_day = days.get_day(past).unwrap().unwrap();
    assert_eq!(past_day.entries.len(), 1);
    assert!(past_day.entries[0].completed);
    assert!(days.get_day(today()).unwrap().unwrap().entries.is_empty());
    assert!(days.get_day(future).unwrap().unwrap().entries.is_empty());
    assert!(!service.get_template(template.id).unwrap().active);
}

#[test]
fn toggle_prunes_then_regenerates_today() {
    let conn = open_db_in_memory().unwrap();
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let service = service(&templates, &days);
    let template = service
        .create_template(&TemplateDraft::new("Standup", "daily", 2))
        .unwrap()
        .template;

    let off = service.toggle_template(template.id).unwrap();
    assert!(!off.template.active);
    assert_eq!(off.pruned, 1);
    assert!(days.get_day(today()).unwrap().unwrap().entries.is_empty());

    let on = service.toggle_template(template.id).unwrap();
    assert!(on.template.active);
    assert_eq!(on.generation.unwrap().created.len(), 1);
    let day = days.get_day(today()).unwrap().unwrap();
    assert_eq!(day.entries.len(), 1);
    assert_eq!(day.entries[0].rank, Rank::SECOND);
}

#[test]
fn schedule_edit_keeps_stale_entry_without_duplicating() {
    let conn = open_db_in_memory().unwrap();
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let service = service(&templates, &days);
    let template = service
        .create_template(&TemplateDraft::new("Standup", "daily", 1))
        .unwrap()
        .template;

    let change = service
        .update_template(template.id, &TemplateDraft::new("Standup (sat)", "saturday", 1))
        .unwrap();

    assert_eq!(change.template.name, "Standup (sat)");
    assert!(change.generation.unwrap().created.is_empty());
    let day = days.get_day(today()).unwrap().unwrap();
    assert_eq!(day.entries.len(), 1);
    assert_eq!(day.entries[0].name, "Standup");
}

#[test]
fn update_to_inactive_prunes() {
    let conn = open_db_in_memory().unwrap();
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let service = service(&templates, &days);
    let template = service
        .create_template(&TemplateDraft::new("Standup", "daily", 1))
        .unwrap()
        .template;

    let change = service
        .update_template(template.id, &TemplateDraft::new("Standup", "daily", 1).inactive())
        .unwrap();

    assert_eq!(change.pruned, 1);
    assert!(change.generation.is_none());
}

#[test]
fn unknown_ids_map_to_semantic_errors() {
    let conn = open_db_in_memory().unwrap();
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let service = service(&templates, &days);
    let missing = Uuid::new_v4();

    assert!(matches!(
        service.deactivate_template(missing),
        Err(TemplateServiceError::InvalidOperation(_))
    ));
    assert!(matches!(
        service.toggle_template(missing),
        Err(TemplateServiceError::NotFound(id)) if id == missing
    ));
    assert!(matches!(
        service.get_template(missing),
        Err(TemplateServiceError::NotFound(_))
    ));
    assert!(matches!(
        service.update_template(missing, &TemplateDraft::new("x", "daily", 1)),
        Err(TemplateServiceError::NotFound(_))
    ));
}

#[test]
fn list_is_ordered_by_rank_then_name() {
    let conn = open_db_in_memory().unwrap();
    let templates = SqliteTemplateRepository::try_new(&conn).unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let service = service(&templates, &days);
    for (name, rank) in [("Walk", 3), ("Read", 2), ("Gym", 2), ("Plan", 1)] {
        service
            .create_template(&TemplateDraft::new(name, "saturday", rank).inactive())
            .unwrap();
    }

    let names: Vec<String> = service
        .list_templates(false)
        .unwrap()
        .into_iter()
        .map(|template| template.name)
        .collect();
    assert_eq!(names, vec!["Plan", "Gym", "Read", "Walk"]);
    assert!(service.list_templates(true).unwrap().is_empty());
}
