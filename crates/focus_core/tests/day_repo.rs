use chrono::{NaiveDate, NaiveTime};
use focus_core::db::open_db_in_memory;
use focus_core::repo::day_repo::{DayEdit, MoveOutcome};
use focus_core::{
    DayRecord, DayRepository, PriorityEntry, Rank, RepoError, SqliteDayRepository,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn discarded_edit_does_not_create_day() {
    let conn = open_db_in_memory().unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();

    days.modify_day(date(2025, 1, 6), &mut |record: &mut DayRecord| {
        record.push_entry(PriorityEntry::new("draft", Rank::FIRST)).unwrap();
        DayEdit::Discard
    })
    .unwrap();

    assert!(days.get_day(date(2025, 1, 6)).unwrap().is_none());
}

#[test]
fn journal_and_entries_survive_reload() {
    let conn = open_db_in_memory().unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();

    let saved = days
        .modify_day(date(2025, 1, 6), &mut |record: &mut DayRecord| {
            record.journal.brain_dump = Some("lots".to_string());
            record.journal.worries = Some("taxes".to_string());
            record.journal.worry_time = NaiveTime::from_hms_opt(20, 30, 0);
            record.push_entry(PriorityEntry::new("b", Rank::SECOND)).unwrap();
            record.push_entry(PriorityEntry::new("a", Rank::FIRST)).unwrap();
            DayEdit::Commit
        })
        .unwrap();

    let loaded = days.get_day(date(2025, 1, 6)).unwrap().unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.entries[0].name, "a");
    assert_eq!(loaded.journal.worry_time, NaiveTime::from_hms_opt(20, 30, 0));
}

#[test]
fn edits_update_and_delete_existing_rows() {
    let conn = open_db_in_memory().unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let day = date(2025, 1, 6);
    days.modify_day(day, &mut |record: &mut DayRecord| {
        record.push_entry(PriorityEntry::new("keep", Rank::FIRST)).unwrap();
        record.push_entry(PriorityEntry::new("drop", Rank::SECOND)).unwrap();
        DayEdit::Commit
    })
    .unwrap();

    days.modify_day(day, &mut |record: &mut DayRecord| {
        let drop_id = record.entries[1].id;
        record.remove_entry(drop_id);
        record.entries[0].completed = true;
        DayEdit::Commit
    })
    .unwrap();

    let loaded = days.get_day(day).unwrap().unwrap();
    assert_eq!(loaded.entries.len(), 1);
    assert!(loaded.entries[0].completed);
}

#[test]
fn invalid_edit_is_rejected_before_writing() {
    let conn = open_db_in_memory().unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();

    let err = days
        .modify_day(date(2025, 1, 6), &mut |record: &mut DayRecord| {
            record.entries.push(PriorityEntry::new("a", Rank::FIRST));
            record.entries.push(PriorityEntry::new("b", Rank::FIRST));
            DayEdit::Commit
        })
        .unwrap_err();

    assert!(matches!(err, RepoError::DayValidation(_)));
    assert!(days.get_day(date(2025, 1, 6)).unwrap().is_none());
}

#[test]
fn list_days_returns_existing_days_in_range() {
    let conn = open_db_in_memory().unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    for day in [date(2025, 1, 8), date(2025, 1, 6), date(2025, 2, 1)] {
        days.modify_day(day, &mut |_: &mut DayRecord| DayEdit::Commit)
            .unwrap();
    }

    let listed: Vec<NaiveDate> = days
        .list_days(date(2025, 1, 1), date(2025, 1, 31))
        .unwrap()
        .into_iter()
        .map(|record| record.date)
        .collect();
    assert_eq!(listed, vec![date(2025, 1, 6), date(2025, 1, 8)]);
}

#[test]
fn move_entry_refuses_full_target_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let days = SqliteDayRepository::try_new(&conn).unwrap();
    let entry = PriorityEntry::new("move me", Rank::FIRST);
    let id = entry.id;
    days.modify_day(date(2025, 1, 6), &mut |record: &mut DayRecord| {
        record.push_entry(entry.clone()).unwrap();
        DayEdit::Commit
    })
    .unwrap();
    days.modify_day(date(2025, 1, 7), &mut |record: &mut DayRecord| {
        for rank in Rank::ALL {
            record.push_entry(PriorityEntry::new("busy", rank)).unwrap();
        }
        DayEdit::Commit
    })
    .unwrap();

    let outcome = days.move_entry(id, date(2025, 1, 7)).unwrap();
    assert_eq!(outcome, MoveOutcome::TargetUnavailable);
    assert_eq!(days.find_entry(id).unwrap().unwrap().date, date(2025, 1, 6));

    let err = days.move_entry(uuid::Uuid::new_v4(), date(2025, 1, 8)).unwrap_err();
    assert!(matches!(err, RepoError::EntryNotFound(_)));
}
