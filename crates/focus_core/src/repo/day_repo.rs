//! Day record repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Load day records with their priority entries and dismissed templates.
//! - Apply read-modify-write edits to one day atomically.
//! - Re-own a priority entry from one day to another in one transaction.
//! - Answer "which entries came from template T" without cascade rules.
//!
//! # Invariants
//! - At most one `day_records` row per date; it is inserted lazily on the
//!   first committed edit.
//! - `modify_day` and `move_entry` hold an immediate (write) transaction from
//!   the first read to the commit.
//! - `DayRecord::validate()` runs before any write of a day.

use super::codec::{
    bool_to_int, date_to_db, parse_bool, parse_date, parse_rank, parse_time, parse_uuid,
    time_to_db,
};
use super::error::ensure_connection_ready;
use super::{RepoError, RepoResult};
use crate::model::day::{DayJournal, DayRecord, DayRecordId, PriorityEntry, PriorityId};
use crate::model::template::TemplateId;
use chrono::NaiveDate;
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::{BTreeSet, HashMap};

const ENTRY_LOCATION_SELECT_SQL: &str = "SELECT
    p.uuid AS uuid,
    p.name AS name,
    p.is_done AS is_done,
    p.rank AS rank,
    p.template_uuid AS template_uuid,
    d.uuid AS day_uuid,
    d.day AS day
FROM priority_entries p
JOIN day_records d ON d.uuid = p.day_uuid";

/// Outcome of an edit closure passed to `DayRepository::modify_day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayEdit {
    /// Persist the edited record (creating the day row when needed).
    Commit,
    /// Roll back; a day that did not exist stays absent.
    Discard,
}

/// A priority entry together with the day that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLocation {
    pub day_id: DayRecordId,
    pub date: NaiveDate,
    pub entry: PriorityEntry,
}

/// Result of `DayRepository::move_entry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved {
        from: NaiveDate,
        to: NaiveDate,
        entry: PriorityEntry,
    },
    /// The target day is full. Nothing was written.
    TargetUnavailable,
    /// The entry was completed before the move transaction started.
    EntryCompleted,
}

/// Store contract for day records and their priority entries.
pub trait DayRepository {
    fn get_day(&self, date: NaiveDate) -> RepoResult<Option<DayRecord>>;

    /// Days within `from..=to`, ordered by date. Missing days are skipped.
    fn list_days(&self, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<DayRecord>>;

    /// Runs `edit` on the day for `date` (a fresh record when absent) inside
    /// one write transaction and persists the result on `DayEdit::Commit`.
    ///
    /// Returns the record as seen after the edit; it is only persisted when
    /// the edit committed.
    fn modify_day(
        &self,
        date: NaiveDate,
        edit: &mut dyn FnMut(&mut DayRecord) -> DayEdit,
    ) -> RepoResult<DayRecord>;

    fn find_entry(&self, id: PriorityId) -> RepoResult<Option<EntryLocation>>;

    /// Moves an incomplete entry to `target_date` at the lowest free rank and
    /// clears its completion flag. A generated entry leaves its template
    /// dismissed on the source day.
    fn move_entry(&self, id: PriorityId, target_date: NaiveDate) -> RepoResult<MoveOutcome>;

    /// Entries generated by `template_id`, ordered by date.
    fn list_entries_for_template(&self, template_id: TemplateId)
        -> RepoResult<Vec<EntryLocation>>;

    /// Deletes entries of `template_id` on days `>= from`; returns the count.
    fn delete_future_entries_for_template(
        &self,
        template_id: TemplateId,
        from: NaiveDate,
    ) -> RepoResult<usize>;
}

impl<R: DayRepository + ?Sized> DayRepository for &R {
    fn get_day(&self, date: NaiveDate) -> RepoResult<Option<DayRecord>> {
        (**self).get_day(date)
    }

    fn list_days(&self, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<DayRecord>> {
        (**self).list_days(from, to)
    }

    fn modify_day(
        &self,
        date: NaiveDate,
        edit: &mut dyn FnMut(&mut DayRecord) -> DayEdit,
    ) -> RepoResult<DayRecord> {
        (**self).modify_day(date, edit)
    }

    fn find_entry(&self, id: PriorityId) -> RepoResult<Option<EntryLocation>> {
        (**self).find_entry(id)
    }

    fn move_entry(&self, id: PriorityId, target_date: NaiveDate) -> RepoResult<MoveOutcome> {
        (**self).move_entry(id, target_date)
    }

    fn list_entries_for_template(
        &self,
        template_id: TemplateId,
    ) -> RepoResult<Vec<EntryLocation>> {
        (**self).list_entries_for_template(template_id)
    }

    fn delete_future_entries_for_template(
        &self,
        template_id: TemplateId,
        from: NaiveDate,
    ) -> RepoResult<usize> {
        (**self).delete_future_entries_for_template(template_id, from)
    }
}

/// SQLite-backed day repository.
pub struct SqliteDayRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDayRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl DayRepository for SqliteDayRepository<'_> {
    fn get_day(&self, date: NaiveDate) -> RepoResult<Option<DayRecord>> {
        load_day(self.conn, date)
    }

    fn list_days(&self, from: NaiveDate, to: NaiveDate) -> RepoResult<Vec<DayRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT day FROM day_records
             WHERE day >= ?1 AND day <= ?2
             ORDER BY day ASC;",
        )?;
        let dates = stmt
            .query_map([date_to_db(from), date_to_db(to)], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut days = Vec::with_capacity(dates.len());
        for text in dates {
            let date = parse_date(&text, "day_records.day")?;
            if let Some(day) = load_day(self.conn, date)? {
                days.push(day);
            }
        }
        Ok(days)
    }

    fn modify_day(
        &self,
        date: NaiveDate,
        edit: &mut dyn FnMut(&mut DayRecord) -> DayEdit,
    ) -> RepoResult<DayRecord> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let before = load_day(&tx, date)?;
        let mut day = before.clone().unwrap_or_else(|| DayRecord::new(date));

        if edit(&mut day) == DayEdit::Discard {
            // Dropping `tx` rolls back; nothing was written.
            return Ok(day);
        }

        if day.date != date || before.as_ref().is_some_and(|prev| prev.id != day.id) {
            return Err(RepoError::InvalidData(format!(
                "edit for day {date} changed the record identity"
            )));
        }
        day.sort_entries();
        persist_day(&tx, before.as_ref(), &day)?;
        tx.commit()?;
        Ok(day)
    }

    fn find_entry(&self, id: PriorityId) -> RepoResult<Option<EntryLocation>> {
        find_entry_location(self.conn, id)
    }

    fn move_entry(&self, id: PriorityId, target_date: NaiveDate) -> RepoResult<MoveOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let source = find_entry_location(&tx, id)?.ok_or(RepoError::EntryNotFound(id))?;
        if source.entry.completed {
            return Ok(MoveOutcome::EntryCompleted);
        }
        if source.date == target_date {
            return Ok(MoveOutcome::TargetUnavailable);
        }

        let existing_target = load_day(&tx, target_date)?;
        let mut target = existing_target
            .clone()
            .unwrap_or_else(|| DayRecord::new(target_date));
        let Some(rank) = target.lowest_free_rank() else {
            debug!(
                "event=entry_move module=repo status=target_unavailable entry={} target={}",
                id, target_date
            );
            return Ok(MoveOutcome::TargetUnavailable);
        };

        let mut moved = source.entry.clone();
        moved.rank = rank;
        moved.completed = false;
        target.push_entry(moved.clone())?;

        if existing_target.is_none() {
            insert_day_row(&tx, &target)?;
        }
        tx.execute(
            "UPDATE priority_entries
             SET day_uuid = ?1, rank = ?2, is_done = 0
             WHERE uuid = ?3;",
            params![
                target.id.to_string(),
                i64::from(rank.get()),
                id.to_string()
            ],
        )?;
        if let Some(template_id) = moved.template_id {
            insert_dismissed(&tx, source.day_id, template_id)?;
        }
        touch_day(&tx, source.day_id)?;
        touch_day(&tx, target.id)?;
        tx.commit()?;

        Ok(MoveOutcome::Moved {
            from: source.date,
            to: target_date,
            entry: moved,
        })
    }

    fn list_entries_for_template(
        &self,
        template_id: TemplateId,
    ) -> RepoResult<Vec<EntryLocation>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTRY_LOCATION_SELECT_SQL}
             WHERE p.template_uuid = ?1
             ORDER BY d.day ASC, p.rank ASC;"
        ))?;
        let mut rows = stmt.query([template_id.to_string()])?;
        let mut locations = Vec::new();
        while let Some(row) = rows.next()? {
            locations.push(parse_location_row(row)?);
        }
        Ok(locations)
    }

    fn delete_future_entries_for_template(
        &self,
        template_id: TemplateId,
        from: NaiveDate,
    ) -> RepoResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM priority_entries
             WHERE template_uuid = ?1
               AND day_uuid IN (SELECT uuid FROM day_records WHERE day >= ?2);",
            params![template_id.to_string(), date_to_db(from)],
        )?;
        Ok(deleted)
    }
}

fn load_day(conn: &Connection, date: NaiveDate) -> RepoResult<Option<DayRecord>> {
    let row = conn
        .query_row(
            "SELECT uuid, brain_dump, worries, worry_time, gratitude
             FROM day_records
             WHERE day = ?1;",
            [date_to_db(date)],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()?;
    let Some((uuid_text, brain_dump, worries, worry_time, gratitude)) = row else {
        return Ok(None);
    };

    let id = parse_uuid(&uuid_text, "day_records.uuid")?;
    let worry_time = worry_time
        .map(|value| parse_time(&value, "day_records.worry_time"))
        .transpose()?;

    let mut day = DayRecord {
        id,
        date,
        journal: DayJournal {
            brain_dump,
            worries,
            worry_time,
            gratitude,
        },
        entries: load_entries(conn, id)?,
        dismissed_templates: load_dismissed(conn, id)?,
    };
    day.sort_entries();
    day.validate()?;
    Ok(Some(day))
}

fn load_entries(conn: &Connection, day_id: DayRecordId) -> RepoResult<Vec<PriorityEntry>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, name, is_done, rank, template_uuid
         FROM priority_entries
         WHERE day_uuid = ?1
         ORDER BY rank ASC, uuid ASC;",
    )?;
    let mut rows = stmt.query([day_id.to_string()])?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(parse_entry_row(row)?);
    }
    Ok(entries)
}

fn load_dismissed(conn: &Connection, day_id: DayRecordId) -> RepoResult<BTreeSet<TemplateId>> {
    let mut stmt = conn.prepare(
        "SELECT template_uuid FROM dismissed_templates WHERE day_uuid = ?1;",
    )?;
    let values = stmt
        .query_map([day_id.to_string()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    values
        .iter()
        .map(|value| parse_uuid(value, "dismissed_templates.template_uuid"))
        .collect()
}

fn find_entry_location(conn: &Connection, id: PriorityId) -> RepoResult<Option<EntryLocation>> {
    let mut stmt = conn.prepare(&format!("{ENTRY_LOCATION_SELECT_SQL} WHERE p.uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_location_row(row)?));
    }
    Ok(None)
}

/// Writes the difference between `before` and `after` for one day.
fn persist_day(tx: &Transaction<'_>, before: Option<&DayRecord>, after: &DayRecord) -> RepoResult<()> {
    after.validate()?;

    match before {
        None => insert_day_row(tx, after)?,
        Some(_) => {
            tx.execute(
                "UPDATE day_records
                 SET
                    brain_dump = ?1,
                    worries = ?2,
                    worry_time = ?3,
                    gratitude = ?4,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?5;",
                params![
                    after.journal.brain_dump.as_deref(),
                    after.journal.worries.as_deref(),
                    after.journal.worry_time.map(time_to_db),
                    after.journal.gratitude.as_deref(),
                    after.id.to_string(),
                ],
            )?;
        }
    }

    let previous: HashMap<PriorityId, &PriorityEntry> = before
        .map(|day| day.entries.iter().map(|entry| (entry.id, entry)).collect())
        .unwrap_or_default();

    for entry_id in previous.keys() {
        if after.entry(*entry_id).is_none() {
            tx.execute(
                "DELETE FROM priority_entries WHERE uuid = ?1 AND day_uuid = ?2;",
                params![entry_id.to_string(), after.id.to_string()],
            )?;
        }
    }

    for entry in &after.entries {
        match previous.get(&entry.id) {
            Some(old) if *old == entry => {}
            Some(_) => {
                tx.execute(
                    "UPDATE priority_entries
                     SET name = ?1, is_done = ?2, rank = ?3, template_uuid = ?4
                     WHERE uuid = ?5 AND day_uuid = ?6;",
                    params![
                        entry.name.as_str(),
                        bool_to_int(entry.completed),
                        i64::from(entry.rank.get()),
                        entry.template_id.map(|id| id.to_string()),
                        entry.id.to_string(),
                        after.id.to_string(),
                    ],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO priority_entries (
                        uuid,
                        day_uuid,
                        name,
                        is_done,
                        rank,
                        template_uuid
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                    params![
                        entry.id.to_string(),
                        after.id.to_string(),
                        entry.name.as_str(),
                        bool_to_int(entry.completed),
                        i64::from(entry.rank.get()),
                        entry.template_id.map(|id| id.to_string()),
                    ],
                )?;
            }
        }
    }

    for template_id in &after.dismissed_templates {
        let known = before.is_some_and(|day| day.dismissed_templates.contains(template_id));
        if !known {
            insert_dismissed(tx, after.id, *template_id)?;
        }
    }

    Ok(())
}

fn insert_day_row(conn: &Connection, day: &DayRecord) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO day_records (
            uuid,
            day,
            brain_dump,
            worries,
            worry_time,
            gratitude
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            day.id.to_string(),
            date_to_db(day.date),
            day.journal.brain_dump.as_deref(),
            day.journal.worries.as_deref(),
            day.journal.worry_time.map(time_to_db),
            day.journal.gratitude.as_deref(),
        ],
    )?;
    Ok(())
}

fn insert_dismissed(conn: &Connection, day_id: DayRecordId, template_id: TemplateId) -> RepoResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO dismissed_templates (day_uuid, template_uuid) VALUES (?1, ?2);",
        params![day_id.to_string(), template_id.to_string()],
    )?;
    Ok(())
}

fn touch_day(conn: &Connection, day_id: DayRecordId) -> RepoResult<()> {
    conn.execute(
        "UPDATE day_records SET updated_at = (strftime('%s', 'now') * 1000) WHERE uuid = ?1;",
        [day_id.to_string()],
    )?;
    Ok(())
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<PriorityEntry> {
    let uuid_text: String = row.get("uuid")?;
    let template_id = row
        .get::<_, Option<String>>("template_uuid")?
        .map(|value| parse_uuid(&value, "priority_entries.template_uuid"))
        .transpose()?;
    Ok(PriorityEntry {
        id: parse_uuid(&uuid_text, "priority_entries.uuid")?,
        name: row.get("name")?,
        completed: parse_bool(row.get("is_done")?, "priority_entries.is_done")?,
        rank: parse_rank(row.get("rank")?, "priority_entries.rank")?,
        template_id,
    })
}

fn parse_location_row(row: &Row<'_>) -> RepoResult<EntryLocation> {
    let day_uuid: String = row.get("day_uuid")?;
    let day: String = row.get("day")?;
    Ok(EntryLocation {
        day_id: parse_uuid(&day_uuid, "day_records.uuid")?,
        date: parse_date(&day, "day_records.day")?,
        entry: parse_entry_row(row)?,
    })
}
