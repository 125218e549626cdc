//! Day read/save use-cases.
//!
//! # Responsibility
//! - Save the user-authored part of a day: journal fields and priorities.
//! - Keep the day's worry reminder in sync after each save.
//!
//! # Invariants
//! - Priorities merge by rank: a matching rank updates the existing entry in
//!   place (its template link survives), a free rank gets a new user entry.
//! - An existing entry whose rank is absent (or blank) in the input is
//!   removed; a removed generated entry dismisses its template for that day.

use crate::model::day::{DayJournal, DayRecord, DayValidationError, PriorityEntry};
use crate::model::rank::Rank;
use crate::repo::day_repo::{DayEdit, DayRepository};
use crate::repo::RepoError;
use crate::schedule::clock::Clock;
use crate::scheduler::TaskScheduler;
use crate::service::reminder_service::{ReminderOutcome, ReminderService};
use chrono::{NaiveDate, NaiveTime};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum DayServiceError {
    /// Caller input rejected before any write.
    InvalidInput(String),
    Repo(RepoError),
}

impl Display for DayServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(message) => write!(f, "invalid day input: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DayServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for DayServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// One priority as submitted by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityInput {
    pub rank: u8,
    pub name: String,
    #[serde(default)]
    pub completed: bool,
}

/// Full user-editable state of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayInput {
    pub date: NaiveDate,
    #[serde(default)]
    pub brain_dump: Option<String>,
    #[serde(default)]
    pub worries: Option<String>,
    #[serde(default)]
    pub worry_time: Option<NaiveTime>,
    #[serde(default)]
    pub gratitude: Option<String>,
    #[serde(default)]
    pub priorities: Vec<PriorityInput>,
}

impl DayInput {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            brain_dump: None,
            worries: None,
            worry_time: None,
            gratitude: None,
            priorities: Vec::new(),
        }
    }

    pub fn with_priority(mut self, rank: u8, name: impl Into<String>) -> Self {
        self.priorities.push(PriorityInput {
            rank,
            name: name.into(),
            completed: false,
        });
        self
    }
}

/// Persisted day plus the reminder state after the save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySaved {
    pub day: DayRecord,
    pub reminder: ReminderOutcome,
}

/// Day facade over the day store and the reminder policy.
pub struct DayService<D, S, C>
where
    D: DayRepository,
    S: TaskScheduler,
    C: Clock,
{
    days: D,
    reminders: ReminderService<S>,
    clock: C,
}

impl<D, S, C> DayService<D, S, C>
where
    D: DayRepository,
    S: TaskScheduler,
    C: Clock,
{
    pub fn new(days: D, reminders: ReminderService<S>, clock: C) -> Self {
        Self {
            days,
            reminders,
            clock,
        }
    }

    pub fn get_day(&self, date: NaiveDate) -> Result<Option<DayRecord>, DayServiceError> {
        Ok(self.days.get_day(date)?)
    }

    /// Creates or updates the day for `input.date`.
    pub fn save_day(&self, input: &DayInput) -> Result<DaySaved, DayServiceError> {
        let incoming = normalize_priorities(&input.priorities)?;
        let journal = DayJournal {
            brain_dump: non_blank(input.brain_dump.as_deref()),
            worries: non_blank(input.worries.as_deref()),
            worry_time: input.worry_time,
            gratitude: non_blank(input.gratitude.as_deref()),
        };

        let mut merge_error = None;
        let day = self.days.modify_day(input.date, &mut |day: &mut DayRecord| {
            day.journal = journal.clone();
            match merge_priorities(day, &incoming) {
                Ok(()) => DayEdit::Commit,
                Err(err) => {
                    merge_error = Some(err);
                    DayEdit::Discard
                }
            }
        })?;
        if let Some(err) = merge_error {
            return Err(DayServiceError::Repo(RepoError::DayValidation(err)));
        }

        info!(
            "event=day_save module=service status=ok date={} entries={}",
            day.date,
            day.entries.len()
        );
        let reminder = self.reminders.sync_worry_reminder(&day, self.clock.now());
        Ok(DaySaved { day, reminder })
    }
}

/// Validated `(rank, name, completed)` rows, blank names dropped.
fn normalize_priorities(
    priorities: &[PriorityInput],
) -> Result<BTreeMap<Rank, (String, bool)>, DayServiceError> {
    let mut by_rank = BTreeMap::new();
    for item in priorities {
        let rank = Rank::new(item.rank)
            .map_err(|err| DayServiceError::InvalidInput(err.to_string()))?;
        let name = item.name.trim();
        if name.is_empty() {
            continue;
        }
        if by_rank
            .insert(rank, (name.to_string(), item.completed))
            .is_some()
        {
            return Err(DayServiceError::InvalidInput(format!(
                "rank {rank} submitted more than once"
            )));
        }
    }
    Ok(by_rank)
}

fn merge_priorities(
    day: &mut DayRecord,
    incoming: &BTreeMap<Rank, (String, bool)>,
) -> Result<(), DayValidationError> {
    let removed: Vec<_> = day
        .entries
        .iter()
        .filter(|entry| !incoming.contains_key(&entry.rank))
        .map(|entry| entry.id)
        .collect();
    for id in removed {
        day.remove_entry(id);
    }

    for (rank, (name, completed)) in incoming {
        if let Some(entry) = day.entry_at_rank_mut(*rank) {
            entry.name = name.clone();
            entry.completed = *completed;
            continue;
        }
        let mut entry = PriorityEntry::new(name.clone(), *rank);
        entry.completed = *completed;
        day.push_entry(entry)?;
    }
    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
