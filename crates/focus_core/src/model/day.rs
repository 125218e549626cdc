//! Day record and priority entry model.
//!
//! # Responsibility
//! - Hold one calendar day's priorities and journal fields.
//! - Enforce capacity and rank uniqueness for in-memory edits.
//!
//! # Invariants
//! - At most `MAX_PRIORITIES_PER_DAY` entries, no two with the same rank.
//! - `entries` is kept sorted by rank.
//! - Removing a generated entry records its template as dismissed for the day.

use crate::model::rank::Rank;
use crate::model::template::{RecurringTemplate, TemplateId};
use crate::model::MAX_PRIORITIES_PER_DAY;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type DayRecordId = Uuid;
pub type PriorityId = Uuid;

/// One of the (up to three) priorities of a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityEntry {
    pub id: PriorityId,
    pub name: String,
    pub completed: bool,
    pub rank: Rank,
    /// Set only for entries materialized from a template.
    pub template_id: Option<TemplateId>,
}

impl PriorityEntry {
    /// Creates a user-authored entry.
    pub fn new(name: impl Into<String>, rank: Rank) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            completed: false,
            rank,
            template_id: None,
        }
    }

    /// Creates the entry generation produces for `template`.
    pub fn generated(template: &RecurringTemplate, rank: Rank) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: template.name.clone(),
            completed: false,
            rank,
            template_id: Some(template.id),
        }
    }

    pub fn is_generated(&self) -> bool {
        self.template_id.is_some()
    }
}

/// Free-text journal fields of a day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayJournal {
    pub brain_dump: Option<String>,
    pub worries: Option<String>,
    /// Local time for the worry reminder; `None` uses the configured default.
    pub worry_time: Option<NaiveTime>,
    pub gratitude: Option<String>,
}

/// Per-date aggregate. At most one exists per calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRecord {
    pub id: DayRecordId,
    pub date: NaiveDate,
    pub journal: DayJournal,
    pub entries: Vec<PriorityEntry>,
    /// Templates whose entry was removed from this day and must not return.
    pub dismissed_templates: BTreeSet<TemplateId>,
}

impl DayRecord {
    /// Creates an empty, not yet persisted record for `date`.
    pub fn new(date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            date,
            journal: DayJournal::default(),
            entries: Vec::new(),
            dismissed_templates: BTreeSet::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_PRIORITIES_PER_DAY
    }

    pub fn is_rank_free(&self, rank: Rank) -> bool {
        self.entries.iter().all(|entry| entry.rank != rank)
    }

    /// Smallest rank not yet used by an entry, `None` when the day is full.
    pub fn lowest_free_rank(&self) -> Option<Rank> {
        Rank::ALL.into_iter().find(|rank| self.is_rank_free(*rank))
    }

    pub fn entry(&self, id: PriorityId) -> Option<&PriorityEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn entry_at_rank_mut(&mut self, rank: Rank) -> Option<&mut PriorityEntry> {
        self.entries.iter_mut().find(|entry| entry.rank == rank)
    }

    pub fn has_template_entry(&self, template_id: TemplateId) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.template_id == Some(template_id))
    }

    /// Template ids generation must skip for this day: the ones already
    /// materialized here plus the dismissed ones.
    pub fn represented_templates(&self) -> HashSet<TemplateId> {
        self.entries
            .iter()
            .filter_map(|entry| entry.template_id)
            .chain(self.dismissed_templates.iter().copied())
            .collect()
    }

    /// Appends `entry`, keeping rank order.
    ///
    /// # Errors
    /// - `CapacityExceeded` when the day already has three entries.
    /// - `DuplicateRank` when the rank is already taken.
    pub fn push_entry(&mut self, entry: PriorityEntry) -> Result<(), DayValidationError> {
        if self.is_full() {
            return Err(DayValidationError::CapacityExceeded {
                date: self.date,
                count: self.entries.len() + 1,
            });
        }
        if !self.is_rank_free(entry.rank) {
            return Err(DayValidationError::DuplicateRank {
                date: self.date,
                rank: entry.rank,
            });
        }
        self.entries.push(entry);
        self.sort_entries();
        Ok(())
    }

    /// Removes one entry by id; a generated entry dismisses its template.
    pub fn remove_entry(&mut self, id: PriorityId) -> Option<PriorityEntry> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        let removed = self.entries.remove(index);
        if let Some(template_id) = removed.template_id {
            self.dismissed_templates.insert(template_id);
        }
        Some(removed)
    }

    pub fn sort_entries(&mut self) {
        self.entries.sort_by_key(|entry| entry.rank);
    }

    /// Checks every invariant of the aggregate.
    pub fn validate(&self) -> Result<(), DayValidationError> {
        if self.entries.len() > MAX_PRIORITIES_PER_DAY {
            return Err(DayValidationError::CapacityExceeded {
                date: self.date,
                count: self.entries.len(),
            });
        }

        let mut ranks = HashSet::new();
        let mut ids = HashSet::new();
        for entry in &self.entries {
            if entry.name.trim().is_empty() {
                return Err(DayValidationError::EmptyEntryName(entry.id));
            }
            if !ids.insert(entry.id) {
                return Err(DayValidationError::DuplicateEntry(entry.id));
            }
            if !ranks.insert(entry.rank) {
                return Err(DayValidationError::DuplicateRank {
                    date: self.date,
                    rank: entry.rank,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayValidationError {
    CapacityExceeded { date: NaiveDate, count: usize },
    DuplicateRank { date: NaiveDate, rank: Rank },
    DuplicateEntry(PriorityId),
    EmptyEntryName(PriorityId),
}

impl Display for DayValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapacityExceeded { date, count } => write!(
                f,
                "day {date} would hold {count} priorities; at most {MAX_PRIORITIES_PER_DAY} allowed"
            ),
            Self::DuplicateRank { date, rank } => {
                write!(f, "day {date} already has a priority with rank {rank}")
            }
            Self::DuplicateEntry(id) => write!(f, "priority {id} appears twice"),
            Self::EmptyEntryName(id) => write!(f, "priority {id} has a blank name"),
        }
    }
}

impl Error for DayValidationError {}
