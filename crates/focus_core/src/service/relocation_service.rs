//! Relocation of an incomplete priority to a later day.
//!
//! # Responsibility
//! - Find the first day after the entry's current day with a free slot.
//! - Re-own the entry there in one write transaction.
//!
//! # Invariants
//! - Completed entries are never moved.
//! - The entry is moved, never copied; it lands at the lowest free rank of
//!   the target day with its completion flag cleared.
//! - Nothing is written before the final move; cancellation and deadline
//!   leave the store untouched.

use crate::model::day::{DayRecord, PriorityEntry, PriorityId};
use crate::repo::day_repo::{DayRepository, MoveOutcome};
use crate::repo::RepoError;
use chrono::{Days, NaiveDate};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Days scanned after the current day when no horizon is configured.
pub const DEFAULT_RELOCATION_HORIZON_DAYS: u32 = 365;

#[derive(Debug)]
pub enum RelocationError {
    NotFound(PriorityId),
    /// The entry cannot be relocated in its current state.
    InvalidOperation(String),
    /// No qualifying day within the horizon.
    CapacityExhausted {
        from: NaiveDate,
        horizon_days: u32,
    },
    /// Deadline passed or cancel flag raised before the move.
    Cancelled,
    Repo(RepoError),
}

impl Display for RelocationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "priority not found: {id}"),
            Self::InvalidOperation(message) => write!(f, "invalid operation: {message}"),
            Self::CapacityExhausted { from, horizon_days } => write!(
                f,
                "no day with a free slot within {horizon_days} days after {from}"
            ),
            Self::Cancelled => write!(f, "relocation cancelled"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RelocationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for RelocationError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::EntryNotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Bounds of one relocation scan.
#[derive(Debug, Clone)]
pub struct RelocationOptions {
    pub horizon_days: u32,
    pub deadline: Option<Instant>,
    pub cancel: Option<Arc<AtomicBool>>,
}

impl RelocationOptions {
    pub fn with_horizon(horizon_days: u32) -> Self {
        Self {
            horizon_days,
            deadline: None,
            cancel: None,
        }
    }

    fn interrupted(&self) -> bool {
        let cancelled = self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed));
        let expired = self
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline);
        cancelled || expired
    }
}

impl Default for RelocationOptions {
    fn default() -> Self {
        Self::with_horizon(DEFAULT_RELOCATION_HORIZON_DAYS)
    }
}

/// Completed relocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relocation {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Entry as stored on the target day.
    pub entry: PriorityEntry,
}

/// Moves incomplete priorities forward in time.
pub struct RelocationPlanner<D: DayRepository> {
    days: D,
    horizon_days: u32,
}

impl<D: DayRepository> RelocationPlanner<D> {
    pub fn new(days: D) -> Self {
        Self::with_horizon(days, DEFAULT_RELOCATION_HORIZON_DAYS)
    }

    pub fn with_horizon(days: D, horizon_days: u32) -> Self {
        Self { days, horizon_days }
    }

    /// Moves entry `id` to the next day with a free slot.
    pub fn relocate(&self, id: PriorityId) -> Result<Relocation, RelocationError> {
        self.relocate_with(id, &RelocationOptions::with_horizon(self.horizon_days))
    }

    /// Same as `relocate` with caller-supplied scan bounds.
    ///
    /// # Errors
    /// - `NotFound` when no entry has `id`.
    /// - `InvalidOperation` when the entry is completed.
    /// - `CapacityExhausted` when every day in the horizon is unavailable.
    /// - `Cancelled` when `options` interrupt the scan.
    pub fn relocate_with(
        &self,
        id: PriorityId,
        options: &RelocationOptions,
    ) -> Result<Relocation, RelocationError> {
        let location = self
            .days
            .find_entry(id)?
            .ok_or(RelocationError::NotFound(id))?;
        if location.entry.completed {
            return Err(completed_error(id));
        }

        let from = location.date;
        let last = from
            .checked_add_days(Days::new(u64::from(options.horizon_days)))
            .unwrap_or(NaiveDate::MAX);
        let first = from.checked_add_days(Days::new(1)).unwrap_or(NaiveDate::MAX);

        // One range read up front; the move transaction re-checks each pick.
        let known: HashMap<NaiveDate, DayRecord> = if options.horizon_days == 0 || first > last {
            HashMap::new()
        } else {
            self.days
                .list_days(first, last)?
                .into_iter()
                .map(|day| (day.date, day))
                .collect()
        };

        for offset in 1..=u64::from(options.horizon_days) {
            if options.interrupted() {
                warn!(
                    "event=relocation module=service status=cancelled entry={} from={} scanned={}",
                    id,
                    from,
                    offset - 1
                );
                return Err(RelocationError::Cancelled);
            }
            let Some(candidate) = from.checked_add_days(Days::new(offset)) else {
                break;
            };

            if known.get(&candidate).is_some_and(DayRecord::is_full) {
                continue;
            }

            match self.days.move_entry(id, candidate)? {
                MoveOutcome::Moved { from, to, entry } => {
                    info!(
                        "event=relocation module=service status=ok entry={} from={} to={} rank={}",
                        id, from, to, entry.rank
                    );
                    return Ok(Relocation { from, to, entry });
                }
                // Filled up since the range read; keep scanning.
                MoveOutcome::TargetUnavailable => continue,
                MoveOutcome::EntryCompleted => return Err(completed_error(id)),
            }
        }

        warn!(
            "event=relocation module=service status=capacity_exhausted entry={} from={} horizon_days={}",
            id, from, options.horizon_days
        );
        Err(RelocationError::CapacityExhausted {
            from,
            horizon_days: options.horizon_days,
        })
    }
}

fn completed_error(id: PriorityId) -> RelocationError {
    RelocationError::InvalidOperation(format!("priority {id} is completed and cannot be moved"))
}
