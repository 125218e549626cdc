//! Recurring priority template model.
//!
//! # Responsibility
//! - Define the template that generation materializes into day entries.
//! - Validate user-supplied template fields before persistence.
//!
//! # Invariants
//! - `id` is stable and never reused for another template.
//! - Templates are never hard-deleted; `active = false` is the tombstone.
//! - `schedule` syntax is checked by the cron matcher, not by this model.

use crate::model::rank::{InvalidRank, Rank};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a recurring template.
pub type TemplateId = Uuid;

/// Recurring priority definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringTemplate {
    pub id: TemplateId,
    /// Name copied into every generated entry.
    pub name: String,
    /// Cron expression or schedule alias (`weekdays`, `monday`, ...).
    pub schedule: String,
    pub active: bool,
    /// Rank requested for generated entries.
    pub rank: Rank,
    pub created_at: DateTime<Utc>,
}

impl RecurringTemplate {
    /// Creates an active template with a generated id.
    pub fn new(name: impl Into<String>, schedule: impl Into<String>, rank: Rank) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            schedule: schedule.into(),
            active: true,
            rank,
            created_at: Utc::now(),
        }
    }

    /// Builds a template from caller input, trimming text fields.
    pub fn from_draft(draft: &TemplateDraft) -> Result<Self, TemplateValidationError> {
        let rank = Rank::new(draft.rank).map_err(TemplateValidationError::InvalidRank)?;
        let mut template = Self::new(draft.name.trim(), draft.schedule.trim(), rank);
        template.active = draft.active;
        template.validate()?;
        Ok(template)
    }

    /// Overwrites the mutable fields with `draft`, keeping id and creation time.
    pub fn apply_draft(&mut self, draft: &TemplateDraft) -> Result<(), TemplateValidationError> {
        let rank = Rank::new(draft.rank).map_err(TemplateValidationError::InvalidRank)?;
        self.name = draft.name.trim().to_string();
        self.schedule = draft.schedule.trim().to_string();
        self.rank = rank;
        self.active = draft.active;
        self.validate()
    }

    pub fn validate(&self) -> Result<(), TemplateValidationError> {
        if self.name.trim().is_empty() {
            return Err(TemplateValidationError::EmptyName);
        }
        if self.schedule.trim().is_empty() {
            return Err(TemplateValidationError::EmptySchedule);
        }
        Ok(())
    }
}

/// Caller input for creating or replacing a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub name: String,
    pub schedule: String,
    pub rank: u8,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl TemplateDraft {
    pub fn new(name: impl Into<String>, schedule: impl Into<String>, rank: u8) -> Self {
        Self {
            name: name.into(),
            schedule: schedule.into(),
            rank,
            active: true,
        }
    }

    /// Same draft with the active flag cleared.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateValidationError {
    EmptyName,
    EmptySchedule,
    InvalidRank(InvalidRank),
}

impl Display for TemplateValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "template name must not be blank"),
            Self::EmptySchedule => write!(f, "template schedule must not be blank"),
            Self::InvalidRank(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TemplateValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRank(err) => Some(err),
            _ => None,
        }
    }
}
