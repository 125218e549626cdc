//! Recurring template lifecycle use-cases.
//!
//! # Responsibility
//! - Create, edit, activate and deactivate templates.
//! - Keep day records consistent with the new template state: regenerate
//!   today when active, prune today and later when inactive.
//!
//! # Invariants
//! - Schedules are validated before anything is persisted.
//! - Pruning never touches days before today (configured timezone).
//! - Templates are never hard-deleted.
//!
//! # See also
//! - `service::recurrence_engine` for the generation rules.

use crate::model::template::{
    RecurringTemplate, TemplateDraft, TemplateId, TemplateValidationError,
};
use crate::repo::day_repo::DayRepository;
use crate::repo::template_repo::TemplateRepository;
use crate::repo::RepoError;
use crate::schedule::clock::Clock;
use crate::schedule::cron_matcher::{CronMatcher, InvalidSchedule};
use crate::service::recurrence_engine::{GenerationReport, RecurrenceEngine};
use chrono::NaiveDate;
use chrono_tz::Tz;
use log::{error, info};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for template lifecycle use-cases.
#[derive(Debug)]
pub enum TemplateServiceError {
    /// Name or rank rejected; nothing was persisted.
    InvalidInput(TemplateValidationError),
    /// Schedule does not parse; nothing was persisted.
    InvalidSchedule(InvalidSchedule),
    NotFound(TemplateId),
    /// Operation not applicable to the current state.
    InvalidOperation(String),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for TemplateServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(err) => write!(f, "invalid template: {err}"),
            Self::InvalidSchedule(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "template not found: {id}"),
            Self::InvalidOperation(message) => write!(f, "invalid operation: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TemplateServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidInput(err) => Some(err),
            Self::InvalidSchedule(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::NotFound(_) | Self::InvalidOperation(_) => None,
        }
    }
}

impl From<RepoError> for TemplateServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::TemplateNotFound(id) => Self::NotFound(id),
            RepoError::TemplateValidation(err) => Self::InvalidInput(err),
            other => Self::Repo(other),
        }
    }
}

impl From<TemplateValidationError> for TemplateServiceError {
    fn from(value: TemplateValidationError) -> Self {
        Self::InvalidInput(value)
    }
}

impl From<InvalidSchedule> for TemplateServiceError {
    fn from(value: InvalidSchedule) -> Self {
        Self::InvalidSchedule(value)
    }
}

/// Result of a lifecycle write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateChange {
    pub template: RecurringTemplate,
    /// Today's generation run; `None` when none ran or it failed after the
    /// template write succeeded.
    pub generation: Option<GenerationReport>,
    /// Entries removed from today and later days.
    pub pruned: usize,
}

/// Template lifecycle facade over repository implementations.
pub struct TemplateService<T, D, M, C>
where
    T: TemplateRepository,
    D: DayRepository,
    M: CronMatcher,
    C: Clock,
{
    templates: T,
    days: D,
    matcher: M,
    clock: C,
    timezone: Tz,
}

impl<T, D, M, C> TemplateService<T, D, M, C>
where
    T: TemplateRepository,
    D: DayRepository,
    M: CronMatcher,
    C: Clock,
{
    pub fn new(templates: T, days: D, matcher: M, clock: C, timezone: Tz) -> Self {
        Self {
            templates,
            days,
            matcher,
            clock,
            timezone,
        }
    }

    /// Validates and persists a new template; an active one is materialized
    /// for today right away.
    pub fn create_template(
        &self,
        draft: &TemplateDraft,
    ) -> Result<TemplateChange, TemplateServiceError> {
        let template = RecurringTemplate::from_draft(draft)?;
        self.matcher.validate(&template.schedule)?;
        self.templates.create_template(&template)?;
        info!(
            "event=template_create module=service status=ok template={} active={}",
            template.id, template.active
        );

        let generation = if template.active {
            self.regenerate_today(template.id)
        } else {
            None
        };
        Ok(TemplateChange {
            template,
            generation,
            pruned: 0,
        })
    }

    /// Replaces name, schedule, rank and active flag.
    ///
    /// Entries generated before the edit keep their old name and rank.
    pub fn update_template(
        &self,
        id: TemplateId,
        draft: &TemplateDraft,
    ) -> Result<TemplateChange, TemplateServiceError> {
        let mut template = self.require_template(id)?;
        template.apply_draft(draft)?;
        self.matcher.validate(&template.schedule)?;
        self.templates.update_template(&template)?;
        info!(
            "event=template_update module=service status=ok template={} active={}",
            template.id, template.active
        );
        self.reconcile(template)
    }

    /// Persists the active flag, then regenerates (on) or prunes (off).
    pub fn set_active(
        &self,
        id: TemplateId,
        active: bool,
    ) -> Result<TemplateChange, TemplateServiceError> {
        let mut template = self.require_template(id)?;
        self.templates.set_active(id, active)?;
        template.active = active;
        info!(
            "event=template_set_active module=service status=ok template={} active={}",
            id, active
        );
        self.reconcile(template)
    }

    /// Flips the active flag.
    pub fn toggle_template(&self, id: TemplateId) -> Result<TemplateChange, TemplateServiceError> {
        let template = self.require_template(id)?;
        self.set_active(id, !template.active)
    }

    /// Deletion as exposed to users: the template is deactivated and its
    /// future entries are pruned.
    ///
    /// # Errors
    /// - `InvalidOperation` when `id` does not name a template.
    pub fn deactivate_template(
        &self,
        id: TemplateId,
    ) -> Result<TemplateChange, TemplateServiceError> {
        if self.templates.get_template(id)?.is_none() {
            return Err(TemplateServiceError::InvalidOperation(format!(
                "cannot delete unknown template {id}"
            )));
        }
        self.set_active(id, false)
    }

    pub fn get_template(&self, id: TemplateId) -> Result<RecurringTemplate, TemplateServiceError> {
        self.require_template(id)
    }

    /// Templates ordered by rank, then name.
    pub fn list_templates(
        &self,
        active_only: bool,
    ) -> Result<Vec<RecurringTemplate>, TemplateServiceError> {
        Ok(self.templates.list_templates(active_only)?)
    }

    fn require_template(&self, id: TemplateId) -> Result<RecurringTemplate, TemplateServiceError> {
        self.templates
            .get_template(id)?
            .ok_or(TemplateServiceError::NotFound(id))
    }

    fn reconcile(
        &self,
        template: RecurringTemplate,
    ) -> Result<TemplateChange, TemplateServiceError> {
        if template.active {
            let generation = self.regenerate_today(template.id);
            return Ok(TemplateChange {
                template,
                generation,
                pruned: 0,
            });
        }

        let pruned = self.prune_from(template.id, self.today())?;
        Ok(TemplateChange {
            template,
            generation: None,
            pruned,
        })
    }

    fn today(&self) -> NaiveDate {
        self.clock.today(self.timezone)
    }

    fn prune_from(
        &self,
        id: TemplateId,
        from: NaiveDate,
    ) -> Result<usize, TemplateServiceError> {
        let pruned = self.days.delete_future_entries_for_template(id, from)?;
        info!(
            "event=template_prune module=service status=ok template={} from={} pruned={}",
            id, from, pruned
        );
        Ok(pruned)
    }

    /// The template write already committed, so a failed run is logged and
    /// reported as `None` instead of failing the call.
    fn regenerate_today(&self, id: TemplateId) -> Option<GenerationReport> {
        let today = self.today();
        let engine = RecurrenceEngine::new(&self.templates, &self.days, &self.matcher, self.timezone);
        match engine.generate_for_date(today) {
            Ok(report) => Some(report),
            Err(err) => {
                error!(
                    "event=template_regenerate module=service status=error template={} date={} error={}",
                    id, today, err
                );
                None
            }
        }
    }
}
