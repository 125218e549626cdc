//! Recurring priority materialization.
//!
//! # Responsibility
//! - Decide which active templates fire on a calendar date.
//! - Append one generated entry per firing template to that date's day record.
//!
//! # Invariants
//! - Idempotent per (template, date): a template already represented on the
//!   day (entry present or dismissed) is skipped.
//! - Never exceeds the day capacity; surplus matches are dropped and reported.
//! - User-authored and completed entries are never touched.
//! - No write happens when nothing is appended; the day is not created.

use crate::model::day::{DayRecord, PriorityEntry};
use crate::model::rank::Rank;
use crate::model::template::{RecurringTemplate, TemplateId};
use crate::repo::day_repo::{DayEdit, DayRepository};
use crate::repo::template_repo::TemplateRepository;
use crate::repo::RepoResult;
use crate::schedule::cron_matcher::CronMatcher;
use chrono::NaiveDate;
use chrono_tz::Tz;
use log::{info, warn};
use serde::Serialize;

/// Per-template problem that did not abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationFailure {
    pub template_id: TemplateId,
    pub reason: String,
}

/// Outcome of one generation run for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub date: NaiveDate,
    /// Entries appended by this run, in append order.
    pub created: Vec<PriorityEntry>,
    /// Matching templates already represented on the day.
    pub skipped_existing: Vec<TemplateId>,
    /// Matching templates left out because the day was full.
    pub dropped_for_capacity: Vec<TemplateId>,
    pub failures: Vec<GenerationFailure>,
}

impl GenerationReport {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            created: Vec::new(),
            skipped_existing: Vec::new(),
            dropped_for_capacity: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Generation engine over template/day stores and a cron matcher.
pub struct RecurrenceEngine<T, D, M>
where
    T: TemplateRepository,
    D: DayRepository,
    M: CronMatcher,
{
    templates: T,
    days: D,
    matcher: M,
    timezone: Tz,
}

impl<T, D, M> RecurrenceEngine<T, D, M>
where
    T: TemplateRepository,
    D: DayRepository,
    M: CronMatcher,
{
    pub fn new(templates: T, days: D, matcher: M, timezone: Tz) -> Self {
        Self {
            templates,
            days,
            matcher,
            timezone,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Generates entries for `date` from every active template in the store.
    ///
    /// # Errors
    /// - Storage failures abort the run and propagate unchanged.
    pub fn generate_for_date(&self, date: NaiveDate) -> RepoResult<GenerationReport> {
        let templates = self.templates.list_templates(true)?;
        self.generate_with(date, &templates)
    }

    /// Generates entries for `date` from the given templates.
    ///
    /// Inactive templates in `templates` are ignored. Templates are applied
    /// in slice order, so callers pass them sorted by rank.
    pub fn generate_with(
        &self,
        date: NaiveDate,
        templates: &[RecurringTemplate],
    ) -> RepoResult<GenerationReport> {
        let mut report = GenerationReport::empty(date);
        let mut matched = Vec::new();

        for template in templates.iter().filter(|template| template.active) {
            match self.matcher.matches(&template.schedule, date, self.timezone) {
                Ok(true) => matched.push(template),
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        "event=generation_template module=service status=error date={} template={} reason=invalid_schedule",
                        date, template.id
                    );
                    report.failures.push(GenerationFailure {
                        template_id: template.id,
                        reason: err.to_string(),
                    });
                }
            }
        }

        if matched.is_empty() {
            info!(
                "event=generation_run module=service status=ok date={} matched=0 created=0",
                date
            );
            return Ok(report);
        }

        let mut created = Vec::new();
        let mut skipped = Vec::new();
        let mut dropped = Vec::new();
        let mut append_failures = Vec::new();

        self.days.modify_day(date, &mut |day: &mut DayRecord| {
            let represented = day.represented_templates();
            for template in &matched {
                if represented.contains(&template.id) {
                    skipped.push(template.id);
                    continue;
                }
                let Some(rank) = pick_rank(template.rank, day.is_rank_free(template.rank), || {
                    day.lowest_free_rank()
                }) else {
                    dropped.push(template.id);
                    continue;
                };

                let entry = PriorityEntry::generated(template, rank);
                match day.push_entry(entry.clone()) {
                    Ok(()) => created.push(entry),
                    Err(err) => append_failures.push(GenerationFailure {
                        template_id: template.id,
                        reason: err.to_string(),
                    }),
                }
            }

            if created.is_empty() {
                DayEdit::Discard
            } else {
                DayEdit::Commit
            }
        })?;

        for template_id in &dropped {
            warn!(
                "event=generation_template module=service status=dropped date={} template={} reason=capacity",
                date, template_id
            );
        }
        for failure in &append_failures {
            warn!(
                "event=generation_template module=service status=error date={} template={} reason=append_failed",
                date, failure.template_id
            );
        }

        report.created = created;
        report.skipped_existing = skipped;
        report.dropped_for_capacity = dropped;
        report.failures.extend(append_failures);

        info!(
            "event=generation_run module=service status=ok date={} matched={} created={} skipped={} dropped={} failures={}",
            date,
            matched.len(),
            report.created.len(),
            report.skipped_existing.len(),
            report.dropped_for_capacity.len(),
            report.failures.len()
        );
        Ok(report)
    }
}

/// Hinted rank when free, otherwise the lowest free one.
fn pick_rank(
    hint: Rank,
    hint_is_free: bool,
    lowest_free: impl FnOnce() -> Option<Rank>,
) -> Option<Rank> {
    if hint_is_free {
        Some(hint)
    } else {
        lowest_free()
    }
}
