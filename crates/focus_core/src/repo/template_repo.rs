//! Recurring template repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over `recurring_templates`.
//! - List active templates in the deterministic order generation uses.
//!
//! # Invariants
//! - Write paths call `RecurringTemplate::validate()` before SQL mutations.
//! - Templates are never deleted; deactivation only clears `is_active`.
//! - Listing order is `rank ASC, name ASC, created_at ASC, uuid ASC`.

use super::codec::{
    bool_to_int, parse_bool, parse_rank, parse_timestamp, parse_uuid, timestamp_to_db,
};
use super::error::ensure_connection_ready;
use super::{RepoError, RepoResult};
use crate::model::template::{RecurringTemplate, TemplateId};
use rusqlite::{params, Connection, Row};

const TEMPLATE_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    schedule,
    is_active,
    rank,
    created_at
FROM recurring_templates";

/// Store contract for recurring templates.
pub trait TemplateRepository {
    fn create_template(&self, template: &RecurringTemplate) -> RepoResult<TemplateId>;
    /// Replaces name, schedule, rank and active flag of an existing template.
    fn update_template(&self, template: &RecurringTemplate) -> RepoResult<()>;
    fn get_template(&self, id: TemplateId) -> RepoResult<Option<RecurringTemplate>>;
    fn list_templates(&self, active_only: bool) -> RepoResult<Vec<RecurringTemplate>>;
    fn set_active(&self, id: TemplateId, active: bool) -> RepoResult<()>;
}

impl<R: TemplateRepository + ?Sized> TemplateRepository for &R {
    fn create_template(&self, template: &RecurringTemplate) -> RepoResult<TemplateId> {
        (**self).create_template(template)
    }

    fn update_template(&self, template: &RecurringTemplate) -> RepoResult<()> {
        (**self).update_template(template)
    }

    fn get_template(&self, id: TemplateId) -> RepoResult<Option<RecurringTemplate>> {
        (**self).get_template(id)
    }

    fn list_templates(&self, active_only: bool) -> RepoResult<Vec<RecurringTemplate>> {
        (**self).list_templates(active_only)
    }

    fn set_active(&self, id: TemplateId, active: bool) -> RepoResult<()> {
        (**self).set_active(id, active)
    }
}

/// SQLite-backed template repository.
pub struct SqliteTemplateRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTemplateRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TemplateRepository for SqliteTemplateRepository<'_> {
    fn create_template(&self, template: &RecurringTemplate) -> RepoResult<TemplateId> {
        template.validate()?;

        self.conn.execute(
            "INSERT INTO recurring_templates (
                uuid,
                name,
                schedule,
                is_active,
                rank,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                template.id.to_string(),
                template.name.as_str(),
                template.schedule.as_str(),
                bool_to_int(template.active),
                i64::from(template.rank.get()),
                timestamp_to_db(template.created_at),
            ],
        )?;

        Ok(template.id)
    }

    fn update_template(&self, template: &RecurringTemplate) -> RepoResult<()> {
        template.validate()?;

        let changed = self.conn.execute(
            "UPDATE recurring_templates
             SET
                name = ?1,
                schedule = ?2,
                is_active = ?3,
                rank = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?5;",
            params![
                template.name.as_str(),
                template.schedule.as_str(),
                bool_to_int(template.active),
                i64::from(template.rank.get()),
                template.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::TemplateNotFound(template.id));
        }
        Ok(())
    }

    fn get_template(&self, id: TemplateId) -> RepoResult<Option<RecurringTemplate>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TEMPLATE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_template_row(row)?));
        }
        Ok(None)
    }

    fn list_templates(&self, active_only: bool) -> RepoResult<Vec<RecurringTemplate>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TEMPLATE_SELECT_SQL}
             WHERE (?1 = 0 OR is_active = 1)
             ORDER BY rank ASC, name ASC, created_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([bool_to_int(active_only)])?;
        let mut templates = Vec::new();
        while let Some(row) = rows.next()? {
            templates.push(parse_template_row(row)?);
        }
        Ok(templates)
    }

    fn set_active(&self, id: TemplateId, active: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE recurring_templates
             SET
                is_active = ?1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?2;",
            params![bool_to_int(active), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::TemplateNotFound(id));
        }
        Ok(())
    }
}

fn parse_template_row(row: &Row<'_>) -> RepoResult<RecurringTemplate> {
    let uuid_text: String = row.get("uuid")?;
    let template = RecurringTemplate {
        id: parse_uuid(&uuid_text, "recurring_templates.uuid")?,
        name: row.get("name")?,
        schedule: row.get("schedule")?,
        active: parse_bool(row.get("is_active")?, "recurring_templates.is_active")?,
        rank: parse_rank(row.get("rank")?, "recurring_templates.rank")?,
        created_at: parse_timestamp(row.get("created_at")?, "recurring_templates.created_at")?,
    };
    template.validate()?;
    Ok(template)
}
