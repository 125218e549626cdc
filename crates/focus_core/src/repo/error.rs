use crate::db::{latest_version_mismatch, DbError};
use crate::model::day::{DayValidationError, PriorityId};
use crate::model::template::{TemplateId, TemplateValidationError};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Error for template/day persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    TemplateValidation(TemplateValidationError),
    DayValidation(DayValidationError),
    Db(DbError),
    TemplateNotFound(TemplateId),
    EntryNotFound(PriorityId),
    /// Connection schema is not at the version this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl RepoError {
    /// Store contention that a caller may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Db(err) if err.is_busy())
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemplateValidation(err) => write!(f, "{err}"),
            Self::DayValidation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::TemplateNotFound(id) => write!(f, "template not found: {id}"),
            Self::EntryNotFound(id) => write!(f, "priority not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TemplateValidation(err) => Some(err),
            Self::DayValidation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::TemplateNotFound(_) => None,
            Self::EntryNotFound(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<TemplateValidationError> for RepoError {
    fn from(value: TemplateValidationError) -> Self {
        Self::TemplateValidation(value)
    }
}

impl From<DayValidationError> for RepoError {
    fn from(value: DayValidationError) -> Self {
        Self::DayValidation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Rejects connections that did not go through `open_db*`.
pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    if let Some((expected_version, actual_version)) = latest_version_mismatch(conn)? {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}
