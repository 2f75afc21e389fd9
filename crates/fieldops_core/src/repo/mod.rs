//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per aggregate.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repository writes enforce model `validate()` before persistence.
//! - Plain CRUD repositories share [`RepoError`]; the invariant-heavy
//!   schedule and invoice repositories own richer error enums.
//! - Repositories refuse to operate on unmigrated connections.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::ValidationError;
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod client_repo;
pub mod invoice_repo;
pub mod job_repo;
pub mod lead_repo;
pub mod quotation_repo;
pub mod schedule_repo;
pub mod user_repo;

/// Default page size for list queries.
pub const LIST_DEFAULT_LIMIT: u32 = 50;
/// Upper bound for caller-provided page sizes.
pub const LIST_LIMIT_MAX: u32 = 200;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error shared by the plain CRUD repositories.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Validation(ValidationError),
    NotFound {
        entity: &'static str,
        id: Uuid,
    },
    /// A business linkage or uniqueness rule was violated by the write.
    Constraint(&'static str),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Constraint(message) => write!(f, "{message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
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

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ReadinessError> for RepoError {
    fn from(value: ReadinessError) -> Self {
        match value {
            ReadinessError::Sqlite(err) => Self::Db(DbError::Sqlite(err)),
            ReadinessError::SchemaVersion { expected, actual } => Self::UninitializedConnection {
                expected_version: expected,
                actual_version: actual,
            },
            ReadinessError::MissingTable(table) => Self::MissingRequiredTable(table),
            ReadinessError::MissingColumn { table, column } => {
                Self::MissingRequiredColumn { table, column }
            }
        }
    }
}

/// Outcome of the shared schema-readiness probe.
#[derive(Debug)]
pub(crate) enum ReadinessError {
    Sqlite(rusqlite::Error),
    SchemaVersion { expected: u32, actual: u32 },
    MissingTable(&'static str),
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },
}

/// Table name plus the columns the repository depends on.
pub(crate) type TableSpec = (&'static str, &'static [&'static str]);

/// Verifies schema version and required tables/columns for a repository.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[TableSpec],
) -> Result<(), ReadinessError> {
    let expected = latest_version();
    let actual: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .map_err(ReadinessError::Sqlite)?;
    if actual != expected {
        return Err(ReadinessError::SchemaVersion { expected, actual });
    }

    for &(table, columns) in tables {
        if !table_exists(conn, table)? {
            return Err(ReadinessError::MissingTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(ReadinessError::MissingColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool, ReadinessError> {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )
        .map_err(ReadinessError::Sqlite)?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, ReadinessError> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table});"))
        .map_err(ReadinessError::Sqlite)?;
    let mut rows = stmt.query([]).map_err(ReadinessError::Sqlite)?;
    while let Some(row) = rows.next().map_err(ReadinessError::Sqlite)? {
        let current: String = row.get(1).map_err(ReadinessError::Sqlite)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Allocates the next human document number for a document kind.
///
/// Must run inside the transaction that inserts the document, so an
/// aborted insert never burns a number that a reader already saw.
pub(crate) fn allocate_doc_number(
    conn: &Connection,
    kind: &'static str,
    prefix: &'static str,
) -> rusqlite::Result<String> {
    let value: i64 = conn.query_row(
        "INSERT INTO doc_counters (kind, next_value) VALUES (?1, 1)
         ON CONFLICT(kind) DO UPDATE SET next_value = next_value + 1
         RETURNING next_value;",
        [kind],
        |row| row.get(0),
    )?;
    Ok(format!("{prefix}-{value:04}"))
}

/// Normalizes a caller-provided page size against the list contract.
pub fn normalize_list_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => LIST_DEFAULT_LIMIT,
        Some(value) if value > LIST_LIMIT_MAX => LIST_LIMIT_MAX,
        Some(value) => value,
    }
}

pub(crate) fn parse_uuid_text(value: &str, column: &'static str) -> Result<Uuid, String> {
    Uuid::parse_str(value).map_err(|_| format!("invalid uuid value `{value}` in {column}"))
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    i64::from(value)
}

pub(crate) fn int_to_bool(value: i64, column: &'static str) -> Result<bool, String> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(format!("invalid boolean value `{other}` in {column}")),
    }
}

/// Loads the ordered line items of a priced document.
///
/// `table`/`parent_column` are trusted compile-time constants from the
/// calling repository, never user input.
pub(crate) fn load_line_items(
    conn: &Connection,
    table: &'static str,
    parent_column: &'static str,
    parent: Uuid,
) -> Result<Vec<crate::model::line_item::LineItem>, RepoError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT uuid, description, quantity, unit_price_cents, position
         FROM {table}
         WHERE {parent_column} = ?1
         ORDER BY position ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query([parent.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let uuid_text: String = row.get("uuid")?;
        items.push(crate::model::line_item::LineItem {
            id: parse_uuid_text(&uuid_text, "line item uuid").map_err(RepoError::InvalidData)?,
            description: row.get("description")?,
            quantity: row.get("quantity")?,
            unit_price_cents: row.get("unit_price_cents")?,
            position: row.get("position")?,
        });
    }
    Ok(items)
}

/// Inserts a full set of line items under one parent document.
pub(crate) fn insert_line_items(
    conn: &Connection,
    table: &'static str,
    parent_column: &'static str,
    parent: Uuid,
    items: &[crate::model::line_item::LineItem],
) -> Result<(), RepoError> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table} (uuid, {parent_column}, description, quantity, unit_price_cents, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);"
    ))?;
    for item in items {
        stmt.execute(rusqlite::params![
            item.id.to_string(),
            parent.to_string(),
            item.description.as_str(),
            item.quantity,
            item.unit_price_cents,
            item.position,
        ])?;
    }
    Ok(())
}

/// Maps a SQLite constraint failure onto a semantic repository error.
pub(crate) fn map_constraint(err: rusqlite::Error, message: &'static str) -> RepoError {
    match err {
        rusqlite::Error::SqliteFailure(inner, _)
            if inner.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            RepoError::Constraint(message)
        }
        other => RepoError::Db(DbError::Sqlite(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_list_limit;

    #[test]
    fn limits_clamp_to_contract_bounds() {
        assert_eq!(normalize_list_limit(None), 50);
        assert_eq!(normalize_list_limit(Some(0)), 50);
        assert_eq!(normalize_list_limit(Some(25)), 25);
        assert_eq!(normalize_list_limit(Some(10_000)), 200);
    }
}
