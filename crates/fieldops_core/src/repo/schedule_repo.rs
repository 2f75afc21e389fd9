//! Schedule repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist calendar entries and their assignees.
//! - Own conflict detection for overlapping employee assignments.
//!
//! # Invariants
//! - Conflict detection and the write it guards share one immediate
//!   transaction, so racing writers serialize at the database.
//! - Only entries whose status blocks the slot participate in conflicts.
//! - Creating an entry for a pending job moves the job to `scheduled`
//!   (with a history row) inside the same transaction.

use crate::db::DbError;
use crate::model::job_order::JobOrderId;
use crate::model::schedule::{ScheduleEntry, ScheduleEntryId, ScheduleStatus};
use crate::model::user::UserId;
use crate::model::ValidationError;
use crate::repo::job_repo::ensure_users_active;
use crate::repo::{ensure_connection_ready, parse_uuid_text, ReadinessError, RepoError, TableSpec};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const REQUIRED_TABLES: &[TableSpec] = &[
    ("schedule_entries", &["uuid", "starts_at", "ends_at", "status"]),
    ("schedule_assignees", &["entry_uuid", "user_uuid"]),
    ("job_orders", &["uuid", "status"]),
    ("job_status_updates", &["uuid", "job_uuid", "changed_by"]),
    ("users", &["uuid", "active"]),
];

const ENTRY_SELECT_SQL: &str = "SELECT
    uuid,
    job_uuid,
    title,
    location,
    starts_at,
    ends_at,
    status,
    notes
FROM schedule_entries";

pub type ScheduleRepoResult<T> = Result<T, ScheduleRepoError>;

/// One existing booking that overlaps a requested slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleConflict {
    pub entry_id: ScheduleEntryId,
    pub title: String,
    pub starts_at: i64,
    pub ends_at: i64,
    /// The assignees shared between the requested slot and this entry.
    pub user_ids: Vec<UserId>,
}

/// Errors from schedule repository operations.
#[derive(Debug)]
pub enum ScheduleRepoError {
    Db(DbError),
    EntryNotFound(ScheduleEntryId),
    JobNotFound(JobOrderId),
    Validation(ValidationError),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// One of the requested assignees is unknown or deactivated.
    AssigneeRejected(&'static str),
    /// The requested slot overlaps existing bookings.
    Conflict(Vec<ScheduleConflict>),
}

impl Display for ScheduleRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::EntryNotFound(id) => write!(f, "schedule entry not found: {id}"),
            Self::JobNotFound(id) => write!(f, "job order not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted schedule data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "schedule repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "schedule repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "schedule repository requires column `{column}` in table `{table}`"
            ),
            Self::AssigneeRejected(message) => write!(f, "{message}"),
            Self::Conflict(conflicts) => {
                write!(f, "slot conflicts with {} existing booking(s)", conflicts.len())
            }
        }
    }
}

impl Error for ScheduleRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ScheduleRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ScheduleRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ValidationError> for ScheduleRepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ReadinessError> for ScheduleRepoError {
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

// Only the assignee checks in this module surface shared repo errors.
impl From<RepoError> for ScheduleRepoError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(err) => Self::Db(err),
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { .. } => Self::AssigneeRejected("assignee not found"),
            RepoError::Constraint(message) => Self::AssigneeRejected(message),
            RepoError::InvalidData(message) => Self::InvalidData(message),
            RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            } => Self::UninitializedConnection {
                expected_version,
                actual_version,
            },
            RepoError::MissingRequiredTable(table) => Self::MissingRequiredTable(table),
            RepoError::MissingRequiredColumn { table, column } => {
                Self::MissingRequiredColumn { table, column }
            }
        }
    }
}

/// Read model: a schedule entry with its assignees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntryDetail {
    pub entry: ScheduleEntry,
    /// Sorted by user id for deterministic output.
    pub assignees: Vec<UserId>,
}

/// Query options for listing a time window of the calendar.
#[derive(Debug, Clone)]
pub struct ScheduleWindowQuery {
    /// Window start, epoch milliseconds (inclusive).
    pub from: i64,
    /// Window end, epoch milliseconds (exclusive).
    pub to: i64,
    /// Restrict to entries involving this user.
    pub assignee: Option<UserId>,
    /// Also return cancelled/no-show entries.
    pub include_released: bool,
}

/// Repository interface for schedule persistence.
pub trait ScheduleRepository {
    /// Persists a new entry after conflict detection.
    ///
    /// With `allow_conflicts` the entry is created regardless; the
    /// detected conflicts are returned either way so callers can log or
    /// surface them. `actor` attributes the job history row written when
    /// a pending linked job moves to `scheduled`.
    fn create_entry(
        &mut self,
        entry: &ScheduleEntry,
        assignees: &[UserId],
        allow_conflicts: bool,
        actor: UserId,
    ) -> ScheduleRepoResult<Vec<ScheduleConflict>>;
    fn get_detail(&self, id: ScheduleEntryId) -> ScheduleRepoResult<Option<ScheduleEntryDetail>>;
    fn list_window(
        &self,
        query: &ScheduleWindowQuery,
    ) -> ScheduleRepoResult<Vec<ScheduleEntryDetail>>;
    /// Guarded status move; returns `false` when the row left `from`.
    fn apply_status(
        &self,
        id: ScheduleEntryId,
        from: ScheduleStatus,
        to: ScheduleStatus,
    ) -> ScheduleRepoResult<bool>;
    /// Moves the slot, re-running conflict detection in the same
    /// transaction.
    fn reschedule(
        &mut self,
        id: ScheduleEntryId,
        starts_at: i64,
        ends_at: i64,
        allow_conflicts: bool,
    ) -> ScheduleRepoResult<Vec<ScheduleConflict>>;
    /// Replaces the assignee set, re-running conflict detection.
    fn replace_assignees(
        &mut self,
        id: ScheduleEntryId,
        assignees: &[UserId],
        allow_conflicts: bool,
    ) -> ScheduleRepoResult<Vec<ScheduleConflict>>;
}

/// SQLite-backed schedule repository.
pub struct SqliteScheduleRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteScheduleRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> ScheduleRepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl ScheduleRepository for SqliteScheduleRepository<'_> {
    fn create_entry(
        &mut self,
        entry: &ScheduleEntry,
        assignees: &[UserId],
        allow_conflicts: bool,
        actor: UserId,
    ) -> ScheduleRepoResult<Vec<ScheduleConflict>> {
        entry.validate()?;
        if assignees.is_empty() {
            return Err(ValidationError::NoAssignees.into());
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        ensure_users_active(&tx, assignees)?;

        let linked_job_status: Option<String> = match entry.job_order_id {
            Some(job_id) => {
                let status: Option<String> = tx
                    .query_row(
                        "SELECT status FROM job_orders WHERE uuid = ?1;",
                        [job_id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;
                if status.is_none() {
                    return Err(ScheduleRepoError::JobNotFound(job_id));
                }
                status
            }
            None => None,
        };

        let conflicts =
            find_conflicts(&tx, assignees, entry.starts_at, entry.ends_at, None)?;
        if !conflicts.is_empty() && !allow_conflicts {
            return Err(ScheduleRepoError::Conflict(conflicts));
        }

        tx.execute(
            "INSERT INTO schedule_entries
                (uuid, job_uuid, title, location, starts_at, ends_at, status, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                entry.id.to_string(),
                entry.job_order_id.map(|id| id.to_string()),
                entry.title.as_str(),
                entry.location.as_deref(),
                entry.starts_at,
                entry.ends_at,
                entry.status.as_str(),
                entry.notes.as_deref(),
            ],
        )?;
        for user_id in assignees {
            tx.execute(
                "INSERT OR IGNORE INTO schedule_assignees (entry_uuid, user_uuid) VALUES (?1, ?2);",
                params![entry.id.to_string(), user_id.to_string()],
            )?;
        }

        if let (Some(job_id), Some("pending")) =
            (entry.job_order_id, linked_job_status.as_deref())
        {
            let changed = tx.execute(
                "UPDATE job_orders
                 SET status = 'scheduled', updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1 AND status = 'pending';",
                [job_id.to_string()],
            )?;
            if changed == 1 {
                tx.execute(
                    "INSERT INTO job_status_updates
                        (uuid, job_uuid, from_status, to_status, note, changed_by)
                     VALUES (?1, ?2, 'pending', 'scheduled', 'schedule entry created', ?3);",
                    params![
                        Uuid::new_v4().to_string(),
                        job_id.to_string(),
                        actor.to_string(),
                    ],
                )?;
            }
        }

        tx.commit()?;
        Ok(conflicts)
    }

    fn get_detail(&self, id: ScheduleEntryId) -> ScheduleRepoResult<Option<ScheduleEntryDetail>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let entry = parse_entry_row(row)?;
        let assignees = load_assignees(self.conn, id)?;
        Ok(Some(ScheduleEntryDetail { entry, assignees }))
    }

    fn list_window(
        &self,
        query: &ScheduleWindowQuery,
    ) -> ScheduleRepoResult<Vec<ScheduleEntryDetail>> {
        let mut sql = format!("{ENTRY_SELECT_SQL} WHERE starts_at < ?1 AND ends_at > ?2");
        let mut bind_values: Vec<Value> = vec![
            Value::Integer(query.to),
            Value::Integer(query.from),
        ];

        if !query.include_released {
            sql.push_str(" AND status NOT IN ('cancelled', 'no_show')");
        }
        if let Some(assignee) = query.assignee {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1
                    FROM schedule_assignees a
                    WHERE a.entry_uuid = schedule_entries.uuid
                      AND a.user_uuid = ?
                )",
            );
            bind_values.push(Value::Text(assignee.to_string()));
        }

        sql.push_str(" ORDER BY starts_at ASC, uuid ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let entry = parse_entry_row(row)?;
            let assignees = load_assignees(self.conn, entry.id)?;
            entries.push(ScheduleEntryDetail { entry, assignees });
        }
        Ok(entries)
    }

    fn apply_status(
        &self,
        id: ScheduleEntryId,
        from: ScheduleStatus,
        to: ScheduleStatus,
    ) -> ScheduleRepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE schedule_entries
             SET status = ?3, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1 AND status = ?2;",
            params![id.to_string(), from.as_str(), to.as_str()],
        )?;

        if changed == 1 {
            return Ok(true);
        }

        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM schedule_entries WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(ScheduleRepoError::EntryNotFound(id));
        }
        Ok(false)
    }

    fn reschedule(
        &mut self,
        id: ScheduleEntryId,
        starts_at: i64,
        ends_at: i64,
        allow_conflicts: bool,
    ) -> ScheduleRepoResult<Vec<ScheduleConflict>> {
        if ends_at <= starts_at {
            return Err(ValidationError::EmptyTimeRange { starts_at, ends_at }.into());
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(status) = load_entry_status(&tx, id)? else {
            return Err(ScheduleRepoError::EntryNotFound(id));
        };
        let assignees = load_assignees(&tx, id)?;

        let conflicts = if status.blocks_slot() {
            find_conflicts(&tx, &assignees, starts_at, ends_at, Some(id))?
        } else {
            Vec::new()
        };
        if !conflicts.is_empty() && !allow_conflicts {
            return Err(ScheduleRepoError::Conflict(conflicts));
        }

        tx.execute(
            "UPDATE schedule_entries
             SET starts_at = ?2, ends_at = ?3, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), starts_at, ends_at],
        )?;
        tx.commit()?;
        Ok(conflicts)
    }

    fn replace_assignees(
        &mut self,
        id: ScheduleEntryId,
        assignees: &[UserId],
        allow_conflicts: bool,
    ) -> ScheduleRepoResult<Vec<ScheduleConflict>> {
        if assignees.is_empty() {
            return Err(ValidationError::NoAssignees.into());
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(status) = load_entry_status(&tx, id)? else {
            return Err(ScheduleRepoError::EntryNotFound(id));
        };
        ensure_users_active(&tx, assignees)?;

        let (starts_at, ends_at): (i64, i64) = tx.query_row(
            "SELECT starts_at, ends_at FROM schedule_entries WHERE uuid = ?1;",
            [id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let conflicts = if status.blocks_slot() {
            find_conflicts(&tx, assignees, starts_at, ends_at, Some(id))?
        } else {
            Vec::new()
        };
        if !conflicts.is_empty() && !allow_conflicts {
            return Err(ScheduleRepoError::Conflict(conflicts));
        }

        tx.execute(
            "DELETE FROM schedule_assignees WHERE entry_uuid = ?1;",
            [id.to_string()],
        )?;
        for user_id in assignees {
            tx.execute(
                "INSERT OR IGNORE INTO schedule_assignees (entry_uuid, user_uuid) VALUES (?1, ?2);",
                params![id.to_string(), user_id.to_string()],
            )?;
        }
        tx.execute(
            "UPDATE schedule_entries SET updated_at = (strftime('%s', 'now') * 1000) WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(conflicts)
    }
}

/// Finds existing blocking bookings that overlap `[starts_at, ends_at)`
/// and share at least one of `users`.
fn find_conflicts(
    conn: &Connection,
    users: &[UserId],
    starts_at: i64,
    ends_at: i64,
    exclude: Option<ScheduleEntryId>,
) -> ScheduleRepoResult<Vec<ScheduleConflict>> {
    if users.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders = vec!["?"; users.len()].join(", ");
    let mut sql = format!(
        "SELECT
            e.uuid,
            e.title,
            e.starts_at,
            e.ends_at,
            GROUP_CONCAT(a.user_uuid) AS overlap_users
         FROM schedule_entries e
         INNER JOIN schedule_assignees a ON a.entry_uuid = e.uuid
         WHERE e.status NOT IN ('cancelled', 'no_show')
           AND e.starts_at < ?
           AND e.ends_at > ?
           AND a.user_uuid IN ({placeholders})"
    );
    let mut bind_values: Vec<Value> = vec![Value::Integer(ends_at), Value::Integer(starts_at)];
    for user_id in users {
        bind_values.push(Value::Text(user_id.to_string()));
    }
    if let Some(exclude) = exclude {
        sql.push_str(" AND e.uuid != ?");
        bind_values.push(Value::Text(exclude.to_string()));
    }
    sql.push_str(
        " GROUP BY e.uuid, e.title, e.starts_at, e.ends_at
          ORDER BY e.starts_at ASC, e.uuid ASC;",
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut conflicts = Vec::new();
    while let Some(row) = rows.next()? {
        let uuid_text: String = row.get("uuid")?;
        let users_text: String = row.get("overlap_users")?;
        let mut user_ids = Vec::new();
        for part in users_text.split(',') {
            user_ids.push(
                parse_uuid_text(part, "schedule_assignees.user_uuid")
                    .map_err(ScheduleRepoError::InvalidData)?,
            );
        }
        user_ids.sort_unstable();

        conflicts.push(ScheduleConflict {
            entry_id: parse_uuid_text(&uuid_text, "schedule_entries.uuid")
                .map_err(ScheduleRepoError::InvalidData)?,
            title: row.get("title")?,
            starts_at: row.get("starts_at")?,
            ends_at: row.get("ends_at")?,
            user_ids,
        });
    }
    Ok(conflicts)
}

fn load_entry_status(
    conn: &Connection,
    id: ScheduleEntryId,
) -> ScheduleRepoResult<Option<ScheduleStatus>> {
    let status_text: Option<String> = conn
        .query_row(
            "SELECT status FROM schedule_entries WHERE uuid = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match status_text {
        None => Ok(None),
        Some(text) => ScheduleStatus::parse(&text).map(Some).ok_or_else(|| {
            ScheduleRepoError::InvalidData(format!(
                "invalid schedule status `{text}` in schedule_entries.status"
            ))
        }),
    }
}

fn load_assignees(conn: &Connection, id: ScheduleEntryId) -> ScheduleRepoResult<Vec<UserId>> {
    let mut stmt = conn.prepare(
        "SELECT user_uuid FROM schedule_assignees WHERE entry_uuid = ?1 ORDER BY user_uuid ASC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut assignees = Vec::new();
    while let Some(row) = rows.next()? {
        let text: String = row.get(0)?;
        assignees.push(
            parse_uuid_text(&text, "schedule_assignees.user_uuid")
                .map_err(ScheduleRepoError::InvalidData)?,
        );
    }
    Ok(assignees)
}

fn parse_entry_row(row: &Row<'_>) -> ScheduleRepoResult<ScheduleEntry> {
    let uuid_text: String = row.get("uuid")?;
    let status_text: String = row.get("status")?;
    let status = ScheduleStatus::parse(&status_text).ok_or_else(|| {
        ScheduleRepoError::InvalidData(format!(
            "invalid schedule status `{status_text}` in schedule_entries.status"
        ))
    })?;

    let job_order_id = match row.get::<_, Option<String>>("job_uuid")? {
        Some(text) => Some(
            parse_uuid_text(&text, "schedule_entries.job_uuid")
                .map_err(ScheduleRepoError::InvalidData)?,
        ),
        None => None,
    };

    Ok(ScheduleEntry {
        id: parse_uuid_text(&uuid_text, "schedule_entries.uuid")
            .map_err(ScheduleRepoError::InvalidData)?,
        job_order_id,
        title: row.get("title")?,
        location: row.get("location")?,
        starts_at: row.get("starts_at")?,
        ends_at: row.get("ends_at")?,
        status,
        notes: row.get("notes")?,
    })
}
