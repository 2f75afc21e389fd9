//! Job order repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist job orders with crew assignments and status history.
//!
//! # Invariants
//! - Status moves are guarded updates; every applied move appends one
//!   history row in the same transaction.
//! - Crew replacement is atomic and only accepts active users.
//! - Completed and in-progress jobs are never deleted.

use crate::model::job_order::{JobOrder, JobOrderId, JobStatus, JobStatusUpdate};
use crate::model::user::UserId;
use crate::repo::quotation_repo::ensure_site_belongs_to_client;
use crate::repo::{
    allocate_doc_number, ensure_connection_ready, normalize_list_limit, parse_uuid_text,
    RepoError, RepoResult, TableSpec,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

const REQUIRED_TABLES: &[TableSpec] = &[
    ("job_orders", &["uuid", "number", "client_uuid", "status"]),
    ("job_assignments", &["job_uuid", "user_uuid"]),
    ("job_status_updates", &["uuid", "job_uuid", "changed_by"]),
    ("users", &["uuid", "active"]),
    ("doc_counters", &["kind", "next_value"]),
];

const JOB_SELECT_SQL: &str = "SELECT
    uuid,
    number,
    client_uuid,
    site_uuid,
    quotation_uuid,
    title,
    description,
    status
FROM job_orders";

/// Read model: a job order with crew and status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDetail {
    pub job: JobOrder,
    /// Assigned crew, sorted by user id for deterministic output.
    pub crew: Vec<UserId>,
    /// Status history, oldest first.
    pub history: Vec<JobStatusUpdate>,
}

/// Query options for listing job orders.
#[derive(Debug, Clone, Default)]
pub struct JobListQuery {
    pub client_id: Option<Uuid>,
    pub status: Option<JobStatus>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for job order persistence.
pub trait JobRepository {
    /// Persists a new pending job; the returned detail carries the number.
    fn create_job(&mut self, job: &JobOrder) -> RepoResult<JobDetail>;
    fn update_info(
        &self,
        id: JobOrderId,
        title: &str,
        description: Option<&str>,
    ) -> RepoResult<()>;
    /// Applies `from -> to` and appends a history row atomically.
    ///
    /// Returns `false` when the job has concurrently left `from`.
    fn apply_transition(
        &mut self,
        id: JobOrderId,
        from: JobStatus,
        to: JobStatus,
        note: Option<&str>,
        changed_by: UserId,
    ) -> RepoResult<bool>;
    /// Replaces the full crew set atomically.
    fn replace_crew(&mut self, id: JobOrderId, crew: &[UserId]) -> RepoResult<()>;
    fn get_detail(&self, id: JobOrderId) -> RepoResult<Option<JobDetail>>;
    fn list_jobs(&self, query: &JobListQuery) -> RepoResult<Vec<JobOrder>>;
    /// Deletes the job and its dependents; returns `false` when the
    /// current status forbids deletion.
    fn delete_job(&mut self, id: JobOrderId) -> RepoResult<bool>;
}

/// SQLite-backed job order repository.
pub struct SqliteJobRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteJobRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl JobRepository for SqliteJobRepository<'_> {
    fn create_job(&mut self, job: &JobOrder) -> RepoResult<JobDetail> {
        job.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        ensure_site_belongs_to_client(&tx, job.site_id, job.client_id)?;

        let number = allocate_doc_number(&tx, "job_order", "JOB")?;
        tx.execute(
            "INSERT INTO job_orders
                (uuid, number, client_uuid, site_uuid, quotation_uuid, title, description, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                job.id.to_string(),
                number.as_str(),
                job.client_id.to_string(),
                job.site_id.map(|id| id.to_string()),
                job.quotation_id.map(|id| id.to_string()),
                job.title.as_str(),
                job.description.as_deref(),
                job.status.as_str(),
            ],
        )?;
        tx.commit()?;

        self.get_detail(job.id)?.ok_or(RepoError::InvalidData(
            "created job order not found in read-back".to_string(),
        ))
    }

    fn update_info(
        &self,
        id: JobOrderId,
        title: &str,
        description: Option<&str>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE job_orders
             SET
                title = ?2,
                description = ?3,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), title, description],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "job order",
                id,
            });
        }

        Ok(())
    }

    fn apply_transition(
        &mut self,
        id: JobOrderId,
        from: JobStatus,
        to: JobStatus,
        note: Option<&str>,
        changed_by: UserId,
    ) -> RepoResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
            "UPDATE job_orders
             SET status = ?3, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1 AND status = ?2;",
            params![id.to_string(), from.as_str(), to.as_str()],
        )?;

        if changed == 0 {
            let exists: i64 = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM job_orders WHERE uuid = ?1);",
                [id.to_string()],
                |row| row.get(0),
            )?;
            if exists == 0 {
                return Err(RepoError::NotFound {
                    entity: "job order",
                    id,
                });
            }
            return Ok(false);
        }

        tx.execute(
            "INSERT INTO job_status_updates (uuid, job_uuid, from_status, to_status, note, changed_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                Uuid::new_v4().to_string(),
                id.to_string(),
                from.as_str(),
                to.as_str(),
                note,
                changed_by.to_string(),
            ],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn replace_crew(&mut self, id: JobOrderId, crew: &[UserId]) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM job_orders WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::NotFound {
                entity: "job order",
                id,
            });
        }

        ensure_users_active(&tx, crew)?;

        tx.execute(
            "DELETE FROM job_assignments WHERE job_uuid = ?1;",
            [id.to_string()],
        )?;
        for user_id in crew {
            tx.execute(
                "INSERT OR IGNORE INTO job_assignments (job_uuid, user_uuid) VALUES (?1, ?2);",
                params![id.to_string(), user_id.to_string()],
            )?;
        }
        tx.execute(
            "UPDATE job_orders SET updated_at = (strftime('%s', 'now') * 1000) WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_detail(&self, id: JobOrderId) -> RepoResult<Option<JobDetail>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{JOB_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let job = parse_job_row(row)?;
        let crew = load_crew(self.conn, id)?;
        let history = load_history(self.conn, id)?;
        Ok(Some(JobDetail { job, crew, history }))
    }

    fn list_jobs(&self, query: &JobListQuery) -> RepoResult<Vec<JobOrder>> {
        let mut sql = format!("{JOB_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(client_id) = query.client_id {
            sql.push_str(" AND client_uuid = ?");
            bind_values.push(Value::Text(client_id.to_string()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }

        sql.push_str(" ORDER BY updated_at DESC, uuid ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_list_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut jobs = Vec::new();
        while let Some(row) = rows.next()? {
            jobs.push(parse_job_row(row)?);
        }
        Ok(jobs)
    }

    fn delete_job(&mut self, id: JobOrderId) -> RepoResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let status_text: Option<String> = tx
            .query_row(
                "SELECT status FROM job_orders WHERE uuid = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(status_text) = status_text else {
            return Err(RepoError::NotFound {
                entity: "job order",
                id,
            });
        };
        let status = JobStatus::parse(&status_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid job status `{status_text}` in job_orders.status"
            ))
        })?;
        if !status.deletable() {
            return Ok(false);
        }

        // Assignments, history and schedule entries go with the job via
        // ON DELETE CASCADE.
        tx.execute("DELETE FROM job_orders WHERE uuid = ?1;", [id.to_string()])?;
        tx.commit()?;
        Ok(true)
    }
}

/// Rejects unknown or inactive users inside the calling transaction.
pub(crate) fn ensure_users_active(conn: &Connection, users: &[UserId]) -> RepoResult<()> {
    for user_id in users {
        let active: Option<i64> = conn
            .query_row(
                "SELECT active FROM users WHERE uuid = ?1;",
                [user_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match active {
            Some(1) => {}
            Some(_) => return Err(RepoError::Constraint("user is deactivated")),
            None => {
                return Err(RepoError::NotFound {
                    entity: "user",
                    id: *user_id,
                })
            }
        }
    }
    Ok(())
}

fn load_crew(conn: &Connection, id: JobOrderId) -> RepoResult<Vec<UserId>> {
    let mut stmt = conn.prepare(
        "SELECT user_uuid FROM job_assignments WHERE job_uuid = ?1 ORDER BY user_uuid ASC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut crew = Vec::new();
    while let Some(row) = rows.next()? {
        let text: String = row.get(0)?;
        crew.push(
            parse_uuid_text(&text, "job_assignments.user_uuid").map_err(RepoError::InvalidData)?,
        );
    }
    Ok(crew)
}

fn load_history(conn: &Connection, id: JobOrderId) -> RepoResult<Vec<JobStatusUpdate>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, job_uuid, from_status, to_status, note, changed_by, changed_at
         FROM job_status_updates
         WHERE job_uuid = ?1
         ORDER BY changed_at ASC, uuid ASC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut history = Vec::new();
    while let Some(row) = rows.next()? {
        history.push(parse_history_row(row)?);
    }
    Ok(history)
}

fn parse_history_row(row: &Row<'_>) -> RepoResult<JobStatusUpdate> {
    let uuid_text: String = row.get("uuid")?;
    let job_text: String = row.get("job_uuid")?;
    let changed_by_text: String = row.get("changed_by")?;
    let from_text: String = row.get("from_status")?;
    let to_text: String = row.get("to_status")?;

    let parse_status = |value: &str| {
        JobStatus::parse(value).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid job status `{value}` in job_status_updates"))
        })
    };

    Ok(JobStatusUpdate {
        id: parse_uuid_text(&uuid_text, "job_status_updates.uuid")
            .map_err(RepoError::InvalidData)?,
        job_order_id: parse_uuid_text(&job_text, "job_status_updates.job_uuid")
            .map_err(RepoError::InvalidData)?,
        from_status: parse_status(&from_text)?,
        to_status: parse_status(&to_text)?,
        note: row.get("note")?,
        changed_by: parse_uuid_text(&changed_by_text, "job_status_updates.changed_by")
            .map_err(RepoError::InvalidData)?,
        changed_at: row.get("changed_at")?,
    })
}

fn parse_job_row(row: &Row<'_>) -> RepoResult<JobOrder> {
    let uuid_text: String = row.get("uuid")?;
    let client_text: String = row.get("client_uuid")?;
    let status_text: String = row.get("status")?;
    let status = JobStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid job status `{status_text}` in job_orders.status"
        ))
    })?;

    let site_id = match row.get::<_, Option<String>>("site_uuid")? {
        Some(text) => {
            Some(parse_uuid_text(&text, "job_orders.site_uuid").map_err(RepoError::InvalidData)?)
        }
        None => None,
    };
    let quotation_id = match row.get::<_, Option<String>>("quotation_uuid")? {
        Some(text) => Some(
            parse_uuid_text(&text, "job_orders.quotation_uuid").map_err(RepoError::InvalidData)?,
        ),
        None => None,
    };

    Ok(JobOrder {
        id: parse_uuid_text(&uuid_text, "job_orders.uuid").map_err(RepoError::InvalidData)?,
        number: row.get("number")?,
        client_id: parse_uuid_text(&client_text, "job_orders.client_uuid")
            .map_err(RepoError::InvalidData)?,
        site_id,
        quotation_id,
        title: row.get("title")?,
        description: row.get("description")?,
        status,
    })
}
