//! Lead repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist the lead pipeline and the lead-to-client conversion.
//!
//! # Invariants
//! - Conversion inserts the client (and optional site) and marks the lead
//!   converted in a single immediate transaction.
//! - A lead that is already `converted` or `lost` cannot convert again.

use crate::model::client::{Client, Site};
use crate::model::lead::{Lead, LeadId, LeadStatus};
use crate::repo::{
    ensure_connection_ready, normalize_list_limit, parse_uuid_text, RepoError, RepoResult,
    TableSpec,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, TransactionBehavior};

const REQUIRED_TABLES: &[TableSpec] = &[
    ("leads", &["uuid", "name", "status", "converted_client_uuid"]),
    ("clients", &["uuid", "name"]),
    ("sites", &["uuid", "client_uuid"]),
];

const LEAD_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    email,
    phone,
    source,
    address,
    notes,
    status,
    converted_client_uuid
FROM leads";

/// Query options for listing leads.
#[derive(Debug, Clone, Default)]
pub struct LeadListQuery {
    pub status: Option<LeadStatus>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for lead persistence.
pub trait LeadRepository {
    fn create_lead(&self, lead: &Lead) -> RepoResult<LeadId>;
    fn update_lead(&self, lead: &Lead) -> RepoResult<()>;
    fn set_status(&self, id: LeadId, status: LeadStatus) -> RepoResult<()>;
    fn get_lead(&self, id: LeadId) -> RepoResult<Option<Lead>>;
    fn list_leads(&self, query: &LeadListQuery) -> RepoResult<Vec<Lead>>;
    /// Converts the lead into the given client (+ optional site) atomically.
    fn convert(&mut self, id: LeadId, client: &Client, site: Option<&Site>) -> RepoResult<()>;
}

/// SQLite-backed lead repository.
pub struct SqliteLeadRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteLeadRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl LeadRepository for SqliteLeadRepository<'_> {
    fn create_lead(&self, lead: &Lead) -> RepoResult<LeadId> {
        lead.validate()?;

        self.conn.execute(
            "INSERT INTO leads (uuid, name, email, phone, source, address, notes, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                lead.id.to_string(),
                lead.name.as_str(),
                lead.email.as_deref(),
                lead.phone.as_deref(),
                lead.source.as_deref(),
                lead.address.as_deref(),
                lead.notes.as_deref(),
                lead.status.as_str(),
            ],
        )?;

        Ok(lead.id)
    }

    fn update_lead(&self, lead: &Lead) -> RepoResult<()> {
        lead.validate()?;

        let changed = self.conn.execute(
            "UPDATE leads
             SET
                name = ?2,
                email = ?3,
                phone = ?4,
                source = ?5,
                address = ?6,
                notes = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![
                lead.id.to_string(),
                lead.name.as_str(),
                lead.email.as_deref(),
                lead.phone.as_deref(),
                lead.source.as_deref(),
                lead.address.as_deref(),
                lead.notes.as_deref(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "lead",
                id: lead.id,
            });
        }

        Ok(())
    }

    fn set_status(&self, id: LeadId, status: LeadStatus) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE leads
             SET status = ?2, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), status.as_str()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound { entity: "lead", id });
        }

        Ok(())
    }

    fn get_lead(&self, id: LeadId) -> RepoResult<Option<Lead>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{LEAD_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_lead_row(row)?));
        }
        Ok(None)
    }

    fn list_leads(&self, query: &LeadListQuery) -> RepoResult<Vec<Lead>> {
        let mut sql = format!("{LEAD_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

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
        let mut leads = Vec::new();
        while let Some(row) = rows.next()? {
            leads.push(parse_lead_row(row)?);
        }
        Ok(leads)
    }

    fn convert(&mut self, id: LeadId, client: &Client, site: Option<&Site>) -> RepoResult<()> {
        client.validate()?;
        if let Some(site) = site {
            site.validate()?;
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO clients (uuid, name, contact_name, email, phone, archived)
             VALUES (?1, ?2, ?3, ?4, ?5, 0);",
            params![
                client.id.to_string(),
                client.name.as_str(),
                client.contact_name.as_deref(),
                client.email.as_deref(),
                client.phone.as_deref(),
            ],
        )?;

        if let Some(site) = site {
            tx.execute(
                "INSERT INTO sites (uuid, client_uuid, label, address, access_notes)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    site.id.to_string(),
                    client.id.to_string(),
                    site.label.as_str(),
                    site.address.as_str(),
                    site.access_notes.as_deref(),
                ],
            )?;
        }

        // The status guard re-runs inside the transaction, so two racing
        // conversions cannot both succeed.
        let changed = tx.execute(
            "UPDATE leads
             SET
                status = 'converted',
                converted_client_uuid = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND status NOT IN ('converted', 'lost');",
            params![id.to_string(), client.id.to_string()],
        )?;

        if changed == 0 {
            let exists: i64 = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM leads WHERE uuid = ?1);",
                [id.to_string()],
                |row| row.get(0),
            )?;
            return if exists == 1 {
                Err(RepoError::Constraint("lead is already converted or lost"))
            } else {
                Err(RepoError::NotFound { entity: "lead", id })
            };
        }

        tx.commit()?;
        Ok(())
    }
}

fn parse_lead_row(row: &Row<'_>) -> RepoResult<Lead> {
    let uuid_text: String = row.get("uuid")?;
    let status_text: String = row.get("status")?;
    let status = LeadStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid lead status `{status_text}` in leads.status"))
    })?;

    let converted_client_id = match row.get::<_, Option<String>>("converted_client_uuid")? {
        Some(text) => Some(
            parse_uuid_text(&text, "leads.converted_client_uuid")
                .map_err(RepoError::InvalidData)?,
        ),
        None => None,
    };

    Ok(Lead {
        id: parse_uuid_text(&uuid_text, "leads.uuid").map_err(RepoError::InvalidData)?,
        name: row.get("name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        source: row.get("source")?,
        address: row.get("address")?,
        notes: row.get("notes")?,
        status,
        converted_client_id,
    })
}
