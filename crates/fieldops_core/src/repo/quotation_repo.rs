//! Quotation repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist quotations with their line items and lifecycle status.
//!
//! # Invariants
//! - Document numbers are allocated inside the creating transaction.
//! - Item replacement is atomic and only valid while the row is `draft`.
//! - A linked site must belong to the quotation's client.

use crate::model::client::{ClientId, SiteId};
use crate::model::line_item::{compute_totals, DocumentTotals, LineItem};
use crate::model::quotation::{Quotation, QuotationId, QuotationStatus};
use crate::repo::{
    allocate_doc_number, ensure_connection_ready, insert_line_items, load_line_items,
    normalize_list_limit, parse_uuid_text, RepoError, RepoResult, TableSpec,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;

const REQUIRED_TABLES: &[TableSpec] = &[
    ("quotations", &["uuid", "number", "client_uuid", "status"]),
    ("quotation_items", &["uuid", "quotation_uuid", "position"]),
    ("doc_counters", &["kind", "next_value"]),
];

const QUOTATION_SELECT_SQL: &str = "SELECT
    uuid,
    number,
    client_uuid,
    site_uuid,
    status,
    valid_until,
    tax_rate_bp,
    notes
FROM quotations";

/// Read model: a quotation with its items and derived totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotationDetail {
    pub quotation: Quotation,
    pub items: Vec<LineItem>,
    pub totals: DocumentTotals,
}

/// Query options for listing quotations.
#[derive(Debug, Clone, Default)]
pub struct QuotationListQuery {
    pub client_id: Option<ClientId>,
    pub status: Option<QuotationStatus>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for quotation persistence.
pub trait QuotationRepository {
    /// Persists a new draft; the returned detail carries the allocated number.
    fn create_quotation(
        &mut self,
        quotation: &Quotation,
        items: &[LineItem],
    ) -> RepoResult<QuotationDetail>;
    /// Replaces the full item set; rejected unless the row is still draft.
    fn replace_items(&mut self, id: QuotationId, items: &[LineItem]) -> RepoResult<()>;
    /// Guarded status move; returns `false` when the row left `from` already.
    fn set_status(
        &self,
        id: QuotationId,
        from: QuotationStatus,
        to: QuotationStatus,
    ) -> RepoResult<bool>;
    fn get_detail(&self, id: QuotationId) -> RepoResult<Option<QuotationDetail>>;
    fn list_quotations(&self, query: &QuotationListQuery) -> RepoResult<Vec<Quotation>>;
}

/// SQLite-backed quotation repository.
pub struct SqliteQuotationRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteQuotationRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl QuotationRepository for SqliteQuotationRepository<'_> {
    fn create_quotation(
        &mut self,
        quotation: &Quotation,
        items: &[LineItem],
    ) -> RepoResult<QuotationDetail> {
        quotation.validate()?;
        for item in items {
            item.validate()?;
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        ensure_site_belongs_to_client(&tx, quotation.site_id, quotation.client_id)?;

        let number = allocate_doc_number(&tx, "quotation", "Q")?;
        tx.execute(
            "INSERT INTO quotations
                (uuid, number, client_uuid, site_uuid, status, valid_until, tax_rate_bp, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                quotation.id.to_string(),
                number.as_str(),
                quotation.client_id.to_string(),
                quotation.site_id.map(|id| id.to_string()),
                quotation.status.as_str(),
                quotation.valid_until,
                quotation.tax_rate_bp,
                quotation.notes.as_deref(),
            ],
        )?;
        insert_line_items(&tx, "quotation_items", "quotation_uuid", quotation.id, items)?;
        tx.commit()?;

        self.get_detail(quotation.id)?.ok_or(RepoError::InvalidData(
            "created quotation not found in read-back".to_string(),
        ))
    }

    fn replace_items(&mut self, id: QuotationId, items: &[LineItem]) -> RepoResult<()> {
        for item in items {
            item.validate()?;
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM quotations WHERE uuid = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match status.as_deref() {
            None => {
                return Err(RepoError::NotFound {
                    entity: "quotation",
                    id,
                })
            }
            Some("draft") => {}
            Some(_) => {
                return Err(RepoError::Constraint(
                    "quotation items can only be replaced while draft",
                ))
            }
        }

        tx.execute(
            "DELETE FROM quotation_items WHERE quotation_uuid = ?1;",
            [id.to_string()],
        )?;
        insert_line_items(&tx, "quotation_items", "quotation_uuid", id, items)?;
        tx.execute(
            "UPDATE quotations SET updated_at = (strftime('%s', 'now') * 1000) WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn set_status(
        &self,
        id: QuotationId,
        from: QuotationStatus,
        to: QuotationStatus,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE quotations
             SET status = ?3, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1 AND status = ?2;",
            params![id.to_string(), from.as_str(), to.as_str()],
        )?;

        if changed == 1 {
            return Ok(true);
        }

        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM quotations WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::NotFound {
                entity: "quotation",
                id,
            });
        }
        Ok(false)
    }

    fn get_detail(&self, id: QuotationId) -> RepoResult<Option<QuotationDetail>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{QUOTATION_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let quotation = parse_quotation_row(row)?;
        let items = load_line_items(self.conn, "quotation_items", "quotation_uuid", id)?;
        let totals = compute_totals(&items, quotation.tax_rate_bp);
        Ok(Some(QuotationDetail {
            quotation,
            items,
            totals,
        }))
    }

    fn list_quotations(&self, query: &QuotationListQuery) -> RepoResult<Vec<Quotation>> {
        let mut sql = format!("{QUOTATION_SELECT_SQL} WHERE 1 = 1");
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
        let mut quotations = Vec::new();
        while let Some(row) = rows.next()? {
            quotations.push(parse_quotation_row(row)?);
        }
        Ok(quotations)
    }
}

/// Verifies the optional site linkage inside the creating transaction.
pub(crate) fn ensure_site_belongs_to_client(
    conn: &Connection,
    site_id: Option<SiteId>,
    client_id: ClientId,
) -> RepoResult<()> {
    let Some(site_id) = site_id else {
        return Ok(());
    };

    let owner: Option<String> = conn
        .query_row(
            "SELECT client_uuid FROM sites WHERE uuid = ?1;",
            [site_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    match owner {
        Some(owner) if owner == client_id.to_string() => Ok(()),
        Some(_) => Err(RepoError::Constraint("site does not belong to client")),
        None => Err(RepoError::NotFound {
            entity: "site",
            id: site_id,
        }),
    }
}

fn parse_quotation_row(row: &Row<'_>) -> RepoResult<Quotation> {
    let uuid_text: String = row.get("uuid")?;
    let client_text: String = row.get("client_uuid")?;
    let status_text: String = row.get("status")?;
    let status = QuotationStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid quotation status `{status_text}` in quotations.status"
        ))
    })?;

    let site_id = match row.get::<_, Option<String>>("site_uuid")? {
        Some(text) => {
            Some(parse_uuid_text(&text, "quotations.site_uuid").map_err(RepoError::InvalidData)?)
        }
        None => None,
    };

    Ok(Quotation {
        id: parse_uuid_text(&uuid_text, "quotations.uuid").map_err(RepoError::InvalidData)?,
        number: row.get("number")?,
        client_id: parse_uuid_text(&client_text, "quotations.client_uuid")
            .map_err(RepoError::InvalidData)?,
        site_id,
        status,
        valid_until: row.get("valid_until")?,
        tax_rate_bp: row.get("tax_rate_bp")?,
        notes: row.get("notes")?,
    })
}
