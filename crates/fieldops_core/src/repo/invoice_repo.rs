//! Invoice repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist invoices, line items and payments.
//! - Own the payment-recording transaction and status recomputation.
//!
//! # Invariants
//! - The sum of recorded payments never exceeds the invoice total; the
//!   balance check and the insert share one immediate transaction.
//! - Status is recomputed from payment totals after every payment.
//! - Void is only reachable with zero payments on file.

use crate::db::DbError;
use crate::model::client::ClientId;
use crate::model::invoice::{
    status_from_payments, Invoice, InvoiceId, InvoiceStatus, Payment, PaymentMethod,
};
use crate::model::line_item::{compute_totals, DocumentTotals, LineItem};
use crate::model::ValidationError;
use crate::repo::{
    allocate_doc_number, ensure_connection_ready, insert_line_items, load_line_items,
    normalize_list_limit, parse_uuid_text, ReadinessError, RepoError, TableSpec,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const REQUIRED_TABLES: &[TableSpec] = &[
    ("invoices", &["uuid", "number", "client_uuid", "status"]),
    ("invoice_items", &["uuid", "invoice_uuid", "position"]),
    ("invoice_payments", &["uuid", "invoice_uuid", "amount_cents"]),
    ("doc_counters", &["kind", "next_value"]),
];

const INVOICE_SELECT_SQL: &str = "SELECT
    uuid,
    number,
    client_uuid,
    job_uuid,
    status,
    issued_at,
    due_at,
    tax_rate_bp,
    notes
FROM invoices";

pub type InvoiceRepoResult<T> = Result<T, InvoiceRepoError>;

/// Errors from invoice repository operations.
#[derive(Debug)]
pub enum InvoiceRepoError {
    Db(DbError),
    NotFound(InvoiceId),
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
    /// Items can only change while the invoice is a draft.
    ItemsLocked(InvoiceId),
    /// The invoice is not in a state that accepts payments.
    PaymentNotAllowed {
        invoice: InvoiceId,
        status: InvoiceStatus,
    },
    /// The payment would push the paid total above the invoice total.
    Overpayment {
        invoice: InvoiceId,
        attempted_cents: i64,
        balance_cents: i64,
    },
    /// Void requested for an invoice that already has payments.
    VoidWithPayments(InvoiceId),
    /// Void requested from a status other than draft/sent.
    VoidNotAllowed {
        invoice: InvoiceId,
        status: InvoiceStatus,
    },
    /// Guarded status move found the row in a different state.
    StaleStatus(InvoiceId),
    /// Linked job/site does not match the invoice's client.
    LinkedDocumentMismatch(&'static str),
}

impl Display for InvoiceRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "invoice not found: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted invoice data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "invoice repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "invoice repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "invoice repository requires column `{column}` in table `{table}`"
            ),
            Self::ItemsLocked(id) => {
                write!(f, "invoice {id} is not a draft; items are locked")
            }
            Self::PaymentNotAllowed { invoice, status } => write!(
                f,
                "invoice {invoice} does not accept payments in status `{}`",
                status.as_str()
            ),
            Self::Overpayment {
                invoice,
                attempted_cents,
                balance_cents,
            } => write!(
                f,
                "payment of {attempted_cents} cents exceeds open balance {balance_cents} on invoice {invoice}"
            ),
            Self::VoidWithPayments(id) => {
                write!(f, "invoice {id} has payments and cannot be voided")
            }
            Self::VoidNotAllowed { invoice, status } => write!(
                f,
                "invoice {invoice} cannot be voided from status `{}`",
                status.as_str()
            ),
            Self::StaleStatus(id) => {
                write!(f, "invoice {id} changed status concurrently")
            }
            Self::LinkedDocumentMismatch(message) => write!(f, "{message}"),
        }
    }
}

impl Error for InvoiceRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for InvoiceRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for InvoiceRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ValidationError> for InvoiceRepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ReadinessError> for InvoiceRepoError {
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

impl From<RepoError> for InvoiceRepoError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Db(err) => Self::Db(err),
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { .. } => Self::LinkedDocumentMismatch("linked row not found"),
            RepoError::Constraint(message) => Self::LinkedDocumentMismatch(message),
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

/// Read model: an invoice with items, payments and derived money state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<LineItem>,
    pub payments: Vec<Payment>,
    pub totals: DocumentTotals,
    pub paid_cents: i64,
    pub balance_cents: i64,
}

/// Query options for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct InvoiceListQuery {
    pub client_id: Option<ClientId>,
    pub status: Option<InvoiceStatus>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for invoice persistence.
pub trait InvoiceRepository {
    /// Persists a new draft; the returned detail carries the number.
    fn create_invoice(
        &mut self,
        invoice: &Invoice,
        items: &[LineItem],
    ) -> InvoiceRepoResult<InvoiceDetail>;
    /// Replaces the full item set; rejected unless the row is still draft.
    fn replace_items(&mut self, id: InvoiceId, items: &[LineItem]) -> InvoiceRepoResult<()>;
    /// Guarded draft -> sent move.
    fn mark_sent(&self, id: InvoiceId) -> InvoiceRepoResult<()>;
    /// Records a payment and recomputes status atomically.
    fn record_payment(&mut self, payment: &Payment) -> InvoiceRepoResult<InvoiceDetail>;
    /// Voids a draft/sent invoice with zero payments.
    fn void_invoice(&mut self, id: InvoiceId) -> InvoiceRepoResult<()>;
    fn get_detail(&self, id: InvoiceId) -> InvoiceRepoResult<Option<InvoiceDetail>>;
    fn list_invoices(&self, query: &InvoiceListQuery) -> InvoiceRepoResult<Vec<Invoice>>;
}

/// SQLite-backed invoice repository.
pub struct SqliteInvoiceRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteInvoiceRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> InvoiceRepoResult<Self> {
        ensure_connection_ready(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }
}

impl InvoiceRepository for SqliteInvoiceRepository<'_> {
    fn create_invoice(
        &mut self,
        invoice: &Invoice,
        items: &[LineItem],
    ) -> InvoiceRepoResult<InvoiceDetail> {
        invoice.validate()?;
        for item in items {
            item.validate()?;
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(job_id) = invoice.job_order_id {
            ensure_job_belongs_to_client(&tx, job_id, invoice.client_id)?;
        }

        let number = allocate_doc_number(&tx, "invoice", "INV")?;
        tx.execute(
            "INSERT INTO invoices
                (uuid, number, client_uuid, job_uuid, status, issued_at, due_at, tax_rate_bp, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                invoice.id.to_string(),
                number.as_str(),
                invoice.client_id.to_string(),
                invoice.job_order_id.map(|id| id.to_string()),
                invoice.status.as_str(),
                invoice.issued_at,
                invoice.due_at,
                invoice.tax_rate_bp,
                invoice.notes.as_deref(),
            ],
        )?;
        insert_line_items(&tx, "invoice_items", "invoice_uuid", invoice.id, items)?;
        tx.commit()?;

        self.get_detail(invoice.id)?.ok_or(InvoiceRepoError::InvalidData(
            "created invoice not found in read-back".to_string(),
        ))
    }

    fn replace_items(&mut self, id: InvoiceId, items: &[LineItem]) -> InvoiceRepoResult<()> {
        for item in items {
            item.validate()?;
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        match load_status(&tx, id)? {
            None => return Err(InvoiceRepoError::NotFound(id)),
            Some(InvoiceStatus::Draft) => {}
            Some(_) => return Err(InvoiceRepoError::ItemsLocked(id)),
        }

        tx.execute(
            "DELETE FROM invoice_items WHERE invoice_uuid = ?1;",
            [id.to_string()],
        )?;
        insert_line_items(&tx, "invoice_items", "invoice_uuid", id, items)?;
        tx.execute(
            "UPDATE invoices SET updated_at = (strftime('%s', 'now') * 1000) WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn mark_sent(&self, id: InvoiceId) -> InvoiceRepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE invoices
             SET status = 'sent', updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1 AND status = 'draft';",
            [id.to_string()],
        )?;

        if changed == 1 {
            return Ok(());
        }

        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM invoices WHERE uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            Err(InvoiceRepoError::NotFound(id))
        } else {
            Err(InvoiceRepoError::StaleStatus(id))
        }
    }

    fn record_payment(&mut self, payment: &Payment) -> InvoiceRepoResult<InvoiceDetail> {
        payment.validate()?;
        let id = payment.invoice_id;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(status) = load_status(&tx, id)? else {
            return Err(InvoiceRepoError::NotFound(id));
        };
        if !status.accepts_payments() {
            return Err(InvoiceRepoError::PaymentNotAllowed {
                invoice: id,
                status,
            });
        }

        let tax_rate_bp: u32 = tx.query_row(
            "SELECT tax_rate_bp FROM invoices WHERE uuid = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )?;
        let items = load_line_items(&tx, "invoice_items", "invoice_uuid", id)?;
        let totals = compute_totals(&items, tax_rate_bp);
        let paid_cents = load_paid_cents(&tx, id)?;

        let balance_cents = totals.total_cents - paid_cents;
        if payment.amount_cents > balance_cents {
            return Err(InvoiceRepoError::Overpayment {
                invoice: id,
                attempted_cents: payment.amount_cents,
                balance_cents,
            });
        }

        tx.execute(
            "INSERT INTO invoice_payments
                (uuid, invoice_uuid, amount_cents, method, reference, paid_at, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                payment.id.to_string(),
                id.to_string(),
                payment.amount_cents,
                payment.method.as_str(),
                payment.reference.as_deref(),
                payment.paid_at,
                payment.notes.as_deref(),
            ],
        )?;

        let new_status =
            status_from_payments(totals.total_cents, paid_cents + payment.amount_cents);
        tx.execute(
            "UPDATE invoices
             SET status = ?2, updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), new_status.as_str()],
        )?;
        tx.commit()?;

        self.get_detail(id)?.ok_or(InvoiceRepoError::InvalidData(
            "invoice missing after payment".to_string(),
        ))
    }

    fn void_invoice(&mut self, id: InvoiceId) -> InvoiceRepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(status) = load_status(&tx, id)? else {
            return Err(InvoiceRepoError::NotFound(id));
        };
        if !matches!(status, InvoiceStatus::Draft | InvoiceStatus::Sent) {
            return Err(InvoiceRepoError::VoidNotAllowed {
                invoice: id,
                status,
            });
        }
        if load_paid_cents(&tx, id)? > 0 {
            return Err(InvoiceRepoError::VoidWithPayments(id));
        }

        tx.execute(
            "UPDATE invoices
             SET status = 'void', updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_detail(&self, id: InvoiceId) -> InvoiceRepoResult<Option<InvoiceDetail>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{INVOICE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let invoice = parse_invoice_row(row)?;
        let items = load_line_items(self.conn, "invoice_items", "invoice_uuid", id)?;
        let payments = load_payments(self.conn, id)?;
        let totals = compute_totals(&items, invoice.tax_rate_bp);
        let paid_cents: i64 = payments.iter().map(|payment| payment.amount_cents).sum();
        Ok(Some(InvoiceDetail {
            invoice,
            items,
            payments,
            totals,
            paid_cents,
            balance_cents: totals.total_cents - paid_cents,
        }))
    }

    fn list_invoices(&self, query: &InvoiceListQuery) -> InvoiceRepoResult<Vec<Invoice>> {
        let mut sql = format!("{INVOICE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(client_id) = query.client_id {
            sql.push_str(" AND client_uuid = ?");
            bind_values.push(Value::Text(client_id.to_string()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }

        sql.push_str(" ORDER BY issued_at DESC, uuid ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_list_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut invoices = Vec::new();
        while let Some(row) = rows.next()? {
            invoices.push(parse_invoice_row(row)?);
        }
        Ok(invoices)
    }
}

fn ensure_job_belongs_to_client(
    conn: &Connection,
    job_id: Uuid,
    client_id: ClientId,
) -> InvoiceRepoResult<()> {
    let owner: Option<String> = conn
        .query_row(
            "SELECT client_uuid FROM job_orders WHERE uuid = ?1;",
            [job_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    match owner {
        Some(owner) if owner == client_id.to_string() => Ok(()),
        Some(_) => Err(InvoiceRepoError::LinkedDocumentMismatch(
            "job order does not belong to client",
        )),
        None => Err(InvoiceRepoError::LinkedDocumentMismatch(
            "job order not found",
        )),
    }
}

fn load_status(conn: &Connection, id: InvoiceId) -> InvoiceRepoResult<Option<InvoiceStatus>> {
    let status_text: Option<String> = conn
        .query_row(
            "SELECT status FROM invoices WHERE uuid = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match status_text {
        None => Ok(None),
        Some(text) => InvoiceStatus::parse(&text)
            .map(Some)
            .ok_or_else(|| {
                InvoiceRepoError::InvalidData(format!(
                    "invalid invoice status `{text}` in invoices.status"
                ))
            }),
    }
}

fn load_paid_cents(conn: &Connection, id: InvoiceId) -> InvoiceRepoResult<i64> {
    let paid: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount_cents), 0) FROM invoice_payments WHERE invoice_uuid = ?1;",
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(paid)
}

fn load_payments(conn: &Connection, id: InvoiceId) -> InvoiceRepoResult<Vec<Payment>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, invoice_uuid, amount_cents, method, reference, paid_at, notes
         FROM invoice_payments
         WHERE invoice_uuid = ?1
         ORDER BY paid_at ASC, uuid ASC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut payments = Vec::new();
    while let Some(row) = rows.next()? {
        payments.push(parse_payment_row(row)?);
    }
    Ok(payments)
}

fn parse_payment_row(row: &Row<'_>) -> InvoiceRepoResult<Payment> {
    let uuid_text: String = row.get("uuid")?;
    let invoice_text: String = row.get("invoice_uuid")?;
    let method_text: String = row.get("method")?;
    let method = PaymentMethod::parse(&method_text).ok_or_else(|| {
        InvoiceRepoError::InvalidData(format!(
            "invalid payment method `{method_text}` in invoice_payments.method"
        ))
    })?;

    Ok(Payment {
        id: parse_uuid_text(&uuid_text, "invoice_payments.uuid")
            .map_err(InvoiceRepoError::InvalidData)?,
        invoice_id: parse_uuid_text(&invoice_text, "invoice_payments.invoice_uuid")
            .map_err(InvoiceRepoError::InvalidData)?,
        amount_cents: row.get("amount_cents")?,
        method,
        reference: row.get("reference")?,
        paid_at: row.get("paid_at")?,
        notes: row.get("notes")?,
    })
}

fn parse_invoice_row(row: &Row<'_>) -> InvoiceRepoResult<Invoice> {
    let uuid_text: String = row.get("uuid")?;
    let client_text: String = row.get("client_uuid")?;
    let status_text: String = row.get("status")?;
    let status = InvoiceStatus::parse(&status_text).ok_or_else(|| {
        InvoiceRepoError::InvalidData(format!(
            "invalid invoice status `{status_text}` in invoices.status"
        ))
    })?;

    let job_order_id = match row.get::<_, Option<String>>("job_uuid")? {
        Some(text) => Some(
            parse_uuid_text(&text, "invoices.job_uuid").map_err(InvoiceRepoError::InvalidData)?,
        ),
        None => None,
    };

    Ok(Invoice {
        id: parse_uuid_text(&uuid_text, "invoices.uuid").map_err(InvoiceRepoError::InvalidData)?,
        number: row.get("number")?,
        client_id: parse_uuid_text(&client_text, "invoices.client_uuid")
            .map_err(InvoiceRepoError::InvalidData)?,
        job_order_id,
        status,
        issued_at: row.get("issued_at")?,
        due_at: row.get("due_at")?,
        tax_rate_bp: row.get("tax_rate_bp")?,
        notes: row.get("notes")?,
    })
}
