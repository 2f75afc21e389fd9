//! Invoice and payment endpoints.

use crate::api::error::ApiError;
use crate::api::handlers::{now_ms, parse_id, q_parsed, q_u32, q_uuid, QueryMap};
use crate::api::types::{CreateInvoiceRequest, LineItemInput, PaymentRequest, ReplaceItemsRequest};
use crate::AppState;
use fieldops_core::{
    Invoice, InvoiceDetail, InvoiceListQuery, InvoiceService, InvoiceStatus, JobService,
    LineItem, SqliteInvoiceRepository, SqliteJobRepository,
};

fn service(state: &mut AppState) -> Result<InvoiceService<SqliteInvoiceRepository<'_>>, ApiError> {
    let repo = SqliteInvoiceRepository::try_new(&mut state.conn)
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(InvoiceService::new(repo))
}

pub fn list(state: &mut AppState, query: &QueryMap) -> Result<Vec<Invoice>, ApiError> {
    let list_query = InvoiceListQuery {
        client_id: q_uuid(query, "client_id")?,
        status: q_parsed(query, "status", InvoiceStatus::parse)?,
        limit: q_u32(query, "limit")?,
        offset: q_u32(query, "offset")?.unwrap_or(0),
    };
    Ok(service(state)?.list_invoices(&list_query)?)
}

/// Creates a draft invoice, either directly against a client or billing a
/// completed job order.
pub fn create(state: &mut AppState, req: CreateInvoiceRequest) -> Result<InvoiceDetail, ApiError> {
    let items: Vec<LineItem> = req.items.into_iter().map(LineItemInput::into_item).collect();

    if let Some(job_id) = req.job_order_id {
        let job = {
            let svc = JobService::new(SqliteJobRepository::try_new(&mut state.conn)?);
            svc.get_detail(job_id)?
                .ok_or_else(|| ApiError::not_found(format!("job order {job_id} not found")))?
        };

        let mut invoice = Invoice::new(job.job.client_id, req.issued_at);
        invoice.due_at = req.due_at;
        invoice.tax_rate_bp = req.tax_rate_bp;
        invoice.notes = req.notes;
        return Ok(service(state)?.create_from_job(&job, invoice, items)?);
    }

    let client_id = req
        .client_id
        .ok_or_else(|| ApiError::bad_request("either client_id or job_order_id is required"))?;
    let mut invoice = Invoice::new(client_id, req.issued_at);
    invoice.due_at = req.due_at;
    invoice.tax_rate_bp = req.tax_rate_bp;
    invoice.notes = req.notes;
    Ok(service(state)?.create_draft(invoice, items)?)
}

pub fn get(state: &mut AppState, raw_id: &str) -> Result<InvoiceDetail, ApiError> {
    let id = parse_id(raw_id)?;
    service(state)?
        .get_detail(id)?
        .ok_or_else(|| ApiError::not_found(format!("invoice {id} not found")))
}

pub fn replace_items(
    state: &mut AppState,
    raw_id: &str,
    req: ReplaceItemsRequest,
) -> Result<InvoiceDetail, ApiError> {
    let id = parse_id(raw_id)?;
    let items: Vec<LineItem> = req.items.into_iter().map(LineItemInput::into_item).collect();
    Ok(service(state)?.replace_items(id, items)?)
}

pub fn send(state: &mut AppState, raw_id: &str) -> Result<InvoiceDetail, ApiError> {
    let id = parse_id(raw_id)?;
    Ok(service(state)?.send(id)?)
}

pub fn record_payment(
    state: &mut AppState,
    raw_id: &str,
    req: PaymentRequest,
) -> Result<InvoiceDetail, ApiError> {
    let id = parse_id(raw_id)?;
    let paid_at = req.paid_at.unwrap_or_else(now_ms);
    Ok(service(state)?.record_payment(
        id,
        req.amount_cents,
        req.method,
        req.reference,
        paid_at,
        req.notes,
    )?)
}

pub fn void(state: &mut AppState, raw_id: &str) -> Result<InvoiceDetail, ApiError> {
    let id = parse_id(raw_id)?;
    Ok(service(state)?.void(id)?)
}
