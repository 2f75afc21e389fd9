//! Quotation endpoints.

use crate::api::error::ApiError;
use crate::api::handlers::{parse_id, q_parsed, q_u32, q_uuid, QueryMap};
use crate::api::types::{CreateQuotationRequest, LineItemInput, ReplaceItemsRequest};
use crate::AppState;
use fieldops_core::{
    LineItem, Quotation, QuotationDetail, QuotationListQuery, QuotationService, QuotationStatus,
    SqliteQuotationRepository,
};

fn service(
    state: &mut AppState,
) -> Result<QuotationService<SqliteQuotationRepository<'_>>, ApiError> {
    Ok(QuotationService::new(SqliteQuotationRepository::try_new(
        &mut state.conn,
    )?))
}

pub fn list(state: &mut AppState, query: &QueryMap) -> Result<Vec<Quotation>, ApiError> {
    let list_query = QuotationListQuery {
        client_id: q_uuid(query, "client_id")?,
        status: q_parsed(query, "status", QuotationStatus::parse)?,
        limit: q_u32(query, "limit")?,
        offset: q_u32(query, "offset")?.unwrap_or(0),
    };
    Ok(service(state)?.list_quotations(&list_query)?)
}

pub fn create(
    state: &mut AppState,
    req: CreateQuotationRequest,
) -> Result<QuotationDetail, ApiError> {
    let mut quotation = Quotation::new(req.client_id);
    quotation.site_id = req.site_id;
    quotation.tax_rate_bp = req.tax_rate_bp;
    quotation.valid_until = req.valid_until;
    quotation.notes = req.notes;

    let items: Vec<LineItem> = req
        .items
        .into_iter()
        .map(LineItemInput::into_item)
        .collect();
    Ok(service(state)?.create_draft(quotation, items)?)
}

pub fn get(state: &mut AppState, raw_id: &str) -> Result<QuotationDetail, ApiError> {
    let id = parse_id(raw_id)?;
    service(state)?
        .get_detail(id)?
        .ok_or_else(|| ApiError::not_found(format!("quotation {id} not found")))
}

pub fn replace_items(
    state: &mut AppState,
    raw_id: &str,
    req: ReplaceItemsRequest,
) -> Result<QuotationDetail, ApiError> {
    let id = parse_id(raw_id)?;
    let items: Vec<LineItem> = req
        .items
        .into_iter()
        .map(LineItemInput::into_item)
        .collect();
    Ok(service(state)?.replace_items(id, items)?)
}

pub fn send(state: &mut AppState, raw_id: &str) -> Result<QuotationDetail, ApiError> {
    let id = parse_id(raw_id)?;
    Ok(service(state)?.send(id)?)
}

pub fn accept(state: &mut AppState, raw_id: &str) -> Result<QuotationDetail, ApiError> {
    let id = parse_id(raw_id)?;
    Ok(service(state)?.accept(id)?)
}

pub fn decline(state: &mut AppState, raw_id: &str) -> Result<QuotationDetail, ApiError> {
    let id = parse_id(raw_id)?;
    Ok(service(state)?.decline(id)?)
}

pub fn expire(state: &mut AppState, raw_id: &str) -> Result<QuotationDetail, ApiError> {
    let id = parse_id(raw_id)?;
    Ok(service(state)?.expire(id)?)
}
