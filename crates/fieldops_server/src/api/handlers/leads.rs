//! Lead pipeline endpoints.

use crate::api::error::ApiError;
use crate::api::handlers::{parse_id, q_parsed, q_u32, QueryMap};
use crate::api::types::{ConvertLeadPayload, LeadPayload, LeadStatusRequest};
use crate::AppState;
use fieldops_core::service::lead_service::ConvertLeadRequest;
use fieldops_core::{
    Lead, LeadListQuery, LeadService, LeadStatus, SqliteLeadRepository,
};
use serde::Serialize;

fn service(state: &mut AppState) -> Result<LeadService<SqliteLeadRepository<'_>>, ApiError> {
    Ok(LeadService::new(SqliteLeadRepository::try_new(
        &mut state.conn,
    )?))
}

/// Conversion response: the converted lead plus the new client/site ids.
#[derive(Debug, Serialize)]
pub struct ConversionData {
    pub lead: Lead,
    pub client: fieldops_core::Client,
    pub site: Option<fieldops_core::Site>,
}

pub fn list(state: &mut AppState, query: &QueryMap) -> Result<Vec<Lead>, ApiError> {
    let list_query = LeadListQuery {
        status: q_parsed(query, "status", LeadStatus::parse)?,
        limit: q_u32(query, "limit")?,
        offset: q_u32(query, "offset")?.unwrap_or(0),
    };
    Ok(service(state)?.list_leads(&list_query)?)
}

pub fn create(state: &mut AppState, payload: LeadPayload) -> Result<Lead, ApiError> {
    let mut lead = Lead::new(payload.name);
    lead.email = payload.email;
    lead.phone = payload.phone;
    lead.source = payload.source;
    lead.address = payload.address;
    lead.notes = payload.notes;
    Ok(service(state)?.create_lead(lead)?)
}

pub fn get(state: &mut AppState, raw_id: &str) -> Result<Lead, ApiError> {
    let id = parse_id(raw_id)?;
    service(state)?
        .get_lead(id)?
        .ok_or_else(|| ApiError::not_found(format!("lead {id} not found")))
}

pub fn update(state: &mut AppState, raw_id: &str, payload: LeadPayload) -> Result<Lead, ApiError> {
    let id = parse_id(raw_id)?;
    let svc = service(state)?;
    let mut lead = svc
        .get_lead(id)?
        .ok_or_else(|| ApiError::not_found(format!("lead {id} not found")))?;

    lead.name = payload.name;
    lead.email = payload.email;
    lead.phone = payload.phone;
    lead.source = payload.source;
    lead.address = payload.address;
    lead.notes = payload.notes;
    Ok(svc.update_lead(lead)?)
}

pub fn set_status(
    state: &mut AppState,
    raw_id: &str,
    req: LeadStatusRequest,
) -> Result<Lead, ApiError> {
    let id = parse_id(raw_id)?;
    Ok(service(state)?.transition(id, req.status)?)
}

pub fn convert(
    state: &mut AppState,
    raw_id: &str,
    payload: ConvertLeadPayload,
) -> Result<ConversionData, ApiError> {
    let id = parse_id(raw_id)?;
    let converted = service(state)?.convert(
        id,
        ConvertLeadRequest {
            client_name: payload.client_name,
            contact_name: payload.contact_name,
            site_label: payload.site_label,
        },
    )?;
    Ok(ConversionData {
        lead: converted.lead,
        client: converted.client,
        site: converted.site,
    })
}
