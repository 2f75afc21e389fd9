//! Client and site endpoints.

use crate::api::error::ApiError;
use crate::api::handlers::{parse_id, q_bool, q_u32, QueryMap};
use crate::api::types::{ArchiveRequest, ClientDetailData, ClientPayload, SitePayload};
use crate::AppState;
use fieldops_core::{
    Client, ClientListQuery, ClientRepository, Site, SqliteClientRepository,
};
use serde_json::{json, Value};

pub fn list(state: &mut AppState, query: &QueryMap) -> Result<Vec<Client>, ApiError> {
    let repo = SqliteClientRepository::try_new(&state.conn)?;
    let clients = repo.list_clients(&ClientListQuery {
        include_archived: q_bool(query, "include_archived")?,
        limit: q_u32(query, "limit")?,
        offset: q_u32(query, "offset")?.unwrap_or(0),
    })?;
    Ok(clients)
}

pub fn create(state: &mut AppState, payload: ClientPayload) -> Result<Client, ApiError> {
    let repo = SqliteClientRepository::try_new(&state.conn)?;
    let mut client = Client::new(payload.name);
    client.contact_name = payload.contact_name;
    client.email = payload.email;
    client.phone = payload.phone;

    let id = repo.create_client(&client)?;
    repo.get_client(id)?
        .ok_or_else(|| ApiError::internal("client created but could not be read back"))
}

pub fn get(state: &mut AppState, raw_id: &str) -> Result<ClientDetailData, ApiError> {
    let id = parse_id(raw_id)?;
    let repo = SqliteClientRepository::try_new(&state.conn)?;
    let client = repo
        .get_client(id)?
        .ok_or_else(|| ApiError::not_found(format!("client {id} not found")))?;
    let sites = repo.list_sites(id)?;
    Ok(ClientDetailData { client, sites })
}

pub fn update(
    state: &mut AppState,
    raw_id: &str,
    payload: ClientPayload,
) -> Result<Client, ApiError> {
    let id = parse_id(raw_id)?;
    let repo = SqliteClientRepository::try_new(&state.conn)?;
    let mut client = repo
        .get_client(id)?
        .ok_or_else(|| ApiError::not_found(format!("client {id} not found")))?;

    client.name = payload.name;
    client.contact_name = payload.contact_name;
    client.email = payload.email;
    client.phone = payload.phone;
    repo.update_client(&client)?;

    repo.get_client(id)?
        .ok_or_else(|| ApiError::internal("client missing after update"))
}

pub fn set_archived(
    state: &mut AppState,
    raw_id: &str,
    req: ArchiveRequest,
) -> Result<Client, ApiError> {
    let id = parse_id(raw_id)?;
    let repo = SqliteClientRepository::try_new(&state.conn)?;
    repo.set_archived(id, req.archived)?;
    repo.get_client(id)?
        .ok_or_else(|| ApiError::internal("client missing after archive toggle"))
}

pub fn list_sites(state: &mut AppState, raw_client_id: &str) -> Result<Vec<Site>, ApiError> {
    let client_id = parse_id(raw_client_id)?;
    let repo = SqliteClientRepository::try_new(&state.conn)?;
    repo.get_client(client_id)?
        .ok_or_else(|| ApiError::not_found(format!("client {client_id} not found")))?;
    Ok(repo.list_sites(client_id)?)
}

pub fn add_site(
    state: &mut AppState,
    raw_client_id: &str,
    payload: SitePayload,
) -> Result<Site, ApiError> {
    let client_id = parse_id(raw_client_id)?;
    let repo = SqliteClientRepository::try_new(&state.conn)?;
    repo.get_client(client_id)?
        .ok_or_else(|| ApiError::not_found(format!("client {client_id} not found")))?;

    let mut site = Site::new(client_id, payload.label, payload.address);
    site.access_notes = payload.access_notes;
    let id = repo.add_site(&site)?;
    repo.get_site(id)?
        .ok_or_else(|| ApiError::internal("site created but could not be read back"))
}

pub fn update_site(
    state: &mut AppState,
    raw_site_id: &str,
    payload: SitePayload,
) -> Result<Site, ApiError> {
    let site_id = parse_id(raw_site_id)?;
    let repo = SqliteClientRepository::try_new(&state.conn)?;
    let mut site = repo
        .get_site(site_id)?
        .ok_or_else(|| ApiError::not_found(format!("site {site_id} not found")))?;

    site.label = payload.label;
    site.address = payload.address;
    site.access_notes = payload.access_notes;
    repo.update_site(&site)?;

    repo.get_site(site_id)?
        .ok_or_else(|| ApiError::internal("site missing after update"))
}

pub fn delete_site(state: &mut AppState, raw_site_id: &str) -> Result<Value, ApiError> {
    let site_id = parse_id(raw_site_id)?;
    let repo = SqliteClientRepository::try_new(&state.conn)?;
    repo.remove_site(site_id)?;
    Ok(json!({ "deleted": true }))
}
