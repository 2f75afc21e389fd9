//! Job order endpoints.

use crate::api::error::ApiError;
use crate::api::handlers::{parse_id, q_parsed, q_u32, q_uuid, QueryMap};
use crate::api::types::{CreateJobRequest, CrewRequest, JobInfoRequest, JobStatusRequest};
use crate::auth::AuthContext;
use crate::AppState;
use fieldops_core::{
    JobDetail, JobListQuery, JobOrder, JobService, JobStatus, QuotationService,
    SqliteJobRepository, SqliteQuotationRepository,
};
use serde_json::{json, Value};

fn service(state: &mut AppState) -> Result<JobService<SqliteJobRepository<'_>>, ApiError> {
    Ok(JobService::new(SqliteJobRepository::try_new(
        &mut state.conn,
    )?))
}

pub fn list(state: &mut AppState, query: &QueryMap) -> Result<Vec<JobOrder>, ApiError> {
    let list_query = JobListQuery {
        client_id: q_uuid(query, "client_id")?,
        status: q_parsed(query, "status", JobStatus::parse)?,
        limit: q_u32(query, "limit")?,
        offset: q_u32(query, "offset")?.unwrap_or(0),
    };
    Ok(service(state)?.list_jobs(&list_query)?)
}

/// Creates a job, either directly against a client or from an accepted
/// quotation.
pub fn create(state: &mut AppState, req: CreateJobRequest) -> Result<JobDetail, ApiError> {
    if let Some(quotation_id) = req.quotation_id {
        let quotation = {
            let svc = QuotationService::new(SqliteQuotationRepository::try_new(&mut state.conn)?);
            svc.get_detail(quotation_id)?
                .ok_or_else(|| ApiError::not_found(format!("quotation {quotation_id} not found")))?
        };
        return Ok(service(state)?.create_from_quotation(
            &quotation,
            req.title,
            req.description,
        )?);
    }

    let client_id = req
        .client_id
        .ok_or_else(|| ApiError::bad_request("either client_id or quotation_id is required"))?;
    let mut job = JobOrder::new(client_id, req.title);
    job.site_id = req.site_id;
    job.description = req.description;
    Ok(service(state)?.create_job(job)?)
}

pub fn get(state: &mut AppState, raw_id: &str) -> Result<JobDetail, ApiError> {
    let id = parse_id(raw_id)?;
    service(state)?
        .get_detail(id)?
        .ok_or_else(|| ApiError::not_found(format!("job order {id} not found")))
}

pub fn update_info(
    state: &mut AppState,
    raw_id: &str,
    req: JobInfoRequest,
) -> Result<JobDetail, ApiError> {
    let id = parse_id(raw_id)?;
    let svc = service(state)?;
    svc.update_info(id, &req.title, req.description.as_deref())?;
    svc.get_detail(id)?
        .ok_or_else(|| ApiError::internal("job order missing after update"))
}

pub fn set_status(
    state: &mut AppState,
    ctx: &AuthContext,
    raw_id: &str,
    req: JobStatusRequest,
) -> Result<JobDetail, ApiError> {
    let id = parse_id(raw_id)?;
    Ok(service(state)?.transition(id, req.status, req.note.as_deref(), ctx.user_id)?)
}

pub fn replace_crew(
    state: &mut AppState,
    raw_id: &str,
    req: CrewRequest,
) -> Result<JobDetail, ApiError> {
    let id = parse_id(raw_id)?;
    Ok(service(state)?.replace_crew(id, &req.crew)?)
}

pub fn delete(state: &mut AppState, raw_id: &str) -> Result<Value, ApiError> {
    let id = parse_id(raw_id)?;
    service(state)?.delete_job(id)?;
    Ok(json!({ "deleted": true }))
}
