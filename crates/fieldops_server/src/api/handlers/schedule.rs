//! Schedule and booking endpoints.

use crate::api::error::ApiError;
use crate::api::handlers::{parse_id, q_bool, q_i64, q_uuid, QueryMap};
use crate::api::types::{
    AssigneesRequest, BookingData, CreateScheduleRequest, RescheduleRequest, ScheduleStatusRequest,
};
use crate::auth::AuthContext;
use crate::AppState;
use fieldops_core::{
    ScheduleEntry, ScheduleEntryDetail, ScheduleService, ScheduleWindowQuery,
    SqliteScheduleRepository,
};

fn service(
    state: &mut AppState,
) -> Result<ScheduleService<SqliteScheduleRepository<'_>>, ApiError> {
    let repo = SqliteScheduleRepository::try_new(&mut state.conn)
        .map_err(|err| ApiError::internal(err.to_string()))?;
    Ok(ScheduleService::new(repo))
}

/// Lists entries overlapping `[from, to)`, optionally restricted to one
/// assignee.
pub fn list_window(
    state: &mut AppState,
    query: &QueryMap,
) -> Result<Vec<ScheduleEntryDetail>, ApiError> {
    let from = q_i64(query, "from")?
        .ok_or_else(|| ApiError::bad_request("query parameter `from` is required"))?;
    let to = q_i64(query, "to")?
        .ok_or_else(|| ApiError::bad_request("query parameter `to` is required"))?;

    let window = ScheduleWindowQuery {
        from,
        to,
        assignee: q_uuid(query, "assignee")?,
        include_released: q_bool(query, "include_released")?,
    };
    Ok(service(state)?.list_window(&window)?)
}

pub fn create(
    state: &mut AppState,
    ctx: &AuthContext,
    req: CreateScheduleRequest,
) -> Result<BookingData, ApiError> {
    let mut entry = ScheduleEntry::new(req.title, req.starts_at, req.ends_at);
    entry.job_order_id = req.job_order_id;
    entry.location = req.location;
    entry.notes = req.notes;

    let outcome =
        service(state)?.create_entry(entry, &req.assignees, req.allow_conflicts, ctx.user_id)?;
    Ok(BookingData {
        entry: outcome.detail,
        overridden_conflicts: outcome.overridden_conflicts,
    })
}

pub fn get(state: &mut AppState, raw_id: &str) -> Result<ScheduleEntryDetail, ApiError> {
    let id = parse_id(raw_id)?;
    service(state)?
        .get_detail(id)?
        .ok_or_else(|| ApiError::not_found(format!("schedule entry {id} not found")))
}

pub fn set_status(
    state: &mut AppState,
    raw_id: &str,
    req: ScheduleStatusRequest,
) -> Result<ScheduleEntryDetail, ApiError> {
    let id = parse_id(raw_id)?;
    Ok(service(state)?.transition(id, req.status)?)
}

pub fn reschedule(
    state: &mut AppState,
    raw_id: &str,
    req: RescheduleRequest,
) -> Result<BookingData, ApiError> {
    let id = parse_id(raw_id)?;
    let outcome =
        service(state)?.reschedule(id, req.starts_at, req.ends_at, req.allow_conflicts)?;
    Ok(BookingData {
        entry: outcome.detail,
        overridden_conflicts: outcome.overridden_conflicts,
    })
}

pub fn replace_assignees(
    state: &mut AppState,
    raw_id: &str,
    req: AssigneesRequest,
) -> Result<BookingData, ApiError> {
    let id = parse_id(raw_id)?;
    let outcome =
        service(state)?.replace_assignees(id, &req.assignees, req.allow_conflicts)?;
    Ok(BookingData {
        entry: outcome.detail,
        overridden_conflicts: outcome.overridden_conflicts,
    })
}
