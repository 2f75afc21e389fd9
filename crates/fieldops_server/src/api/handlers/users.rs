//! User account endpoints (admin only; enforced by the router).

use crate::api::error::ApiError;
use crate::api::handlers::parse_id;
use crate::api::types::{CreateUserRequest, SetActiveRequest, SetPasswordRequest, UserProfileRequest};
use crate::auth::hash_password;
use crate::AppState;
use fieldops_core::{SqliteUserRepository, User, UserService};
use serde_json::{json, Value};

fn service(state: &mut AppState) -> Result<UserService<SqliteUserRepository<'_>>, ApiError> {
    Ok(UserService::new(SqliteUserRepository::try_new(
        &state.conn,
    )?))
}

pub fn list(state: &mut AppState) -> Result<Vec<User>, ApiError> {
    Ok(service(state)?.list_users()?)
}

pub fn create(state: &mut AppState, req: CreateUserRequest) -> Result<User, ApiError> {
    if req.password.len() < 8 {
        return Err(ApiError::bad_request(
            "password must be at least 8 characters",
        ));
    }

    let user = User::new(
        req.username,
        req.display_name,
        req.role,
        hash_password(&req.password),
    );
    Ok(service(state)?.create_user(user)?)
}

pub fn update_profile(
    state: &mut AppState,
    raw_id: &str,
    req: UserProfileRequest,
) -> Result<User, ApiError> {
    let id = parse_id(raw_id)?;
    Ok(service(state)?.update_profile(id, &req.display_name, req.role)?)
}

pub fn set_password(
    state: &mut AppState,
    raw_id: &str,
    req: SetPasswordRequest,
) -> Result<Value, ApiError> {
    let id = parse_id(raw_id)?;
    if req.password.len() < 8 {
        return Err(ApiError::bad_request(
            "password must be at least 8 characters",
        ));
    }
    service(state)?.set_password_hash(id, &hash_password(&req.password))?;
    Ok(json!({ "updated": true }))
}

pub fn set_active(
    state: &mut AppState,
    raw_id: &str,
    req: SetActiveRequest,
) -> Result<User, ApiError> {
    let id = parse_id(raw_id)?;
    Ok(service(state)?.set_active(id, req.active)?)
}
