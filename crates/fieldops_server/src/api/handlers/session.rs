//! Session endpoints: login, logout and the caller's status view.

use crate::api::error::ApiError;
use crate::api::types::{LoginRequest, LoginResponse, StatusData};
use crate::auth::{verify_password, AuthContext};
use crate::AppState;
use fieldops_core::{SqliteUserRepository, UserRepository};
use log::{info, warn};
use serde_json::{json, Value};

/// Verifies credentials and issues a session token.
pub fn login(state: &mut AppState, req: LoginRequest) -> Result<LoginResponse, ApiError> {
    let user = {
        let repo = SqliteUserRepository::try_new(&state.conn)?;
        repo.get_by_username(&req.username)?
    };

    let Some(user) = user else {
        warn!(
            "event=login module=session status=denied reason=unknown_user username={}",
            req.username.trim().to_lowercase()
        );
        return Err(ApiError::unauthorized("invalid username or password"));
    };
    if !user.active || !verify_password(&user.password_hash, &req.password) {
        warn!(
            "event=login module=session status=denied reason=bad_credentials user={}",
            user.id
        );
        return Err(ApiError::unauthorized("invalid username or password"));
    }

    let token = state.sessions.issue(AuthContext {
        user_id: user.id,
        username: user.username.clone(),
        role: user.role,
    });
    info!(
        "event=login module=session status=ok user={} role={}",
        user.id,
        user.role.as_str()
    );
    Ok(LoginResponse { token, user })
}

/// Revokes the caller's session token.
pub fn logout(state: &mut AppState, token: &str) -> Result<Value, ApiError> {
    if state.sessions.revoke(token) {
        info!("event=logout module=session status=ok");
    }
    Ok(json!({ "logged_out": true }))
}

/// Reports service version and the authenticated account.
pub fn status(state: &mut AppState, ctx: &AuthContext) -> Result<StatusData, ApiError> {
    let user = {
        let repo = SqliteUserRepository::try_new(&state.conn)?;
        repo.get_user(ctx.user_id)?
            .ok_or_else(|| ApiError::unauthorized("session user no longer exists"))?
    };

    Ok(StatusData {
        version: fieldops_core::core_version().to_string(),
        user,
    })
}
