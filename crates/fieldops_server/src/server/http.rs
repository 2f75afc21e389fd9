//! tiny_http server adapter.
//!
//! Maps method + path onto the pure handlers in `api::handlers`, applies
//! the session and role gates, and converts results into the uniform
//! JSON envelope. Requests are handled sequentially on one connection.

use std::collections::HashMap;
use std::io::Cursor;
#[allow(unused_imports)]
use std::io::Read as _;

use log::{debug, error, info};
use serde::{de::DeserializeOwned, Serialize};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::api::handlers::{self, QueryMap};
use crate::api::{ApiError, ApiResponse};
use crate::auth::{role_allows, AuthContext, Permission};
use crate::AppState;

const SESSION_COOKIE: &str = "fieldops_session";

/// Runs the accept loop until the process is terminated.
pub fn serve(addr: &str, state: &mut AppState) -> Result<(), String> {
    let server =
        Server::http(addr).map_err(|err| format!("failed to bind `{addr}`: {err}"))?;
    info!("event=server_start module=server status=ok addr={addr}");

    for mut request in server.incoming_requests() {
        let reply = handle_request(state, &mut request);
        if let Err(err) = request.respond(reply) {
            error!("event=http_respond module=server status=error error={err}");
        }
    }

    Ok(())
}

/// Handles one API request and returns the JSON response.
pub fn handle_request(state: &mut AppState, request: &mut Request) -> Response<Cursor<Vec<u8>>> {
    let url = request.url().to_string();
    let method = request.method().clone();
    let (path, query) = split_url(&url);

    // Accept both /api/v1/... (versioned) and /api/... paths.
    let Some(api_path) = path
        .strip_prefix("/api/v1")
        .or_else(|| path.strip_prefix("/api"))
    else {
        return finish(&method, &url, error_reply(&ApiError::not_found("not an API path")));
    };
    let segments: Vec<&str> = api_path
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    let token = extract_token(request);

    // Login is the only unauthenticated route.
    if method == Method::Post && segments == ["session"] {
        let reply = match read_json_body(request) {
            Ok(req) => match handlers::session::login(state, req) {
                Ok(response) => {
                    let cookie = format!(
                        "{SESSION_COOKIE}={}; HttpOnly; SameSite=Strict; Path=/",
                        response.token
                    );
                    success_reply(&response).with_cookie(cookie)
                }
                Err(err) => error_reply(&err),
            },
            Err(err) => error_reply(&err),
        };
        return finish(&method, &url, reply);
    }

    let Some(ctx) = token
        .as_deref()
        .and_then(|token| state.sessions.resolve(token))
    else {
        return finish(
            &method,
            &url,
            error_reply(&ApiError::unauthorized("missing or expired session")),
        );
    };

    let reply = route(state, &ctx, token.as_deref(), &method, &segments, &query, request);
    finish(&method, &url, reply)
}

fn route(
    state: &mut AppState,
    ctx: &AuthContext,
    token: Option<&str>,
    method: &Method,
    segments: &[&str],
    query: &QueryMap,
    request: &mut Request,
) -> Reply {
    use Permission::{ManageDocuments, ManageUsers, OperateStatus, Read};

    let guard = |permission: Permission| -> Result<(), ApiError> {
        if role_allows(ctx.role, permission) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "role `{}` may not perform this operation",
                ctx.role.as_str()
            )))
        }
    };

    match (method, segments) {
        // Session and status.
        (&Method::Delete, ["session"]) => reply_of(
            token
                .ok_or_else(|| ApiError::unauthorized("missing session token"))
                .and_then(|token| handlers::session::logout(state, token)),
        ),
        (&Method::Get, ["status"]) => reply_of(handlers::session::status(state, ctx)),

        // Clients and sites.
        (&Method::Get, ["clients"]) => {
            reply_of(guard(Read).and_then(|()| handlers::clients::list(state, query)))
        }
        (&Method::Post, ["clients"]) => reply_of(guard(ManageDocuments).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::clients::create(state, req))
        })),
        (&Method::Get, ["clients", id]) => {
            reply_of(guard(Read).and_then(|()| handlers::clients::get(state, id)))
        }
        (&Method::Patch, ["clients", id]) => reply_of(guard(ManageDocuments).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::clients::update(state, id, req))
        })),
        (&Method::Post, ["clients", id, "archive"]) => {
            reply_of(guard(ManageDocuments).and_then(|()| {
                read_json_body(request)
                    .and_then(|req| handlers::clients::set_archived(state, id, req))
            }))
        }
        (&Method::Get, ["clients", id, "sites"]) => {
            reply_of(guard(Read).and_then(|()| handlers::clients::list_sites(state, id)))
        }
        (&Method::Post, ["clients", id, "sites"]) => {
            reply_of(guard(ManageDocuments).and_then(|()| {
                read_json_body(request).and_then(|req| handlers::clients::add_site(state, id, req))
            }))
        }
        (&Method::Patch, ["sites", id]) => reply_of(guard(ManageDocuments).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::clients::update_site(state, id, req))
        })),
        (&Method::Delete, ["sites", id]) => reply_of(
            guard(ManageDocuments).and_then(|()| handlers::clients::delete_site(state, id)),
        ),

        // Leads.
        (&Method::Get, ["leads"]) => {
            reply_of(guard(Read).and_then(|()| handlers::leads::list(state, query)))
        }
        (&Method::Post, ["leads"]) => reply_of(guard(ManageDocuments).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::leads::create(state, req))
        })),
        (&Method::Get, ["leads", id]) => {
            reply_of(guard(Read).and_then(|()| handlers::leads::get(state, id)))
        }
        (&Method::Patch, ["leads", id]) => reply_of(guard(ManageDocuments).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::leads::update(state, id, req))
        })),
        (&Method::Post, ["leads", id, "status"]) => {
            reply_of(guard(ManageDocuments).and_then(|()| {
                read_json_body(request).and_then(|req| handlers::leads::set_status(state, id, req))
            }))
        }
        (&Method::Post, ["leads", id, "convert"]) => {
            reply_of(guard(ManageDocuments).and_then(|()| {
                read_json_body(request).and_then(|req| handlers::leads::convert(state, id, req))
            }))
        }

        // Quotations.
        (&Method::Get, ["quotations"]) => {
            reply_of(guard(Read).and_then(|()| handlers::quotations::list(state, query)))
        }
        (&Method::Post, ["quotations"]) => reply_of(guard(ManageDocuments).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::quotations::create(state, req))
        })),
        (&Method::Get, ["quotations", id]) => {
            reply_of(guard(Read).and_then(|()| handlers::quotations::get(state, id)))
        }
        (&Method::Put, ["quotations", id, "items"]) => {
            reply_of(guard(ManageDocuments).and_then(|()| {
                read_json_body(request)
                    .and_then(|req| handlers::quotations::replace_items(state, id, req))
            }))
        }
        (&Method::Post, ["quotations", id, "send"]) => reply_of(
            guard(ManageDocuments).and_then(|()| handlers::quotations::send(state, id)),
        ),
        (&Method::Post, ["quotations", id, "accept"]) => reply_of(
            guard(ManageDocuments).and_then(|()| handlers::quotations::accept(state, id)),
        ),
        (&Method::Post, ["quotations", id, "decline"]) => reply_of(
            guard(ManageDocuments).and_then(|()| handlers::quotations::decline(state, id)),
        ),
        (&Method::Post, ["quotations", id, "expire"]) => reply_of(
            guard(ManageDocuments).and_then(|()| handlers::quotations::expire(state, id)),
        ),

        // Job orders.
        (&Method::Get, ["jobs"]) => {
            reply_of(guard(Read).and_then(|()| handlers::jobs::list(state, query)))
        }
        (&Method::Post, ["jobs"]) => reply_of(guard(ManageDocuments).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::jobs::create(state, req))
        })),
        (&Method::Get, ["jobs", id]) => {
            reply_of(guard(Read).and_then(|()| handlers::jobs::get(state, id)))
        }
        (&Method::Patch, ["jobs", id]) => reply_of(guard(ManageDocuments).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::jobs::update_info(state, id, req))
        })),
        (&Method::Delete, ["jobs", id]) => {
            reply_of(guard(ManageDocuments).and_then(|()| handlers::jobs::delete(state, id)))
        }
        (&Method::Post, ["jobs", id, "status"]) => reply_of(guard(OperateStatus).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::jobs::set_status(state, ctx, id, req))
        })),
        (&Method::Put, ["jobs", id, "crew"]) => reply_of(guard(ManageDocuments).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::jobs::replace_crew(state, id, req))
        })),

        // Invoices.
        (&Method::Get, ["invoices"]) => {
            reply_of(guard(Read).and_then(|()| handlers::invoices::list(state, query)))
        }
        (&Method::Post, ["invoices"]) => reply_of(guard(ManageDocuments).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::invoices::create(state, req))
        })),
        (&Method::Get, ["invoices", id]) => {
            reply_of(guard(Read).and_then(|()| handlers::invoices::get(state, id)))
        }
        (&Method::Put, ["invoices", id, "items"]) => {
            reply_of(guard(ManageDocuments).and_then(|()| {
                read_json_body(request)
                    .and_then(|req| handlers::invoices::replace_items(state, id, req))
            }))
        }
        (&Method::Post, ["invoices", id, "send"]) => reply_of(
            guard(ManageDocuments).and_then(|()| handlers::invoices::send(state, id)),
        ),
        (&Method::Post, ["invoices", id, "payments"]) => {
            reply_of(guard(ManageDocuments).and_then(|()| {
                read_json_body(request)
                    .and_then(|req| handlers::invoices::record_payment(state, id, req))
            }))
        }
        (&Method::Post, ["invoices", id, "void"]) => reply_of(
            guard(ManageDocuments).and_then(|()| handlers::invoices::void(state, id)),
        ),

        // Schedule.
        (&Method::Get, ["schedule"]) => {
            reply_of(guard(Read).and_then(|()| handlers::schedule::list_window(state, query)))
        }
        (&Method::Post, ["schedule"]) => reply_of(guard(ManageDocuments).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::schedule::create(state, ctx, req))
        })),
        (&Method::Get, ["schedule", id]) => {
            reply_of(guard(Read).and_then(|()| handlers::schedule::get(state, id)))
        }
        (&Method::Post, ["schedule", id, "status"]) => {
            reply_of(guard(OperateStatus).and_then(|()| {
                read_json_body(request)
                    .and_then(|req| handlers::schedule::set_status(state, id, req))
            }))
        }
        (&Method::Post, ["schedule", id, "reschedule"]) => {
            reply_of(guard(ManageDocuments).and_then(|()| {
                read_json_body(request)
                    .and_then(|req| handlers::schedule::reschedule(state, id, req))
            }))
        }
        (&Method::Put, ["schedule", id, "assignees"]) => {
            reply_of(guard(ManageDocuments).and_then(|()| {
                read_json_body(request)
                    .and_then(|req| handlers::schedule::replace_assignees(state, id, req))
            }))
        }

        // Users.
        (&Method::Get, ["users"]) => {
            reply_of(guard(ManageUsers).and_then(|()| handlers::users::list(state)))
        }
        (&Method::Post, ["users"]) => reply_of(guard(ManageUsers).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::users::create(state, req))
        })),
        (&Method::Patch, ["users", id]) => reply_of(guard(ManageUsers).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::users::update_profile(state, id, req))
        })),
        (&Method::Post, ["users", id, "password"]) => {
            reply_of(guard(ManageUsers).and_then(|()| {
                read_json_body(request).and_then(|req| handlers::users::set_password(state, id, req))
            }))
        }
        (&Method::Post, ["users", id, "active"]) => reply_of(guard(ManageUsers).and_then(|()| {
            read_json_body(request).and_then(|req| handlers::users::set_active(state, id, req))
        })),

        _ => error_reply(&ApiError::not_found(format!(
            "API endpoint not found: {method} /{}",
            segments.join("/")
        ))),
    }
}

// ---------------------------------------------------------------------------
// Request parsing
// ---------------------------------------------------------------------------

fn split_url(url: &str) -> (&str, QueryMap) {
    match url.split_once('?') {
        None => (url, HashMap::new()),
        Some((path, raw_query)) => {
            let mut query = HashMap::new();
            for pair in raw_query.split('&') {
                if let Some((key, value)) = pair.split_once('=') {
                    query.insert(key.to_string(), value.to_string());
                }
            }
            (path, query)
        }
    }
}

/// Pulls the session token from `Authorization: Bearer` or the session
/// cookie.
fn extract_token(request: &Request) -> Option<String> {
    for header in request.headers() {
        let field = header.field.as_str().as_str();
        if field.eq_ignore_ascii_case("authorization") {
            let value = header.value.as_str();
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
        if field.eq_ignore_ascii_case("cookie") {
            for part in header.value.as_str().split(';') {
                if let Some((name, value)) = part.trim().split_once('=') {
                    if name == SESSION_COOKIE {
                        return Some(value.trim().to_string());
                    }
                }
            }
        }
    }
    None
}

fn read_json_body<T: DeserializeOwned>(request: &mut Request) -> Result<T, ApiError> {
    let mut body = String::new();
    request
        .as_reader()
        .read_to_string(&mut body)
        .map_err(|err| ApiError::bad_request(format!("failed to read request body: {err}")))?;

    serde_json::from_str(&body).map_err(|err| ApiError::bad_request(format!("invalid JSON: {err}")))
}

// ---------------------------------------------------------------------------
// Response conversion
// ---------------------------------------------------------------------------

struct Reply {
    status: u16,
    body: String,
    cookie: Option<String>,
}

impl Reply {
    fn with_cookie(mut self, cookie: String) -> Self {
        self.cookie = Some(cookie);
        self
    }
}

fn reply_of<T: Serialize>(result: Result<T, ApiError>) -> Reply {
    match result {
        Ok(data) => success_reply(&data),
        Err(err) => error_reply(&err),
    }
}

fn success_reply<T: Serialize>(data: &T) -> Reply {
    Reply {
        status: 200,
        body: serialize_envelope(&ApiResponse::success(data)),
        cookie: None,
    }
}

fn error_reply(err: &ApiError) -> Reply {
    Reply {
        status: err.status_code(),
        body: serialize_envelope(&ApiResponse::<()>::error(err)),
        cookie: None,
    }
}

fn serialize_envelope<T: Serialize>(envelope: &ApiResponse<T>) -> String {
    serde_json::to_string(envelope).unwrap_or_else(|_| r#"{"success":false}"#.to_string())
}

fn finish(method: &Method, url: &str, reply: Reply) -> Response<Cursor<Vec<u8>>> {
    debug!(
        "event=http_request module=server method={method} url={url} status={}",
        reply.status
    );

    let mut response = Response::from_data(reply.body.into_bytes())
        .with_header(Header::from_bytes("Content-Type", "application/json").unwrap())
        .with_status_code(StatusCode(reply.status));
    if let Some(cookie) = reply.cookie {
        if let Ok(header) = Header::from_bytes("Set-Cookie", cookie) {
            response = response.with_header(header);
        }
    }
    response
}
