use fieldops_core::db::open_db_in_memory;
use fieldops_core::{
    Role, SqliteUserRepository, User, UserRepository,
};
use fieldops_server::api::handlers::{clients, invoices, jobs, schedule, session, users};
use fieldops_server::api::types::{
    ClientPayload, CreateInvoiceRequest, CreateJobRequest, CreateScheduleRequest,
    CreateUserRequest, JobStatusRequest, LineItemInput, LoginRequest, PaymentRequest,
};
use fieldops_server::api::ErrorCode;
use fieldops_server::auth::{hash_password, AuthContext};
use fieldops_server::AppState;
use fieldops_core::{JobStatus, PaymentMethod};
use std::collections::HashMap;
use uuid::Uuid;

const T0: i64 = 1_760_000_000_000;
const HOUR: i64 = 3_600_000;

#[test]
fn login_issues_resolvable_tokens_and_rejects_bad_credentials() {
    let mut state = fresh_state();
    seed_user(&state, "manager", Role::Manager, "correct horse");

    let err = session::login(
        &mut state,
        LoginRequest {
            username: "manager".to_string(),
            password: "wrong".to_string(),
        },
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthorized);

    let response = session::login(
        &mut state,
        LoginRequest {
            username: "Manager".to_string(),
            password: "correct horse".to_string(),
        },
    )
    .unwrap();
    assert_eq!(response.user.username, "manager");

    let ctx = state.sessions.resolve(&response.token).unwrap();
    assert_eq!(ctx.role, Role::Manager);

    session::logout(&mut state, &response.token).unwrap();
    assert!(state.sessions.resolve(&response.token).is_none());
}

#[test]
fn deactivated_users_cannot_log_in() {
    let mut state = fresh_state();
    let user_id = seed_user(&state, "leaver", Role::Technician, "pw12345678");
    {
        let repo = SqliteUserRepository::try_new(&state.conn).unwrap();
        repo.set_active(user_id, false).unwrap();
    }

    let err = session::login(
        &mut state,
        LoginRequest {
            username: "leaver".to_string(),
            password: "pw12345678".to_string(),
        },
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::Unauthorized);
}

#[test]
fn client_crud_roundtrip_through_handlers() {
    let mut state = fresh_state();

    let client = clients::create(
        &mut state,
        ClientPayload {
            name: "Handler BV".to_string(),
            contact_name: Some("A. Handler".to_string()),
            email: Some("a@handler.test".to_string()),
            phone: None,
        },
    )
    .unwrap();

    let detail = clients::get(&mut state, &client.id.to_string()).unwrap();
    assert_eq!(detail.client.name, "Handler BV");
    assert!(detail.sites.is_empty());

    let err = clients::get(&mut state, &Uuid::new_v4().to_string()).unwrap_err();
    assert_eq!(err.code, ErrorCode::NotFound);

    let err = clients::get(&mut state, "not-a-uuid").unwrap_err();
    assert_eq!(err.code, ErrorCode::BadRequest);

    let listed = clients::list(&mut state, &HashMap::new()).unwrap();
    assert_eq!(listed.len(), 1);
}

#[test]
fn double_booking_surfaces_as_conflict_with_entry_ids() {
    let mut state = fresh_state();
    let manager = seed_user(&state, "manager", Role::Manager, "pw12345678");
    let tech = seed_user(&state, "tech", Role::Technician, "pw12345678");
    let ctx = context_for(manager, Role::Manager);

    let first = schedule::create(
        &mut state,
        &ctx,
        booking_request("First visit", T0, T0 + 2 * HOUR, vec![tech], false),
    )
    .unwrap();
    assert!(first.overridden_conflicts.is_empty());

    let err = schedule::create(
        &mut state,
        &ctx,
        booking_request("Clashing visit", T0 + HOUR, T0 + 3 * HOUR, vec![tech], false),
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::Conflict);
    assert!(err
        .message
        .contains(&first.entry.entry.id.to_string()));

    let forced = schedule::create(
        &mut state,
        &ctx,
        booking_request("Forced", T0 + HOUR, T0 + 3 * HOUR, vec![tech], true),
    )
    .unwrap();
    assert_eq!(forced.overridden_conflicts.len(), 1);
}

#[test]
fn payment_flow_maps_overpayment_to_conflict() {
    let mut state = fresh_state();
    let client = clients::create(
        &mut state,
        ClientPayload {
            name: "Payer BV".to_string(),
            contact_name: None,
            email: None,
            phone: None,
        },
    )
    .unwrap();

    let invoice = invoices::create(
        &mut state,
        CreateInvoiceRequest {
            client_id: Some(client.id),
            job_order_id: None,
            issued_at: T0,
            due_at: None,
            tax_rate_bp: 0,
            notes: None,
            items: vec![LineItemInput {
                description: "One treatment".to_string(),
                quantity: 1,
                unit_price_cents: 30_000,
            }],
        },
    )
    .unwrap();
    let invoice_id = invoice.invoice.id.to_string();

    invoices::send(&mut state, &invoice_id).unwrap();
    let paid = invoices::record_payment(
        &mut state,
        &invoice_id,
        PaymentRequest {
            amount_cents: 30_000,
            method: PaymentMethod::BankTransfer,
            reference: None,
            paid_at: Some(T0 + HOUR),
            notes: None,
        },
    )
    .unwrap();
    assert_eq!(paid.balance_cents, 0);

    let err = invoices::record_payment(
        &mut state,
        &invoice_id,
        PaymentRequest {
            amount_cents: 1,
            method: PaymentMethod::Cash,
            reference: None,
            paid_at: None,
            notes: None,
        },
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::Conflict);
}

#[test]
fn job_status_updates_record_the_acting_user() {
    let mut state = fresh_state();
    let manager = seed_user(&state, "manager", Role::Manager, "pw12345678");
    let ctx = context_for(manager, Role::Manager);

    let client = clients::create(
        &mut state,
        ClientPayload {
            name: "Jobs BV".to_string(),
            contact_name: None,
            email: None,
            phone: None,
        },
    )
    .unwrap();

    let job = jobs::create(
        &mut state,
        CreateJobRequest {
            client_id: Some(client.id),
            quotation_id: None,
            site_id: None,
            title: "Handler job".to_string(),
            description: None,
        },
    )
    .unwrap();

    let updated = jobs::set_status(
        &mut state,
        &ctx,
        &job.job.id.to_string(),
        JobStatusRequest {
            status: JobStatus::Scheduled,
            note: Some("booked".to_string()),
        },
    )
    .unwrap();
    assert_eq!(updated.job.status, JobStatus::Scheduled);
    assert_eq!(updated.history.len(), 1);
    assert_eq!(updated.history[0].changed_by, manager);

    let err = jobs::set_status(
        &mut state,
        &ctx,
        &job.job.id.to_string(),
        JobStatusRequest {
            status: JobStatus::Completed,
            note: None,
        },
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::Conflict);
}

#[test]
fn user_admin_handlers_enforce_password_and_uniqueness_rules() {
    let mut state = fresh_state();

    let err = users::create(
        &mut state,
        CreateUserRequest {
            username: "short".to_string(),
            display_name: "Short".to_string(),
            role: Role::Technician,
            password: "2short".to_string(),
        },
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::BadRequest);

    users::create(
        &mut state,
        CreateUserRequest {
            username: "unique".to_string(),
            display_name: "First".to_string(),
            role: Role::Technician,
            password: "long enough".to_string(),
        },
    )
    .unwrap();

    let err = users::create(
        &mut state,
        CreateUserRequest {
            username: "unique".to_string(),
            display_name: "Second".to_string(),
            role: Role::Technician,
            password: "long enough".to_string(),
        },
    )
    .unwrap_err();
    assert_eq!(err.code, ErrorCode::Conflict);
}

fn fresh_state() -> AppState {
    AppState::new(open_db_in_memory().unwrap())
}

fn seed_user(state: &AppState, username: &str, role: Role, password: &str) -> Uuid {
    let repo = SqliteUserRepository::try_new(&state.conn).unwrap();
    repo.create_user(&User::new(username, username, role, hash_password(password)))
        .unwrap()
}

fn context_for(user_id: Uuid, role: Role) -> AuthContext {
    AuthContext {
        user_id,
        username: "test".to_string(),
        role,
    }
}

fn booking_request(
    title: &str,
    starts_at: i64,
    ends_at: i64,
    assignees: Vec<Uuid>,
    allow_conflicts: bool,
) -> CreateScheduleRequest {
    CreateScheduleRequest {
        job_order_id: None,
        title: title.to_string(),
        location: None,
        starts_at,
        ends_at,
        notes: None,
        assignees,
        allow_conflicts,
    }
}
