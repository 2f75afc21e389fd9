use fieldops_core::db::open_db_in_memory;
use fieldops_core::{
    Client, ClientRepository, Invoice, InvoiceService, InvoiceServiceError, InvoiceStatus,
    JobOrder, JobService, JobStatus, LineItem, PaymentMethod, Role, SqliteClientRepository,
    SqliteInvoiceRepository, SqliteJobRepository, SqliteUserRepository, User, UserRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

const ISSUED_AT: i64 = 1_750_000_000_000;

#[test]
fn drafts_get_numbers_and_payments_drive_status() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Billing BV");

    let invoice = invoice_service(&mut conn)
        .create_draft(
            Invoice::new(client_id, ISSUED_AT),
            vec![LineItem::new("Treatment", 1, 50_000)],
        )
        .unwrap();
    assert_eq!(invoice.invoice.number, "INV-0001");
    assert_eq!(invoice.invoice.status, InvoiceStatus::Draft);
    assert_eq!(invoice.balance_cents, 50_000);

    let invoice_id = invoice.invoice.id;
    invoice_service(&mut conn).send(invoice_id).unwrap();

    let partial = invoice_service(&mut conn)
        .record_payment(
            invoice_id,
            20_000,
            PaymentMethod::BankTransfer,
            Some("stmt-114".to_string()),
            ISSUED_AT + 86_400_000,
            None,
        )
        .unwrap();
    assert_eq!(partial.invoice.status, InvoiceStatus::PartiallyPaid);
    assert_eq!(partial.paid_cents, 20_000);
    assert_eq!(partial.balance_cents, 30_000);

    let settled = invoice_service(&mut conn)
        .record_payment(
            invoice_id,
            30_000,
            PaymentMethod::Cash,
            None,
            ISSUED_AT + 172_800_000,
            None,
        )
        .unwrap();
    assert_eq!(settled.invoice.status, InvoiceStatus::Paid);
    assert_eq!(settled.balance_cents, 0);
    assert_eq!(settled.payments.len(), 2);
}

#[test]
fn overpayment_is_rejected_and_leaves_state_unchanged() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Strict BV");

    let invoice = invoice_service(&mut conn)
        .create_draft(
            Invoice::new(client_id, ISSUED_AT),
            vec![LineItem::new("Small job", 1, 10_000)],
        )
        .unwrap();
    let invoice_id = invoice.invoice.id;
    invoice_service(&mut conn).send(invoice_id).unwrap();
    invoice_service(&mut conn)
        .record_payment(invoice_id, 4_000, PaymentMethod::Card, None, ISSUED_AT, None)
        .unwrap();

    let err = invoice_service(&mut conn)
        .record_payment(invoice_id, 6_001, PaymentMethod::Card, None, ISSUED_AT, None)
        .unwrap_err();
    assert!(matches!(
        err,
        InvoiceServiceError::Overpayment {
            attempted_cents: 6_001,
            balance_cents: 6_000
        }
    ));

    let detail = invoice_service(&mut conn)
        .get_detail(invoice_id)
        .unwrap()
        .unwrap();
    assert_eq!(detail.invoice.status, InvoiceStatus::PartiallyPaid);
    assert_eq!(detail.paid_cents, 4_000);
    assert_eq!(detail.payments.len(), 1);
}

#[test]
fn payments_require_a_sent_invoice() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Draft BV");

    let invoice = invoice_service(&mut conn)
        .create_draft(
            Invoice::new(client_id, ISSUED_AT),
            vec![LineItem::new("Job", 1, 5_000)],
        )
        .unwrap();

    let err = invoice_service(&mut conn)
        .record_payment(
            invoice.invoice.id,
            5_000,
            PaymentMethod::Cash,
            None,
            ISSUED_AT,
            None,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        InvoiceServiceError::PaymentNotAllowed(InvoiceStatus::Draft)
    ));

    let err = invoice_service(&mut conn)
        .record_payment(
            invoice.invoice.id,
            0,
            PaymentMethod::Cash,
            None,
            ISSUED_AT,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, InvoiceServiceError::Validation(_)));
}

#[test]
fn void_requires_zero_payments() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Void BV");

    let clean = invoice_service(&mut conn)
        .create_draft(
            Invoice::new(client_id, ISSUED_AT),
            vec![LineItem::new("Cancelled work", 1, 7_500)],
        )
        .unwrap();
    let voided = invoice_service(&mut conn).void(clean.invoice.id).unwrap();
    assert_eq!(voided.invoice.status, InvoiceStatus::Void);

    let paid = invoice_service(&mut conn)
        .create_draft(
            Invoice::new(client_id, ISSUED_AT),
            vec![LineItem::new("Real work", 1, 7_500)],
        )
        .unwrap();
    invoice_service(&mut conn).send(paid.invoice.id).unwrap();
    invoice_service(&mut conn)
        .record_payment(paid.invoice.id, 1_000, PaymentMethod::Cash, None, ISSUED_AT, None)
        .unwrap();

    let err = invoice_service(&mut conn).void(paid.invoice.id).unwrap_err();
    assert!(matches!(err, InvoiceServiceError::VoidWithPayments(id) if id == paid.invoice.id));

    // Paid invoices cannot be voided either.
    invoice_service(&mut conn)
        .record_payment(paid.invoice.id, 6_500, PaymentMethod::Cash, None, ISSUED_AT, None)
        .unwrap();
    let err = invoice_service(&mut conn).void(paid.invoice.id).unwrap_err();
    assert!(matches!(
        err,
        InvoiceServiceError::VoidNotAllowed(InvoiceStatus::Paid)
    ));
}

#[test]
fn sending_an_empty_invoice_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Empty Invoice BV");

    let invoice = invoice_service(&mut conn)
        .create_draft(Invoice::new(client_id, ISSUED_AT), vec![])
        .unwrap();
    let err = invoice_service(&mut conn).send(invoice.invoice.id).unwrap_err();
    assert!(matches!(err, InvoiceServiceError::NoItems(_)));
}

#[test]
fn invoicing_a_job_requires_completion() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Job Billing BV");
    let manager = seed_user(&conn, "manager", Role::Manager);

    let job = {
        let mut service = JobService::new(SqliteJobRepository::try_new(&mut conn).unwrap());
        service
            .create_job(JobOrder::new(client_id, "Billable job"))
            .unwrap()
    };

    let err = invoice_service(&mut conn)
        .create_from_job(
            &job,
            Invoice::new(client_id, ISSUED_AT),
            vec![LineItem::new("Work done", 1, 40_000)],
        )
        .unwrap_err();
    assert!(matches!(
        err,
        InvoiceServiceError::JobNotCompleted(JobStatus::Pending)
    ));

    let completed = {
        let mut service = JobService::new(SqliteJobRepository::try_new(&mut conn).unwrap());
        service
            .transition(job.job.id, JobStatus::Scheduled, None, manager)
            .unwrap();
        service
            .transition(job.job.id, JobStatus::InProgress, None, manager)
            .unwrap();
        service
            .transition(job.job.id, JobStatus::Completed, None, manager)
            .unwrap()
    };

    let invoice = invoice_service(&mut conn)
        .create_from_job(
            &completed,
            Invoice::new(client_id, ISSUED_AT),
            vec![LineItem::new("Work done", 1, 40_000)],
        )
        .unwrap();
    assert_eq!(invoice.invoice.job_order_id, Some(job.job.id));
    assert_eq!(invoice.invoice.client_id, client_id);
}

fn seed_client(conn: &Connection, name: &str) -> Uuid {
    let repo = SqliteClientRepository::try_new(conn).unwrap();
    repo.create_client(&Client::new(name)).unwrap()
}

fn seed_user(conn: &Connection, username: &str, role: Role) -> Uuid {
    let repo = SqliteUserRepository::try_new(conn).unwrap();
    repo.create_user(&User::new(username, username, role, "hash"))
        .unwrap()
}

fn invoice_service(conn: &mut Connection) -> InvoiceService<SqliteInvoiceRepository<'_>> {
    InvoiceService::new(SqliteInvoiceRepository::try_new(conn).unwrap())
}
