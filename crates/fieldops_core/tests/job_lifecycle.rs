use fieldops_core::db::open_db_in_memory;
use fieldops_core::{
    Client, ClientRepository, JobOrder, JobService, JobServiceError, JobStatus, LineItem,
    Quotation, QuotationService, QuotationStatus, Role, RepoError, SqliteClientRepository,
    SqliteJobRepository, SqliteQuotationRepository, SqliteUserRepository, User, UserRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

#[test]
fn jobs_start_pending_with_sequential_numbers() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Jobs BV");

    let first = job_service(&mut conn)
        .create_job(JobOrder::new(client_id, "Kitchen deep clean"))
        .unwrap();
    assert_eq!(first.job.number, "JOB-0001");
    assert_eq!(first.job.status, JobStatus::Pending);
    assert!(first.crew.is_empty());
    assert!(first.history.is_empty());

    let second = job_service(&mut conn)
        .create_job(JobOrder::new(client_id, "Roof inspection"))
        .unwrap();
    assert_eq!(second.job.number, "JOB-0002");
}

#[test]
fn transitions_append_history_and_reject_illegal_moves() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "History BV");
    let manager = seed_user(&conn, "manager", Role::Manager);

    let job = job_service(&mut conn)
        .create_job(JobOrder::new(client_id, "Full treatment"))
        .unwrap();

    let err = job_service(&mut conn)
        .transition(job.job.id, JobStatus::Completed, None, manager)
        .unwrap_err();
    assert!(matches!(
        err,
        JobServiceError::InvalidTransition {
            from: JobStatus::Pending,
            to: JobStatus::Completed
        }
    ));

    let job = job_service(&mut conn)
        .transition(job.job.id, JobStatus::Scheduled, Some("crew booked"), manager)
        .unwrap();
    let job = job_service(&mut conn)
        .transition(job.job.id, JobStatus::InProgress, None, manager)
        .unwrap();
    let job = job_service(&mut conn)
        .transition(job.job.id, JobStatus::Completed, Some("signed off"), manager)
        .unwrap();

    assert_eq!(job.job.status, JobStatus::Completed);
    assert_eq!(job.history.len(), 3);
    assert_eq!(job.history[0].from_status, JobStatus::Pending);
    assert_eq!(job.history[0].to_status, JobStatus::Scheduled);
    assert_eq!(job.history[0].note.as_deref(), Some("crew booked"));
    assert_eq!(job.history[2].to_status, JobStatus::Completed);
    assert_eq!(job.history[2].changed_by, manager);
}

#[test]
fn crew_replacement_accepts_only_active_users() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Crew BV");
    let tech_a = seed_user(&conn, "tech.a", Role::Technician);
    let tech_b = seed_user(&conn, "tech.b", Role::Technician);

    let job = job_service(&mut conn)
        .create_job(JobOrder::new(client_id, "Two-person job"))
        .unwrap();

    let job = job_service(&mut conn)
        .replace_crew(job.job.id, &[tech_b, tech_a])
        .unwrap();
    let mut expected = vec![tech_a, tech_b];
    expected.sort_unstable();
    assert_eq!(job.crew, expected);

    {
        let users = SqliteUserRepository::try_new(&conn).unwrap();
        users.set_active(tech_b, false).unwrap();
    }
    let err = job_service(&mut conn)
        .replace_crew(job.job.id, &[tech_a, tech_b])
        .unwrap_err();
    assert!(matches!(err, JobServiceError::Repo(RepoError::Constraint(_))));

    let err = job_service(&mut conn)
        .replace_crew(job.job.id, &[Uuid::new_v4()])
        .unwrap_err();
    assert!(matches!(
        err,
        JobServiceError::Repo(RepoError::NotFound { entity: "user", .. })
    ));
}

#[test]
fn completed_and_in_progress_jobs_cannot_be_deleted() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Delete BV");
    let manager = seed_user(&conn, "manager", Role::Manager);

    let job = job_service(&mut conn)
        .create_job(JobOrder::new(client_id, "Protected job"))
        .unwrap();
    job_service(&mut conn)
        .transition(job.job.id, JobStatus::Scheduled, None, manager)
        .unwrap();
    job_service(&mut conn)
        .transition(job.job.id, JobStatus::InProgress, None, manager)
        .unwrap();

    let err = job_service(&mut conn).delete_job(job.job.id).unwrap_err();
    assert!(matches!(
        err,
        JobServiceError::DeleteForbidden(JobStatus::InProgress)
    ));

    job_service(&mut conn)
        .transition(job.job.id, JobStatus::Completed, None, manager)
        .unwrap();
    let err = job_service(&mut conn).delete_job(job.job.id).unwrap_err();
    assert!(matches!(
        err,
        JobServiceError::DeleteForbidden(JobStatus::Completed)
    ));

    let pending = job_service(&mut conn)
        .create_job(JobOrder::new(client_id, "Disposable job"))
        .unwrap();
    job_service(&mut conn).delete_job(pending.job.id).unwrap();
    assert!(job_service(&mut conn)
        .get_detail(pending.job.id)
        .unwrap()
        .is_none());
}

#[test]
fn creation_from_quotation_requires_acceptance() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "From Quote BV");

    let quotation = {
        let mut service =
            QuotationService::new(SqliteQuotationRepository::try_new(&mut conn).unwrap());
        let draft = service
            .create_draft(
                Quotation::new(client_id),
                vec![LineItem::new("Annual contract", 12, 15_000)],
            )
            .unwrap();
        service.send(draft.quotation.id).unwrap()
    };

    let err = job_service(&mut conn)
        .create_from_quotation(&quotation, "Too early", None)
        .unwrap_err();
    assert!(matches!(
        err,
        JobServiceError::QuotationNotAccepted(QuotationStatus::Sent)
    ));

    let accepted = {
        let mut service =
            QuotationService::new(SqliteQuotationRepository::try_new(&mut conn).unwrap());
        service.accept(quotation.quotation.id).unwrap()
    };
    let job = job_service(&mut conn)
        .create_from_quotation(&accepted, "Annual contract work", Some("12 visits".to_string()))
        .unwrap();
    assert_eq!(job.job.client_id, client_id);
    assert_eq!(job.job.quotation_id, Some(accepted.quotation.id));
    assert_eq!(job.job.status, JobStatus::Pending);
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

fn job_service(conn: &mut Connection) -> JobService<SqliteJobRepository<'_>> {
    JobService::new(SqliteJobRepository::try_new(conn).unwrap())
}
