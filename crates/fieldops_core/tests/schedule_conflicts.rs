use fieldops_core::db::open_db_in_memory;
use fieldops_core::{
    Client, ClientRepository, JobOrder, JobService, JobStatus, Role, ScheduleEntry,
    ScheduleService, ScheduleServiceError, ScheduleStatus, ScheduleWindowQuery,
    SqliteClientRepository, SqliteJobRepository, SqliteScheduleRepository, SqliteUserRepository,
    User, UserRepository, ValidationError,
};
use rusqlite::Connection;
use uuid::Uuid;

const T0: i64 = 1_760_000_000_000;
const HOUR: i64 = 3_600_000;

#[test]
fn overlapping_slot_with_shared_assignee_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let ctx = Fixture::seed(&conn);

    schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Morning visit", T0, T0 + 2 * HOUR),
            &[ctx.tech_a],
            false,
            ctx.manager,
        )
        .unwrap();

    let err = schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Overlapping visit", T0 + HOUR, T0 + 3 * HOUR),
            &[ctx.tech_a, ctx.tech_b],
            false,
            ctx.manager,
        )
        .unwrap_err();

    let ScheduleServiceError::Conflict(conflicts) = err else {
        panic!("expected conflict error");
    };
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].title, "Morning visit");
    assert_eq!(conflicts[0].user_ids, vec![ctx.tech_a]);
}

#[test]
fn touching_slots_and_disjoint_crews_do_not_conflict() {
    let mut conn = open_db_in_memory().unwrap();
    let ctx = Fixture::seed(&conn);

    schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("First", T0, T0 + 2 * HOUR),
            &[ctx.tech_a],
            false,
            ctx.manager,
        )
        .unwrap();

    // Back-to-back on the same technician: [start, end) means no overlap.
    let back_to_back = schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Second", T0 + 2 * HOUR, T0 + 4 * HOUR),
            &[ctx.tech_a],
            false,
            ctx.manager,
        )
        .unwrap();
    assert!(back_to_back.overridden_conflicts.is_empty());

    // Same window, different technician.
    let parallel = schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Parallel", T0, T0 + 2 * HOUR),
            &[ctx.tech_b],
            false,
            ctx.manager,
        )
        .unwrap();
    assert!(parallel.overridden_conflicts.is_empty());
}

#[test]
fn released_entries_do_not_block_their_slot() {
    let mut conn = open_db_in_memory().unwrap();
    let ctx = Fixture::seed(&conn);

    let booked = schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("To be cancelled", T0, T0 + 2 * HOUR),
            &[ctx.tech_a],
            false,
            ctx.manager,
        )
        .unwrap();
    schedule_service(&mut conn)
        .cancel(booked.detail.entry.id)
        .unwrap();

    let rebooked = schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Replacement", T0, T0 + 2 * HOUR),
            &[ctx.tech_a],
            false,
            ctx.manager,
        )
        .unwrap();
    assert!(rebooked.overridden_conflicts.is_empty());
}

#[test]
fn override_creates_anyway_and_reports_conflicts() {
    let mut conn = open_db_in_memory().unwrap();
    let ctx = Fixture::seed(&conn);

    schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Existing", T0, T0 + 2 * HOUR),
            &[ctx.tech_a],
            false,
            ctx.manager,
        )
        .unwrap();

    let outcome = schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Forced double booking", T0 + HOUR, T0 + 2 * HOUR),
            &[ctx.tech_a],
            true,
            ctx.manager,
        )
        .unwrap();
    assert_eq!(outcome.overridden_conflicts.len(), 1);

    // Both entries exist.
    let window = schedule_service(&mut conn)
        .list_window(&ScheduleWindowQuery {
            from: T0,
            to: T0 + 4 * HOUR,
            assignee: Some(ctx.tech_a),
            include_released: false,
        })
        .unwrap();
    assert_eq!(window.len(), 2);
}

#[test]
fn reschedule_rechecks_conflicts_inside_the_transaction() {
    let mut conn = open_db_in_memory().unwrap();
    let ctx = Fixture::seed(&conn);

    schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Fixed", T0, T0 + 2 * HOUR),
            &[ctx.tech_a],
            false,
            ctx.manager,
        )
        .unwrap();
    let movable = schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Movable", T0 + 4 * HOUR, T0 + 6 * HOUR),
            &[ctx.tech_a],
            false,
            ctx.manager,
        )
        .unwrap();

    let err = schedule_service(&mut conn)
        .reschedule(movable.detail.entry.id, T0 + HOUR, T0 + 3 * HOUR, false)
        .unwrap_err();
    assert!(matches!(err, ScheduleServiceError::Conflict(_)));

    // The slot did not move.
    let detail = schedule_service(&mut conn)
        .get_detail(movable.detail.entry.id)
        .unwrap()
        .unwrap();
    assert_eq!(detail.entry.starts_at, T0 + 4 * HOUR);

    let moved = schedule_service(&mut conn)
        .reschedule(movable.detail.entry.id, T0 + 2 * HOUR, T0 + 4 * HOUR, false)
        .unwrap();
    assert_eq!(moved.detail.entry.starts_at, T0 + 2 * HOUR);
    assert!(moved.overridden_conflicts.is_empty());

    let err = schedule_service(&mut conn)
        .reschedule(movable.detail.entry.id, T0 + 3 * HOUR, T0 + 3 * HOUR, false)
        .unwrap_err();
    assert!(matches!(
        err,
        ScheduleServiceError::Validation(ValidationError::EmptyTimeRange { .. })
    ));
}

#[test]
fn assignee_replacement_rechecks_conflicts() {
    let mut conn = open_db_in_memory().unwrap();
    let ctx = Fixture::seed(&conn);

    schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Busy tech A", T0, T0 + 2 * HOUR),
            &[ctx.tech_a],
            false,
            ctx.manager,
        )
        .unwrap();
    let other = schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Tech B visit", T0, T0 + 2 * HOUR),
            &[ctx.tech_b],
            false,
            ctx.manager,
        )
        .unwrap();

    let err = schedule_service(&mut conn)
        .replace_assignees(other.detail.entry.id, &[ctx.tech_a], false)
        .unwrap_err();
    assert!(matches!(err, ScheduleServiceError::Conflict(_)));

    let err = schedule_service(&mut conn)
        .replace_assignees(other.detail.entry.id, &[], false)
        .unwrap_err();
    assert!(matches!(
        err,
        ScheduleServiceError::Validation(ValidationError::NoAssignees)
    ));

    let swapped = schedule_service(&mut conn)
        .replace_assignees(other.detail.entry.id, &[ctx.tech_b, ctx.tech_a], true)
        .unwrap();
    assert_eq!(swapped.overridden_conflicts.len(), 1);
    assert_eq!(swapped.detail.assignees.len(), 2);
}

#[test]
fn booking_a_pending_job_moves_it_to_scheduled() {
    let mut conn = open_db_in_memory().unwrap();
    let ctx = Fixture::seed(&conn);

    let job = {
        let mut service = JobService::new(SqliteJobRepository::try_new(&mut conn).unwrap());
        service
            .create_job(JobOrder::new(ctx.client, "Job with booking"))
            .unwrap()
    };

    let mut entry = ScheduleEntry::new("Execute job", T0, T0 + 2 * HOUR);
    entry.job_order_id = Some(job.job.id);
    schedule_service(&mut conn)
        .create_entry(entry, &[ctx.tech_a], false, ctx.manager)
        .unwrap();

    let job = {
        let service = JobService::new(SqliteJobRepository::try_new(&mut conn).unwrap());
        service.get_detail(job.job.id).unwrap().unwrap()
    };
    assert_eq!(job.job.status, JobStatus::Scheduled);
    assert_eq!(job.history.len(), 1);
    assert_eq!(job.history[0].to_status, JobStatus::Scheduled);
    assert_eq!(job.history[0].changed_by, ctx.manager);

    let err = {
        let mut entry = ScheduleEntry::new("Bad job link", T0 + 3 * HOUR, T0 + 4 * HOUR);
        entry.job_order_id = Some(Uuid::new_v4());
        schedule_service(&mut conn)
            .create_entry(entry, &[ctx.tech_a], false, ctx.manager)
            .unwrap_err()
    };
    assert!(matches!(err, ScheduleServiceError::Repo(_)));
}

#[test]
fn status_transitions_follow_the_table() {
    let mut conn = open_db_in_memory().unwrap();
    let ctx = Fixture::seed(&conn);

    let booked = schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Visit", T0, T0 + HOUR),
            &[ctx.tech_a],
            false,
            ctx.manager,
        )
        .unwrap();
    let id = booked.detail.entry.id;

    let err = schedule_service(&mut conn)
        .transition(id, ScheduleStatus::Completed)
        .unwrap_err();
    assert!(matches!(
        err,
        ScheduleServiceError::InvalidTransition {
            from: ScheduleStatus::Scheduled,
            to: ScheduleStatus::Completed
        }
    ));

    schedule_service(&mut conn)
        .transition(id, ScheduleStatus::Confirmed)
        .unwrap();
    let done = schedule_service(&mut conn)
        .transition(id, ScheduleStatus::Completed)
        .unwrap();
    assert_eq!(done.entry.status, ScheduleStatus::Completed);

    let err = schedule_service(&mut conn)
        .transition(id, ScheduleStatus::Cancelled)
        .unwrap_err();
    assert!(matches!(err, ScheduleServiceError::InvalidTransition { .. }));
}

#[test]
fn window_listing_filters_by_assignee_and_released_state() {
    let mut conn = open_db_in_memory().unwrap();
    let ctx = Fixture::seed(&conn);

    let visible = schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Visible", T0, T0 + HOUR),
            &[ctx.tech_a],
            false,
            ctx.manager,
        )
        .unwrap();
    let cancelled = schedule_service(&mut conn)
        .create_entry(
            ScheduleEntry::new("Cancelled", T0, T0 + HOUR),
            &[ctx.tech_b],
            false,
            ctx.manager,
        )
        .unwrap();
    schedule_service(&mut conn)
        .cancel(cancelled.detail.entry.id)
        .unwrap();

    let window = ScheduleWindowQuery {
        from: T0,
        to: T0 + 2 * HOUR,
        assignee: None,
        include_released: false,
    };
    let entries = schedule_service(&mut conn).list_window(&window).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entry.id, visible.detail.entry.id);

    let with_released = schedule_service(&mut conn)
        .list_window(&ScheduleWindowQuery {
            include_released: true,
            ..window.clone()
        })
        .unwrap();
    assert_eq!(with_released.len(), 2);

    let tech_b_only = schedule_service(&mut conn)
        .list_window(&ScheduleWindowQuery {
            assignee: Some(ctx.tech_b),
            include_released: true,
            ..window.clone()
        })
        .unwrap();
    assert_eq!(tech_b_only.len(), 1);

    let err = schedule_service(&mut conn)
        .list_window(&ScheduleWindowQuery {
            from: T0 + HOUR,
            to: T0,
            assignee: None,
            include_released: false,
        })
        .unwrap_err();
    assert!(matches!(err, ScheduleServiceError::InvalidWindow { .. }));
}

struct Fixture {
    client: Uuid,
    manager: Uuid,
    tech_a: Uuid,
    tech_b: Uuid,
}

impl Fixture {
    fn seed(conn: &Connection) -> Self {
        let clients = SqliteClientRepository::try_new(conn).unwrap();
        let client = clients.create_client(&Client::new("Fixture BV")).unwrap();

        let users = SqliteUserRepository::try_new(conn).unwrap();
        let manager = users
            .create_user(&User::new("manager", "Manager", Role::Manager, "hash"))
            .unwrap();
        let tech_a = users
            .create_user(&User::new("tech.a", "Tech A", Role::Technician, "hash"))
            .unwrap();
        let tech_b = users
            .create_user(&User::new("tech.b", "Tech B", Role::Technician, "hash"))
            .unwrap();

        Self {
            client,
            manager,
            tech_a,
            tech_b,
        }
    }
}

fn schedule_service(conn: &mut Connection) -> ScheduleService<SqliteScheduleRepository<'_>> {
    ScheduleService::new(SqliteScheduleRepository::try_new(conn).unwrap())
}
