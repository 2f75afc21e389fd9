use fieldops_core::db::open_db_in_memory;
use fieldops_core::{
    Client, ClientRepository, LineItem, Quotation, QuotationService, QuotationServiceError,
    QuotationStatus, RepoError, Site, SqliteClientRepository, SqliteQuotationRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

#[test]
fn drafts_get_sequential_numbers_and_derived_totals() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Totals BV");

    let mut quotation = Quotation::new(client_id);
    quotation.tax_rate_bp = 2_100;
    let first = quotation_service(&mut conn)
        .create_draft(
            quotation,
            vec![
                LineItem::new("Quarterly pest control", 4, 9_500),
                LineItem::new("Rodent stations", 6, 1_250),
            ],
        )
        .unwrap();

    assert_eq!(first.quotation.number, "Q-0001");
    assert_eq!(first.quotation.status, QuotationStatus::Draft);
    assert_eq!(first.totals.subtotal_cents, 45_500);
    assert_eq!(first.totals.tax_cents, 9_555);
    assert_eq!(first.totals.total_cents, 55_055);
    assert_eq!(first.items[0].position, 0);
    assert_eq!(first.items[1].position, 1);

    let second = quotation_service(&mut conn)
        .create_draft(Quotation::new(client_id), vec![])
        .unwrap();
    assert_eq!(second.quotation.number, "Q-0002");
}

#[test]
fn item_replacement_is_draft_only() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Locked Items BV");

    let draft = quotation_service(&mut conn)
        .create_draft(
            Quotation::new(client_id),
            vec![LineItem::new("Initial visit", 1, 5_000)],
        )
        .unwrap();

    let replaced = quotation_service(&mut conn)
        .replace_items(
            draft.quotation.id,
            vec![
                LineItem::new("Initial visit", 1, 5_000),
                LineItem::new("Follow-up", 2, 3_000),
            ],
        )
        .unwrap();
    assert_eq!(replaced.items.len(), 2);

    quotation_service(&mut conn).send(draft.quotation.id).unwrap();
    let err = quotation_service(&mut conn)
        .replace_items(draft.quotation.id, vec![])
        .unwrap_err();
    assert!(matches!(
        err,
        QuotationServiceError::NotDraft(QuotationStatus::Sent)
    ));
}

#[test]
fn sending_an_empty_quotation_is_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Empty BV");

    let draft = quotation_service(&mut conn)
        .create_draft(Quotation::new(client_id), vec![])
        .unwrap();

    let err = quotation_service(&mut conn)
        .send(draft.quotation.id)
        .unwrap_err();
    assert!(matches!(err, QuotationServiceError::NoItems(id) if id == draft.quotation.id));
}

#[test]
fn verdicts_require_a_sent_quotation() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Verdict BV");

    let draft = quotation_service(&mut conn)
        .create_draft(
            Quotation::new(client_id),
            vec![LineItem::new("One-off treatment", 1, 18_000)],
        )
        .unwrap();

    let err = quotation_service(&mut conn)
        .accept(draft.quotation.id)
        .unwrap_err();
    assert!(matches!(
        err,
        QuotationServiceError::InvalidTransition {
            from: QuotationStatus::Draft,
            to: QuotationStatus::Accepted
        }
    ));

    quotation_service(&mut conn).send(draft.quotation.id).unwrap();
    let accepted = quotation_service(&mut conn)
        .accept(draft.quotation.id)
        .unwrap();
    assert_eq!(accepted.quotation.status, QuotationStatus::Accepted);

    let err = quotation_service(&mut conn)
        .decline(draft.quotation.id)
        .unwrap_err();
    assert!(matches!(
        err,
        QuotationServiceError::InvalidTransition {
            from: QuotationStatus::Accepted,
            to: QuotationStatus::Declined
        }
    ));
}

#[test]
fn linked_site_must_belong_to_the_client() {
    let mut conn = open_db_in_memory().unwrap();
    let client_id = seed_client(&conn, "Owner BV");
    let other_client = seed_client(&conn, "Other BV");

    let foreign_site = Site::new(other_client, "Foreign", "Elsewhere 9");
    {
        let client_repo = SqliteClientRepository::try_new(&conn).unwrap();
        client_repo.add_site(&foreign_site).unwrap();
    }

    let mut quotation = Quotation::new(client_id);
    quotation.site_id = Some(foreign_site.id);
    let err = quotation_service(&mut conn)
        .create_draft(quotation, vec![])
        .unwrap_err();
    assert!(matches!(
        err,
        QuotationServiceError::Repo(RepoError::Constraint(_))
    ));

    let mut quotation = Quotation::new(client_id);
    quotation.site_id = Some(Uuid::new_v4());
    let err = quotation_service(&mut conn)
        .create_draft(quotation, vec![])
        .unwrap_err();
    assert!(matches!(err, QuotationServiceError::Repo(RepoError::NotFound { .. })));
}

fn seed_client(conn: &Connection, name: &str) -> Uuid {
    let repo = SqliteClientRepository::try_new(conn).unwrap();
    repo.create_client(&Client::new(name)).unwrap()
}

fn quotation_service(conn: &mut Connection) -> QuotationService<SqliteQuotationRepository<'_>> {
    QuotationService::new(SqliteQuotationRepository::try_new(conn).unwrap())
}
