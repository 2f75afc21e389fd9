use fieldops_core::db::open_db_in_memory;
use fieldops_core::service::lead_service::ConvertLeadRequest;
use fieldops_core::{
    ClientRepository, Lead, LeadListQuery, LeadService, LeadServiceError, LeadStatus,
    SqliteClientRepository, SqliteLeadRepository, ValidationError,
};
use rusqlite::Connection;

#[test]
fn lead_requires_a_contact_channel() {
    let mut conn = open_db_in_memory().unwrap();
    let service = lead_service(&mut conn);

    let err = service.create_lead(Lead::new("No Contact")).unwrap_err();
    assert!(matches!(
        err,
        LeadServiceError::Validation(ValidationError::MissingContact)
    ));
}

#[test]
fn pipeline_moves_follow_the_transition_table() {
    let mut conn = open_db_in_memory().unwrap();

    let lead = lead_service(&mut conn)
        .create_lead(sample_lead("Pipeline Test"))
        .unwrap();
    assert_eq!(lead.status, LeadStatus::New);

    let lead = lead_service(&mut conn)
        .transition(lead.id, LeadStatus::Contacted)
        .unwrap();
    assert_eq!(lead.status, LeadStatus::Contacted);

    let lead = lead_service(&mut conn)
        .transition(lead.id, LeadStatus::Qualified)
        .unwrap();
    assert_eq!(lead.status, LeadStatus::Qualified);

    let err = lead_service(&mut conn)
        .transition(lead.id, LeadStatus::New)
        .unwrap_err();
    assert!(matches!(
        err,
        LeadServiceError::InvalidTransition {
            from: LeadStatus::Qualified,
            to: LeadStatus::New
        }
    ));
}

#[test]
fn conversion_creates_client_and_site_from_lead_data() {
    let mut conn = open_db_in_memory().unwrap();

    let mut draft = sample_lead("Bakkerij Jansen");
    draft.address = Some("Molenstraat 12".to_string());
    let lead = lead_service(&mut conn).create_lead(draft).unwrap();

    let converted = lead_service(&mut conn)
        .convert(lead.id, ConvertLeadRequest::default())
        .unwrap();

    assert_eq!(converted.lead.status, LeadStatus::Converted);
    assert_eq!(
        converted.lead.converted_client_id,
        Some(converted.client.id)
    );
    assert_eq!(converted.client.name, "Bakkerij Jansen");
    assert_eq!(converted.client.phone.as_deref(), Some("+31201234567"));

    let site = converted.site.expect("lead with address should get a site");
    assert_eq!(site.address, "Molenstraat 12");
    assert_eq!(site.label, "Main site");

    // Client and site are visible through the client repository.
    let client_repo = SqliteClientRepository::try_new(&conn).unwrap();
    assert!(client_repo
        .get_client(converted.client.id)
        .unwrap()
        .is_some());
    assert_eq!(client_repo.list_sites(converted.client.id).unwrap().len(), 1);
}

#[test]
fn conversion_is_rejected_for_terminal_leads() {
    let mut conn = open_db_in_memory().unwrap();

    let lead = lead_service(&mut conn)
        .create_lead(sample_lead("One Shot"))
        .unwrap();
    lead_service(&mut conn)
        .convert(lead.id, ConvertLeadRequest::default())
        .unwrap();

    let err = lead_service(&mut conn)
        .convert(lead.id, ConvertLeadRequest::default())
        .unwrap_err();
    assert!(matches!(
        err,
        LeadServiceError::NotConvertible(LeadStatus::Converted)
    ));

    let lost = lead_service(&mut conn)
        .create_lead(sample_lead("Walked Away"))
        .unwrap();
    lead_service(&mut conn)
        .transition(lost.id, LeadStatus::Lost)
        .unwrap();
    let err = lead_service(&mut conn)
        .convert(lost.id, ConvertLeadRequest::default())
        .unwrap_err();
    assert!(matches!(
        err,
        LeadServiceError::NotConvertible(LeadStatus::Lost)
    ));
}

#[test]
fn listing_filters_by_status() {
    let mut conn = open_db_in_memory().unwrap();

    let first = lead_service(&mut conn)
        .create_lead(sample_lead("First"))
        .unwrap();
    lead_service(&mut conn)
        .create_lead(sample_lead("Second"))
        .unwrap();
    lead_service(&mut conn)
        .transition(first.id, LeadStatus::Lost)
        .unwrap();

    let lost = lead_service(&mut conn)
        .list_leads(&LeadListQuery {
            status: Some(LeadStatus::Lost),
            ..LeadListQuery::default()
        })
        .unwrap();
    assert_eq!(lost.len(), 1);
    assert_eq!(lost[0].id, first.id);

    let fresh = lead_service(&mut conn)
        .list_leads(&LeadListQuery {
            status: Some(LeadStatus::New),
            ..LeadListQuery::default()
        })
        .unwrap();
    assert_eq!(fresh.len(), 1);
}

fn sample_lead(name: &str) -> Lead {
    let mut lead = Lead::new(name);
    lead.phone = Some("+31201234567".to_string());
    lead.source = Some("website".to_string());
    lead
}

fn lead_service(conn: &mut Connection) -> LeadService<SqliteLeadRepository<'_>> {
    LeadService::new(SqliteLeadRepository::try_new(conn).unwrap())
}
