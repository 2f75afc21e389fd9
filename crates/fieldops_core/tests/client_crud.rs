use fieldops_core::db::open_db_in_memory;
use fieldops_core::{
    Client, ClientListQuery, ClientRepository, RepoError, Site, SqliteClientRepository,
    ValidationError,
};
use uuid::Uuid;

#[test]
fn create_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();

    let mut client = Client::new("Harbor Bakery");
    client.email = Some("office@harborbakery.test".to_string());
    let id = repo.create_client(&client).unwrap();

    let loaded = repo.get_client(id).unwrap().unwrap();
    assert_eq!(loaded.name, "Harbor Bakery");
    assert_eq!(loaded.email.as_deref(), Some("office@harborbakery.test"));
    assert!(!loaded.archived);
}

#[test]
fn validation_blocks_blank_name_and_bad_email() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();

    let blank = Client::new("   ");
    assert!(matches!(
        repo.create_client(&blank).unwrap_err(),
        RepoError::Validation(ValidationError::BlankField("name"))
    ));

    let mut bad_email = Client::new("Good Name");
    bad_email.email = Some("not an email".to_string());
    assert!(matches!(
        repo.create_client(&bad_email).unwrap_err(),
        RepoError::Validation(ValidationError::InvalidEmail(_))
    ));
}

#[test]
fn archived_clients_are_hidden_from_default_listing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();

    let active = repo.create_client(&Client::new("Active Co")).unwrap();
    let dormant = repo.create_client(&Client::new("Dormant Co")).unwrap();
    repo.set_archived(dormant, true).unwrap();

    let visible = repo.list_clients(&ClientListQuery::default()).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, active);

    let all = repo
        .list_clients(&ClientListQuery {
            include_archived: true,
            ..ClientListQuery::default()
        })
        .unwrap();
    assert_eq!(all.len(), 2);

    repo.set_archived(dormant, false).unwrap();
    let visible = repo.list_clients(&ClientListQuery::default()).unwrap();
    assert_eq!(visible.len(), 2);
}

#[test]
fn update_missing_client_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();

    let ghost = Client::new("Ghost");
    let err = repo.update_client(&ghost).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            entity: "client",
            id
        } if id == ghost.id
    ));
}

#[test]
fn sites_belong_to_their_client() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();

    let client_id = repo.create_client(&Client::new("Warehouse Group")).unwrap();
    let site_a = Site::new(client_id, "North hall", "Dockweg 1");
    let site_b = Site::new(client_id, "South hall", "Dockweg 2");
    repo.add_site(&site_a).unwrap();
    repo.add_site(&site_b).unwrap();

    let sites = repo.list_sites(client_id).unwrap();
    assert_eq!(sites.len(), 2);
    assert_eq!(sites[0].label, "North hall");

    let orphan = Site::new(Uuid::new_v4(), "Nowhere", "Void 0");
    assert!(matches!(
        repo.add_site(&orphan).unwrap_err(),
        RepoError::Constraint(_)
    ));

    repo.remove_site(site_a.id).unwrap();
    assert_eq!(repo.list_sites(client_id).unwrap().len(), 1);
    assert!(repo.get_site(site_a.id).unwrap().is_none());
}

#[test]
fn site_updates_replace_contact_fields() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteClientRepository::try_new(&conn).unwrap();

    let client_id = repo.create_client(&Client::new("Office Park")).unwrap();
    let mut site = Site::new(client_id, "Tower A", "Parklaan 5");
    repo.add_site(&site).unwrap();

    site.access_notes = Some("badge at reception".to_string());
    site.address = "Parklaan 5, floor 3".to_string();
    repo.update_site(&site).unwrap();

    let loaded = repo.get_site(site.id).unwrap().unwrap();
    assert_eq!(loaded.address, "Parklaan 5, floor 3");
    assert_eq!(loaded.access_notes.as_deref(), Some("badge at reception"));
}
