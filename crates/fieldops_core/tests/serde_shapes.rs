use fieldops_core::{
    Client, InvoiceStatus, JobStatus, LeadStatus, PaymentMethod, QuotationStatus, Role,
    ScheduleStatus, User,
};
use serde_json::json;

#[test]
fn statuses_serialize_as_snake_case_strings() {
    assert_eq!(json!(JobStatus::InProgress), json!("in_progress"));
    assert_eq!(json!(InvoiceStatus::PartiallyPaid), json!("partially_paid"));
    assert_eq!(json!(ScheduleStatus::NoShow), json!("no_show"));
    assert_eq!(json!(LeadStatus::Qualified), json!("qualified"));
    assert_eq!(json!(QuotationStatus::Declined), json!("declined"));
    assert_eq!(json!(PaymentMethod::BankTransfer), json!("bank_transfer"));
}

#[test]
fn status_strings_roundtrip_through_parse() {
    for status in [
        JobStatus::Pending,
        JobStatus::Scheduled,
        JobStatus::InProgress,
        JobStatus::Completed,
        JobStatus::Cancelled,
    ] {
        assert_eq!(JobStatus::parse(status.as_str()), Some(status));
    }
    assert_eq!(JobStatus::parse("paused"), None);

    for status in [
        ScheduleStatus::Scheduled,
        ScheduleStatus::Confirmed,
        ScheduleStatus::Completed,
        ScheduleStatus::Cancelled,
        ScheduleStatus::NoShow,
    ] {
        assert_eq!(ScheduleStatus::parse(status.as_str()), Some(status));
    }
}

#[test]
fn client_json_shape_is_stable() {
    let mut client = Client::new("Shape BV");
    client.email = Some("shape@example.test".to_string());
    let value = serde_json::to_value(&client).unwrap();

    assert_eq!(value["name"], "Shape BV");
    assert_eq!(value["email"], "shape@example.test");
    assert_eq!(value["archived"], false);
    assert!(value["contact_name"].is_null());
}

#[test]
fn user_json_never_carries_the_password_hash() {
    let user = User::new("j.doe", "J. Doe", Role::Technician, "salt$digest");
    let value = serde_json::to_value(&user).unwrap();

    assert!(value.get("password_hash").is_none());
    assert_eq!(value["username"], "j.doe");
    assert_eq!(value["role"], "technician");
}
