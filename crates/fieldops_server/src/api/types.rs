//! Request and response DTOs for the JSON API.
//!
//! Core read models (`Client`, `QuotationDetail`, `InvoiceDetail`, ...)
//! serialize directly; the types here cover inbound payloads and the few
//! composite responses.

use fieldops_core::{
    Client, JobStatus, LeadStatus, LineItem, PaymentMethod, Role, ScheduleConflict,
    ScheduleEntryDetail, ScheduleStatus, Site, User,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// `GET /status` payload: service version plus the calling account.
#[derive(Debug, Serialize)]
pub struct StatusData {
    pub version: String,
    pub user: User,
}

// ---------------------------------------------------------------------------
// Clients and sites
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ClientPayload {
    pub name: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    pub archived: bool,
}

#[derive(Debug, Deserialize)]
pub struct SitePayload {
    pub label: String,
    pub address: String,
    #[serde(default)]
    pub access_notes: Option<String>,
}

/// `GET /clients/{id}` payload: the client plus its sites.
#[derive(Debug, Serialize)]
pub struct ClientDetailData {
    pub client: Client,
    pub sites: Vec<Site>,
}

// ---------------------------------------------------------------------------
// Leads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LeadPayload {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LeadStatusRequest {
    pub status: LeadStatus,
}

#[derive(Debug, Deserialize, Default)]
pub struct ConvertLeadPayload {
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub site_label: Option<String>,
}

// ---------------------------------------------------------------------------
// Priced documents
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl LineItemInput {
    pub fn into_item(self) -> LineItem {
        LineItem::new(self.description, self.quantity, self.unit_price_cents)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateQuotationRequest {
    pub client_id: Uuid,
    #[serde(default)]
    pub site_id: Option<Uuid>,
    #[serde(default)]
    pub tax_rate_bp: u32,
    #[serde(default)]
    pub valid_until: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceItemsRequest {
    pub items: Vec<LineItemInput>,
}

// ---------------------------------------------------------------------------
// Job orders
// ---------------------------------------------------------------------------

/// Job creation: either directly against a client, or from an accepted
/// quotation (which then provides the client/site linkage).
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    #[serde(default)]
    pub client_id: Option<Uuid>,
    #[serde(default)]
    pub quotation_id: Option<Uuid>,
    #[serde(default)]
    pub site_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobInfoRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JobStatusRequest {
    pub status: JobStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CrewRequest {
    pub crew: Vec<Uuid>,
}

// ---------------------------------------------------------------------------
// Invoices
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    #[serde(default)]
    pub client_id: Option<Uuid>,
    #[serde(default)]
    pub job_order_id: Option<Uuid>,
    pub issued_at: i64,
    #[serde(default)]
    pub due_at: Option<i64>,
    #[serde(default)]
    pub tax_rate_bp: u32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItemInput>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub amount_cents: i64,
    pub method: PaymentMethod,
    #[serde(default)]
    pub reference: Option<String>,
    /// Defaults to the server clock when omitted.
    #[serde(default)]
    pub paid_at: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    #[serde(default)]
    pub job_order_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    pub starts_at: i64,
    pub ends_at: i64,
    #[serde(default)]
    pub notes: Option<String>,
    pub assignees: Vec<Uuid>,
    #[serde(default)]
    pub allow_conflicts: bool,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub starts_at: i64,
    pub ends_at: i64,
    #[serde(default)]
    pub allow_conflicts: bool,
}

#[derive(Debug, Deserialize)]
pub struct AssigneesRequest {
    pub assignees: Vec<Uuid>,
    #[serde(default)]
    pub allow_conflicts: bool,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleStatusRequest {
    pub status: ScheduleStatus,
}

/// Booking response: the entry plus any conflicts the caller overrode.
#[derive(Debug, Serialize)]
pub struct BookingData {
    pub entry: ScheduleEntryDetail,
    pub overridden_conflicts: Vec<ScheduleConflict>,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UserProfileRequest {
    pub display_name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    #[serde(default = "default_true")]
    pub active: bool,
}
