//! Core domain logic for the fieldops business management system.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::client::{Client, ClientId, Site, SiteId};
pub use model::invoice::{Invoice, InvoiceId, InvoiceStatus, Payment, PaymentMethod};
pub use model::job_order::{JobOrder, JobOrderId, JobStatus, JobStatusUpdate};
pub use model::lead::{Lead, LeadId, LeadStatus};
pub use model::line_item::{compute_totals, DocumentTotals, LineItem};
pub use model::quotation::{Quotation, QuotationId, QuotationStatus};
pub use model::schedule::{ScheduleEntry, ScheduleEntryId, ScheduleStatus};
pub use model::user::{Role, User, UserId};
pub use model::ValidationError;
pub use repo::client_repo::{ClientListQuery, ClientRepository, SqliteClientRepository};
pub use repo::invoice_repo::{
    InvoiceDetail, InvoiceListQuery, InvoiceRepoError, InvoiceRepository, SqliteInvoiceRepository,
};
pub use repo::job_repo::{JobDetail, JobListQuery, JobRepository, SqliteJobRepository};
pub use repo::lead_repo::{LeadListQuery, LeadRepository, SqliteLeadRepository};
pub use repo::quotation_repo::{
    QuotationDetail, QuotationListQuery, QuotationRepository, SqliteQuotationRepository,
};
pub use repo::schedule_repo::{
    ScheduleConflict, ScheduleEntryDetail, ScheduleRepoError, ScheduleRepository,
    ScheduleWindowQuery, SqliteScheduleRepository,
};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::invoice_service::{InvoiceService, InvoiceServiceError};
pub use service::job_service::{JobService, JobServiceError};
pub use service::lead_service::{ConvertLeadRequest, ConvertedLead, LeadService, LeadServiceError};
pub use service::quotation_service::{QuotationService, QuotationServiceError};
pub use service::schedule_service::{BookingOutcome, ScheduleService, ScheduleServiceError};
pub use service::user_service::{UserService, UserServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
