//! Lead pipeline use-case service.
//!
//! # Responsibility
//! - Provide lead create/update/transition/convert/list APIs.
//! - Enforce the pipeline transition table and conversion preconditions.
//!
//! # Invariants
//! - Conversion builds the client (and optional site) from the lead and
//!   hands both to the repository in one atomic operation.
//! - A converted or lost lead never converts again.

use crate::model::client::{Client, Site};
use crate::model::lead::{Lead, LeadId, LeadStatus};
use crate::model::ValidationError;
use crate::repo::lead_repo::{LeadListQuery, LeadRepository};
use crate::repo::{RepoError, RepoResult};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for lead use-cases.
#[derive(Debug)]
pub enum LeadServiceError {
    LeadNotFound(LeadId),
    /// Requested pipeline move is not in the transition table.
    InvalidTransition { from: LeadStatus, to: LeadStatus },
    /// Conversion requested for a converted/lost lead.
    NotConvertible(LeadStatus),
    Validation(ValidationError),
    Repo(RepoError),
    /// Write/read-back mismatch.
    InconsistentState(&'static str),
}

impl Display for LeadServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LeadNotFound(id) => write!(f, "lead not found: {id}"),
            Self::InvalidTransition { from, to } => write!(
                f,
                "lead cannot move from `{}` to `{}`",
                from.as_str(),
                to.as_str()
            ),
            Self::NotConvertible(status) => {
                write!(f, "lead in status `{}` cannot convert", status.as_str())
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent lead state: {details}"),
        }
    }
}

impl Error for LeadServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LeadServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { entity: "lead", id } => Self::LeadNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Overrides for the lead-to-client conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertLeadRequest {
    /// Client name; defaults to the lead name.
    pub client_name: Option<String>,
    /// Contact person; defaults to the lead name.
    pub contact_name: Option<String>,
    /// Label for the site created from the lead address.
    pub site_label: Option<String>,
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConvertedLead {
    pub lead: Lead,
    pub client: Client,
    pub site: Option<Site>,
}

/// Lead service facade over repository implementations.
pub struct LeadService<R: LeadRepository> {
    repo: R,
}

impl<R: LeadRepository> LeadService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn create_lead(&self, lead: Lead) -> Result<Lead, LeadServiceError> {
        lead.validate().map_err(LeadServiceError::Validation)?;
        let id = self.repo.create_lead(&lead)?;
        self.repo
            .get_lead(id)?
            .ok_or(LeadServiceError::InconsistentState(
                "created lead not found in read-back",
            ))
    }

    pub fn update_lead(&self, lead: Lead) -> Result<Lead, LeadServiceError> {
        lead.validate().map_err(LeadServiceError::Validation)?;
        self.repo.update_lead(&lead)?;
        self.repo
            .get_lead(lead.id)?
            .ok_or(LeadServiceError::InconsistentState(
                "updated lead not found in read-back",
            ))
    }

    /// Moves a lead along the pipeline (everything except conversion).
    pub fn transition(&self, id: LeadId, to: LeadStatus) -> Result<Lead, LeadServiceError> {
        let lead = self
            .repo
            .get_lead(id)?
            .ok_or(LeadServiceError::LeadNotFound(id))?;

        if !lead.status.can_transition(to) {
            return Err(LeadServiceError::InvalidTransition {
                from: lead.status,
                to,
            });
        }

        self.repo.set_status(id, to)?;
        self.repo
            .get_lead(id)?
            .ok_or(LeadServiceError::InconsistentState(
                "lead missing after transition",
            ))
    }

    /// Converts the lead into a client, carrying contact data over and
    /// creating a site when the lead has an address.
    pub fn convert(
        &mut self,
        id: LeadId,
        request: ConvertLeadRequest,
    ) -> Result<ConvertedLead, LeadServiceError> {
        let lead = self
            .repo
            .get_lead(id)?
            .ok_or(LeadServiceError::LeadNotFound(id))?;
        if !lead.status.convertible() {
            return Err(LeadServiceError::NotConvertible(lead.status));
        }

        let mut client = Client::new(
            request
                .client_name
                .unwrap_or_else(|| lead.name.clone()),
        );
        client.contact_name = request.contact_name.or_else(|| Some(lead.name.clone()));
        client.email = lead.email.clone();
        client.phone = lead.phone.clone();
        client.validate().map_err(LeadServiceError::Validation)?;

        let site = lead.address.as_ref().map(|address| {
            let label = request
                .site_label
                .unwrap_or_else(|| "Main site".to_string());
            Site::new(client.id, label, address.clone())
        });
        if let Some(site) = site.as_ref() {
            site.validate().map_err(LeadServiceError::Validation)?;
        }

        self.repo.convert(id, &client, site.as_ref())?;

        let lead = self
            .repo
            .get_lead(id)?
            .ok_or(LeadServiceError::InconsistentState(
                "lead missing after conversion",
            ))?;
        Ok(ConvertedLead { lead, client, site })
    }

    pub fn get_lead(&self, id: LeadId) -> RepoResult<Option<Lead>> {
        self.repo.get_lead(id)
    }

    pub fn list_leads(&self, query: &LeadListQuery) -> RepoResult<Vec<Lead>> {
        self.repo.list_leads(query)
    }
}
