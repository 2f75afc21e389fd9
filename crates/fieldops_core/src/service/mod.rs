//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Enforce lifecycle transition tables above the persistence layer.
//! - Keep API/edge layers decoupled from storage details.

pub mod invoice_service;
pub mod job_service;
pub mod lead_service;
pub mod quotation_service;
pub mod schedule_service;
pub mod user_service;
