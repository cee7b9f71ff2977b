//! Orchestrator-facing credential resources
mod handler;
mod schema;

pub use handler::{CredentialResource, ReadOutcome};
pub use schema::{
    CERTIFICATE_TYPES, CERTIFICATE_USAGE, CredentialSpec, DEFAULT_CERTIFICATE_TYPE, ResourceRecord,
};
