//! Core types for credential reconciliation
mod context;
mod credential;
mod error;
mod id;
mod secure;
mod time;

pub use context::OperationContext;
pub use credential::Credential;
pub use error::{
    AlreadyExistsError, CredentialError, DirectoryError, ParseError, ReplicationError, Result,
    SpecError,
};
pub use id::{CredentialIdentifier, CredentialKind, SEPARATOR};
pub use secure::SecureString;
pub use time::{format_rfc3339, parse_rfc3339};
