//! Azure AD Credential - key and password reconciliation for directory objects
//!
//! Manages certificate and password credentials attached to Azure AD service
//! principals and applications on behalf of an infrastructure orchestrator.
//!
//! # Features
//!
//! - **Stable identifiers** - `<parentObjectID>/<kind>/<keyID>` persisted in orchestrator state
//! - **Safe read-modify-write** - whole-list updates serialized per parent
//! - **Eventual consistency** - creates wait until the new key is readable
//! - **Drift tolerance** - vanished parents and keys clear state instead of failing
//! - **Secret hygiene** - credential values are zeroized and never logged
//!
//! # Example
//!
//! ```
//! use azuread_credential::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), CredentialError> {
//! let directory = Arc::new(InMemoryDirectory::new());
//! directory.insert_parent(ParentKind::ServicePrincipal, "sp-1");
//!
//! let certificates =
//!     CredentialResource::service_principal_certificate(directory, LockTable::new());
//! let ctx = certificates.timeouts().context_for_create();
//! let spec = CredentialSpec::new("sp-1", "-----BEGIN CERTIFICATE-----")
//!     .with_key_id("key-abc")
//!     .with_end_date_relative("8760h");
//!
//! let record = certificates.create(&ctx, &spec).await?;
//! assert_eq!(record.id.to_string(), "sp-1/certificate/key-abc");
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

/// Provider configuration
pub mod config;
/// Core types, errors, and primitives
pub mod core;
/// Directory client abstraction and the Graph implementation
pub mod directory;
/// Per-parent mutual exclusion
pub mod lock;
/// List merge logic and the replication waiter
pub mod reconcile;
/// Lifecycle handlers and resource schema
pub mod resource;
/// In-memory directory for tests
pub mod testing;

// ── Root re-exports ──────────────────────────────────────────────

pub use crate::core::{
    Credential, CredentialError, CredentialIdentifier, CredentialKind, OperationContext,
    ParseError, Result,
};
pub use crate::resource::{CredentialResource, CredentialSpec, ReadOutcome, ResourceRecord};

/// Commonly used types and traits
pub mod prelude {
    pub use crate::config::{ConfigError, ProviderConfig, Timeouts};
    pub use crate::core::{
        Credential, CredentialError, CredentialIdentifier, CredentialKind, DirectoryError,
        OperationContext, ParseError, ReplicationError, SecureString, SpecError,
    };
    pub use crate::directory::{
        DirectoryClient, DirectoryObject, GraphClient, GraphConfig, Lookup, ParentKind,
    };
    pub use crate::lock::{LockGuard, LockTable};
    pub use crate::reconcile::ReplicationPolicy;
    pub use crate::resource::{CredentialResource, CredentialSpec, ReadOutcome, ResourceRecord};
    pub use crate::testing::InMemoryDirectory;
}
