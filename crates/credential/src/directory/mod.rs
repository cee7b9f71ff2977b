//! Remote directory abstraction
//!
//! Handlers talk to the identity directory only through [`DirectoryClient`].
//! [`GraphClient`] is the HTTP implementation; tests use
//! [`InMemoryDirectory`](crate::testing::InMemoryDirectory).

mod graph;

pub use graph::{DEFAULT_API_VERSION, DEFAULT_ENDPOINT, GraphClient, GraphConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{Credential, CredentialKind, DirectoryError, OperationContext};

/// Kind of directory object that owns credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    /// Service principal
    ServicePrincipal,
    /// Application registration
    Application,
}

impl ParentKind {
    /// Path segment of the object collection in the directory API
    pub fn collection(self) -> &'static str {
        match self {
            Self::ServicePrincipal => "servicePrincipals",
            Self::Application => "applications",
        }
    }

    /// Lock namespace shared by every resource mutating this kind of parent
    ///
    /// Certificate and password resources of the same parent share it, so
    /// their read-modify-write cycles serialize with each other as well.
    pub fn lock_namespace(self) -> &'static str {
        match self {
            Self::ServicePrincipal => "azuread_service_principal",
            Self::Application => "azuread_application",
        }
    }
}

impl fmt::Display for ParentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ServicePrincipal => f.write_str("service principal"),
            Self::Application => f.write_str("application"),
        }
    }
}

/// Minimal view of a parent directory object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryObject {
    /// Object ID
    pub object_id: String,
    /// Display name, if the API returned one
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Result of looking up something that may legitimately be absent
///
/// Absence is drift, not failure: handlers react to it by clearing state
/// rather than erroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The object exists
    Found(T),
    /// The object does not exist
    NotFound,
}

impl<T> Lookup<T> {
    /// Convert into an `Option`
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }

    /// Returns `true` if the object exists
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }
}

/// Operations the lifecycle handlers need from the directory
///
/// Updates replace the parent's whole list of the given kind. Reads are
/// eventually consistent: a list fetched right after an update may not
/// reflect it yet.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Fetch a parent object
    ///
    /// Returns [`Lookup::NotFound`] when the object does not exist.
    async fn get(
        &self,
        ctx: &OperationContext,
        parent_kind: ParentKind,
        object_id: &str,
    ) -> Result<Lookup<DirectoryObject>, DirectoryError>;

    /// List the parent's credentials of `kind`
    async fn list_credentials(
        &self,
        ctx: &OperationContext,
        parent_kind: ParentKind,
        object_id: &str,
        kind: CredentialKind,
    ) -> Result<Vec<Credential>, DirectoryError>;

    /// Replace the parent's credentials of `kind` with `credentials`
    async fn update_credentials(
        &self,
        ctx: &OperationContext,
        parent_kind: ParentKind,
        object_id: &str,
        kind: CredentialKind,
        credentials: &[Credential],
    ) -> Result<(), DirectoryError>;
}
