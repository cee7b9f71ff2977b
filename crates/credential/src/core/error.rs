//! Error types for credential reconciliation
//!
//! The hierarchy mirrors the layers of the crate:
//! - [`ParseError`]: malformed persisted identifiers
//! - [`SpecError`]: invalid caller-supplied resource fields
//! - [`AlreadyExistsError`]: merge signal for a duplicate key ID
//! - [`DirectoryError`]: failures reported by the remote directory API
//! - [`ReplicationError`]: a write that never became visible
//! - [`CredentialError`]: top-level error surfaced by the lifecycle handlers
//!
//! Drift (the parent object or the credential vanished remotely) is not an
//! error at the handler boundary; see [`crate::resource::ReadOutcome`].
//!
//! ```
//! use azuread_credential::core::{CredentialError, ParseError};
//!
//! let err: CredentialError = ParseError::ComponentCount {
//!     input: "sp-1/certificate".to_string(),
//!     found: 2,
//! }
//! .into();
//! assert!(err.to_string().contains("sp-1/certificate"));
//! ```

use std::time::Duration;
use thiserror::Error;

use crate::core::CredentialKind;

/// Identifier parsing errors
///
/// Always fatal: a malformed identifier is never retried and is reported
/// distinctly from "not found".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The identifier does not have exactly three `/`-separated components
    #[error("credential ID {input:?} should have 3 segments separated by '/', found {found}")]
    ComponentCount {
        /// Raw input
        input: String,
        /// Number of components found
        found: usize,
    },

    /// A component is empty
    #[error("credential ID {input:?} has an empty {component}")]
    EmptyComponent {
        /// Raw input
        input: String,
        /// Which component is empty
        component: &'static str,
    },

    /// The kind component is not a known credential kind
    #[error("unknown credential kind {kind:?}, expected \"certificate\" or \"password\"")]
    UnknownKind {
        /// Kind as written
        kind: String,
    },

    /// The identifier names a different kind than the resource expects
    #[error("credential ID {input:?} is a {found} credential, expected {expected}")]
    KindMismatch {
        /// Raw input
        input: String,
        /// Kind the resource manages
        expected: CredentialKind,
        /// Kind found in the identifier
        found: CredentialKind,
    },
}

/// Invalid caller-supplied credential fields
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for {field:?}: {reason}")]
pub struct SpecError {
    /// Schema field name
    pub field: &'static str,
    /// Why the value was rejected
    pub reason: String,
}

impl SpecError {
    pub(crate) fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// A credential with the same key ID already exists in the parent's list
///
/// Not a hard failure: callers treat it as the idempotent-import path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("credential with key ID {key_id:?} already exists")]
pub struct AlreadyExistsError {
    /// Duplicate key ID
    pub key_id: String,
}

/// Errors reported by a [`DirectoryClient`](crate::directory::DirectoryClient)
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    /// The addressed directory object does not exist
    #[error("directory object {object_id:?} was not found")]
    NotFound {
        /// Object ID that was requested
        object_id: String,
    },

    /// The API answered with a non-success status
    #[error("directory API returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Error message extracted from the response body
        message: String,
    },

    /// The request never produced a response (connect, TLS, timeout)
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("failed to decode directory response: {0}")]
    Decode(String),
}

impl DirectoryError {
    /// Returns `true` for failures that may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::NotFound { .. } | Self::Decode(_) => false,
        }
    }
}

/// Replication waiter failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicationError {
    /// The deadline elapsed before the key became visible
    #[error(
        "credential {key_id:?} was not visible after {attempts} polls{}",
        last_error_suffix(.last_error)
    )]
    Timeout {
        /// Key ID the waiter was looking for
        key_id: String,
        /// Number of polls performed
        attempts: u32,
        /// Last poll error, if the final polls failed
        last_error: Option<String>,
    },
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(" (last error: {e})"))
        .unwrap_or_default()
}

/// Top-level error returned by the lifecycle handlers
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Persisted identifier could not be parsed
    #[error("parsing credential ID: {0}")]
    Parse(#[from] ParseError),

    /// Resource fields are invalid
    #[error("building credential: {0}")]
    Spec(#[from] SpecError),

    /// The credential already exists remotely; the orchestrator should import it
    #[error(
        "{resource_type} with ID {id:?} already exists - \
         to be managed it needs to be imported"
    )]
    ImportAsExists {
        /// Orchestrator resource type name
        resource_type: &'static str,
        /// Identifier the existing credential would be imported under
        id: String,
    },

    /// A remote call failed
    #[error("{operation} for object ID {object_id:?}: {source}")]
    Directory {
        /// What the handler was doing
        operation: &'static str,
        /// Parent object ID
        object_id: String,
        /// Underlying directory error
        #[source]
        source: DirectoryError,
    },

    /// The write succeeded but replication was not confirmed
    #[error("waiting for credential replication for object ID {object_id:?}: {source}")]
    Replication {
        /// Parent object ID
        object_id: String,
        /// Underlying waiter error
        #[source]
        source: ReplicationError,
    },

    /// The operation deadline elapsed
    #[error("{operation} timed out after {duration:?}")]
    Timeout {
        /// What the handler was doing
        operation: &'static str,
        /// Total budget of the operation
        duration: Duration,
    },

    /// The orchestrator cancelled the operation
    #[error("{operation} was cancelled")]
    Cancelled {
        /// What the handler was doing
        operation: &'static str,
    },

    /// Configuration is invalid
    #[error("configuration: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl CredentialError {
    pub(crate) fn directory(
        operation: &'static str,
        object_id: impl Into<String>,
        source: DirectoryError,
    ) -> Self {
        Self::Directory {
            operation,
            object_id: object_id.into(),
            source,
        }
    }

    /// Returns `true` if retrying the whole operation later may succeed
    ///
    /// Informational only: the handlers never retry on their own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Directory { source, .. } => source.is_transient(),
            Self::Replication { .. } | Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

/// Result type alias for handler operations
pub type Result<T> = std::result::Result<T, CredentialError>;
