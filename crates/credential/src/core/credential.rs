//! Credential record as stored on a directory object

use chrono::{DateTime, Utc};

use crate::core::SecureString;

/// A key or password credential attached to a service principal or application
///
/// Identity is the key ID within one parent. Once written a credential is
/// never modified; rotation means adding a new key and removing the old one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Key ID, unique within the parent's credential list
    pub key_id: String,

    /// Key type (`AsymmetricX509Cert`, `Symmetric`); unset for passwords
    pub credential_type: Option<String>,

    /// Key usage (`Verify` for certificates); unset for passwords
    pub usage: Option<String>,

    /// Start of validity
    pub start_date: Option<DateTime<Utc>>,

    /// End of validity
    pub end_date: Option<DateTime<Utc>>,

    /// Base64-encoded identifier, used as the credential description
    pub custom_key_identifier: Option<String>,

    /// Public key material or password
    ///
    /// The directory never returns password values and usually omits key
    /// material on reads, so this is `None` for most listed credentials.
    pub value: Option<SecureString>,
}

impl Credential {
    /// Create a credential carrying only its key ID
    pub fn new(key_id: impl Into<String>) -> Self {
        Self {
            key_id: key_id.into(),
            credential_type: None,
            usage: None,
            start_date: None,
            end_date: None,
            custom_key_identifier: None,
            value: None,
        }
    }

    /// Set the key type (builder pattern)
    pub fn with_type(mut self, credential_type: impl Into<String>) -> Self {
        self.credential_type = Some(credential_type.into());
        self
    }

    /// Set the key usage (builder pattern)
    pub fn with_usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = Some(usage.into());
        self
    }

    /// Set the validity window (builder pattern)
    pub fn with_validity(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    /// Set the value (builder pattern)
    pub fn with_value(mut self, value: impl Into<SecureString>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the already-encoded custom key identifier (builder pattern)
    pub fn with_custom_key_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.custom_key_identifier = Some(identifier.into());
        self
    }
}
