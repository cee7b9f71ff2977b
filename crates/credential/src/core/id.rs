//! Composite credential identifiers
//!
//! A credential attached to a directory object is persisted under the
//! identifier `<parentObjectID>/<kind>/<keyID>`. The format is part of the
//! orchestrator state and must stay byte-for-byte stable.
//!
//! ```
//! use azuread_credential::core::{CredentialIdentifier, CredentialKind};
//!
//! let id = CredentialIdentifier::new("sp-1", CredentialKind::Certificate, "key-abc");
//! assert_eq!(id.to_string(), "sp-1/certificate/key-abc");
//!
//! let parsed: CredentialIdentifier = "sp-1/certificate/key-abc".parse()?;
//! assert_eq!(parsed, id);
//! # Ok::<(), azuread_credential::core::ParseError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::ParseError;

/// Component separator of the persisted identifier
pub const SEPARATOR: char = '/';

/// Kind of credential attached to a directory object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
    /// Key credential (public certificate or symmetric key)
    Certificate,
    /// Password credential (client secret)
    Password,
}

impl CredentialKind {
    /// Textual form used inside identifiers
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Certificate => "certificate",
            Self::Password => "password",
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CredentialKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "certificate" => Ok(Self::Certificate),
            "password" => Ok(Self::Password),
            other => Err(ParseError::UnknownKind {
                kind: other.to_string(),
            }),
        }
    }
}

/// Identifier of one credential within one parent object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CredentialIdentifier {
    parent_object_id: String,
    kind: CredentialKind,
    key_id: String,
}

impl CredentialIdentifier {
    /// Compose an identifier from its parts
    ///
    /// Components are taken as-is; use [`CredentialIdentifier::parse`] to
    /// validate untrusted input.
    pub fn new(
        parent_object_id: impl Into<String>,
        kind: CredentialKind,
        key_id: impl Into<String>,
    ) -> Self {
        Self {
            parent_object_id: parent_object_id.into(),
            kind,
            key_id: key_id.into(),
        }
    }

    /// Parse a persisted identifier
    ///
    /// # Errors
    ///
    /// - [`ParseError::ComponentCount`] unless there are exactly three components
    /// - [`ParseError::EmptyComponent`] if any component is empty
    /// - [`ParseError::UnknownKind`] if the kind is neither `certificate` nor `password`
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let parts: Vec<&str> = input.split(SEPARATOR).collect();
        let [parent, kind, key_id] = parts.as_slice() else {
            return Err(ParseError::ComponentCount {
                input: input.to_string(),
                found: parts.len(),
            });
        };

        for (value, component) in [
            (parent, "parent object ID"),
            (kind, "credential kind"),
            (key_id, "key ID"),
        ] {
            if value.is_empty() {
                return Err(ParseError::EmptyComponent {
                    input: input.to_string(),
                    component,
                });
            }
        }

        Ok(Self {
            parent_object_id: (*parent).to_string(),
            kind: kind.parse()?,
            key_id: (*key_id).to_string(),
        })
    }

    /// Parse a persisted identifier that must name a credential of `expected` kind
    pub fn parse_as(input: &str, expected: CredentialKind) -> Result<Self, ParseError> {
        let id = Self::parse(input)?;
        if id.kind != expected {
            return Err(ParseError::KindMismatch {
                input: input.to_string(),
                expected,
                found: id.kind,
            });
        }
        Ok(id)
    }

    /// Object ID of the owning service principal or application
    pub fn parent_object_id(&self) -> &str {
        &self.parent_object_id
    }

    /// Credential kind
    pub fn kind(&self) -> CredentialKind {
        self.kind
    }

    /// Key ID of the credential within its parent
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl fmt::Display for CredentialIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.parent_object_id, self.kind, self.key_id
        )
    }
}

impl FromStr for CredentialIdentifier {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<CredentialIdentifier> for String {
    fn from(id: CredentialIdentifier) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for CredentialIdentifier {
    type Error = ParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}
