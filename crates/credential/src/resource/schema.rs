//! Caller-facing resource fields and the persisted projection

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{
    Credential, CredentialIdentifier, CredentialKind, SecureString, SpecError, format_rfc3339,
    parse_rfc3339,
};

/// Certificate key type used when none is given
pub const DEFAULT_CERTIFICATE_TYPE: &str = "AsymmetricX509Cert";

/// Key types the directory accepts for key credentials
pub const CERTIFICATE_TYPES: [&str; 2] = ["AsymmetricX509Cert", "Symmetric"];

/// Usage stamped on every key credential
pub const CERTIFICATE_USAGE: &str = "Verify";

/// Desired state of one credential as declared by the caller
///
/// # Examples
///
/// ```
/// use azuread_credential::core::CredentialKind;
/// use azuread_credential::resource::CredentialSpec;
///
/// let spec = CredentialSpec::new("sp-1", "-----BEGIN CERTIFICATE-----")
///     .with_key_id("key-abc")
///     .with_end_date_relative("8760h");
/// let credential = spec.build(CredentialKind::Certificate, chrono::Utc::now())?;
/// assert_eq!(credential.key_id, "key-abc");
/// assert_eq!(credential.credential_type.as_deref(), Some("AsymmetricX509Cert"));
/// # Ok::<(), azuread_credential::core::SpecError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialSpec {
    /// Object ID of the owning service principal or application
    pub parent_object_id: String,

    /// Key ID; a random UUID is generated when unset
    pub key_id: Option<String>,

    /// Key type, certificates only
    pub credential_type: Option<String>,

    /// Certificate material or password
    pub value: SecureString,

    /// RFC 3339 start of validity, "now" when unset
    pub start_date: Option<String>,

    /// RFC 3339 end of validity
    pub end_date: Option<String>,

    /// End of validity relative to the start, as a duration like `240h`
    pub end_date_relative: Option<String>,

    /// Free-form description, sent base64-encoded as the custom key identifier
    pub description: Option<String>,
}

impl CredentialSpec {
    /// Spec with only the required fields set
    pub fn new(parent_object_id: impl Into<String>, value: impl Into<SecureString>) -> Self {
        Self {
            parent_object_id: parent_object_id.into(),
            key_id: None,
            credential_type: None,
            value: value.into(),
            start_date: None,
            end_date: None,
            end_date_relative: None,
            description: None,
        }
    }

    /// Set the key ID (builder pattern)
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }

    /// Set the key type (builder pattern)
    pub fn with_type(mut self, credential_type: impl Into<String>) -> Self {
        self.credential_type = Some(credential_type.into());
        self
    }

    /// Set the start date (builder pattern)
    pub fn with_start_date(mut self, start_date: impl Into<String>) -> Self {
        self.start_date = Some(start_date.into());
        self
    }

    /// Set an absolute end date (builder pattern)
    pub fn with_end_date(mut self, end_date: impl Into<String>) -> Self {
        self.end_date = Some(end_date.into());
        self
    }

    /// Set a relative end date (builder pattern)
    pub fn with_end_date_relative(mut self, duration: impl Into<String>) -> Self {
        self.end_date_relative = Some(duration.into());
        self
    }

    /// Set the description (builder pattern)
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Build the credential to write, resolving defaults against `now`
    pub fn build(&self, kind: CredentialKind, now: DateTime<Utc>) -> Result<Credential, SpecError> {
        validate_component("parent_object_id", &self.parent_object_id)?;
        if self.value.is_empty() {
            return Err(SpecError::new("value", "must not be empty"));
        }

        let key_id = match &self.key_id {
            Some(id) => {
                validate_component("key_id", id)?;
                id.clone()
            }
            None => uuid::Uuid::new_v4().to_string(),
        };

        let start = match &self.start_date {
            Some(raw) => parse_rfc3339(raw).map_err(|e| {
                SpecError::new("start_date", format!("{raw:?} is not RFC 3339: {e}"))
            })?,
            None => now,
        };
        let end = self.resolve_end(start)?;
        if end <= start {
            return Err(SpecError::new(
                "end_date",
                format!(
                    "{} must be after start date {}",
                    format_rfc3339(&end),
                    format_rfc3339(&start)
                ),
            ));
        }

        let mut credential = Credential::new(key_id)
            .with_validity(start, end)
            .with_value(self.value.clone());

        match kind {
            CredentialKind::Certificate => {
                let credential_type = self
                    .credential_type
                    .as_deref()
                    .unwrap_or(DEFAULT_CERTIFICATE_TYPE);
                if !CERTIFICATE_TYPES.contains(&credential_type) {
                    return Err(SpecError::new(
                        "type",
                        format!(
                            "{credential_type:?} is not one of {}",
                            CERTIFICATE_TYPES.join(", ")
                        ),
                    ));
                }
                credential = credential
                    .with_type(credential_type)
                    .with_usage(CERTIFICATE_USAGE);
            }
            CredentialKind::Password => {
                if self.credential_type.is_some() {
                    return Err(SpecError::new("type", "not supported for passwords"));
                }
            }
        }

        if let Some(description) = &self.description {
            credential = credential.with_custom_key_identifier(STANDARD.encode(description));
        }

        Ok(credential)
    }

    fn resolve_end(&self, start: DateTime<Utc>) -> Result<DateTime<Utc>, SpecError> {
        match (&self.end_date, &self.end_date_relative) {
            (Some(_), Some(_)) => Err(SpecError::new(
                "end_date",
                "conflicts with end_date_relative, set only one",
            )),
            (None, None) => Err(SpecError::new(
                "end_date",
                "one of end_date or end_date_relative must be set",
            )),
            (Some(raw), None) => parse_rfc3339(raw)
                .map_err(|e| SpecError::new("end_date", format!("{raw:?} is not RFC 3339: {e}"))),
            (None, Some(raw)) => {
                let duration = humantime::parse_duration(raw).map_err(|e| {
                    SpecError::new("end_date_relative", format!("{raw:?} is not a duration: {e}"))
                })?;
                let delta = chrono::Duration::from_std(duration)
                    .map_err(|e| SpecError::new("end_date_relative", e.to_string()))?;
                start
                    .checked_add_signed(delta)
                    .ok_or_else(|| SpecError::new("end_date_relative", "end date out of range"))
            }
        }
    }
}

fn validate_component(field: &'static str, value: &str) -> Result<(), SpecError> {
    if value.is_empty() {
        return Err(SpecError::new(field, "must not be empty"));
    }
    if value.contains(crate::core::SEPARATOR) {
        return Err(SpecError::new(field, "must not contain '/'"));
    }
    Ok(())
}

/// State persisted by the orchestrator for one managed credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Composite identifier `<parent>/<kind>/<keyID>`
    pub id: CredentialIdentifier,

    /// Parent object ID
    pub parent_object_id: String,

    /// Key ID
    pub key_id: String,

    /// Key type, certificates only
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<String>,

    /// RFC 3339 start of validity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,

    /// RFC 3339 end of validity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl ResourceRecord {
    /// Project a remote credential into persisted state
    pub fn project(id: CredentialIdentifier, credential: &Credential) -> Self {
        Self {
            parent_object_id: id.parent_object_id().to_string(),
            key_id: id.key_id().to_string(),
            credential_type: credential.credential_type.clone(),
            start_date: credential.start_date.as_ref().map(format_rfc3339),
            end_date: credential.end_date.as_ref().map(format_rfc3339),
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_build_certificate_defaults() {
        let credential = CredentialSpec::new("sp-1", "cert")
            .with_end_date("2027-01-01T00:00:00Z")
            .build(CredentialKind::Certificate, now())
            .unwrap();

        assert!(uuid::Uuid::parse_str(&credential.key_id).is_ok());
        assert_eq!(credential.credential_type.as_deref(), Some("AsymmetricX509Cert"));
        assert_eq!(credential.usage.as_deref(), Some("Verify"));
        assert_eq!(credential.start_date, Some(now()));
        assert_eq!(credential.value, Some(SecureString::from("cert")));
    }

    #[test]
    fn test_build_relative_end_date_from_start() {
        let credential = CredentialSpec::new("sp-1", "secret")
            .with_key_id("k1")
            .with_start_date("2026-02-01T00:00:00Z")
            .with_end_date_relative("240h")
            .build(CredentialKind::Password, now())
            .unwrap();

        assert_eq!(
            credential.end_date.map(|d| format_rfc3339(&d)),
            Some("2026-02-11T00:00:00Z".to_string())
        );
        assert!(credential.credential_type.is_none());
        assert!(credential.usage.is_none());
    }

    #[test]
    fn test_build_encodes_description() {
        let credential = CredentialSpec::new("sp-1", "secret")
            .with_end_date_relative("1h")
            .with_description("ci token")
            .build(CredentialKind::Password, now())
            .unwrap();
        assert_eq!(credential.custom_key_identifier.as_deref(), Some("Y2kgdG9rZW4="));
    }

    #[test]
    fn test_build_encodes_non_ascii_description() {
        let credential = CredentialSpec::new("sp-1", "MIIC")
            .with_end_date_relative("1h")
            .with_description("clé")
            .build(CredentialKind::Certificate, now())
            .unwrap();
        assert_eq!(credential.custom_key_identifier.as_deref(), Some("Y2zDqQ=="));
    }

    #[rstest]
    #[case::conflicting_end(
        CredentialSpec::new("sp-1", "v")
            .with_end_date("2027-01-01T00:00:00Z")
            .with_end_date_relative("1h"),
        "end_date"
    )]
    #[case::missing_end(CredentialSpec::new("sp-1", "v"), "end_date")]
    #[case::end_before_start(
        CredentialSpec::new("sp-1", "v").with_end_date("2025-01-01T00:00:00Z"),
        "end_date"
    )]
    #[case::bad_start(
        CredentialSpec::new("sp-1", "v").with_start_date("yesterday").with_end_date_relative("1h"),
        "start_date"
    )]
    #[case::bad_duration(
        CredentialSpec::new("sp-1", "v").with_end_date_relative("forever"),
        "end_date_relative"
    )]
    #[case::invalid_type(
        CredentialSpec::new("sp-1", "v").with_type("Pem").with_end_date_relative("1h"),
        "type"
    )]
    #[case::empty_value(CredentialSpec::new("sp-1", "").with_end_date_relative("1h"), "value")]
    #[case::slash_in_key_id(
        CredentialSpec::new("sp-1", "v").with_key_id("a/b").with_end_date_relative("1h"),
        "key_id"
    )]
    fn test_build_rejects(#[case] spec: CredentialSpec, #[case] field: &str) {
        let err = spec.build(CredentialKind::Certificate, now()).unwrap_err();
        assert_eq!(err.field, field, "{err}");
    }

    #[test]
    fn test_password_rejects_type() {
        let err = CredentialSpec::new("sp-1", "v")
            .with_type("Symmetric")
            .with_end_date_relative("1h")
            .build(CredentialKind::Password, now())
            .unwrap_err();
        assert_eq!(err.field, "type");
    }

    #[test]
    fn test_record_projection() {
        let credential = Credential::new("key-abc")
            .with_type("AsymmetricX509Cert")
            .with_validity(now(), Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
        let id = CredentialIdentifier::new("sp-1", CredentialKind::Certificate, "key-abc");
        let record = ResourceRecord::project(id, &credential);

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({
                "id": "sp-1/certificate/key-abc",
                "parent_object_id": "sp-1",
                "key_id": "key-abc",
                "type": "AsymmetricX509Cert",
                "start_date": "2026-01-01T00:00:00Z",
                "end_date": "2027-01-01T00:00:00Z",
            })
        );
    }
}
