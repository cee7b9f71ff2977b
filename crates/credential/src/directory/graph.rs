//! Azure AD Graph implementation of [`DirectoryClient`]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::ConfigError;
use crate::core::{Credential, CredentialKind, DirectoryError, OperationContext, SecureString};
use crate::directory::{DirectoryClient, DirectoryObject, Lookup, ParentKind};

/// Default public-cloud Graph endpoint
pub const DEFAULT_ENDPOINT: &str = "https://graph.windows.net";

/// Graph API version the wire format below targets
pub const DEFAULT_API_VERSION: &str = "1.6";

/// Connection settings for [`GraphClient`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Base URL of the Graph service for the target cloud
    pub endpoint: String,

    /// Tenant the directory objects live in
    pub tenant_id: String,

    /// `api-version` query parameter sent with every request
    pub api_version: String,

    /// Upper bound for a single request; the operation deadline may cut it shorter
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            tenant_id: String::new(),
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl GraphConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "graph.tenant_id".into(),
            });
        }

        let endpoint = Url::parse(&self.endpoint).map_err(|e| ConfigError::InvalidValue {
            field: "graph.endpoint".into(),
            reason: e.to_string(),
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                field: "graph.endpoint".into(),
                reason: format!("{} cannot be used as a base URL", self.endpoint),
            });
        }

        if self.api_version.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "graph.api_version".into(),
            });
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "graph.request_timeout".into(),
                reason: "must be greater than zero".into(),
            });
        }

        Ok(())
    }
}

/// HTTP client for service principal and application credentials
///
/// Authentication is a pre-acquired bearer token; acquiring and refreshing
/// it is the caller's concern.
#[derive(Debug, Clone)]
pub struct GraphClient {
    http: Client,
    base: Url,
    config: GraphConfig,
    token: SecureString,
}

impl GraphClient {
    /// Create a client after validating `config`
    pub fn new(config: GraphConfig, token: impl Into<SecureString>) -> Result<Self, ConfigError> {
        config.validate()?;
        let base = Url::parse(&config.endpoint).map_err(|e| ConfigError::InvalidValue {
            field: "graph.endpoint".into(),
            reason: e.to_string(),
        })?;
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "graph".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base,
            config,
            token: token.into(),
        })
    }

    /// Configuration the client was built from
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    fn url(&self, parent_kind: ParentKind, object_id: &str, kind: Option<CredentialKind>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&self.config.tenant_id)
                .push(parent_kind.collection())
                .push(object_id);
            if let Some(kind) = kind {
                segments.push(credentials_segment(kind));
            }
        }
        url.query_pairs_mut()
            .append_pair("api-version", &self.config.api_version);
        url
    }

    fn request(
        &self,
        ctx: &OperationContext,
        method: Method,
        url: Url,
    ) -> Result<RequestBuilder, DirectoryError> {
        let timeout = self.config.request_timeout.min(ctx.remaining());
        if timeout.is_zero() {
            return Err(DirectoryError::Transport(
                "operation deadline passed before the request was sent".into(),
            ));
        }
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(self.token.expose())
            .timeout(timeout))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, DirectoryError> {
        let response = request
            .send()
            .await
            .map_err(|e| DirectoryError::Transport(e.to_string()))?;
        tracing::trace!(status = %response.status(), url = %response.url(), "graph response");
        Ok(response)
    }
}

fn credentials_segment(kind: CredentialKind) -> &'static str {
    match kind {
        CredentialKind::Certificate => "keyCredentials",
        CredentialKind::Password => "passwordCredentials",
    }
}

async fn status_error(response: Response) -> DirectoryError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GraphErrorBody>(&body)
        .ok()
        .and_then(|b| b.error.message.map(|m| m.value))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });
    DirectoryError::Status {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl DirectoryClient for GraphClient {
    #[tracing::instrument(skip(self, ctx), fields(tenant = %self.config.tenant_id))]
    async fn get(
        &self,
        ctx: &OperationContext,
        parent_kind: ParentKind,
        object_id: &str,
    ) -> Result<Lookup<DirectoryObject>, DirectoryError> {
        let url = self.url(parent_kind, object_id, None);
        let response = self.send(self.request(ctx, Method::GET, url)?).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Lookup::NotFound),
            status if status.is_success() => response
                .json::<DirectoryObject>()
                .await
                .map(Lookup::Found)
                .map_err(|e| DirectoryError::Decode(e.to_string())),
            _ => Err(status_error(response).await),
        }
    }

    #[tracing::instrument(skip(self, ctx), fields(tenant = %self.config.tenant_id))]
    async fn list_credentials(
        &self,
        ctx: &OperationContext,
        parent_kind: ParentKind,
        object_id: &str,
        kind: CredentialKind,
    ) -> Result<Vec<Credential>, DirectoryError> {
        let url = self.url(parent_kind, object_id, Some(kind));
        let response = self.send(self.request(ctx, Method::GET, url)?).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound {
                object_id: object_id.to_string(),
            }),
            status if status.is_success() => {
                let body: ListBody = response
                    .json()
                    .await
                    .map_err(|e| DirectoryError::Decode(e.to_string()))?;
                Ok(body.value.into_iter().map(Credential::from).collect())
            }
            _ => Err(status_error(response).await),
        }
    }

    #[tracing::instrument(
        skip(self, ctx, credentials),
        fields(tenant = %self.config.tenant_id, count = credentials.len())
    )]
    async fn update_credentials(
        &self,
        ctx: &OperationContext,
        parent_kind: ParentKind,
        object_id: &str,
        kind: CredentialKind,
        credentials: &[Credential],
    ) -> Result<(), DirectoryError> {
        let url = self.url(parent_kind, object_id, Some(kind));
        let body = UpdateBody {
            value: credentials.iter().map(WireCredential::from).collect(),
        };
        let response = self
            .send(self.request(ctx, Method::PATCH, url)?.json(&body))
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(DirectoryError::NotFound {
                object_id: object_id.to_string(),
            }),
            status if status.is_success() => Ok(()),
            _ => Err(status_error(response).await),
        }
    }
}

/// Credential as it appears on the wire (key and password share one shape)
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCredential {
    key_id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    credential_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    usage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    custom_key_identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

impl From<&Credential> for WireCredential {
    fn from(c: &Credential) -> Self {
        Self {
            key_id: c.key_id.clone(),
            credential_type: c.credential_type.clone(),
            usage: c.usage.clone(),
            start_date: c.start_date,
            end_date: c.end_date,
            custom_key_identifier: c.custom_key_identifier.clone(),
            value: c.value.as_ref().map(|v| v.expose().to_string()),
        }
    }
}

impl From<WireCredential> for Credential {
    fn from(w: WireCredential) -> Self {
        Self {
            key_id: w.key_id,
            credential_type: w.credential_type,
            usage: w.usage,
            start_date: w.start_date,
            end_date: w.end_date,
            custom_key_identifier: w.custom_key_identifier,
            value: w.value.map(SecureString::from),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListBody {
    #[serde(default)]
    value: Vec<WireCredential>,
}

#[derive(Debug, Serialize)]
struct UpdateBody {
    value: Vec<WireCredential>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    #[serde(rename = "odata.error")]
    error: GraphError,
}

#[derive(Debug, Deserialize)]
struct GraphError {
    #[serde(default)]
    message: Option<GraphErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphErrorMessage {
    #[serde(default)]
    value: String,
}
