//! Provider configuration
//!
//! ```
//! use azuread_credential::config::ProviderConfig;
//!
//! let config: ProviderConfig = serde_json::from_str(r#"{
//!     "graph": { "tenant_id": "00000000-0000-0000-0000-000000000001" },
//!     "timeouts": { "create": "2m" },
//!     "replication": { "initial_interval": "500ms" }
//! }"#)?;
//! assert!(config.validate().is_ok());
//! assert_eq!(config.timeouts.create.as_secs(), 120);
//! # Ok::<(), serde_json::Error>(())
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::OperationContext;
use crate::directory::{DEFAULT_ENDPOINT, GraphConfig};
use crate::reconcile::ReplicationPolicy;

/// Configuration error types
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("invalid configuration: {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Missing required configuration
    #[error("missing required configuration: {field}")]
    MissingRequired { field: String },
}

/// Per-operation timeout budgets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Budget for create, including the replication wait
    #[serde(with = "humantime_serde")]
    pub create: Duration,

    /// Budget for read
    #[serde(with = "humantime_serde")]
    pub read: Duration,

    /// Budget for delete
    #[serde(with = "humantime_serde")]
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: Duration::from_secs(5 * 60),
            read: Duration::from_secs(5 * 60),
            delete: Duration::from_secs(5 * 60),
        }
    }
}

impl Timeouts {
    /// Validate that every budget is non-zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("timeouts.create", self.create),
            ("timeouts.read", self.read),
            ("timeouts.delete", self.delete),
        ] {
            if value.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    reason: "must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }

    /// Fresh context with the create budget
    pub fn context_for_create(&self) -> OperationContext {
        OperationContext::new(self.create)
    }

    /// Fresh context with the read budget
    pub fn context_for_read(&self) -> OperationContext {
        OperationContext::new(self.read)
    }

    /// Fresh context with the delete budget
    pub fn context_for_delete(&self) -> OperationContext {
        OperationContext::new(self.delete)
    }
}

/// Complete provider configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Directory API connection
    pub graph: GraphConfig,

    /// Operation budgets
    pub timeouts: Timeouts,

    /// Replication waiter schedule
    pub replication: ReplicationPolicy,
}

impl ProviderConfig {
    /// Validate all sections
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.graph.validate()?;
        self.timeouts.validate()?;
        self.replication.validate()?;
        Ok(())
    }

    /// Build a configuration from `ARM_TENANT_ID` and `ARM_ENVIRONMENT`
    ///
    /// `ARM_ENVIRONMENT` selects the Graph endpoint of a national cloud and
    /// defaults to `public`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ProviderConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tenant_id = lookup("ARM_TENANT_ID")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "ARM_TENANT_ID".into(),
            })?;

        let environment = lookup("ARM_ENVIRONMENT").unwrap_or_else(|| "public".to_string());
        let endpoint = graph_endpoint(&environment).ok_or_else(|| ConfigError::InvalidValue {
            field: "ARM_ENVIRONMENT".into(),
            reason: format!(
                "unknown environment {environment:?}, \
                 expected one of public, china, usgovernment, german"
            ),
        })?;

        let config = Self {
            graph: GraphConfig {
                endpoint: endpoint.to_string(),
                tenant_id,
                ..Default::default()
            },
            ..Default::default()
        };
        config.validate()?;

        tracing::debug!(environment = %environment, endpoint, "loaded provider configuration");
        Ok(config)
    }
}

/// Graph endpoint of a named Azure cloud
fn graph_endpoint(environment: &str) -> Option<&'static str> {
    match environment.to_ascii_lowercase().as_str() {
        "" | "public" => Some(DEFAULT_ENDPOINT),
        "china" => Some("https://graph.chinacloudapi.cn"),
        "usgovernment" => Some("https://graph.microsoftazure.us"),
        "german" => Some("https://graph.cloudapi.de"),
        _ => None,
    }
}
