//! Create, read, delete and import for one credential resource type

use chrono::Utc;
use std::fmt;
use std::sync::Arc;

use crate::config::{ConfigError, ProviderConfig, Timeouts};
use crate::core::{
    Credential, CredentialError, CredentialIdentifier, CredentialKind, DirectoryError,
    OperationContext, ParseError, Result,
};
use crate::directory::{DirectoryClient, DirectoryObject, Lookup, ParentKind};
use crate::lock::{LockGuard, LockTable};
use crate::reconcile::{
    ReplicationPolicy, add, find_by_key_id, remove_by_key_id, wait_for_visibility,
};
use crate::resource::{CredentialSpec, ResourceRecord};

/// Result of reading a managed credential
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The credential exists remotely
    Present(ResourceRecord),
    /// The parent object or the credential no longer exists; the
    /// orchestrator should drop it from state
    Gone,
}

impl ReadOutcome {
    /// Record if present
    pub fn record(&self) -> Option<&ResourceRecord> {
        match self {
            Self::Present(record) => Some(record),
            Self::Gone => None,
        }
    }
}

/// Lifecycle handlers for credentials of one kind on one kind of parent
///
/// Every mutation is a read-modify-write of the parent's whole credential
/// list and runs under the parent's entry in the shared [`LockTable`].
/// Resources that share a table serialize against each other per parent.
///
/// # Examples
///
/// ```
/// use azuread_credential::lock::LockTable;
/// use azuread_credential::resource::CredentialResource;
/// use azuread_credential::testing::InMemoryDirectory;
/// use std::sync::Arc;
///
/// let directory = Arc::new(InMemoryDirectory::new());
/// let locks = LockTable::new();
/// let certificates =
///     CredentialResource::service_principal_certificate(directory.clone(), locks.clone());
/// let passwords = CredentialResource::service_principal_password(directory, locks);
/// assert_eq!(certificates.resource_type(), "azuread_service_principal_certificate");
/// assert_eq!(passwords.resource_type(), "azuread_service_principal_password");
/// ```
#[derive(Clone)]
pub struct CredentialResource {
    client: Arc<dyn DirectoryClient>,
    locks: LockTable,
    parent_kind: ParentKind,
    kind: CredentialKind,
    resource_type: &'static str,
    replication: ReplicationPolicy,
    timeouts: Timeouts,
}

impl CredentialResource {
    /// Create a resource with default replication policy and timeouts
    pub fn new(
        client: Arc<dyn DirectoryClient>,
        locks: LockTable,
        parent_kind: ParentKind,
        kind: CredentialKind,
        resource_type: &'static str,
    ) -> Self {
        Self {
            client,
            locks,
            parent_kind,
            kind,
            resource_type,
            replication: ReplicationPolicy::default(),
            timeouts: Timeouts::default(),
        }
    }

    /// Certificates on service principals
    pub fn service_principal_certificate(
        client: Arc<dyn DirectoryClient>,
        locks: LockTable,
    ) -> Self {
        Self::new(
            client,
            locks,
            ParentKind::ServicePrincipal,
            CredentialKind::Certificate,
            "azuread_service_principal_certificate",
        )
    }

    /// Passwords on service principals
    pub fn service_principal_password(client: Arc<dyn DirectoryClient>, locks: LockTable) -> Self {
        Self::new(
            client,
            locks,
            ParentKind::ServicePrincipal,
            CredentialKind::Password,
            "azuread_service_principal_password",
        )
    }

    /// Certificates on applications
    pub fn application_certificate(client: Arc<dyn DirectoryClient>, locks: LockTable) -> Self {
        Self::new(
            client,
            locks,
            ParentKind::Application,
            CredentialKind::Certificate,
            "azuread_application_certificate",
        )
    }

    /// Passwords on applications
    pub fn application_password(client: Arc<dyn DirectoryClient>, locks: LockTable) -> Self {
        Self::new(
            client,
            locks,
            ParentKind::Application,
            CredentialKind::Password,
            "azuread_application_password",
        )
    }

    /// Set the replication policy (builder pattern)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the policy does not validate.
    pub fn with_replication(mut self, policy: ReplicationPolicy) -> std::result::Result<Self, ConfigError> {
        policy.validate()?;
        self.replication = policy;
        Ok(self)
    }

    /// Set the operation timeouts (builder pattern)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a timeout is zero.
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> std::result::Result<Self, ConfigError> {
        timeouts.validate()?;
        self.timeouts = timeouts;
        Ok(self)
    }

    /// Take replication policy and timeouts from a provider configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if either section does not validate.
    pub fn with_config(self, config: &ProviderConfig) -> std::result::Result<Self, ConfigError> {
        self.with_replication(config.replication.clone())?
            .with_timeouts(config.timeouts.clone())
    }

    /// Orchestrator resource type name
    pub fn resource_type(&self) -> &'static str {
        self.resource_type
    }

    /// Credential kind managed by this resource
    pub fn kind(&self) -> CredentialKind {
        self.kind
    }

    /// Parent kind managed by this resource
    pub fn parent_kind(&self) -> ParentKind {
        self.parent_kind
    }

    /// Configured timeouts, for building operation contexts
    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    /// Add a credential to its parent and wait until it is readable
    ///
    /// # Errors
    ///
    /// - [`CredentialError::Spec`] if the spec is invalid
    /// - [`CredentialError::ImportAsExists`] if the key ID is already present
    /// - [`CredentialError::Replication`] if the write did not become visible in time
    /// - [`CredentialError::Directory`], [`CredentialError::Timeout`] or
    ///   [`CredentialError::Cancelled`] for remote failures
    #[tracing::instrument(
        skip(self, ctx, spec),
        fields(resource_type = self.resource_type, object_id = %spec.parent_object_id)
    )]
    pub async fn create(
        &self,
        ctx: &OperationContext,
        spec: &CredentialSpec,
    ) -> Result<ResourceRecord> {
        let credential = spec.build(self.kind, Utc::now())?;
        let object_id = spec.parent_object_id.as_str();
        let id = CredentialIdentifier::new(object_id, self.kind, credential.key_id.clone());

        let guard = self.lock(ctx, object_id).await?;

        let existing = self.list(ctx, object_id).await?;
        let merged = add(&existing, credential).map_err(|e| {
            tracing::debug!(key_id = %e.key_id, "credential already exists");
            CredentialError::ImportAsExists {
                resource_type: self.resource_type,
                id: id.to_string(),
            }
        })?;
        self.update(ctx, object_id, &merged).await?;

        let replicated = ctx
            .run_cancellable(
                "waiting for credential replication",
                wait_for_visibility(id.key_id(), ctx.deadline(), &self.replication, || {
                    self.client
                        .list_credentials(ctx, self.parent_kind, object_id, self.kind)
                }),
            )
            .await?
            .map_err(|source| CredentialError::Replication {
                object_id: object_id.to_string(),
                source,
            })?;

        guard.unlock();
        tracing::info!(id = %id, "created credential");
        Ok(ResourceRecord::project(id, &replicated))
    }

    /// Refresh persisted state from the directory
    ///
    /// A missing parent or credential is reported as [`ReadOutcome::Gone`].
    #[tracing::instrument(skip(self, ctx), fields(resource_type = self.resource_type))]
    pub async fn read(&self, ctx: &OperationContext, id: &str) -> Result<ReadOutcome> {
        let id = CredentialIdentifier::parse_as(id, self.kind)?;
        let object_id = id.parent_object_id();

        if self.get(ctx, object_id).await?.found().is_none() {
            tracing::debug!(object_id, "{} not found, removing from state", self.parent_kind);
            return Ok(ReadOutcome::Gone);
        }

        let list = match self.list(ctx, object_id).await {
            Ok(list) => list,
            Err(CredentialError::Directory {
                source: DirectoryError::NotFound { .. },
                ..
            }) => {
                tracing::debug!(object_id, "{} removed while reading", self.parent_kind);
                return Ok(ReadOutcome::Gone);
            }
            Err(e) => return Err(e),
        };

        match find_by_key_id(&list, id.key_id()) {
            Some(credential) => Ok(ReadOutcome::Present(ResourceRecord::project(
                id.clone(),
                credential,
            ))),
            None => {
                tracing::debug!(key_id = id.key_id(), "credential not found, removing from state");
                Ok(ReadOutcome::Gone)
            }
        }
    }

    /// Remove a credential from its parent
    ///
    /// Succeeds without writing when the parent or the key is already gone.
    #[tracing::instrument(skip(self, ctx), fields(resource_type = self.resource_type))]
    pub async fn delete(&self, ctx: &OperationContext, id: &str) -> Result<()> {
        let id = CredentialIdentifier::parse_as(id, self.kind)?;
        let object_id = id.parent_object_id();

        let guard = self.lock(ctx, object_id).await?;

        if self.get(ctx, object_id).await?.found().is_none() {
            tracing::debug!(object_id, "{} already gone", self.parent_kind);
            return Ok(());
        }

        let existing = self.list(ctx, object_id).await?;
        if find_by_key_id(&existing, id.key_id()).is_none() {
            tracing::debug!(key_id = id.key_id(), "credential already gone, skipping update");
            return Ok(());
        }

        let remaining = remove_by_key_id(&existing, id.key_id());
        self.update(ctx, object_id, &remaining).await?;

        guard.unlock();
        tracing::info!(id = %id, "deleted credential");
        Ok(())
    }

    /// Validate an identifier supplied for import
    pub fn import(&self, id: &str) -> std::result::Result<CredentialIdentifier, ParseError> {
        CredentialIdentifier::parse_as(id, self.kind)
    }

    async fn lock(&self, ctx: &OperationContext, object_id: &str) -> Result<LockGuard> {
        ctx.run(
            "acquiring parent lock",
            self.locks.lock(self.parent_kind.lock_namespace(), object_id),
        )
        .await
    }

    async fn get(
        &self,
        ctx: &OperationContext,
        object_id: &str,
    ) -> Result<Lookup<DirectoryObject>> {
        const OPERATION: &str = "retrieving parent object";
        ctx.run(OPERATION, self.client.get(ctx, self.parent_kind, object_id))
            .await?
            .map_err(|e| CredentialError::directory(OPERATION, object_id, e))
    }

    async fn list(&self, ctx: &OperationContext, object_id: &str) -> Result<Vec<Credential>> {
        const OPERATION: &str = "listing credentials";
        ctx.run(
            OPERATION,
            self.client
                .list_credentials(ctx, self.parent_kind, object_id, self.kind),
        )
        .await?
        .map_err(|e| CredentialError::directory(OPERATION, object_id, e))
    }

    async fn update(
        &self,
        ctx: &OperationContext,
        object_id: &str,
        credentials: &[Credential],
    ) -> Result<()> {
        const OPERATION: &str = "updating credentials";
        ctx.run(
            OPERATION,
            self.client
                .update_credentials(ctx, self.parent_kind, object_id, self.kind, credentials),
        )
        .await?
        .map_err(|e| CredentialError::directory(OPERATION, object_id, e))
    }
}

impl fmt::Debug for CredentialResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialResource")
            .field("resource_type", &self.resource_type)
            .field("parent_kind", &self.parent_kind)
            .field("kind", &self.kind)
            .field("replication", &self.replication)
            .field("timeouts", &self.timeouts)
            .finish_non_exhaustive()
    }
}
