use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use crate::core::{Credential, CredentialKind, DirectoryError, OperationContext};
use crate::directory::{DirectoryClient, DirectoryObject, Lookup, ParentKind};

type ParentKey = (ParentKind, String);

#[derive(Debug, Default)]
struct CredentialLists {
    current: Vec<Credential>,
    visible: Vec<Credential>,
    stale_reads_left: u32,
}

impl CredentialLists {
    fn read(&mut self) -> Vec<Credential> {
        if self.stale_reads_left > 0 {
            self.stale_reads_left -= 1;
            return self.visible.clone();
        }
        self.visible.clone_from(&self.current);
        self.current.clone()
    }

    fn write(&mut self, credentials: &[Credential], lag: u32) {
        if self.stale_reads_left == 0 {
            self.visible = std::mem::take(&mut self.current);
        }
        self.current = credentials.to_vec();
        self.stale_reads_left = lag;
    }
}

#[derive(Debug, Default)]
struct ParentState {
    keys: CredentialLists,
    passwords: CredentialLists,
}

impl ParentState {
    fn lists(&mut self, kind: CredentialKind) -> &mut CredentialLists {
        match kind {
            CredentialKind::Certificate => &mut self.keys,
            CredentialKind::Password => &mut self.passwords,
        }
    }
}

/// In-memory directory with configurable consistency and failures
///
/// - replication lag: after an update, the next `n` lists of that parent and
///   kind still return the previous list
/// - list delay: lists take a snapshot, then sleep before returning it, which
///   widens the window between a fetch and the following update
/// - failure injection: one-shot get/update failures and a number of failing
///   lists, all reported as transport errors
pub struct InMemoryDirectory {
    parents: DashMap<ParentKey, ParentState>,
    replication_lag: u32,
    list_delay: Option<Duration>,
    fail_on_get: AtomicBool,
    fail_on_update: AtomicBool,
    failing_lists: AtomicU32,
    get_count: AtomicU32,
    list_count: AtomicU32,
    update_count: AtomicU32,
}

impl InMemoryDirectory {
    /// Create an empty, immediately consistent directory
    pub fn new() -> Self {
        Self {
            parents: DashMap::new(),
            replication_lag: 0,
            list_delay: None,
            fail_on_get: AtomicBool::new(false),
            fail_on_update: AtomicBool::new(false),
            failing_lists: AtomicU32::new(0),
            get_count: AtomicU32::new(0),
            list_count: AtomicU32::new(0),
            update_count: AtomicU32::new(0),
        }
    }

    /// Serve `reads` stale lists after every update
    pub fn with_replication_lag(mut self, reads: u32) -> Self {
        self.replication_lag = reads;
        self
    }

    /// Delay every list response
    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// Make the next get fail
    pub fn fail_next_get(&self) {
        self.fail_on_get.store(true, Ordering::SeqCst);
    }

    /// Make the next update fail
    pub fn fail_next_update(&self) {
        self.fail_on_update.store(true, Ordering::SeqCst);
    }

    /// Make the next list fail
    pub fn fail_next_list(&self) {
        self.fail_lists(1);
    }

    /// Make the next `count` lists fail
    pub fn fail_lists(&self, count: u32) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    /// Number of get calls so far
    pub fn get_count(&self) -> u32 {
        self.get_count.load(Ordering::SeqCst)
    }

    /// Number of list calls so far
    pub fn list_count(&self) -> u32 {
        self.list_count.load(Ordering::SeqCst)
    }

    /// Number of update calls so far
    pub fn update_count(&self) -> u32 {
        self.update_count.load(Ordering::SeqCst)
    }

    /// Create an empty parent object
    pub fn insert_parent(&self, parent_kind: ParentKind, object_id: &str) {
        self.parents
            .entry((parent_kind, object_id.to_string()))
            .or_default();
    }

    /// Delete a parent object and all its credentials
    pub fn remove_parent(&self, parent_kind: ParentKind, object_id: &str) {
        self.parents.remove(&(parent_kind, object_id.to_string()));
    }

    /// Add a credential directly, bypassing lag and counters
    pub fn insert_credential(
        &self,
        parent_kind: ParentKind,
        object_id: &str,
        kind: CredentialKind,
        credential: Credential,
    ) {
        let mut parent = self
            .parents
            .entry((parent_kind, object_id.to_string()))
            .or_default();
        let lists = parent.lists(kind);
        lists.current.push(credential.clone());
        lists.visible.push(credential);
    }

    /// Authoritative credential list, ignoring replication lag
    pub fn credentials(
        &self,
        parent_kind: ParentKind,
        object_id: &str,
        kind: CredentialKind,
    ) -> Vec<Credential> {
        self.parents
            .get_mut(&(parent_kind, object_id.to_string()))
            .map(|mut parent| parent.lists(kind).current.clone())
            .unwrap_or_default()
    }

    fn not_found(object_id: &str) -> DirectoryError {
        DirectoryError::NotFound {
            object_id: object_id.to_string(),
        }
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryClient for InMemoryDirectory {
    async fn get(
        &self,
        _ctx: &OperationContext,
        parent_kind: ParentKind,
        object_id: &str,
    ) -> Result<Lookup<DirectoryObject>, DirectoryError> {
        self.get_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_on_get.swap(false, Ordering::SeqCst) {
            return Err(DirectoryError::Transport("mock get failure".into()));
        }

        if self.parents.contains_key(&(parent_kind, object_id.to_string())) {
            Ok(Lookup::Found(DirectoryObject {
                object_id: object_id.to_string(),
                display_name: None,
            }))
        } else {
            Ok(Lookup::NotFound)
        }
    }

    async fn list_credentials(
        &self,
        _ctx: &OperationContext,
        parent_kind: ParentKind,
        object_id: &str,
        kind: CredentialKind,
    ) -> Result<Vec<Credential>, DirectoryError> {
        self.list_count.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failing_lists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(DirectoryError::Transport("mock list failure".into()));
        }

        let snapshot = self
            .parents
            .get_mut(&(parent_kind, object_id.to_string()))
            .map(|mut parent| parent.lists(kind).read())
            .ok_or_else(|| Self::not_found(object_id))?;

        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }

        Ok(snapshot)
    }

    async fn update_credentials(
        &self,
        _ctx: &OperationContext,
        parent_kind: ParentKind,
        object_id: &str,
        kind: CredentialKind,
        credentials: &[Credential],
    ) -> Result<(), DirectoryError> {
        self.update_count.fetch_add(1, Ordering::SeqCst);

        if self.fail_on_update.swap(false, Ordering::SeqCst) {
            return Err(DirectoryError::Transport("mock update failure".into()));
        }

        let mut parent = self
            .parents
            .get_mut(&(parent_kind, object_id.to_string()))
            .ok_or_else(|| Self::not_found(object_id))?;
        parent.lists(kind).write(credentials, self.replication_lag);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> OperationContext {
        OperationContext::new(Duration::from_secs(5))
    }

    fn key_ids(list: &[Credential]) -> Vec<&str> {
        list.iter().map(|c| c.key_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_replication_lag_serves_stale_lists() {
        let directory = InMemoryDirectory::new().with_replication_lag(2);
        directory.insert_parent(ParentKind::ServicePrincipal, "sp-1");
        let kind = CredentialKind::Certificate;

        directory
            .update_credentials(
                &ctx(),
                ParentKind::ServicePrincipal,
                "sp-1",
                kind,
                &[Credential::new("k1")],
            )
            .await
            .unwrap();

        for _ in 0..2 {
            let list = directory
                .list_credentials(&ctx(), ParentKind::ServicePrincipal, "sp-1", kind)
                .await
                .unwrap();
            assert!(list.is_empty());
        }
        let list = directory
            .list_credentials(&ctx(), ParentKind::ServicePrincipal, "sp-1", kind)
            .await
            .unwrap();
        assert_eq!(key_ids(&list), vec!["k1"]);
        assert_eq!(directory.list_count(), 3);
    }

    #[tokio::test]
    async fn test_failure_injection_is_one_shot() {
        let directory = InMemoryDirectory::new();
        directory.insert_parent(ParentKind::Application, "app-1");
        directory.fail_next_get();

        assert!(directory.get(&ctx(), ParentKind::Application, "app-1").await.is_err());
        assert!(
            directory
                .get(&ctx(), ParentKind::Application, "app-1")
                .await
                .unwrap()
                .is_found()
        );
    }

    #[tokio::test]
    async fn test_missing_parent() {
        let directory = InMemoryDirectory::new();
        let lookup = directory.get(&ctx(), ParentKind::Application, "nope").await.unwrap();
        assert_eq!(lookup, Lookup::NotFound);

        let err = directory
            .list_credentials(&ctx(), ParentKind::Application, "nope", CredentialKind::Password)
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_kinds_are_separate_lists() {
        let directory = InMemoryDirectory::new();
        directory.insert_credential(
            ParentKind::ServicePrincipal,
            "sp-1",
            CredentialKind::Password,
            Credential::new("p1"),
        );
        assert!(
            directory
                .credentials(ParentKind::ServicePrincipal, "sp-1", CredentialKind::Certificate)
                .is_empty()
        );
        assert_eq!(
            directory
                .credentials(ParentKind::ServicePrincipal, "sp-1", CredentialKind::Password)
                .len(),
            1
        );
    }
}
