//! Named lock registry serializing read-modify-write cycles per parent
//!
//! The directory API replaces a parent's whole credential list on update, so
//! two concurrent creates against the same parent would each overwrite the
//! other's key. Every mutating handler holds the lock for
//! `(resource kind, parent object ID)` from the list fetch until the update
//! returns. Operations on different parents never contend.
//!
//! Entries are created on first use and dropped again once no holder or
//! waiter references them, so the table stays bounded by the number of
//! parents with in-flight work.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockKey = (String, String);
type LockMap = DashMap<LockKey, Arc<Mutex<()>>>;

/// Process-wide registry of named async mutexes
///
/// Cloning is cheap and clones share the same table.
///
/// # Examples
///
/// ```
/// use azuread_credential::lock::LockTable;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let locks = LockTable::new();
/// {
///     let _guard = locks.lock("azuread_service_principal", "sp-1").await;
///     assert_eq!(locks.len(), 1);
/// }
/// assert!(locks.is_empty());
/// # }
/// ```
#[derive(Clone, Default)]
pub struct LockTable {
    entries: Arc<LockMap>,
}

impl LockTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `(resource_kind, parent_id)`
    ///
    /// Waits without a bound; callers wrap this in
    /// [`OperationContext::run`](crate::core::OperationContext::run) to honor
    /// their deadline. Dropping the returned future while waiting gives up
    /// the place in the queue without leaking the entry.
    pub async fn lock(&self, resource_kind: &str, parent_id: &str) -> LockGuard {
        let key = (resource_kind.to_string(), parent_id.to_string());
        let waiter = WaiterGuard {
            entries: Arc::clone(&self.entries),
            key: Some(key.clone()),
        };

        let mutex = Arc::clone(self.entries.entry(key).or_default().value());
        let guard = mutex.lock_owned().await;

        tracing::trace!(resource_kind, parent_id, "acquired parent lock");
        LockGuard {
            guard: Some(guard),
            waiter,
        }
    }

    /// Number of names currently held or waited on
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no lock is held or waited on
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for LockTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockTable")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Removes the table entry once its last user goes away
///
/// Held by a waiter before acquisition and by the [`LockGuard`] after, so a
/// cancelled wait cleans up the same way as a release.
struct WaiterGuard {
    entries: Arc<LockMap>,
    key: Option<LockKey>,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            // The map holds one reference; anything above that is a holder
            // or a queued waiter.
            self.entries
                .remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
        }
    }
}

/// Exclusive hold on one named lock, released on drop
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    guard: Option<OwnedMutexGuard<()>>,
    waiter: WaiterGuard,
}

impl LockGuard {
    /// Release the lock explicitly
    pub fn unlock(self) {
        drop(self);
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Release the mutex before the waiter guard checks the reference count.
        self.guard.take();
        if let Some((kind, parent)) = &self.waiter.key {
            tracing::trace!(resource_kind = %kind, parent_id = %parent, "released parent lock");
        }
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.waiter.key)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_name_is_exclusive() {
        let locks = LockTable::new();
        let first = locks.lock("kind", "p1").await;

        let pending =
            tokio::time::timeout(Duration::from_millis(20), locks.lock("kind", "p1")).await;
        assert!(pending.is_err());

        first.unlock();
        let second =
            tokio::time::timeout(Duration::from_millis(200), locks.lock("kind", "p1")).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_different_names_do_not_contend() {
        let locks = LockTable::new();
        let _a = locks.lock("kind", "p1").await;
        let _b = tokio::time::timeout(Duration::from_millis(200), locks.lock("kind", "p2"))
            .await
            .unwrap();
        let _c = tokio::time::timeout(Duration::from_millis(200), locks.lock("other", "p1"))
            .await
            .unwrap();
        assert_eq!(locks.len(), 3);
    }

    #[tokio::test]
    async fn test_entry_removed_after_release() {
        let locks = LockTable::new();
        let guard = locks.lock("kind", "p1").await;
        assert_eq!(locks.len(), 1);
        drop(guard);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_kept_while_waiter_queued() {
        let locks = LockTable::new();
        let guard = locks.lock("kind", "p1").await;

        let table = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = table.lock("kind", "p1").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(guard);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_wait_does_not_leak() {
        let locks = LockTable::new();
        let guard = locks.lock("kind", "p1").await;

        let timed_out =
            tokio::time::timeout(Duration::from_millis(10), locks.lock("kind", "p1")).await;
        assert!(timed_out.is_err());

        drop(guard);
        assert!(locks.is_empty());
    }
}
