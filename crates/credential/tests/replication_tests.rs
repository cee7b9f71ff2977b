//! Integration tests for the replication waiter
//!
//! All tests run on a paused clock so backoff sleeps complete instantly and
//! elapsed times are exact.

use azuread_credential::prelude::*;
use azuread_credential::reconcile::wait_for_visibility;
use rstest::rstest;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::Instant;

fn policy() -> ReplicationPolicy {
    ReplicationPolicy {
        initial_interval: Duration::from_millis(100),
        max_interval: Duration::from_secs(1),
        multiplier: 2.0,
        jitter: false,
        confirmations: 1,
    }
}

type PollResult = Result<Vec<Credential>, DirectoryError>;

/// Poll source that reports the key missing for `misses` polls, then visible
fn visible_after(misses: u32) -> (Arc<AtomicU32>, impl FnMut() -> std::future::Ready<PollResult>) {
    let polls = Arc::new(AtomicU32::new(0));
    let counter = polls.clone();
    let poll = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let list = if n < misses {
            vec![Credential::new("other")]
        } else {
            vec![Credential::new("other"), Credential::new("k1")]
        };
        std::future::ready(Ok(list))
    };
    (polls, poll)
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(5)]
#[tokio::test(start_paused = true)]
async fn test_polls_until_visible(#[case] misses: u32) {
    let (polls, poll) = visible_after(misses);
    let deadline = Instant::now() + Duration::from_secs(60);

    let credential = wait_for_visibility("k1", deadline, &policy(), poll).await.unwrap();

    assert_eq!(credential.key_id, "k1");
    assert_eq!(polls.load(Ordering::SeqCst), misses + 1);
}

#[tokio::test(start_paused = true)]
async fn test_never_visible_times_out_at_deadline() {
    let (polls, poll) = visible_after(u32::MAX);
    let started = Instant::now();
    let budget = Duration::from_millis(2_500);

    let err = wait_for_visibility("k1", started + budget, &policy(), poll)
        .await
        .unwrap_err();

    assert!(started.elapsed() >= budget, "returned before the deadline");
    let ReplicationError::Timeout {
        key_id,
        attempts,
        last_error,
    } = err;
    assert_eq!(key_id, "k1");
    assert_eq!(attempts, polls.load(Ordering::SeqCst));
    assert!(last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_backoff_schedule() {
    // Delays 100, 200, 400, 800, 1000 (capped), then the sixth poll succeeds
    let (_polls, poll) = visible_after(5);
    let started = Instant::now();

    wait_for_visibility("k1", started + Duration::from_secs(60), &policy(), poll)
        .await
        .unwrap();

    assert_eq!(started.elapsed(), Duration::from_millis(2_500));
}

#[tokio::test(start_paused = true)]
async fn test_shrinking_multiplier_falls_back_to_fixed_interval() {
    // A multiplier below 1.0 fails validation but must not break the waiter
    let (polls, poll) = visible_after(3);
    let policy = ReplicationPolicy {
        multiplier: -2.0,
        ..policy()
    };
    let started = Instant::now();

    wait_for_visibility("k1", started + Duration::from_secs(60), &policy, poll)
        .await
        .unwrap();

    assert_eq!(polls.load(Ordering::SeqCst), 4);
    assert_eq!(started.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_errors_are_retried() {
    let polls = Arc::new(AtomicU32::new(0));
    let counter = polls.clone();
    let poll = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let result = if n < 3 {
            Err(DirectoryError::Transport("connection reset".into()))
        } else {
            Ok(vec![Credential::new("k1")])
        };
        std::future::ready(result)
    };

    let credential = wait_for_visibility(
        "k1",
        Instant::now() + Duration::from_secs(60),
        &policy(),
        poll,
    )
    .await
    .unwrap();

    assert_eq!(credential.key_id, "k1");
    assert_eq!(polls.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_reports_last_error() {
    let poll = || {
        std::future::ready(Err::<Vec<Credential>, _>(DirectoryError::Status {
            status: 503,
            message: "service unavailable".into(),
        }))
    };

    let err = wait_for_visibility(
        "k1",
        Instant::now() + Duration::from_secs(1),
        &policy(),
        poll,
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("service unavailable"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_poll_bounded_by_deadline() {
    let poll = || async {
        tokio::time::sleep(Duration::from_secs(3_600)).await;
        Ok::<_, DirectoryError>(vec![Credential::new("k1")])
    };
    let started = Instant::now();

    let err = wait_for_visibility("k1", started + Duration::from_secs(2), &policy(), poll)
        .await
        .unwrap_err();

    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert!(matches!(err, ReplicationError::Timeout { attempts: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn test_confirmations_require_consecutive_hits() {
    // Visible, missing, then visible for good
    let polls = Arc::new(AtomicU32::new(0));
    let counter = polls.clone();
    let poll = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let list = if n == 1 { vec![] } else { vec![Credential::new("k1")] };
        std::future::ready(Ok::<_, DirectoryError>(list))
    };
    let policy = ReplicationPolicy {
        confirmations: 3,
        ..policy()
    };

    wait_for_visibility("k1", Instant::now() + Duration::from_secs(60), &policy, poll)
        .await
        .unwrap();

    assert_eq!(polls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn test_create_waits_for_lagging_directory() {
    // GIVEN: A directory that serves two stale lists after every write
    let directory = Arc::new(InMemoryDirectory::new().with_replication_lag(2));
    directory.insert_parent(ParentKind::ServicePrincipal, "sp-1");
    let resource =
        CredentialResource::service_principal_certificate(directory.clone(), LockTable::new())
            .with_replication(policy())
            .unwrap();

    // WHEN: A certificate is created
    let record = resource
        .create(
            &OperationContext::new(Duration::from_secs(60)),
            &CredentialSpec::new("sp-1", "MIIC")
                .with_key_id("k1")
                .with_end_date_relative("24h"),
        )
        .await
        .unwrap();

    // THEN: One list for the merge, then three polls until visible
    assert_eq!(record.key_id, "k1");
    assert_eq!(directory.list_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_create_reports_replication_timeout() {
    let directory = Arc::new(InMemoryDirectory::new().with_replication_lag(u32::MAX));
    directory.insert_parent(ParentKind::ServicePrincipal, "sp-1");
    let locks = LockTable::new();
    let resource =
        CredentialResource::service_principal_certificate(directory.clone(), locks.clone())
            .with_replication(policy())
            .unwrap();

    let err = resource
        .create(
            &OperationContext::new(Duration::from_secs(5)),
            &CredentialSpec::new("sp-1", "MIIC")
                .with_key_id("k1")
                .with_end_date_relative("24h"),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CredentialError::Replication {
            source: ReplicationError::Timeout { .. },
            ..
        }
    ));
    assert!(locks.is_empty());
}
