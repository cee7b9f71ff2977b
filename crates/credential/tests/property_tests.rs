//! Property tests for identifier encoding and list merging
//!
//! - Identifiers survive encode/parse for any delimiter-free components
//! - Strings without exactly three non-empty components never parse
//! - `add` never mutates its input and fails exactly on duplicate key IDs
//! - `remove_by_key_id` is idempotent and removes nothing else

use azuread_credential::core::{Credential, CredentialIdentifier, CredentialKind, ParseError};
use azuread_credential::reconcile::{add, find_by_key_id, remove_by_key_id};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

fn arb_component() -> impl Strategy<Value = String> {
    "[^/]{1,40}"
}

fn arb_kind() -> impl Strategy<Value = CredentialKind> {
    prop_oneof![Just(CredentialKind::Certificate), Just(CredentialKind::Password)]
}

fn arb_key_id() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("k1".to_string()),
        Just("k2".to_string()),
        Just("k3".to_string()),
        "[a-f0-9]{8}",
    ]
}

/// Credential lists with unique key IDs
fn arb_list() -> impl Strategy<Value = Vec<Credential>> {
    prop::collection::btree_set(arb_key_id(), 0..8)
        .prop_map(|ids| ids.into_iter().map(Credential::new).collect())
}

fn key_ids(list: &[Credential]) -> Vec<&str> {
    list.iter().map(|c| c.key_id.as_str()).collect()
}

// ---------------------------------------------------------------------------
// Identifier codec
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn identifier_round_trips(
        parent in arb_component(),
        kind in arb_kind(),
        key_id in arb_component()
    ) {
        let id = CredentialIdentifier::new(parent.clone(), kind, key_id.clone());
        let parsed = CredentialIdentifier::parse(&id.to_string()).unwrap();

        prop_assert_eq!(parsed.parent_object_id(), parent.as_str());
        prop_assert_eq!(parsed.kind(), kind);
        prop_assert_eq!(parsed.key_id(), key_id.as_str());
        prop_assert_eq!(parsed.to_string(), id.to_string());
    }

    #[test]
    fn wrong_component_count_never_parses(parts in prop::collection::vec(arb_component(), 0..6)) {
        prop_assume!(parts.len() != 3);
        let input = parts.join("/");
        let is_count_error = matches!(
            CredentialIdentifier::parse(&input),
            Err(ParseError::ComponentCount { .. })
        );
        prop_assert!(is_count_error);
    }

    #[test]
    fn parse_never_panics(input in ".*") {
        let _ = CredentialIdentifier::parse(&input);
    }
}

// ---------------------------------------------------------------------------
// Merge / remove
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn add_then_find(list in arb_list(), key_id in arb_key_id()) {
        let before = list.clone();
        match add(&list, Credential::new(key_id.clone())) {
            Ok(merged) => {
                prop_assert!(find_by_key_id(&before, &key_id).is_none());
                prop_assert_eq!(merged.len(), list.len() + 1);
                prop_assert!(find_by_key_id(&merged, &key_id).is_some());
                prop_assert_eq!(&merged[..list.len()], &list[..]);
            }
            Err(err) => {
                prop_assert!(find_by_key_id(&before, &key_id).is_some());
                prop_assert_eq!(err.key_id, key_id);
            }
        }
        prop_assert_eq!(list, before);
    }

    #[test]
    fn remove_is_idempotent(list in arb_list(), key_id in arb_key_id()) {
        let once = remove_by_key_id(&list, &key_id);
        let twice = remove_by_key_id(&once, &key_id);

        prop_assert_eq!(&once, &twice);
        prop_assert!(find_by_key_id(&once, &key_id).is_none());

        let expected: Vec<&str> = key_ids(&list).into_iter().filter(|id| *id != key_id).collect();
        prop_assert_eq!(key_ids(&once), expected);
    }

    #[test]
    fn add_then_remove_restores(list in arb_list(), key_id in arb_key_id()) {
        if let Ok(merged) = add(&list, Credential::new(key_id.clone())) {
            prop_assert_eq!(remove_by_key_id(&merged, &key_id), list);
        }
    }
}
