//! Pure merge/remove logic over a parent's credential list
//!
//! The directory API replaces the whole credential list on update, so every
//! mutation is computed here as a new list from a fetched snapshot. None of
//! these functions mutate their input.

use crate::core::{AlreadyExistsError, Credential};

/// Append `candidate` to a copy of `existing`
///
/// # Errors
///
/// Returns [`AlreadyExistsError`] if a credential with the candidate's key ID
/// is already present; the caller maps this to its import path.
pub fn add(
    existing: &[Credential],
    candidate: Credential,
) -> Result<Vec<Credential>, AlreadyExistsError> {
    if find_by_key_id(existing, &candidate.key_id).is_some() {
        return Err(AlreadyExistsError {
            key_id: candidate.key_id,
        });
    }

    let mut merged = Vec::with_capacity(existing.len() + 1);
    merged.extend_from_slice(existing);
    merged.push(candidate);
    Ok(merged)
}

/// Find the credential with `key_id`
pub fn find_by_key_id<'a>(list: &'a [Credential], key_id: &str) -> Option<&'a Credential> {
    list.iter().find(|c| c.key_id == key_id)
}

/// Copy of `list` without the credential with `key_id`
///
/// Removing an absent key returns the list unchanged.
pub fn remove_by_key_id(list: &[Credential], key_id: &str) -> Vec<Credential> {
    list.iter().filter(|c| c.key_id != key_id).cloned().collect()
}
