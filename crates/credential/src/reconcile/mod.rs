//! Copy-on-write list reconciliation and replication waiting
mod merge;
mod replication;

pub use merge::{add, find_by_key_id, remove_by_key_id};
pub use replication::{ReplicationPolicy, wait_for_visibility};
