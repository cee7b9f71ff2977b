//! Testing utilities for credential reconciliation
//!
//! An in-memory [`DirectoryClient`](crate::directory::DirectoryClient) for
//! exercising the lifecycle handlers without a real tenant.

mod mocks;

pub use mocks::InMemoryDirectory;
