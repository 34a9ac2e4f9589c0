//! Shared helpers for ck-core integration tests

pub mod fixtures;
