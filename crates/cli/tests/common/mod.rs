//! Common utilities for integration tests

#[allow(dead_code)]
pub mod cli;
