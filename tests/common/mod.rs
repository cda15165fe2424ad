//! Common test utilities and helpers
//!
//! Shared by the integration tests: a recording git fake and manifest /
//! workspace fixtures.

#![allow(dead_code)]

pub mod fake_git;
pub mod test_fixtures;
