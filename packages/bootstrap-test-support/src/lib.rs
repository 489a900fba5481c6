//! Shared helpers for bootstrap test suites.

pub mod logging;
