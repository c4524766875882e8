//! Helpers for tests that need an isolated, fast ledger.

pub mod test_utils;

pub use test_utils::*;
