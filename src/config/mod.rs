//! Configuration management
//!
//! Settings for opening a ledger: storage location, mining parameters, the
//! subsidy schedule and the submission amount policy.

pub mod settings;

pub use settings::{AmountPolicy, LedgerConfig};
