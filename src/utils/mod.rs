//! Utility functions and helpers
//!
//! Digest helpers, the wall clock, and the bincode layer used by the store.

pub mod crypto;
pub mod serialization;

pub use crypto::{current_timestamp, sha256_digest, sha256_hex};

pub use serialization::{deserialize, serialize};
