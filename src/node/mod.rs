//! Node service
//!
//! The thread-safe entry point the CLI and embedders talk to.

pub mod service;

pub use service::Node;
