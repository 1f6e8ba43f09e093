//! Identity Verification Backend service

#![deny(clippy::all, clippy::pedantic, clippy::nursery, dead_code)]

/// Bounded admission for proof verifications
pub mod pool;

/// HTTP routes
pub mod routes;

/// Server bootstrap
pub mod server;

/// Environment, errors and extractors
pub mod types;
