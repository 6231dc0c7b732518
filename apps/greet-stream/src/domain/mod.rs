//! Domain Layer - Core types with no transport knowledge.
//!
//! Everything here is plain Rust: the greeting template and the entity
//! records produced by extraction.

/// Entity records and extraction errors.
pub mod extraction;

/// Greeting template applied by the notify endpoint.
pub mod greeting;
