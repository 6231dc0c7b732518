//! Application Layer - Use cases and port definitions.
//!
//! This layer holds the per-call state machines and the port interfaces
//! they depend on. Nothing here knows about protobuf or HTTP.

/// Port interfaces for external collaborators (extraction engine).
pub mod ports;

/// Application services driving the notify, stream, and extraction calls.
pub mod services;
