//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Fan-out hub with bounded per-subscriber queues.
pub mod broadcast;

/// Configuration loaded from the environment.
pub mod config;

/// gRPC and gRPC-Web server implementation.
pub mod grpc;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Rule-based entity extraction engine.
pub mod ner;

/// OpenTelemetry tracing integration.
pub mod telemetry;
