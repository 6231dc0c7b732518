#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::items_after_statements
    )
)]

//! Greet Stream - Notification Fan-out and Entity Extraction
//!
//! A gRPC service (also reachable from browsers over gRPC-Web) with three
//! calls: a unary greeting that notifies every live listener, a server
//! stream that delivers those notifications, and a bidirectional stream
//! that tags named entities in client text.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Plain types with no I/O
//!   - `greeting`: Greeting text
//!   - `extraction`: Entities and engine errors
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: The entity extraction engine interface
//!   - `services`: Notify, stream subscription, extraction pipeline
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `broadcast`: Fan-out hub with bounded per-subscriber queues
//!   - `grpc`: gRPC server, gRPC-Web and CORS
//!   - `ner`: Rule-based entity tagger
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//!                       ┌─────────────┐ ──► GreetStream 1
//! Greet(name) ────────► │ Broadcaster │ ──► GreetStream 2
//!                       └─────────────┘ ──► GreetStream N
//!
//! ExtractEntities ────► Pipeline ──► Engine (blocking pool) ──► responses
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Plain types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::extraction::{Entity, ExtractionError};
pub use domain::greeting::greeting_for;

// Application layer
pub use application::ports::{EntityExtractor, SharedExtractor};
pub use application::services::{
    ExtractionPipeline, Notification, NotifyService, StreamError, StreamOutcome,
    SubscriptionService,
};

// Infrastructure config
pub use infrastructure::config::{
    BroadcastSettings, ConfigError, ExtractionSettings, ServerSettings, ServiceConfig,
    StreamSettings,
};

// Broadcast hub
pub use infrastructure::broadcast::{
    BroadcastConfig, BroadcastError, BroadcastStats, Broadcaster, Delivery, SharedBroadcaster,
    Subscription,
};

// gRPC server (for integration tests)
pub use infrastructure::grpc::{GreetServer, GreetServerConfig, proto::greet::v1 as proto, serve};

// Extraction engine
pub use infrastructure::ner::{ExtractorConfig, HeuristicExtractor};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{
    TelemetryConfig, TelemetryError, TelemetryGuard, init as init_telemetry,
};
