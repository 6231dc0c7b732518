//! gRPC Server
//!
//! Implements the GreetService gRPC service over HTTP/2 and, for browser
//! clients, gRPC-Web over HTTP/1.1.
//!
//! # Architecture
//!
//! 1. `Greet` submits the name to the broadcaster and answers at once
//! 2. `GreetStream` registers a subscriber and streams straight from its
//!    queue until the broadcaster closes or the caller goes away
//! 3. `ExtractEntities` runs in its own task, hands responses to the
//!    transport through a bounded queue, and ends the call with an error
//!    status when the engine rejects a request

mod cors;
pub mod server;

// Allow clippy warnings and missing docs in generated code
#[allow(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]
pub mod proto {
    pub mod greet {
        pub mod v1 {
            include!(concat!(env!("OUT_DIR"), "/greet.v1.rs"));
        }
    }
}

pub use cors::cors_layer;
pub use server::{GreetServer, GreetServerConfig, serve};
