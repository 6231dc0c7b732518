//! Application Services
//!
//! Services that drive each RPC's lifecycle independently of the transport.
//!
//! - `NotifyService`: best-effort submit plus greeting
//! - `SubscriptionService`: register, stream, unregister for stream calls
//! - `ExtractionPipeline`: strict request/response loop over the engine

mod error;
mod extraction;
mod notify;
mod subscription;

pub use error::StreamError;
pub use extraction::ExtractionPipeline;
pub use notify::{Notification, NotifyService};
pub use subscription::{StreamOutcome, SubscriptionService};
