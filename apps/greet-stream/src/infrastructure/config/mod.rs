//! Configuration Module
//!
//! Environment-driven configuration for the greet service.

mod settings;

pub use settings::{
    BroadcastSettings, ConfigError, ExtractionSettings, ServerSettings, ServiceConfig,
    StreamSettings,
};
