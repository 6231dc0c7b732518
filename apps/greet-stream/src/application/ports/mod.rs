//! Port Interfaces
//!
//! Contracts the application services depend on, implemented by adapters
//! in the infrastructure layer.
//!
//! ## Driven Ports (Outbound)
//!
//! - `EntityExtractor`: opaque named-entity engine, `text -> [Entity]`

use std::sync::Arc;

use crate::domain::extraction::{Entity, ExtractionError};

/// Named-entity extraction engine.
///
/// Implementations are synchronous and may be CPU bound; callers run them
/// off the async executor.
#[cfg_attr(test, mockall::automock)]
pub trait EntityExtractor: Send + Sync {
    /// Extract entity mentions from `text`, in the order they occur.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError` when the engine cannot process the input.
    fn extract(&self, text: &str) -> Result<Vec<Entity>, ExtractionError>;
}

/// Shared extraction engine reference.
pub type SharedExtractor = Arc<dyn EntityExtractor>;
