//! Entity Extraction Types
//!
//! Canonical representation of a named-entity mention and the ways an
//! extraction engine can reject its input.

/// A single entity mention found in a text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Exact span of the source text covered by the mention.
    pub text: String,
    /// Engine label for the mention (e.g. `PERSON`, `GPE`).
    pub label: String,
}

impl Entity {
    /// Create a new entity record.
    #[must_use]
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Reasons an extraction engine refuses a text.
///
/// Any of these aborts the whole extraction call, not just the offending
/// request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// Input exceeds the engine's size limit.
    #[error("input is {len} bytes, limit is {max}")]
    InputTooLarge {
        /// Size of the rejected input in bytes.
        len: usize,
        /// Configured limit in bytes.
        max: usize,
    },

    /// Input contains content the engine cannot tokenize.
    #[error("unexpected control character at byte {offset}")]
    Unparseable {
        /// Byte offset of the first offending character.
        offset: usize,
    },
}
