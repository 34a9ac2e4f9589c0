//! Validation errors for keys and tags.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("invalid citation key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("invalid tag '{tag}': {reason}")]
    InvalidTag { tag: String, reason: &'static str },
}
