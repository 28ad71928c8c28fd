//! # Error Types — Core
//!
//! Errors raised by the leaf primitives. Higher layers wrap these in their
//! own `thiserror` enums.

use thiserror::Error;

/// Error raised by pointer, URI and draft helpers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A JSON pointer is not well formed (e.g. a bad `~` escape).
    #[error("invalid json pointer {pointer:?}: {reason}")]
    InvalidPointer {
        /// The offending pointer.
        pointer: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A URL or reference string could not be parsed or joined.
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl {
        /// The offending URL or reference.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// A `$schema` value names no supported draft.
    #[error("unknown draft {0:?}")]
    UnknownDraft(String),
}
