//! # Compiler Options
//!
//! Settings that shape compilation and bound validation. Options are plain
//! data (`serde` round-trippable) so an embedding application can keep them
//! in its own configuration file.
//!
//! ```
//! use jsv_schema::{CompilerOptions, Draft};
//!
//! let options = CompilerOptions::default()
//!     .with_default_draft(Draft::Draft7)
//!     .with_assert_format(true);
//! assert_eq!(options.max_same_instance_depth, 128);
//! ```

use jsv_core::Draft;
use serde::{Deserialize, Serialize};

/// Default bound on consecutive same-instance schema applications.
pub const DEFAULT_MAX_SAME_INSTANCE_DEPTH: usize = 128;

/// Settings for a [`Compiler`](crate::Compiler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Draft applied to documents without `$schema`.
    pub default_draft: Draft,
    /// Whether `format` is compiled into an assertion.
    pub assert_format: bool,
    /// Longest chain of schema applications to one instance value before
    /// validation fails with an infinite-loop error.
    pub max_same_instance_depth: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            default_draft: Draft::default(),
            assert_format: false,
            max_same_instance_depth: DEFAULT_MAX_SAME_INSTANCE_DEPTH,
        }
    }
}

impl CompilerOptions {
    /// Set the draft for documents without `$schema`.
    pub fn with_default_draft(mut self, draft: Draft) -> Self {
        self.default_draft = draft;
        self
    }

    /// Enable or disable `format` assertions.
    pub fn with_assert_format(mut self, assert: bool) -> Self {
        self.assert_format = assert;
        self
    }

    /// Set the same-instance chain bound. Values below 1 are raised to 1.
    pub fn with_max_same_instance_depth(mut self, depth: usize) -> Self {
        self.max_same_instance_depth = depth.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompilerOptions::default();
        assert_eq!(options.default_draft, Draft::Draft2020_12);
        assert!(!options.assert_format);
        assert_eq!(options.max_same_instance_depth, DEFAULT_MAX_SAME_INSTANCE_DEPTH);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let options: CompilerOptions =
            serde_json::from_str(r#"{"default_draft": "draft-07"}"#).unwrap();
        assert_eq!(options.default_draft, Draft::Draft7);
        assert_eq!(options.max_same_instance_depth, DEFAULT_MAX_SAME_INSTANCE_DEPTH);
    }

    #[test]
    fn test_depth_floor() {
        let options = CompilerOptions::default().with_max_same_instance_depth(0);
        assert_eq!(options.max_same_instance_depth, 1);
    }
}
