//! # Error Types — Compilation and Validation
//!
//! ## Taxonomy
//!
//! - [`LoadError`]: the document loader could not produce a document.
//! - [`ResolutionError`]: a URI, `$ref` or anchor did not lead to a schema.
//! - [`SchemaValidationError`]: a schema object failed an extension's metaschema.
//! - [`CompileError`]: anything that aborts compilation. Compilation is
//!   all-or-nothing, so any of these discards every node staged by the call.
//! - [`ValidationError`]: a tree of failed checks for one instance.
//! - [`InfiniteLoopError`]: a same-instance reference cycle was entered
//!   again at validation time.
//! - [`ValidateError`]: what a validation call returns: either of the last two.
//!
//! Validation errors are values, never panics. Every failing check ends up
//! either in the returned tree or in a compile error.

use std::fmt;

use jsv_core::CoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The document loader could not produce a document for a URL.
#[derive(Error, Debug)]
pub enum LoadError {
    /// No loader is registered for the URL's scheme.
    #[error("no loader registered for scheme {0:?}")]
    UnsupportedScheme(String),

    /// The loader knows the scheme but has no document at this URL.
    #[error("no document at {0}")]
    NotFound(String),

    /// The document exists but could not be parsed.
    #[error("cannot parse {url}: {reason}")]
    Parse {
        /// URL of the document.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// IO error reading the document.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A URI, `$ref` or anchor could not be resolved to a schema location.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// The URL or reference string is malformed.
    #[error(transparent)]
    Url(#[from] CoreError),

    /// The loader failed for a document that is not yet registered.
    #[error("failed to load {url}: {source}")]
    Load {
        /// URL of the document.
        url: String,
        /// Loader failure.
        #[source]
        source: LoadError,
    },

    /// The fragment names an anchor that the document does not declare.
    #[error("anchor {anchor:?} not found in {url}")]
    AnchorNotFound {
        /// Document or embedded resource URL.
        url: String,
        /// Anchor name.
        anchor: String,
    },

    /// The fragment pointer addresses nothing in the document.
    #[error("{location} not found")]
    PointerNotFound {
        /// Absolute location that was looked up.
        location: String,
    },

    /// The location holds a value that is neither an object nor a boolean.
    #[error("{location} is not a schema")]
    NotASchema {
        /// Absolute location of the offending value.
        location: String,
    },

    /// `$schema` names a metaschema with no known draft.
    #[error("unsupported $schema {metaschema:?} in {url}")]
    UnsupportedMetaschema {
        /// Document URL.
        url: String,
        /// The `$schema` value.
        metaschema: String,
    },

    /// Two schema objects claim the same identifier.
    #[error("duplicate identifier {id} (at {first} and {second})")]
    DuplicateId {
        /// The identifier URL.
        id: String,
        /// First declaring location.
        first: String,
        /// Second declaring location.
        second: String,
    },
}

/// A schema object does not conform to an extension's metaschema.
#[derive(Error, Debug)]
#[error("{location} does not conform to the metaschema of extension {extension:?}")]
pub struct SchemaValidationError {
    /// Absolute location of the schema object.
    pub location: String,
    /// Name of the extension whose metaschema rejected it.
    pub extension: String,
    /// The metaschema's own error tree.
    #[source]
    pub cause: ValidationError,
}

/// A same-instance reference cycle was entered again during validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("infinite loop at keyword location {keyword_location:?} for instance {instance_location:?}")]
pub struct InfiniteLoopError {
    /// Keyword location of the repeated application.
    pub keyword_location: String,
    /// Instance location the cycle keeps applying to.
    pub instance_location: String,
}

/// Anything that aborts compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    /// The entry point URL could not be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// A `$ref` (or an extension reference) could not be resolved.
    #[error("cannot resolve {reference:?} from {location}: {source}")]
    Reference {
        /// Location of the referring schema.
        location: String,
        /// The reference string.
        reference: String,
        /// Why resolution failed.
        #[source]
        source: ResolutionError,
    },

    /// A schema object failed an extension's metaschema.
    #[error(transparent)]
    SchemaInvalid(#[from] SchemaValidationError),

    /// An extension compiler reported a failure of its own.
    #[error("extension {extension:?} failed at {location}: {reason}")]
    Extension {
        /// Extension name.
        extension: String,
        /// Location of the schema being compiled.
        location: String,
        /// Extension message.
        reason: String,
    },

    /// A keyword value has the wrong shape.
    #[error("invalid {keyword:?} at {location}: {reason}")]
    InvalidKeyword {
        /// Location of the schema object.
        location: String,
        /// Keyword name.
        keyword: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A `pattern` or `patternProperties` key is not a valid regular expression.
    #[error("invalid regex {pattern:?} at {location}: {source}")]
    InvalidRegex {
        /// Location of the keyword.
        location: String,
        /// The pattern text.
        pattern: String,
        /// Regex compiler message.
        #[source]
        source: regex::Error,
    },

    /// An extension with this name is already registered.
    #[error("extension {0:?} is already registered")]
    DuplicateExtension(String),

    /// A metaschema check entered a same-instance cycle.
    #[error(transparent)]
    InfiniteLoop(#[from] InfiniteLoopError),
}

/// A tree of failed checks for one instance.
///
/// Leaves are elementary failing checks. Combinators (`allOf`, `anyOf`,
/// `oneOf`, extension groups) attach their failing branches as `causes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// Keyword path from the top-level schema, following every `$ref` taken.
    pub keyword_location: String,
    /// URI of the schema document plus the pointer of the failing keyword.
    pub absolute_keyword_location: String,
    /// JSON pointer of the failing value within the top-level instance.
    pub instance_location: String,
    /// Human-readable description of the failure.
    pub message: String,
    /// Failing sub-checks, in evaluation order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<ValidationError>,
}

impl ValidationError {
    /// Construct a leaf error.
    pub fn new(
        keyword_location: impl Into<String>,
        absolute_keyword_location: impl Into<String>,
        instance_location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            keyword_location: keyword_location.into(),
            absolute_keyword_location: absolute_keyword_location.into(),
            instance_location: instance_location.into(),
            message: message.into(),
            causes: Vec::new(),
        }
    }

    /// Attach `causes` to `parent` and return it.
    pub fn group(mut parent: ValidationError, causes: Vec<ValidationError>) -> ValidationError {
        parent.causes = causes;
        parent
    }

    /// Whether this error has no causes.
    pub fn is_leaf(&self) -> bool {
        self.causes.is_empty()
    }

    /// All leaf errors of this tree, depth first.
    pub fn leaves(&self) -> Vec<&ValidationError> {
        let mut out = Vec::new();
        collect_leaves(self, &mut out);
        out
    }

    fn fmt_tree(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}[I#{}] [S#{}] {}",
            "",
            self.instance_location,
            self.keyword_location,
            self.message,
            indent = depth * 2
        )?;
        for cause in &self.causes {
            cause.fmt_tree(f, depth + 1)?;
        }
        Ok(())
    }
}

fn collect_leaves<'e>(err: &'e ValidationError, out: &mut Vec<&'e ValidationError>) {
    if err.causes.is_empty() {
        out.push(err);
    }
    for cause in &err.causes {
        collect_leaves(cause, out);
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return self.fmt_tree(f, 0);
        }
        let instance = if self.instance_location.is_empty() {
            "(root)"
        } else {
            self.instance_location.as_str()
        };
        write!(
            f,
            "{instance} does not validate with {}: {}",
            self.absolute_keyword_location, self.message
        )
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating one instance against a compiled schema.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidateError {
    /// The instance is invalid.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// Validation re-entered a same-instance cycle.
    #[error(transparent)]
    InfiniteLoop(#[from] InfiniteLoopError),
}

impl ValidateError {
    /// The validation error tree, if this is an ordinary failure.
    pub fn as_invalid(&self) -> Option<&ValidationError> {
        match self {
            ValidateError::Invalid(e) => Some(e),
            ValidateError::InfiniteLoop(_) => None,
        }
    }

    /// Consume into the validation error tree, if this is an ordinary failure.
    pub fn into_invalid(self) -> Option<ValidationError> {
        match self {
            ValidateError::Invalid(e) => Some(e),
            ValidateError::InfiniteLoop(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(kw: &str, inst: &str, msg: &str) -> ValidationError {
        ValidationError::new(kw, format!("http://x/s.json#{kw}"), inst, msg)
    }

    #[test]
    fn test_group_sets_causes() {
        let parent = leaf("/allOf", "", "allOf failed");
        let grouped = ValidationError::group(
            parent,
            vec![leaf("/allOf/0/type", "", "a"), leaf("/allOf/1/minimum", "", "b")],
        );
        assert!(!grouped.is_leaf());
        assert_eq!(grouped.causes.len(), 2);
        assert_eq!(grouped.leaves().len(), 2);
    }

    #[test]
    fn test_display_root_and_nested() {
        let root = leaf("/type", "", "expected object, but got string");
        assert_eq!(
            root.to_string(),
            "(root) does not validate with http://x/s.json#/type: expected object, but got string"
        );
        let nested = leaf("/properties/x/type", "/x", "bad");
        assert!(nested.to_string().starts_with("/x does not validate"));
    }

    #[test]
    fn test_alternate_display_prints_tree() {
        let tree = ValidationError::group(
            leaf("", "", "validation failed"),
            vec![leaf("/required", "", "missing properties: 'a'")],
        );
        let text = format!("{tree:#}");
        assert!(text.contains("[I#] [S#] validation failed"));
        assert!(text.contains("  [I#] [S#/required] missing properties: 'a'"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let value = serde_json::to_value(leaf("/type", "/a", "m")).unwrap();
        assert_eq!(value["keywordLocation"], "/type");
        assert_eq!(value["instanceLocation"], "/a");
        assert!(value.get("causes").is_none());
    }

    #[test]
    fn test_validate_error_accessors() {
        let err = ValidateError::from(leaf("/type", "", "m"));
        assert!(err.as_invalid().is_some());
        let looped = ValidateError::from(InfiniteLoopError {
            keyword_location: "/$ref".into(),
            instance_location: String::new(),
        });
        assert!(looped.into_invalid().is_none());
    }
}
