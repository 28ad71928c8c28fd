//! # Draft Detection
//!
//! The draft fixes which keyword semantics apply to a schema object. It is
//! resolved once per (sub)resource from `$schema`, or inherited.
//!
//! The draft also decides where subschemas live. Resource indexing walks
//! only these positions so that a property *named* `$id` inside
//! `properties` is never mistaken for an identifier.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// JSON Schema draft whose keyword semantics apply to a schema object.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Draft {
    /// Draft 4.
    #[serde(rename = "draft-04")]
    Draft4,
    /// Draft 6.
    #[serde(rename = "draft-06")]
    Draft6,
    /// Draft 7.
    #[serde(rename = "draft-07")]
    Draft7,
    /// Draft 2019-09.
    #[serde(rename = "2019-09")]
    Draft2019_09,
    /// Draft 2020-12.
    #[default]
    #[serde(rename = "2020-12")]
    Draft2020_12,
}

/// How the value of a subschema keyword is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubschemaShape {
    /// The value is a schema (`not`).
    Single,
    /// The value is an array of schemas (`allOf`).
    Array,
    /// The value is either a schema or an array of schemas (`items` before 2020-12).
    SingleOrArray,
    /// The value is an object whose values are schemas (`properties`).
    Map,
    /// The value is an object whose values are schemas or string arrays (`dependencies`).
    MapOfSchemaOrArray,
}

use SubschemaShape::*;

const SUBSCHEMAS_DRAFT4: &[(&str, SubschemaShape)] = &[
    ("not", Single),
    ("additionalItems", Single),
    ("additionalProperties", Single),
    ("items", SingleOrArray),
    ("allOf", Array),
    ("anyOf", Array),
    ("oneOf", Array),
    ("properties", Map),
    ("patternProperties", Map),
    ("definitions", Map),
    ("dependencies", MapOfSchemaOrArray),
];

const SUBSCHEMAS_DRAFT6: &[(&str, SubschemaShape)] = &[
    ("not", Single),
    ("additionalItems", Single),
    ("additionalProperties", Single),
    ("contains", Single),
    ("propertyNames", Single),
    ("items", SingleOrArray),
    ("allOf", Array),
    ("anyOf", Array),
    ("oneOf", Array),
    ("properties", Map),
    ("patternProperties", Map),
    ("definitions", Map),
    ("dependencies", MapOfSchemaOrArray),
];

const SUBSCHEMAS_DRAFT7: &[(&str, SubschemaShape)] = &[
    ("not", Single),
    ("if", Single),
    ("then", Single),
    ("else", Single),
    ("additionalItems", Single),
    ("additionalProperties", Single),
    ("contains", Single),
    ("propertyNames", Single),
    ("items", SingleOrArray),
    ("allOf", Array),
    ("anyOf", Array),
    ("oneOf", Array),
    ("properties", Map),
    ("patternProperties", Map),
    ("definitions", Map),
    ("dependencies", MapOfSchemaOrArray),
];

const SUBSCHEMAS_DRAFT2019: &[(&str, SubschemaShape)] = &[
    ("not", Single),
    ("if", Single),
    ("then", Single),
    ("else", Single),
    ("additionalItems", Single),
    ("additionalProperties", Single),
    ("contains", Single),
    ("propertyNames", Single),
    ("unevaluatedItems", Single),
    ("unevaluatedProperties", Single),
    ("items", SingleOrArray),
    ("allOf", Array),
    ("anyOf", Array),
    ("oneOf", Array),
    ("properties", Map),
    ("patternProperties", Map),
    ("definitions", Map),
    ("$defs", Map),
    ("dependentSchemas", Map),
];

const SUBSCHEMAS_DRAFT2020: &[(&str, SubschemaShape)] = &[
    ("not", Single),
    ("if", Single),
    ("then", Single),
    ("else", Single),
    ("items", Single),
    ("additionalProperties", Single),
    ("contains", Single),
    ("propertyNames", Single),
    ("unevaluatedItems", Single),
    ("unevaluatedProperties", Single),
    ("prefixItems", Array),
    ("allOf", Array),
    ("anyOf", Array),
    ("oneOf", Array),
    ("properties", Map),
    ("patternProperties", Map),
    ("definitions", Map),
    ("$defs", Map),
    ("dependentSchemas", Map),
];

impl Draft {
    /// Every supported draft, oldest first.
    pub const ALL: [Draft; 5] = [
        Draft::Draft4,
        Draft::Draft6,
        Draft::Draft7,
        Draft::Draft2019_09,
        Draft::Draft2020_12,
    ];

    /// Identify the draft named by a `$schema` URL.
    ///
    /// Scheme (`http`/`https`) and a trailing empty fragment are ignored.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnknownDraft` for any other URL.
    pub fn from_url(url: &str) -> Result<Draft, CoreError> {
        let trimmed = url.trim_end_matches('#');
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        Draft::ALL
            .into_iter()
            .find(|d| {
                d.url()
                    .trim_end_matches('#')
                    .trim_start_matches("https://")
                    .trim_start_matches("http://")
                    == without_scheme
            })
            .ok_or_else(|| CoreError::UnknownDraft(url.to_string()))
    }

    /// Canonical metaschema URL of this draft.
    pub fn url(self) -> &'static str {
        match self {
            Draft::Draft4 => "http://json-schema.org/draft-04/schema#",
            Draft::Draft6 => "http://json-schema.org/draft-06/schema#",
            Draft::Draft7 => "http://json-schema.org/draft-07/schema#",
            Draft::Draft2019_09 => "https://json-schema.org/draft/2019-09/schema",
            Draft::Draft2020_12 => "https://json-schema.org/draft/2020-12/schema",
        }
    }

    /// Keyword that declares a resource identifier.
    pub fn id_keyword(self) -> &'static str {
        match self {
            Draft::Draft4 => "id",
            _ => "$id",
        }
    }

    /// Whether `$anchor` is recognised. Older drafts declare anchors through
    /// fragment-only identifiers instead.
    pub fn has_anchor_keyword(self) -> bool {
        self >= Draft::Draft2019_09
    }

    /// Whether `$ref` makes every sibling keyword ineffective.
    pub fn ref_overrides_siblings(self) -> bool {
        self <= Draft::Draft7
    }

    /// Whether tuple validation uses `prefixItems` (and `items` is the rest).
    pub fn has_prefix_items(self) -> bool {
        self >= Draft::Draft2020_12
    }

    /// Whether `dependencies` is split into `dependentRequired` and `dependentSchemas`.
    pub fn has_split_dependencies(self) -> bool {
        self >= Draft::Draft2019_09
    }

    /// Whether `minContains`/`maxContains` are recognised.
    pub fn has_contains_bounds(self) -> bool {
        self >= Draft::Draft2019_09
    }

    /// Whether `exclusiveMinimum`/`exclusiveMaximum` are booleans modifying
    /// `minimum`/`maximum`.
    pub fn has_boolean_exclusive_bounds(self) -> bool {
        self == Draft::Draft4
    }

    /// Keywords whose values hold subschemas, with their shapes.
    pub fn subschema_keywords(self) -> &'static [(&'static str, SubschemaShape)] {
        match self {
            Draft::Draft4 => SUBSCHEMAS_DRAFT4,
            Draft::Draft6 => SUBSCHEMAS_DRAFT6,
            Draft::Draft7 => SUBSCHEMAS_DRAFT7,
            Draft::Draft2019_09 => SUBSCHEMAS_DRAFT2019,
            Draft::Draft2020_12 => SUBSCHEMAS_DRAFT2020,
        }
    }
}

impl std::fmt::Display for Draft {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Draft::Draft4 => "draft-04",
            Draft::Draft6 => "draft-06",
            Draft::Draft7 => "draft-07",
            Draft::Draft2019_09 => "2019-09",
            Draft::Draft2020_12 => "2020-12",
        };
        f.write_str(name)
    }
}
