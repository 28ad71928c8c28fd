//! # Output Formats
//!
//! Renders a [`ValidationError`] tree as JSON Schema output units: `basic`
//! (a flat list of the failing checks) and `detailed` (the tree, with
//! single-cause aggregates folded into their cause).

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One unit of JSON Schema output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputUnit {
    /// Whether the instance passed at this unit.
    pub valid: bool,
    /// Keyword path from the top-level schema.
    pub keyword_location: String,
    /// Schema URI plus pointer of the keyword.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub absolute_keyword_location: String,
    /// Pointer into the instance.
    pub instance_location: String,
    /// Failure message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Nested units.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<OutputUnit>,
}

impl OutputUnit {
    /// The unit for an instance that passed.
    pub fn valid() -> Self {
        Self {
            valid: true,
            keyword_location: String::new(),
            absolute_keyword_location: String::new(),
            instance_location: String::new(),
            error: None,
            errors: Vec::new(),
        }
    }

    fn from_error(error: &ValidationError) -> Self {
        Self {
            valid: false,
            keyword_location: error.keyword_location.clone(),
            absolute_keyword_location: error.absolute_keyword_location.clone(),
            instance_location: error.instance_location.clone(),
            error: Some(error.message.clone()),
            errors: Vec::new(),
        }
    }
}

impl ValidationError {
    /// `basic` output: a root unit whose `errors` are the leaf failures.
    pub fn basic_output(&self) -> OutputUnit {
        OutputUnit {
            valid: false,
            keyword_location: String::new(),
            absolute_keyword_location: String::new(),
            instance_location: String::new(),
            error: None,
            errors: self.leaves().into_iter().map(OutputUnit::from_error).collect(),
        }
    }

    /// `detailed` output: the error tree, where an aggregate with a single
    /// cause is replaced by that cause.
    pub fn detailed_output(&self) -> OutputUnit {
        if self.causes.len() == 1 {
            return self.causes[0].detailed_output();
        }
        let mut unit = OutputUnit::from_error(self);
        unit.errors = self.causes.iter().map(ValidationError::detailed_output).collect();
        unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(kw: &str, msg: &str) -> ValidationError {
        ValidationError::new(kw, format!("urn:s#{kw}"), "/a", msg)
    }

    fn tree() -> ValidationError {
        ValidationError::group(
            leaf("", "validation failed"),
            vec![
                ValidationError::group(leaf("/then", "if-then failed"), vec![leaf("/then/minimum", "too small")]),
                ValidationError::group(
                    leaf("/anyOf", "anyOf failed"),
                    vec![leaf("/anyOf/0/type", "t0"), leaf("/anyOf/1/type", "t1")],
                ),
            ],
        )
    }

    #[test]
    fn test_basic_output_lists_leaves() {
        let out = tree().basic_output();
        assert!(!out.valid);
        let kws: Vec<&str> = out.errors.iter().map(|u| u.keyword_location.as_str()).collect();
        assert_eq!(kws, vec!["/then/minimum", "/anyOf/0/type", "/anyOf/1/type"]);
    }

    #[test]
    fn test_detailed_output_collapses_single_causes() {
        let out = tree().detailed_output();
        assert_eq!(out.errors.len(), 2);
        assert_eq!(out.errors[0].keyword_location, "/then/minimum");
        assert_eq!(out.errors[1].errors.len(), 2);
    }

    #[test]
    fn test_output_unit_json_shape() {
        let value = serde_json::to_value(leaf("/type", "bad").detailed_output()).unwrap();
        assert_eq!(
            value,
            json!({
                "valid": false,
                "keywordLocation": "/type",
                "absoluteKeywordLocation": "urn:s#/type",
                "instanceLocation": "/a",
                "error": "bad"
            })
        );
        assert_eq!(
            serde_json::to_value(OutputUnit::valid()).unwrap(),
            json!({"valid": true, "keywordLocation": "", "instanceLocation": ""})
        );
    }
}
