//! # Validator
//!
//! Depth-first evaluation of one instance against the compiled graph. The
//! engine keeps its own scope stack (one [`Frame`] per schema application)
//! to build keyword and instance locations and to detect same-instance
//! re-entry; it is created per call and never shared.
//!
//! ## Evaluation order
//!
//! Boolean schema, `type` (a mismatch ends the node), `const`, `enum`,
//! numeric, string, array and object keywords, `$ref`, `allOf`, `anyOf`,
//! `oneOf`, `not`, `if`/`then`/`else`, then extensions by name.
//!
//! A node with one failing keyword returns that keyword's error. With
//! several, they become the causes of one `"validation failed"` error at
//! the node. Errors from sub-schemas applied to derived values and from
//! `$ref` are attached as they are, so their locations point at the leaf.
//!
//! ## Loop guard
//!
//! Entering a node marked at compile time scans the frames that apply to
//! the current instance value; finding the node there means the cycle can
//! never consume the instance, and validation stops with
//! [`InfiniteLoopError`]. A same-instance chain longer than the configured
//! bound stops the same way. Neither is ever treated as a failed branch.

use std::fmt::Write as _;

use jsv_core::json::{json_equal, JsonType};
use jsv_core::pointer;
use serde_json::{Map, Number, Value};

use crate::error::{InfiniteLoopError, ValidateError, ValidationError};
use crate::extension::ValidationContext;
use crate::keywords::Constraints;
use crate::node::{Graph, NodeId};

/// One schema application on the scope stack.
#[derive(Debug)]
struct Frame {
    node: NodeId,
    keyword_location: String,
    instance_location: String,
    same_instance: bool,
    chain: usize,
}

pub(crate) struct Engine<'g> {
    graph: &'g Graph,
    max_same_instance_depth: usize,
    current: Frame,
    ancestors: Vec<Frame>,
}

type Step = Result<(), InfiniteLoopError>;

impl<'g> Engine<'g> {
    pub(crate) fn new(graph: &'g Graph, max_same_instance_depth: usize) -> Self {
        Self {
            graph,
            max_same_instance_depth,
            current: Frame {
                node: NodeId(0),
                keyword_location: String::new(),
                instance_location: String::new(),
                same_instance: false,
                chain: 0,
            },
            ancestors: Vec::new(),
        }
    }

    pub(crate) fn run(mut self, root: NodeId, instance: &Value) -> Result<(), ValidateError> {
        self.current.node = root;
        self.evaluate(instance)
    }

    pub(crate) fn contains(&self, node: NodeId) -> bool {
        self.graph.get(node).is_some()
    }

    pub(crate) fn instance_location(&self) -> &str {
        &self.current.instance_location
    }

    pub(crate) fn keyword_location(&self) -> &str {
        &self.current.keyword_location
    }

    pub(crate) fn keyword_location_of(&self, relative: &str) -> String {
        pointer::append(&self.current.keyword_location, relative)
    }

    fn child_instance(&self, token: &str) -> String {
        pointer::push(&self.current.instance_location, token)
    }

    fn here(&self) -> String {
        self.current.instance_location.clone()
    }

    /// A leaf error at `relative` below the current node.
    pub(crate) fn error(&self, relative: &str, message: impl Into<String>) -> ValidationError {
        let node = self.graph.node(self.current.node);
        ValidationError::new(
            self.keyword_location_of(relative),
            pointer::append(node.location(), relative),
            self.current.instance_location.clone(),
            message,
        )
    }

    /// Apply `node` to `value` in a new frame.
    pub(crate) fn descend(
        &mut self,
        node: NodeId,
        keyword_location: String,
        instance_location: String,
        same_instance: bool,
        value: &Value,
    ) -> Result<(), ValidateError> {
        let chain = if same_instance { self.current.chain + 1 } else { 0 };
        if same_instance
            && (chain > self.max_same_instance_depth
                || (self.graph.node(node).loop_guard && self.is_active(node)))
        {
            tracing::debug!(
                %keyword_location,
                %instance_location,
                chain,
                "same-instance cycle re-entered"
            );
            return Err(InfiniteLoopError {
                keyword_location,
                instance_location,
            }
            .into());
        }

        let frame = Frame {
            node,
            keyword_location,
            instance_location,
            same_instance,
            chain,
        };
        let parent = std::mem::replace(&mut self.current, frame);
        self.ancestors.push(parent);
        let result = self.evaluate(value);
        if let Some(parent) = self.ancestors.pop() {
            self.current = parent;
        }
        result
    }

    /// Whether `node` is already applied to the current instance value.
    fn is_active(&self, node: NodeId) -> bool {
        let mut frame = &self.current;
        let mut ancestors = self.ancestors.iter().rev();
        loop {
            if frame.node == node {
                return true;
            }
            if !frame.same_instance {
                return false;
            }
            match ancestors.next() {
                Some(parent) => frame = parent,
                None => return false,
            }
        }
    }

    /// Apply `node`; `None` when it passed.
    fn probe(
        &mut self,
        node: NodeId,
        keyword_location: String,
        instance_location: String,
        same_instance: bool,
        value: &Value,
    ) -> Result<Option<ValidationError>, InfiniteLoopError> {
        match self.descend(node, keyword_location, instance_location, same_instance, value) {
            Ok(()) => Ok(None),
            Err(ValidateError::Invalid(e)) => Ok(Some(e)),
            Err(ValidateError::InfiniteLoop(e)) => Err(e),
        }
    }

    fn evaluate(&mut self, value: &Value) -> Result<(), ValidateError> {
        let graph = self.graph;
        let node = graph.node(self.current.node);
        if let Some(valid) = node.boolean {
            if valid {
                return Ok(());
            }
            return Err(self.error("", "false schema").into());
        }
        let c = &node.constraints;

        if let Some(types) = &c.types {
            if !types.iter().any(|t| t.matches(value)) {
                let expected: Vec<&str> = types.iter().map(|t| t.as_str()).collect();
                return Err(self
                    .error(
                        "type",
                        format!("expected {}, but got {}", expected.join(" or "), JsonType::of(value)),
                    )
                    .into());
            }
        }

        let mut errors = Vec::new();
        if let Some(expected) = &c.constant {
            if !json_equal(expected, value) {
                errors.push(self.error("const", format!("value must be {expected}")));
            }
        }
        if let Some(allowed) = &c.enumeration {
            if !allowed.iter().any(|a| json_equal(a, value)) {
                errors.push(self.error(
                    "enum",
                    format!("value must be one of {}", Value::Array(allowed.clone())),
                ));
            }
        }
        match value {
            Value::Number(n) => self.numeric(c, n, &mut errors),
            Value::String(s) => self.string(c, s, &mut errors),
            Value::Array(items) => self.array(c, items, &mut errors)?,
            Value::Object(map) => self.object(c, value, map, &mut errors)?,
            _ => {}
        }
        if let Some(target) = node.reference {
            let keyword_location = self.keyword_location_of("$ref");
            if let Some(e) = self.probe(target, keyword_location, self.here(), true, value)? {
                errors.push(e);
            }
        }
        self.combinators(c, value, &mut errors)?;

        for extension in node.extensions.values() {
            let mut ctx = ValidationContext::new(self);
            match extension.validate(&mut ctx, value) {
                Ok(()) => {}
                Err(ValidateError::Invalid(e)) => errors.push(e),
                Err(looped) => return Err(looped),
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0).into()),
            _ => Err(ValidationError::group(self.error("", "validation failed"), errors).into()),
        }
    }

    fn numeric(&self, c: &Constraints, n: &Number, errors: &mut Vec<ValidationError>) {
        let Some(x) = n.as_f64() else {
            return;
        };
        if let Some(m) = c.multiple_of {
            if !is_multiple_of(n, x, m) {
                errors.push(self.error("multipleOf", format!("{n} is not a multiple of {m}")));
            }
        }
        for limit in &c.upper {
            let (ok, op) = if limit.exclusive {
                (x < limit.limit, "<")
            } else {
                (x <= limit.limit, "<=")
            };
            if !ok {
                errors.push(self.error(
                    limit.keyword,
                    format!("must be {op} {}, but got {n}", limit.limit),
                ));
            }
        }
        for limit in &c.lower {
            let (ok, op) = if limit.exclusive {
                (x > limit.limit, ">")
            } else {
                (x >= limit.limit, ">=")
            };
            if !ok {
                errors.push(self.error(
                    limit.keyword,
                    format!("must be {op} {}, but got {n}", limit.limit),
                ));
            }
        }
    }

    fn string(&self, c: &Constraints, s: &str, errors: &mut Vec<ValidationError>) {
        let length = s.chars().count() as u64;
        if let Some(min) = c.min_length {
            if length < min {
                errors.push(self.error("minLength", format!("length must be >= {min}, but got {length}")));
            }
        }
        if let Some(max) = c.max_length {
            if length > max {
                errors.push(self.error("maxLength", format!("length must be <= {max}, but got {length}")));
            }
        }
        if let Some(pattern) = &c.pattern {
            if !pattern.regex.is_match(s) {
                errors.push(self.error(
                    "pattern",
                    format!("'{s}' does not match pattern '{}'", pattern.source),
                ));
            }
        }
        if let Some(format) = &c.format {
            if !(format.check)(s) {
                errors.push(self.error("format", format!("'{s}' is not valid '{}'", format.name)));
            }
        }
    }

    fn array(&mut self, c: &Constraints, items: &[Value], errors: &mut Vec<ValidationError>) -> Step {
        let prefix = &c.items.prefix;
        for (i, (item, node)) in items.iter().zip(prefix).enumerate() {
            let keyword_location = self.keyword_location_of(&format!("{}/{i}", c.items.prefix_keyword));
            let instance_location = self.child_instance(&i.to_string());
            if let Some(e) = self.probe(*node, keyword_location, instance_location, false, item)? {
                errors.push(e);
            }
        }
        if let Some((keyword, node)) = c.items.rest {
            for (i, item) in items.iter().enumerate().skip(prefix.len()) {
                let keyword_location = self.keyword_location_of(keyword);
                let instance_location = self.child_instance(&i.to_string());
                if let Some(e) = self.probe(node, keyword_location, instance_location, false, item)? {
                    errors.push(e);
                }
            }
        }

        if let Some(contains) = &c.contains {
            let mut matched = 0u64;
            for (i, item) in items.iter().enumerate() {
                let keyword_location = self.keyword_location_of("contains");
                let instance_location = self.child_instance(&i.to_string());
                if self
                    .probe(contains.node, keyword_location, instance_location, false, item)?
                    .is_none()
                {
                    matched += 1;
                }
            }
            if matched < contains.min {
                let keyword = if contains.min == 1 { "contains" } else { "minContains" };
                errors.push(self.error(
                    keyword,
                    format!("at least {} items must match contains, but {matched} did", contains.min),
                ));
            }
            if let Some(max) = contains.max {
                if matched > max {
                    errors.push(self.error(
                        "maxContains",
                        format!("at most {max} items may match contains, but {matched} did"),
                    ));
                }
            }
        }

        let count = items.len() as u64;
        if let Some(min) = c.min_items {
            if count < min {
                errors.push(self.error("minItems", format!("minimum {min} items required, but got {count}")));
            }
        }
        if let Some(max) = c.max_items {
            if count > max {
                errors.push(self.error("maxItems", format!("maximum {max} items allowed, but got {count}")));
            }
        }
        if c.unique_items {
            if let Some((i, j)) = first_duplicate(items) {
                errors.push(self.error("uniqueItems", format!("items at index {i} and {j} are equal")));
            }
        }
        Ok(())
    }

    fn object(
        &mut self,
        c: &Constraints,
        value: &Value,
        map: &Map<String, Value>,
        errors: &mut Vec<ValidationError>,
    ) -> Step {
        for (name, node) in &c.properties {
            if let Some(property) = map.get(name) {
                let keyword_location = self.keyword_location_of(&pointer::push("properties", name));
                let instance_location = self.child_instance(name);
                if let Some(e) = self.probe(*node, keyword_location, instance_location, false, property)? {
                    errors.push(e);
                }
            }
        }
        for (key, property) in map {
            for (pattern, node) in &c.pattern_properties {
                if pattern.regex.is_match(key) {
                    let keyword_location =
                        self.keyword_location_of(&pointer::push("patternProperties", &pattern.source));
                    let instance_location = self.child_instance(key);
                    if let Some(e) = self.probe(*node, keyword_location, instance_location, false, property)? {
                        errors.push(e);
                    }
                }
            }
        }
        if let Some(node) = c.additional_properties {
            for (key, property) in map {
                let declared = c.properties.iter().any(|(name, _)| name == key)
                    || c.pattern_properties.iter().any(|(p, _)| p.regex.is_match(key));
                if declared {
                    continue;
                }
                let keyword_location = self.keyword_location_of("additionalProperties");
                let instance_location = self.child_instance(key);
                if let Some(e) = self.probe(node, keyword_location, instance_location, false, property)? {
                    errors.push(e);
                }
            }
        }

        let missing: Vec<&String> = c.required.iter().filter(|name| !map.contains_key(*name)).collect();
        if !missing.is_empty() {
            errors.push(self.error("required", format!("missing properties: {}", quoted(&missing))));
        }

        if let Some(node) = c.property_names {
            for key in map.keys() {
                let keyword_location = self.keyword_location_of("propertyNames");
                let name = Value::String(key.clone());
                if let Some(e) = self.probe(node, keyword_location, self.here(), false, &name)? {
                    errors.push(e);
                }
            }
        }

        let count = map.len() as u64;
        if let Some(min) = c.min_properties {
            if count < min {
                errors.push(self.error(
                    "minProperties",
                    format!("minimum {min} properties required, but got {count}"),
                ));
            }
        }
        if let Some(max) = c.max_properties {
            if count > max {
                errors.push(self.error(
                    "maxProperties",
                    format!("maximum {max} properties allowed, but got {count}"),
                ));
            }
        }

        for dependency in &c.dependent_required {
            if !map.contains_key(&dependency.property) {
                continue;
            }
            let missing: Vec<&String> = dependency
                .then
                .iter()
                .filter(|name| !map.contains_key(*name))
                .collect();
            if !missing.is_empty() {
                errors.push(self.error(
                    &pointer::push(dependency.keyword, &dependency.property),
                    format!(
                        "properties {} required, if '{}' property exists",
                        quoted(&missing),
                        dependency.property
                    ),
                ));
            }
        }
        for dependency in &c.dependent_schemas {
            if !map.contains_key(&dependency.property) {
                continue;
            }
            let keyword_location =
                self.keyword_location_of(&pointer::push(dependency.keyword, &dependency.property));
            if let Some(e) = self.probe(dependency.then, keyword_location, self.here(), true, value)? {
                errors.push(e);
            }
        }
        Ok(())
    }

    fn combinators(&mut self, c: &Constraints, value: &Value, errors: &mut Vec<ValidationError>) -> Step {
        if !c.all_of.is_empty() {
            let causes = self.branches("allOf", &c.all_of, value, false)?.1;
            if !causes.is_empty() {
                errors.push(ValidationError::group(self.error("allOf", "allOf failed"), causes));
            }
        }
        if !c.any_of.is_empty() {
            let (matched, causes) = self.branches("anyOf", &c.any_of, value, true)?;
            if matched.is_empty() {
                errors.push(ValidationError::group(self.error("anyOf", "anyOf failed"), causes));
            }
        }
        if !c.one_of.is_empty() {
            let (matched, causes) = self.branches("oneOf", &c.one_of, value, false)?;
            match matched.len() {
                0 => errors.push(ValidationError::group(self.error("oneOf", "oneOf failed"), causes)),
                1 => {}
                _ => {
                    let mut indexes = String::new();
                    for (n, i) in matched.iter().enumerate() {
                        let sep = if n == 0 { "" } else { ", " };
                        let _ = write!(indexes, "{sep}{i}");
                    }
                    errors.push(self.error(
                        "oneOf",
                        format!("valid against subschemas at indexes {indexes}"),
                    ));
                }
            }
        }
        if let Some(node) = c.not {
            let keyword_location = self.keyword_location_of("not");
            if self.probe(node, keyword_location, self.here(), true, value)?.is_none() {
                errors.push(self.error("not", "not failed"));
            }
        }
        if let Some(condition) = &c.condition {
            let keyword_location = self.keyword_location_of("if");
            let holds = self
                .probe(condition.test, keyword_location, self.here(), true, value)?
                .is_none();
            let (keyword, branch) = if holds {
                ("then", condition.then)
            } else {
                ("else", condition.otherwise)
            };
            if let Some(node) = branch {
                let keyword_location = self.keyword_location_of(keyword);
                if let Some(e) = self.probe(node, keyword_location, self.here(), true, value)? {
                    let parent = self.error(keyword, format!("if-{keyword} failed"));
                    errors.push(ValidationError::group(parent, vec![e]));
                }
            }
        }
        Ok(())
    }

    /// Apply each of `nodes` to `value`; returns the passing indexes and the
    /// failures in order. With `stop_on_match`, stops at the first pass.
    fn branches(
        &mut self,
        keyword: &str,
        nodes: &[NodeId],
        value: &Value,
        stop_on_match: bool,
    ) -> Result<(Vec<usize>, Vec<ValidationError>), InfiniteLoopError> {
        let mut matched = Vec::new();
        let mut causes = Vec::new();
        for (i, node) in nodes.iter().enumerate() {
            let keyword_location = self.keyword_location_of(&format!("{keyword}/{i}"));
            match self.probe(*node, keyword_location, self.here(), true, value)? {
                None => {
                    matched.push(i);
                    if stop_on_match {
                        break;
                    }
                }
                Some(e) => causes.push(e),
            }
        }
        Ok((matched, causes))
    }
}

fn is_multiple_of(n: &Number, x: f64, m: f64) -> bool {
    if let Some(i) = n.as_i64() {
        if m.fract() == 0.0 && m.abs() < 9_007_199_254_740_992.0 {
            return i % (m as i64) == 0;
        }
    }
    let quotient = x / m;
    quotient.is_finite() && (quotient - quotient.round()).abs() < 1e-9
}

fn first_duplicate(items: &[Value]) -> Option<(usize, usize)> {
    for (i, a) in items.iter().enumerate() {
        for (j, b) in items.iter().enumerate().skip(i + 1) {
            if json_equal(a, b) {
                return Some((i, j));
            }
        }
    }
    None
}

fn quoted<T: std::fmt::Display>(values: &[T]) -> String {
    let mut out = String::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "'{v}'");
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::loader::MapLoader;
    use crate::{Compiler, CompilerOptions, ValidateError, ValidationError};
    use serde_json::{json, Value};

    fn compile(schema: Value) -> crate::Schema {
        let mut loader = MapLoader::new();
        loader.insert("urn:test", schema);
        Compiler::with_loader(loader).compile("urn:test").unwrap()
    }

    fn invalid(schema: &crate::Schema, instance: Value) -> ValidationError {
        match schema.validate(&instance) {
            Err(ValidateError::Invalid(e)) => e,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_type_short_circuits_node() {
        let s = compile(json!({"type": "string", "minLength": 3, "const": "abc"}));
        let e = invalid(&s, json!(5));
        assert_eq!(e.keyword_location, "/type");
        assert_eq!(e.message, "expected string, but got integer");
        assert!(e.is_leaf());
    }

    #[test]
    fn test_several_failures_are_grouped() {
        let s = compile(json!({"minLength": 5, "pattern": "^[0-9]+$"}));
        let e = invalid(&s, json!("ab"));
        assert_eq!(e.message, "validation failed");
        assert_eq!(e.keyword_location, "");
        let kws: Vec<&str> = e.causes.iter().map(|c| c.keyword_location.as_str()).collect();
        assert_eq!(kws, vec!["/minLength", "/pattern"]);
    }

    #[test]
    fn test_absolute_location_follows_ref_target() {
        let s = compile(json!({
            "$defs": {"pos": {"minimum": 0}},
            "properties": {"n": {"$ref": "#/$defs/pos"}}
        }));
        let e = invalid(&s, json!({"n": -3}));
        assert_eq!(e.keyword_location, "/properties/n/$ref/minimum");
        assert_eq!(e.absolute_keyword_location, "urn:test#/$defs/pos/minimum");
        assert_eq!(e.instance_location, "/n");
    }

    #[test]
    fn test_numeric_bounds() {
        let s = compile(json!({"exclusiveMinimum": 0, "maximum": 10, "multipleOf": 0.5}));
        assert!(s.is_valid(&json!(10)));
        assert!(s.is_valid(&json!(0.5)));
        assert!(!s.is_valid(&json!(0)));
        assert!(!s.is_valid(&json!(10.5)));
        assert!(!s.is_valid(&json!(0.75)));
        assert!(s.is_valid(&json!("not a number")));
    }

    #[test]
    fn test_draft4_boolean_exclusive_bounds() {
        let s = compile(json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "maximum": 5,
            "exclusiveMaximum": true
        }));
        assert!(s.is_valid(&json!(4.9)));
        let e = invalid(&s, json!(5));
        assert_eq!(e.keyword_location, "/maximum");
    }

    #[test]
    fn test_items_and_prefix_items() {
        let s = compile(json!({"prefixItems": [{"type": "string"}], "items": {"type": "integer"}}));
        assert!(s.is_valid(&json!(["a", 1, 2])));
        let e = invalid(&s, json!(["a", 1, "b"]));
        assert_eq!(e.keyword_location, "/items/type");
        assert_eq!(e.instance_location, "/2");

        let legacy = compile(json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "items": [{"type": "string"}],
            "additionalItems": false
        }));
        assert!(legacy.is_valid(&json!(["a"])));
        let e = invalid(&legacy, json!(["a", 1]));
        assert_eq!(e.keyword_location, "/additionalItems");
        assert_eq!(e.message, "false schema");
    }

    #[test]
    fn test_contains_bounds_and_unique_items() {
        let s = compile(json!({
            "contains": {"const": 1},
            "maxContains": 1,
            "uniqueItems": true
        }));
        assert!(s.is_valid(&json!([1, 2])));
        assert!(!s.is_valid(&json!([2, 3])));
        let e = invalid(&s, json!([1, 1.0]));
        let kws: Vec<&str> = e.causes.iter().map(|c| c.keyword_location.as_str()).collect();
        assert_eq!(kws, vec!["/maxContains", "/uniqueItems"]);
    }

    #[test]
    fn test_object_keywords() {
        let s = compile(json!({
            "properties": {"id": true, "a/b": {"type": "string"}},
            "patternProperties": {"^x-": {"type": "integer"}},
            "additionalProperties": false,
            "required": ["id"],
            "dependentRequired": {"a/b": ["id"]}
        }));
        assert!(s.is_valid(&json!({"id": 1, "a/b": "s", "x-n": 3})));

        let e = invalid(&s, json!({"a/b": 5}));
        let kws: Vec<&str> = e.causes.iter().map(|c| c.keyword_location.as_str()).collect();
        assert_eq!(kws, vec!["/properties/a~1b/type", "/required", "/dependentRequired/a~1b"]);
        assert_eq!(e.causes[0].instance_location, "/a~1b");
        assert_eq!(e.causes[1].message, "missing properties: 'id'");

        let e = invalid(&s, json!({"id": 1, "extra": true}));
        assert_eq!(e.keyword_location, "/additionalProperties");
        assert_eq!(e.instance_location, "/extra");
    }

    #[test]
    fn test_property_names_and_dependencies_draft7() {
        let s = compile(json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "propertyNames": {"maxLength": 3},
            "dependencies": {"a": {"required": ["b"]}, "c": ["d"]}
        }));
        assert!(s.is_valid(&json!({"a": 1, "b": 2})));
        assert!(!s.is_valid(&json!({"long": 1})));
        let e = invalid(&s, json!({"a": 1}));
        assert_eq!(e.keyword_location, "/dependencies/a/required");
        let e = invalid(&s, json!({"c": 1}));
        assert_eq!(e.keyword_location, "/dependencies/c");
    }

    #[test]
    fn test_any_of_and_not() {
        let s = compile(json!({"anyOf": [{"type": "string"}, {"type": "null"}], "not": {"const": "x"}}));
        assert!(s.is_valid(&json!(null)));
        let e = invalid(&s, json!(1));
        assert_eq!(e.message, "anyOf failed");
        assert_eq!(e.causes.len(), 2);
        let e = invalid(&s, json!("x"));
        assert_eq!(e.keyword_location, "/not");
        assert!(e.is_leaf());
    }

    #[test]
    fn test_if_then_else() {
        let s = compile(json!({
            "if": {"type": "integer"},
            "then": {"minimum": 10},
            "else": {"type": "string"}
        }));
        assert!(s.is_valid(&json!(12)));
        assert!(s.is_valid(&json!("s")));
        let e = invalid(&s, json!(3));
        assert_eq!(e.keyword_location, "/then");
        assert_eq!(e.causes[0].keyword_location, "/then/minimum");
        let e = invalid(&s, json!(null));
        assert_eq!(e.message, "if-else failed");
    }

    #[test]
    fn test_format_asserted_only_when_enabled() {
        let schema = json!({"format": "ipv4"});
        let lax = compile(schema.clone());
        assert!(lax.is_valid(&json!("not-an-ip")));

        let mut loader = MapLoader::new();
        loader.insert("urn:test", schema);
        let strict = Compiler::with_loader(loader)
            .with_options(CompilerOptions::default().with_assert_format(true))
            .compile("urn:test")
            .unwrap();
        assert!(strict.is_valid(&json!("10.0.0.1")));
        assert!(strict.is_valid(&json!(17)));
        let e = invalid(&strict, json!("not-an-ip"));
        assert_eq!(e.keyword_location, "/format");
    }

    #[test]
    fn test_false_root_schema() {
        let s = compile(json!(false));
        let e = invalid(&s, json!({}));
        assert_eq!(e.message, "false schema");
        assert_eq!(e.keyword_location, "");
        assert_eq!(e.absolute_keyword_location, "urn:test#");
    }

    #[test]
    fn test_direct_self_reference_is_infinite_loop() {
        let s = compile(json!({"$ref": "#"}));
        match s.validate(&json!(1)) {
            Err(ValidateError::InfiniteLoop(e)) => {
                assert_eq!(e.keyword_location, "/$ref");
                assert_eq!(e.instance_location, "");
            }
            other => panic!("expected infinite loop, got {other:?}"),
        }
    }

    #[test]
    fn test_infinite_loop_is_not_a_failed_branch() {
        let s = compile(json!({
            "$defs": {"spin": {"allOf": [{"$ref": "#/$defs/spin"}]}},
            "anyOf": [{"type": "integer"}, {"$ref": "#/$defs/spin"}]
        }));
        assert!(matches!(s.validate(&json!("s")), Err(ValidateError::InfiniteLoop(_))));
    }
}
