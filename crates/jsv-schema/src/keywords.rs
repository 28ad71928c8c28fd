//! # Keyword Compilation
//!
//! Translates the keywords of one schema object into [`Constraints`], the
//! flat data the validator evaluates. Draft differences are settled here
//! (boolean `exclusiveMaximum` in draft 4, array-form `items` before
//! 2020-12, `dependencies` before 2019-09) so validation never looks at the
//! draft again.
//!
//! Sub-schemas are compiled through the session as they are met:
//! combinators with the current same-instance stack, keywords that apply
//! to a derived value (a property, an item, a key) with an empty one.

use jsv_core::draft::Draft;
use jsv_core::json::{is_integer, JsonType};
use jsv_core::pointer;
use regex::Regex;
use serde_json::{Map, Value};

use crate::compiler::{Session, Site};
use crate::error::CompileError;
use crate::format::{self, FormatCheck};
use crate::node::NodeId;

/// One numeric bound.
#[derive(Debug, Clone)]
pub(crate) struct Limit {
    pub keyword: &'static str,
    pub limit: f64,
    pub exclusive: bool,
}

/// A compiled regular expression and its source text.
#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    pub source: String,
    pub regex: Regex,
}

/// An asserted `format`.
#[derive(Debug, Clone)]
pub(crate) struct Format {
    pub name: String,
    pub check: FormatCheck,
}

/// Positional item schemas followed by the schema for the remaining items.
#[derive(Debug, Default)]
pub(crate) struct Items {
    pub prefix_keyword: &'static str,
    pub prefix: Vec<NodeId>,
    pub rest: Option<(&'static str, NodeId)>,
}

#[derive(Debug)]
pub(crate) struct Contains {
    pub node: NodeId,
    pub min: u64,
    pub max: Option<u64>,
}

/// Something that applies when `property` is present.
#[derive(Debug)]
pub(crate) struct Dependency<T> {
    pub keyword: &'static str,
    pub property: String,
    pub then: T,
}

#[derive(Debug)]
pub(crate) struct Condition {
    pub test: NodeId,
    pub then: Option<NodeId>,
    pub otherwise: Option<NodeId>,
}

/// Everything a schema object asserts apart from `$ref` and extensions.
#[derive(Debug, Default)]
pub(crate) struct Constraints {
    pub types: Option<Vec<JsonType>>,
    pub constant: Option<Value>,
    pub enumeration: Option<Vec<Value>>,

    pub multiple_of: Option<f64>,
    pub upper: Vec<Limit>,
    pub lower: Vec<Limit>,

    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<Pattern>,
    pub format: Option<Format>,

    pub items: Items,
    pub contains: Option<Contains>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
    pub unique_items: bool,

    pub properties: Vec<(String, NodeId)>,
    pub pattern_properties: Vec<(Pattern, NodeId)>,
    pub additional_properties: Option<NodeId>,
    pub required: Vec<String>,
    pub property_names: Option<NodeId>,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    pub dependent_required: Vec<Dependency<Vec<String>>>,
    pub dependent_schemas: Vec<Dependency<NodeId>>,

    pub all_of: Vec<NodeId>,
    pub any_of: Vec<NodeId>,
    pub one_of: Vec<NodeId>,
    pub not: Option<NodeId>,
    pub condition: Option<Condition>,
}

/// Compile the keywords of `obj`, found at `site`.
pub(crate) fn compile(
    session: &mut Session<'_>,
    site: &Site<'_>,
    obj: &Map<String, Value>,
) -> Result<Constraints, CompileError> {
    let mut kc = KeywordCompiler { session, site, obj };
    let mut c = Constraints::default();
    kc.generic(&mut c)?;
    kc.numeric(&mut c)?;
    kc.string(&mut c)?;
    kc.array(&mut c)?;
    kc.object(&mut c)?;
    kc.combinators(&mut c)?;
    Ok(c)
}

struct KeywordCompiler<'k, 's, 'c> {
    session: &'k mut Session<'c>,
    site: &'k Site<'s>,
    obj: &'k Map<String, Value>,
}

impl KeywordCompiler<'_, '_, '_> {
    fn draft(&self) -> Draft {
        self.site.draft
    }

    fn invalid(&self, keyword: &str, reason: impl Into<String>) -> CompileError {
        CompileError::InvalidKeyword {
            location: self.site.location(),
            keyword: keyword.to_string(),
            reason: reason.into(),
        }
    }

    fn sub(&mut self, relative: &str, same_instance: bool) -> Result<NodeId, CompileError> {
        self.session.compile_sub(self.site, relative, same_instance)
    }

    /// A keyword whose value is one schema.
    fn single(&mut self, keyword: &str, same_instance: bool) -> Result<Option<NodeId>, CompileError> {
        match self.obj.get(keyword) {
            None => Ok(None),
            Some(Value::Object(_) | Value::Bool(_)) => {
                self.sub(&pointer::escape(keyword), same_instance).map(Some)
            }
            Some(_) => Err(self.invalid(keyword, "must be a schema")),
        }
    }

    /// A keyword whose value is a non-empty array of schemas.
    fn array_of(&mut self, keyword: &str, same_instance: bool) -> Result<Vec<NodeId>, CompileError> {
        let Some(value) = self.obj.get(keyword) else {
            return Ok(Vec::new());
        };
        let Some(items) = value.as_array().filter(|a| !a.is_empty()) else {
            return Err(self.invalid(keyword, "must be a non-empty array of schemas"));
        };
        (0..items.len())
            .map(|i| self.sub(&format!("{keyword}/{i}"), same_instance))
            .collect()
    }

    /// A keyword whose value is an object of schemas, in document order.
    fn map_of(&mut self, keyword: &str) -> Result<Vec<(String, NodeId)>, CompileError> {
        let Some(value) = self.obj.get(keyword) else {
            return Ok(Vec::new());
        };
        let Some(map) = value.as_object() else {
            return Err(self.invalid(keyword, "must be an object of schemas"));
        };
        let names: Vec<String> = map.keys().cloned().collect();
        names
            .into_iter()
            .map(|name| {
                let id = self.sub(&pointer::push(keyword, &name), false)?;
                Ok((name, id))
            })
            .collect()
    }

    fn count(&self, keyword: &str) -> Result<Option<u64>, CompileError> {
        match self.obj.get(keyword) {
            None => Ok(None),
            Some(Value::Number(n)) if is_integer(n) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .map(Some)
                .ok_or_else(|| self.invalid(keyword, "must be a non-negative integer")),
            Some(_) => Err(self.invalid(keyword, "must be a non-negative integer")),
        }
    }

    fn number(&self, keyword: &str) -> Result<Option<f64>, CompileError> {
        match self.obj.get(keyword) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(keyword, "must be a number")),
            Some(_) => Err(self.invalid(keyword, "must be a number")),
        }
    }

    fn regex(&self, keyword: &str, source: &str) -> Result<Pattern, CompileError> {
        Regex::new(source)
            .map(|regex| Pattern {
                source: source.to_string(),
                regex,
            })
            .map_err(|source_err| CompileError::InvalidRegex {
                location: pointer::append(&self.site.location(), keyword),
                pattern: source.to_string(),
                source: source_err,
            })
    }

    fn generic(&mut self, c: &mut Constraints) -> Result<(), CompileError> {
        if let Some(value) = self.obj.get("type") {
            let names: Vec<&Value> = match value {
                Value::Array(names) => names.iter().collect(),
                single => vec![single],
            };
            let types = names
                .into_iter()
                .map(|name| {
                    name.as_str()
                        .and_then(JsonType::from_name)
                        .ok_or_else(|| self.invalid("type", format!("unknown type {name}")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            c.types = Some(types);
        }
        if self.draft() >= Draft::Draft6 {
            c.constant = self.obj.get("const").cloned();
        }
        if let Some(value) = self.obj.get("enum") {
            let Some(values) = value.as_array() else {
                return Err(self.invalid("enum", "must be an array"));
            };
            c.enumeration = Some(values.clone());
        }
        Ok(())
    }

    fn numeric(&mut self, c: &mut Constraints) -> Result<(), CompileError> {
        if let Some(m) = self.number("multipleOf")? {
            if m <= 0.0 {
                return Err(self.invalid("multipleOf", "must be strictly positive"));
            }
            c.multiple_of = Some(m);
        }
        if self.draft().has_boolean_exclusive_bounds() {
            c.upper.extend(self.legacy_limit("maximum", "exclusiveMaximum")?);
            c.lower.extend(self.legacy_limit("minimum", "exclusiveMinimum")?);
            return Ok(());
        }
        for (keyword, exclusive) in [("maximum", false), ("exclusiveMaximum", true)] {
            if let Some(limit) = self.number(keyword)? {
                c.upper.push(Limit { keyword, limit, exclusive });
            }
        }
        for (keyword, exclusive) in [("minimum", false), ("exclusiveMinimum", true)] {
            if let Some(limit) = self.number(keyword)? {
                c.lower.push(Limit { keyword, limit, exclusive });
            }
        }
        Ok(())
    }

    /// Draft 4 bound: a number plus a boolean flag in a sibling keyword.
    fn legacy_limit(
        &self,
        keyword: &'static str,
        flag: &'static str,
    ) -> Result<Option<Limit>, CompileError> {
        let exclusive = match self.obj.get(flag) {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(self.invalid(flag, "must be a boolean")),
        };
        Ok(self.number(keyword)?.map(|limit| Limit {
            keyword,
            limit,
            exclusive,
        }))
    }

    fn string(&mut self, c: &mut Constraints) -> Result<(), CompileError> {
        c.min_length = self.count("minLength")?;
        c.max_length = self.count("maxLength")?;
        if let Some(value) = self.obj.get("pattern") {
            let Some(source) = value.as_str() else {
                return Err(self.invalid("pattern", "must be a string"));
            };
            c.pattern = Some(self.regex("pattern", source)?);
        }
        if self.session.options().assert_format {
            if let Some(name) = self.obj.get("format").and_then(Value::as_str) {
                match format::checker(name) {
                    Some(check) => {
                        c.format = Some(Format {
                            name: name.to_string(),
                            check,
                        })
                    }
                    None => tracing::debug!(
                        format = name,
                        location = %self.site.location(),
                        "ignoring unknown format"
                    ),
                }
            }
        }
        Ok(())
    }

    fn array(&mut self, c: &mut Constraints) -> Result<(), CompileError> {
        if self.draft().has_prefix_items() {
            c.items = Items {
                prefix_keyword: "prefixItems",
                prefix: self.array_of("prefixItems", false)?,
                rest: self.single("items", false)?.map(|id| ("items", id)),
            };
        } else {
            let obj = self.obj;
            c.items = match obj.get("items") {
                Some(Value::Array(items)) => Items {
                    prefix_keyword: "items",
                    prefix: (0..items.len())
                        .map(|i| self.sub(&format!("items/{i}"), false))
                        .collect::<Result<_, _>>()?,
                    rest: self
                        .single("additionalItems", false)?
                        .map(|id| ("additionalItems", id)),
                },
                Some(_) => Items {
                    prefix_keyword: "items",
                    prefix: Vec::new(),
                    rest: self.single("items", false)?.map(|id| ("items", id)),
                },
                None => Items::default(),
            };
        }

        if self.draft() >= Draft::Draft6 {
            if let Some(node) = self.single("contains", false)? {
                let (min, max) = if self.draft().has_contains_bounds() {
                    (self.count("minContains")?.unwrap_or(1), self.count("maxContains")?)
                } else {
                    (1, None)
                };
                c.contains = Some(Contains { node, min, max });
            }
        }

        c.min_items = self.count("minItems")?;
        c.max_items = self.count("maxItems")?;
        c.unique_items = match self.obj.get("uniqueItems") {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(self.invalid("uniqueItems", "must be a boolean")),
        };
        Ok(())
    }

    fn object(&mut self, c: &mut Constraints) -> Result<(), CompileError> {
        c.properties = self.map_of("properties")?;
        if let Some(value) = self.obj.get("patternProperties") {
            let Some(map) = value.as_object() else {
                return Err(self.invalid("patternProperties", "must be an object of schemas"));
            };
            let sources: Vec<String> = map.keys().cloned().collect();
            for source in sources {
                let pattern = self.regex("patternProperties", &source)?;
                let id = self.sub(&pointer::push("patternProperties", &source), false)?;
                c.pattern_properties.push((pattern, id));
            }
        }
        c.additional_properties = self.single("additionalProperties", false)?;
        if let Some(value) = self.obj.get("required") {
            c.required = self.string_list("required", value)?;
        }
        if self.draft() >= Draft::Draft6 {
            c.property_names = self.single("propertyNames", false)?;
        }
        c.min_properties = self.count("minProperties")?;
        c.max_properties = self.count("maxProperties")?;

        if self.draft().has_split_dependencies() {
            if let Some(value) = self.obj.get("dependentRequired") {
                let Some(map) = value.as_object() else {
                    return Err(self.invalid("dependentRequired", "must be an object"));
                };
                for (property, names) in map {
                    c.dependent_required.push(Dependency {
                        keyword: "dependentRequired",
                        property: property.clone(),
                        then: self.string_list("dependentRequired", names)?,
                    });
                }
            }
            if self.obj.contains_key("dependentSchemas") {
                let Some(map) = self.obj.get("dependentSchemas").and_then(Value::as_object) else {
                    return Err(self.invalid("dependentSchemas", "must be an object of schemas"));
                };
                let properties: Vec<String> = map.keys().cloned().collect();
                for property in properties {
                    let id = self.sub(&pointer::push("dependentSchemas", &property), true)?;
                    c.dependent_schemas.push(Dependency {
                        keyword: "dependentSchemas",
                        property,
                        then: id,
                    });
                }
            }
        } else if let Some(value) = self.obj.get("dependencies") {
            let Some(map) = value.as_object() else {
                return Err(self.invalid("dependencies", "must be an object"));
            };
            let entries: Vec<(String, Value)> =
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            for (property, value) in entries {
                if value.is_array() {
                    c.dependent_required.push(Dependency {
                        keyword: "dependencies",
                        then: self.string_list("dependencies", &value)?,
                        property,
                    });
                } else {
                    let id = self.sub(&pointer::push("dependencies", &property), true)?;
                    c.dependent_schemas.push(Dependency {
                        keyword: "dependencies",
                        property,
                        then: id,
                    });
                }
            }
        }
        Ok(())
    }

    fn combinators(&mut self, c: &mut Constraints) -> Result<(), CompileError> {
        c.all_of = self.array_of("allOf", true)?;
        c.any_of = self.array_of("anyOf", true)?;
        c.one_of = self.array_of("oneOf", true)?;
        c.not = self.single("not", true)?;
        if self.draft() >= Draft::Draft7 {
            if let Some(test) = self.single("if", true)? {
                c.condition = Some(Condition {
                    test,
                    then: self.single("then", true)?,
                    otherwise: self.single("else", true)?,
                });
            }
        }
        Ok(())
    }

    fn string_list(&self, keyword: &str, value: &Value) -> Result<Vec<String>, CompileError> {
        value
            .as_array()
            .and_then(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .ok_or_else(|| self.invalid(keyword, "must be an array of strings"))
    }
}
