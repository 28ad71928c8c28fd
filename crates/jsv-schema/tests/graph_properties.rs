//! Integration tests: structural guarantees of the compiled graph and the
//! shape of validation results.
//!
//! Covers location caching, cycle termination, combinator aggregation,
//! location pointers, and the same-instance loop guard.

use jsv_core::pointer;
use jsv_schema::{
    Compiler, CompilerOptions, MapLoader, Schema, ValidateError, ValidationError,
};
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn compiler_with(url: &str, doc: Value) -> Compiler {
    let mut loader = MapLoader::new();
    loader.insert(url, doc);
    Compiler::with_loader(loader)
}

fn compile(doc: Value) -> Schema {
    compiler_with("urn:graph", doc).compile("urn:graph").unwrap()
}

fn invalid(schema: &Schema, instance: Value) -> ValidationError {
    match schema.validate(&instance) {
        Err(ValidateError::Invalid(e)) => e,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Idempotent caching
// ---------------------------------------------------------------------------

#[test]
fn test_same_location_by_pointer_and_by_ref_is_one_node() {
    let mut compiler = compiler_with(
        "urn:graph",
        json!({
            "$defs": {"name": {"type": "string"}},
            "properties": {"first": {"$ref": "#/$defs/name"}, "last": {"$ref": "#/$defs/name"}}
        }),
    );
    compiler.compile("urn:graph").unwrap();
    let first = compiler.compile("urn:graph#/properties/first").unwrap();
    let last = compiler.compile("urn:graph#/properties/last").unwrap();
    let name = compiler.compile("urn:graph#/$defs/name").unwrap();
    assert_eq!(first.root_node().reference(), Some(name.root()));
    assert_eq!(last.root_node().reference(), Some(name.root()));
}

fn type_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["string", "integer", "number", "boolean", "null", "object", "array"])
}

proptest! {
    #[test]
    fn compiling_twice_returns_identical_nodes(
        props in prop::collection::btree_map("[a-z]{1,6}", type_name(), 1..6)
    ) {
        let properties: Map<String, Value> = props
            .iter()
            .map(|(k, t)| (k.clone(), json!({"type": t})))
            .collect();
        let mut compiler = compiler_with("urn:gen", json!({"properties": properties}));

        let root = compiler.compile("urn:gen").unwrap();
        let nodes = compiler.node_count();
        prop_assert!(root.same_node(&compiler.compile("urn:gen").unwrap()));
        for key in props.keys() {
            let at = format!("urn:gen#{}", pointer::push("/properties", key));
            let a = compiler.compile(&at).unwrap();
            let b = compiler.compile(&at).unwrap();
            prop_assert!(a.same_node(&b));
        }
        prop_assert_eq!(compiler.node_count(), nodes);
    }
}

// ---------------------------------------------------------------------------
// Cycle termination
// ---------------------------------------------------------------------------

/// `n0 -> n1 -> ... -> n{len-1} -> n0`, each a bare `$ref`.
fn ref_ring(len: usize) -> Value {
    let defs: Map<String, Value> = (0..len)
        .map(|i| {
            (
                format!("n{i}"),
                json!({"$ref": format!("#/$defs/n{}", (i + 1) % len)}),
            )
        })
        .collect();
    json!({"$defs": defs})
}

proptest! {
    #[test]
    fn ref_rings_compile_to_true_cycles(len in 1usize..8) {
        let mut compiler = compiler_with("urn:ring", ref_ring(len));
        let start = compiler.compile("urn:ring#/$defs/n0").unwrap();
        prop_assert_eq!(compiler.node_count(), len);

        let mut at = start.root();
        for _ in 0..len {
            at = start.node(at).and_then(|n| n.reference()).unwrap();
        }
        prop_assert_eq!(at, start.root());
        let is_infinite_loop = matches!(start.validate(&json!(0)), Err(ValidateError::InfiniteLoop(_)));
        prop_assert!(is_infinite_loop);
    }
}

#[test]
fn test_recursive_structure_validates_to_any_depth() {
    let schema = compile(json!({
        "type": "object",
        "properties": {
            "value": {"type": "integer"},
            "next": {"$ref": "#"}
        }
    }));
    let mut list = json!({"value": 0});
    for i in 1..50 {
        list = json!({"value": i, "next": list});
    }
    assert!(schema.is_valid(&list));

    let mut broken = json!({"value": "bottom"});
    for i in 1..5 {
        broken = json!({"value": i, "next": broken});
    }
    let e = invalid(&schema, broken);
    assert_eq!(e.instance_location, "/next/next/next/next/value");
    assert_eq!(
        e.keyword_location,
        "/properties/next/$ref/properties/next/$ref/properties/next/$ref/properties/next/$ref/properties/value/type"
    );
    assert_eq!(e.absolute_keyword_location, "urn:graph#/properties/value/type");
}

// ---------------------------------------------------------------------------
// Combinators
// ---------------------------------------------------------------------------

#[test]
fn test_all_of_reports_every_failing_branch_in_order() {
    let schema = compile(json!({"allOf": [{"type": "string"}, {"minimum": 10}]}));
    let e = invalid(&schema, json!(5));
    assert_eq!(e.keyword_location, "/allOf");
    assert_eq!(e.causes.len(), 2);
    assert!(e.causes.iter().all(ValidationError::is_leaf));
    assert_eq!(e.causes[0].keyword_location, "/allOf/0/type");
    assert_eq!(e.causes[1].keyword_location, "/allOf/1/minimum");
}

#[test]
fn test_all_of_passing_branches_are_not_reported() {
    let schema = compile(json!({"allOf": [{"type": "integer"}, {"minimum": 10}, {"maximum": 2}]}));
    let e = invalid(&schema, json!(5));
    assert_eq!(e.causes.len(), 2);
    assert_eq!(e.causes[0].keyword_location, "/allOf/1/minimum");
    assert_eq!(e.causes[1].keyword_location, "/allOf/2/maximum");
}

#[test]
fn test_one_of_with_several_matches() {
    let schema = compile(json!({"oneOf": [{"type": "integer"}, {"minimum": 0}]}));
    let e = invalid(&schema, json!(5));
    assert_eq!(e.keyword_location, "/oneOf");
    assert_eq!(e.message, "valid against subschemas at indexes 0, 1");
    assert!(e.is_leaf());
    assert!(schema.is_valid(&json!(-5)));
}

#[test]
fn test_one_of_with_no_match() {
    let schema = compile(json!({"oneOf": [{"type": "integer"}, {"minimum": 0}]}));
    let e = invalid(&schema, json!(-1.5));
    assert_eq!(e.message, "oneOf failed");
    assert_eq!(e.causes.len(), 2);
    assert_eq!(e.causes[0].keyword_location, "/oneOf/0/type");
    assert_eq!(e.causes[1].keyword_location, "/oneOf/1/minimum");
}

// ---------------------------------------------------------------------------
// Pointer correctness
// ---------------------------------------------------------------------------

#[test]
fn test_property_error_locations() {
    let schema = compile(json!({"properties": {"x": {"type": "integer"}}}));
    let e = invalid(&schema, json!({"x": "s"}));
    assert_eq!(e.instance_location, "/x");
    assert!(e.keyword_location.ends_with("/properties/x/type"));
    assert_eq!(e.absolute_keyword_location, "urn:graph#/properties/x/type");
    assert_eq!(e.to_string(), "/x does not validate with urn:graph#/properties/x/type: expected integer, but got string");
}

proptest! {
    #[test]
    fn property_names_are_escaped_in_locations(key in "[a-z~/ ]{1,8}") {
        let schema = compile(json!({"properties": {key.clone(): {"type": "integer"}}}));
        let mut instance = Map::new();
        instance.insert(key.clone(), json!("s"));
        let e = invalid(&schema, Value::Object(instance));
        prop_assert_eq!(&e.instance_location, &pointer::push("", &key));
        let expected_kw = format!("{}/type", pointer::push("/properties", &key));
        prop_assert_eq!(&e.keyword_location, &expected_kw);
    }
}

#[test]
fn test_items_error_location() {
    let schema = compile(json!({"items": {"properties": {"id": {"type": "string"}}}}));
    let e = invalid(&schema, json!([{"id": "a"}, {"id": 2}]));
    assert_eq!(e.instance_location, "/1/id");
    assert_eq!(e.keyword_location, "/items/properties/id/type");
}

// ---------------------------------------------------------------------------
// Infinite-loop guard
// ---------------------------------------------------------------------------

#[test]
fn test_same_instance_cycle_through_combinators() {
    let schema = compile(json!({
        "$defs": {
            "a": {"anyOf": [{"type": "string"}, {"$ref": "#/$defs/b"}]},
            "b": {"not": {"$ref": "#/$defs/a"}}
        },
        "$ref": "#/$defs/a"
    }));
    // A string passes before the cycle is entered.
    assert!(schema.is_valid(&json!("s")));
    match schema.validate(&json!(1)) {
        Err(ValidateError::InfiniteLoop(e)) => {
            assert_eq!(e.instance_location, "");
            assert!(e.keyword_location.ends_with("/not/$ref"));
        }
        other => panic!("expected an infinite loop, got {other:?}"),
    }
}

#[test]
fn test_cycle_inside_a_property_reports_its_instance() {
    let schema = compile(json!({
        "$defs": {"spin": {"allOf": [{"$ref": "#/$defs/spin"}]}},
        "properties": {"p": {"$ref": "#/$defs/spin"}}
    }));
    assert!(schema.is_valid(&json!({"q": 1})));
    match schema.validate(&json!({"p": 1})) {
        Err(ValidateError::InfiniteLoop(e)) => assert_eq!(e.instance_location, "/p"),
        other => panic!("expected an infinite loop, got {other:?}"),
    }
}

#[test]
fn test_cycle_closed_after_a_property_visit_is_caught_without_depth_bound() {
    // `properties` compiles first and reaches `s` on a fresh chain; the
    // cycle root -> allOf/0 -> s -> root only closes afterwards.
    let doc = json!({
        "properties": {"x": {"$ref": "#/$defs/s"}},
        "allOf": [{"$ref": "#/$defs/s"}],
        "$defs": {"s": {"$ref": "#"}}
    });
    let mut compiler = compiler_with("urn:graph", doc)
        .with_options(CompilerOptions::default().with_max_same_instance_depth(1_000_000));
    let schema = compiler.compile("urn:graph").unwrap();
    let s = compiler.compile("urn:graph#/$defs/s").unwrap();
    assert!(s.root_node().is_loop_guarded());

    match schema.validate(&json!(1)) {
        Err(ValidateError::InfiniteLoop(e)) => {
            assert_eq!(e.instance_location, "");
            assert_eq!(e.keyword_location, "/allOf/0/$ref/$ref/allOf/0/$ref");
        }
        other => panic!("expected an infinite loop, got {other:?}"),
    }
}

#[test]
fn test_depth_bound_applies_to_long_acyclic_chains() {
    let defs: Map<String, Value> = (0..20)
        .map(|i| {
            let next = if i == 19 { json!({"type": "integer"}) } else { json!({"$ref": format!("#/$defs/d{}", i + 1)}) };
            (format!("d{i}"), next)
        })
        .collect();
    let doc = json!({"$defs": defs, "$ref": "#/$defs/d0"});

    let roomy = compile(doc.clone());
    assert!(roomy.is_valid(&json!(1)));

    let tight = compiler_with("urn:graph", doc)
        .with_options(CompilerOptions::default().with_max_same_instance_depth(10))
        .compile("urn:graph")
        .unwrap();
    assert!(matches!(tight.validate(&json!(1)), Err(ValidateError::InfiniteLoop(_))));
}
