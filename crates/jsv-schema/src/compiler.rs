//! # Schema Graph Compiler
//!
//! Turns schema locations into nodes of a shared, possibly cyclic graph.
//!
//! ## Location Cache
//!
//! Every node is keyed by its absolute location (`"<document-url>#<pointer>"`,
//! where the document is the one that physically contains the object, so an
//! embedded `$id` and a pointer to the same object share one key). A node id
//! is reserved and cached *before* the node's keywords are compiled, so a
//! schema that references itself meets its own id and stops.
//!
//! ## All-or-nothing
//!
//! One call to [`Compiler::compile`] runs inside a [`Session`] that stages
//! new nodes and cache entries. They are published together when the whole
//! transitive closure compiled; any error drops them, leaving the compiler
//! exactly as it was (documents already loaded stay loaded).
//!
//! ## Same-instance cycles
//!
//! The session tracks the chain of nodes under construction that apply to
//! the same instance value (`allOf`, `not`, `$ref` and friends) and records
//! every same-instance edge it compiles. A cache hit whose target already
//! reaches the current chain through recorded edges closes a cycle that
//! never consumes the instance, even when part of that cycle was compiled
//! under another chain (a derived-value edge starts a fresh one). The target
//! is marked so the validator checks for re-entry when it gets there.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use jsv_core::pointer;
use jsv_core::uri::split_fragment;
use jsv_core::{CoreError, Draft};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{
    CompileError, LoadError, ResolutionError, SchemaValidationError, ValidateError,
};
use crate::extension::{CompilerContext, ExtCompiler, ExtSchema, Extension};
use crate::keywords;
use crate::loader::{DocumentLoader, SchemeLoader};
use crate::node::{Graph, Node, NodeId};
use crate::options::CompilerOptions;
use crate::resolver::Resolver;
use crate::resource::Resource;
use crate::schema::Schema;

/// Compiles schema documents into [`Schema`] handles.
///
/// A compiler owns the loaded documents, the registered extensions and the
/// node cache. Compiling the same location twice yields the same node.
///
/// ```
/// use jsv_schema::Compiler;
/// use serde_json::json;
///
/// let mut compiler = Compiler::new();
/// compiler
///     .add_resource("urn:example:person", json!({
///         "type": "object",
///         "properties": {"age": {"type": "integer", "minimum": 0}},
///         "required": ["age"]
///     }))
///     .unwrap();
/// let schema = compiler.compile("urn:example:person").unwrap();
/// assert!(schema.is_valid(&json!({"age": 30})));
/// assert!(!schema.is_valid(&json!({"age": -1})));
/// ```
pub struct Compiler {
    resolver: Resolver,
    extensions: BTreeMap<String, Extension>,
    options: CompilerOptions,
    graph: Arc<Graph>,
    cache: HashMap<String, NodeId>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Compiler {
    /// A compiler that loads `file://` documents and nothing else.
    pub fn new() -> Self {
        Self::with_loader(SchemeLoader::with_file())
    }

    /// A compiler that loads unknown documents through `loader`.
    pub fn with_loader(loader: impl DocumentLoader + 'static) -> Self {
        let options = CompilerOptions::default();
        Self {
            resolver: Resolver::new(Box::new(loader), options.default_draft),
            extensions: BTreeMap::new(),
            options,
            graph: Arc::new(Graph::default()),
            cache: HashMap::new(),
        }
    }

    /// Replace the options. The default draft applies to documents loaded
    /// from now on.
    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.resolver.set_default_draft(options.default_draft);
        self.options = options;
        self
    }

    /// Current options.
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Number of nodes compiled so far.
    pub fn node_count(&self) -> usize {
        self.graph.len()
    }

    /// Register `document` under `url` so references to it need no loader.
    ///
    /// # Errors
    ///
    /// Fails when `url` is not a URL or path, or the document cannot be
    /// indexed.
    pub fn add_resource(&mut self, url: &str, document: Value) -> Result<(), CompileError> {
        let url = to_url(url)?;
        self.resolver.add(&url, document)?;
        Ok(())
    }

    /// Register an extension under `name`.
    ///
    /// Every schema object compiled afterwards is first validated against
    /// `meta`, then handed to `compiler`. Nodes already cached are not
    /// revisited.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::DuplicateExtension` if `name` is taken.
    pub fn register_extension(
        &mut self,
        name: impl Into<String>,
        meta: Schema,
        compiler: impl ExtCompiler + 'static,
    ) -> Result<(), CompileError> {
        let name = name.into();
        if self.extensions.contains_key(&name) {
            return Err(CompileError::DuplicateExtension(name));
        }
        tracing::debug!(extension = %name, meta = meta.location(), "registered extension");
        self.extensions.insert(
            name,
            Extension {
                meta,
                compiler: Box::new(compiler),
            },
        );
        Ok(())
    }

    /// Compile the schema at `url`.
    ///
    /// `url` is an absolute URL, optionally with a fragment
    /// (`"https://example.com/s.json#/$defs/a"`), or a filesystem path
    /// relative to the current directory.
    ///
    /// # Errors
    ///
    /// Any resolution, keyword, metaschema or extension failure anywhere
    /// in the schemas reachable from `url`. Nothing is cached on failure.
    pub fn compile(&mut self, url: &str) -> Result<Schema, CompileError> {
        let url = to_url(url)?;
        tracing::debug!(url = %url, "compiling schema");

        let mut session = Session {
            resolver: &mut self.resolver,
            extensions: &self.extensions,
            options: &self.options,
            committed: &self.graph,
            cache: &self.cache,
            staged_cache: HashMap::new(),
            staged: Vec::new(),
            guarded: BTreeSet::new(),
            same_instance_edges: HashMap::new(),
        };
        let root = match session.compile_entry(&url) {
            Ok(root) => root,
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "compilation failed, discarding staged nodes");
                return Err(e);
            }
        };
        let (nodes, cache) = session.finish();

        if !nodes.is_empty() {
            let added = nodes.len();
            self.graph = Arc::new(self.graph.extend(nodes));
            self.cache.extend(cache);
            tracing::debug!(url = %url, added, total = self.graph.len(), "committed compiled nodes");
        }
        Ok(Schema::new(
            Arc::clone(&self.graph),
            root,
            self.options.max_same_instance_depth,
        ))
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("resolver", &self.resolver)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .field("options", &self.options)
            .field("nodes", &self.graph.len())
            .finish()
    }
}

/// Parse an absolute URL, or treat the input as a path below the current
/// directory.
fn to_url(input: &str) -> Result<Url, CompileError> {
    if let Ok(url) = Url::parse(input) {
        return Ok(url);
    }
    let (path, fragment) = split_fragment(input);
    let cwd = std::env::current_dir().map_err(|e| ResolutionError::Load {
        url: input.to_string(),
        source: LoadError::Io(e),
    })?;
    let mut url = Url::from_file_path(cwd.join(path)).map_err(|()| {
        ResolutionError::from(CoreError::InvalidUrl {
            url: input.to_string(),
            reason: "neither an absolute URL nor a file path".to_string(),
        })
    })?;
    url.set_fragment(fragment);
    Ok(url)
}

/// A node under construction on the same-instance chain.
#[derive(Debug, Clone)]
pub(crate) struct StackEntry {
    pub node: NodeId,
    /// Keyword path the node was reached by, for diagnostics.
    pub path: String,
}

/// Where a schema object being compiled lives.
pub(crate) struct Site<'a> {
    pub resource: &'a Arc<Resource>,
    pub pointer: &'a str,
    /// Keyword path from the schema the compile started at.
    pub path: &'a str,
    pub stack: &'a [StackEntry],
    pub draft: Draft,
}

impl Site<'_> {
    pub(crate) fn location(&self) -> String {
        self.resource.location(self.pointer)
    }
}

/// State of one [`Compiler::compile`] call.
pub(crate) struct Session<'c> {
    resolver: &'c mut Resolver,
    extensions: &'c BTreeMap<String, Extension>,
    options: &'c CompilerOptions,
    committed: &'c Graph,
    cache: &'c HashMap<String, NodeId>,
    staged_cache: HashMap<String, NodeId>,
    staged: Vec<Node>,
    guarded: BTreeSet<NodeId>,
    /// Same-instance edges compiled in this session, by source node.
    same_instance_edges: HashMap<NodeId, Vec<NodeId>>,
}

impl<'c> Session<'c> {
    pub(crate) fn options(&self) -> &CompilerOptions {
        self.options
    }

    fn cached(&self, location: &str) -> Option<NodeId> {
        self.staged_cache
            .get(location)
            .or_else(|| self.cache.get(location))
            .copied()
    }

    fn compile_entry(&mut self, url: &Url) -> Result<NodeId, CompileError> {
        let fragment = format!("#{}", url.fragment().unwrap_or(""));
        let resolved = self.resolver.resolve_ref(url, &fragment)?;
        self.compile_location(&resolved.resource, &resolved.pointer, &[], "")
    }

    /// Staged nodes, loop guards applied, and the cache entries naming them.
    fn finish(self) -> (Vec<Node>, HashMap<String, NodeId>) {
        let base = self.committed.len();
        let mut nodes = self.staged;
        for id in &self.guarded {
            if let Some(node) = id.0.checked_sub(base).and_then(|i| nodes.get_mut(i)) {
                node.loop_guard = true;
            }
        }
        (nodes, self.staged_cache)
    }

    fn compile_location(
        &mut self,
        resource: &Arc<Resource>,
        pointer: &str,
        stack: &[StackEntry],
        path: &str,
    ) -> Result<NodeId, CompileError> {
        let location = resource.location(pointer);
        if let Some(id) = self.cached(&location) {
            if let Some(from) = stack.last() {
                self.record_edge(from.node, id);
                if let Some(entry) = self.reaches_chain(id, stack) {
                    if self.guarded.insert(id) {
                        tracing::debug!(
                            %location,
                            path,
                            chain_entry = entry.path.as_str(),
                            "same-instance cycle, enabling loop guard"
                        );
                    }
                }
            }
            return Ok(id);
        }

        let draft = resource.base_at(pointer).draft;
        let id = NodeId(self.committed.len() + self.staged.len());
        self.staged.push(Node::new(location.clone(), draft));
        self.staged_cache.insert(location.clone(), id);
        if let Some(from) = stack.last() {
            self.record_edge(from.node, id);
        }

        let mut stack = stack.to_vec();
        stack.push(StackEntry {
            node: id,
            path: path.to_string(),
        });
        let site = Site {
            resource,
            pointer,
            path,
            stack: &stack,
            draft,
        };
        let node = self.build(&site, location)?;
        tracing::trace!(node = %id, location = node.location(), "compiled node");

        let slot = id.0 - self.committed.len();
        self.staged[slot] = node;
        Ok(id)
    }

    fn record_edge(&mut self, from: NodeId, to: NodeId) {
        self.same_instance_edges.entry(from).or_default().push(to);
    }

    /// The first entry of `chain` that `target` reaches through recorded
    /// same-instance edges, `target` itself included.
    fn reaches_chain<'s>(&self, target: NodeId, chain: &'s [StackEntry]) -> Option<&'s StackEntry> {
        let mut seen = HashSet::new();
        let mut pending = vec![target];
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(entry) = chain.iter().find(|entry| entry.node == id) {
                return Some(entry);
            }
            if let Some(next) = self.same_instance_edges.get(&id) {
                pending.extend(next.iter().copied());
            }
        }
        None
    }

    fn build(&mut self, site: &Site<'_>, location: String) -> Result<Node, CompileError> {
        let mut node = Node::new(location, site.draft);
        let value = match site.resource.lookup(site.pointer) {
            Some(value) => value,
            None => {
                return Err(ResolutionError::PointerNotFound {
                    location: site.location(),
                }
                .into())
            }
        };
        let obj = match value {
            Value::Bool(b) => {
                node.boolean = Some(*b);
                return Ok(node);
            }
            Value::Object(obj) => obj,
            _ => {
                return Err(ResolutionError::NotASchema {
                    location: site.location(),
                }
                .into())
            }
        };

        if let Some(reference) = obj.get("$ref") {
            let Some(reference) = reference.as_str() else {
                return Err(CompileError::InvalidKeyword {
                    location: site.location(),
                    keyword: "$ref".to_string(),
                    reason: "must be a string".to_string(),
                });
            };
            node.reference = Some(self.compile_ref(site, reference, "$ref", true)?);
            if site.draft.ref_overrides_siblings() {
                return Ok(node);
            }
        }

        node.constraints = keywords::compile(self, site, obj)?;
        node.extensions = self.compile_extensions(site, value, obj)?;
        Ok(node)
    }

    fn compile_extensions(
        &mut self,
        site: &Site<'_>,
        value: &Value,
        obj: &Map<String, Value>,
    ) -> Result<BTreeMap<String, Box<dyn ExtSchema>>, CompileError> {
        let extensions = self.extensions;
        let mut compiled = BTreeMap::new();
        for (name, extension) in extensions {
            extension.meta.validate(value).map_err(|e| match e {
                ValidateError::Invalid(cause) => CompileError::from(SchemaValidationError {
                    location: site.location(),
                    extension: name.clone(),
                    cause,
                }),
                ValidateError::InfiniteLoop(e) => CompileError::from(e),
            })?;
            let mut ctx = CompilerContext::new(self, site, name);
            if let Some(payload) = extension.compiler.compile(&mut ctx, obj)? {
                compiled.insert(name.clone(), payload);
            }
        }
        Ok(compiled)
    }

    /// Compile the sub-schema at `relative` below `site`.
    pub(crate) fn compile_sub(
        &mut self,
        site: &Site<'_>,
        relative: &str,
        same_instance: bool,
    ) -> Result<NodeId, CompileError> {
        let stack = if same_instance { site.stack } else { &[] };
        self.compile_location(
            site.resource,
            &pointer::append(site.pointer, relative),
            stack,
            &pointer::append(site.path, relative),
        )
    }

    /// Resolve `reference` against the base URL in effect at `site` and
    /// compile its target.
    ///
    /// Where `$ref` overrides its siblings, a sibling `$id` does not set the
    /// base either: the reference resolves against the enclosing resource.
    pub(crate) fn compile_ref(
        &mut self,
        site: &Site<'_>,
        reference: &str,
        ref_path: &str,
        same_instance: bool,
    ) -> Result<NodeId, CompileError> {
        let base = if site.draft.ref_overrides_siblings() {
            match site.pointer.rsplit_once('/') {
                Some((parent, _)) => site.resource.base_at(parent).url.clone(),
                None => site.resource.url().clone(),
            }
        } else {
            site.resource.base_at(site.pointer).url.clone()
        };
        let resolved = self
            .resolver
            .resolve_ref(&base, reference)
            .map_err(|source| CompileError::Reference {
                location: site.location(),
                reference: reference.to_string(),
                source,
            })?;
        let stack = if same_instance { site.stack } else { &[] };
        self.compile_location(
            &resolved.resource,
            &resolved.pointer,
            stack,
            &pointer::append(site.path, ref_path),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::MapLoader;
    use serde_json::json;

    fn compiler_with(docs: &[(&str, Value)]) -> Compiler {
        let mut loader = MapLoader::new();
        for (url, doc) in docs {
            loader.insert(*url, doc.clone());
        }
        Compiler::with_loader(loader)
    }

    #[test]
    fn test_compile_same_location_twice_is_cached() {
        let mut c = compiler_with(&[("urn:s", json!({"properties": {"a": {"type": "string"}}}))]);
        let first = c.compile("urn:s").unwrap();
        let count = c.node_count();
        let second = c.compile("urn:s").unwrap();
        assert!(first.same_node(&second));
        assert_eq!(c.node_count(), count);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_fragment_entry_point_shares_node_with_parent_compile() {
        let mut c = compiler_with(&[(
            "urn:s",
            json!({"$defs": {"a": {"type": "string"}}, "$ref": "#/$defs/a"}),
        )]);
        let root = c.compile("urn:s").unwrap();
        let a = c.compile("urn:s#/$defs/a").unwrap();
        assert_eq!(root.root_node().reference(), Some(a.root()));
    }

    #[test]
    fn test_self_reference_terminates_and_closes_cycle() {
        let mut c = compiler_with(&[(
            "urn:tree",
            json!({
                "type": "object",
                "properties": {"children": {"type": "array", "items": {"$ref": "#"}}}
            }),
        )]);
        let schema = c.compile("urn:tree").unwrap();
        let item = c.compile("urn:tree#/properties/children/items").unwrap();
        assert_eq!(item.root_node().reference(), Some(schema.root()));
        assert!(!schema.root_node().is_loop_guarded());
    }

    #[test]
    fn test_same_instance_cycle_is_guarded() {
        let mut c = compiler_with(&[(
            "urn:loop",
            json!({"$defs": {"a": {"$ref": "#/$defs/b"}, "b": {"allOf": [{"$ref": "#/$defs/a"}]}}}),
        )]);
        let a = c.compile("urn:loop#/$defs/a").unwrap();
        assert!(a.root_node().is_loop_guarded());
    }

    #[test]
    fn test_failed_compile_publishes_nothing() {
        let mut c = compiler_with(&[
            ("urn:good", json!({"type": "integer"})),
            (
                "urn:bad",
                json!({"properties": {"x": {"$ref": "urn:good"}, "y": {"$ref": "urn:missing"}}}),
            ),
        ]);
        let err = c.compile("urn:bad").unwrap_err();
        assert!(matches!(err, CompileError::Reference { .. }));
        assert_eq!(c.node_count(), 0);
        c.compile("urn:good").unwrap();
        assert_eq!(c.node_count(), 1);
    }

    #[test]
    fn test_ref_overrides_siblings_before_2019() {
        let mut c = compiler_with(&[(
            "urn:d7",
            json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "definitions": {"s": {"type": "string"}},
                "$ref": "#/definitions/s",
                "maxLength": 2
            }),
        )]);
        let schema = c.compile("urn:d7").unwrap();
        assert!(schema.is_valid(&json!("long string")));
        assert!(!schema.is_valid(&json!(5)));
    }

    #[test]
    fn test_sibling_id_does_not_rebase_ref_before_2019() {
        let mut c = compiler_with(&[(
            "http://example.com/root.json",
            json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "definitions": {"a": {"type": "integer"}},
                "properties": {"p": {"$id": "other.json", "$ref": "#/definitions/a"}}
            }),
        )]);
        let schema = c.compile("http://example.com/root.json").unwrap();
        assert!(schema.is_valid(&json!({"p": 1})));
        assert!(!schema.is_valid(&json!({"p": "one"})));

        let p = c.compile("http://example.com/root.json#/properties/p").unwrap();
        let a = c.compile("http://example.com/root.json#/definitions/a").unwrap();
        assert_eq!(p.root_node().reference(), Some(a.root()));
    }

    #[test]
    fn test_cycle_closed_across_a_derived_edge_is_guarded() {
        let mut c = compiler_with(&[(
            "urn:mixed",
            json!({
                "properties": {"x": {"$ref": "#/$defs/s"}},
                "allOf": [{"$ref": "#/$defs/s"}],
                "$defs": {"s": {"$ref": "#"}}
            }),
        )]);
        let root = c.compile("urn:mixed").unwrap();
        let s = c.compile("urn:mixed#/$defs/s").unwrap();
        assert!(s.root_node().is_loop_guarded());
        assert!(!root.root_node().is_loop_guarded());
    }

    #[test]
    fn test_invalid_keyword_values() {
        let mut c = compiler_with(&[
            ("urn:a", json!({"minLength": -1})),
            ("urn:b", json!({"pattern": "("})),
            ("urn:c", json!({"type": "text"})),
            ("urn:d", json!({"$ref": 5})),
        ]);
        assert!(matches!(c.compile("urn:a").unwrap_err(), CompileError::InvalidKeyword { .. }));
        assert!(matches!(c.compile("urn:b").unwrap_err(), CompileError::InvalidRegex { .. }));
        assert!(matches!(c.compile("urn:c").unwrap_err(), CompileError::InvalidKeyword { .. }));
        assert!(matches!(c.compile("urn:d").unwrap_err(), CompileError::InvalidKeyword { .. }));
    }

    #[test]
    fn test_duplicate_extension_name() {
        struct Nothing;
        impl ExtCompiler for Nothing {
            fn compile(
                &self,
                _ctx: &mut CompilerContext<'_, '_>,
                _schema: &Map<String, Value>,
            ) -> Result<Option<Box<dyn ExtSchema>>, CompileError> {
                Ok(None)
            }
        }
        let mut c = compiler_with(&[("urn:meta", json!(true))]);
        let meta = c.compile("urn:meta").unwrap();
        c.register_extension("x", meta.clone(), Nothing).unwrap();
        let err = c.register_extension("x", meta, Nothing).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateExtension(name) if name == "x"));
    }

    #[test]
    fn test_relative_path_becomes_file_url() {
        let url = to_url("schemas/a.json#/x").unwrap();
        assert_eq!(url.scheme(), "file");
        assert!(url.path().ends_with("/schemas/a.json"));
        assert_eq!(url.fragment(), Some("/x"));
    }
}
