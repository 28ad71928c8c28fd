//! # Compiled Nodes
//!
//! Every compiled schema object becomes one [`Node`] in an append-only
//! arena ([`Graph`]) and is addressed by its [`NodeId`]. `$ref` targets and
//! sub-schemas are stored as ids, so a self-referential schema is a finite
//! graph with an index cycle rather than an ownership cycle.
//!
//! Nodes are immutable once their compilation is committed and are shared
//! through `Arc` by every graph snapshot that contains them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use jsv_core::Draft;

use crate::extension::ExtSchema;
use crate::keywords::Constraints;

/// Index of a node in its compiler's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position of the node in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The compiled form of one schema object.
pub struct Node {
    pub(crate) location: String,
    pub(crate) draft: Draft,
    pub(crate) boolean: Option<bool>,
    pub(crate) reference: Option<NodeId>,
    pub(crate) constraints: Constraints,
    pub(crate) extensions: BTreeMap<String, Box<dyn ExtSchema>>,
    pub(crate) loop_guard: bool,
}

impl Node {
    pub(crate) fn new(location: String, draft: Draft) -> Self {
        Self {
            location,
            draft,
            boolean: None,
            reference: None,
            constraints: Constraints::default(),
            extensions: BTreeMap::new(),
            loop_guard: false,
        }
    }

    /// Absolute location: document URL, `#`, JSON pointer.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Draft whose keyword semantics were compiled.
    pub fn draft(&self) -> Draft {
        self.draft
    }

    /// `Some` for the boolean schemas `true` and `false`.
    pub fn boolean(&self) -> Option<bool> {
        self.boolean
    }

    /// Target of this node's `$ref`, if any.
    pub fn reference(&self) -> Option<NodeId> {
        self.reference
    }

    /// Whether this node lies on a same-instance cycle found at compile time.
    pub fn is_loop_guarded(&self) -> bool {
        self.loop_guard
    }

    /// Names of the extensions that contributed to this node, sorted.
    pub fn extension_names(&self) -> impl Iterator<Item = &str> {
        self.extensions.keys().map(String::as_str)
    }

    /// Whether extension `name` contributed to this node.
    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("location", &self.location)
            .field("draft", &self.draft)
            .field("boolean", &self.boolean)
            .field("reference", &self.reference)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .field("loop_guard", &self.loop_guard)
            .finish_non_exhaustive()
    }
}

/// Append-only arena of compiled nodes.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Arc<Node>>,
}

impl Graph {
    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node `id`, if it belongs to this graph.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).map(Arc::as_ref)
    }

    /// Ids handed out by a compiler are always in bounds of every graph
    /// committed after them. Ids from elsewhere go through [`Graph::get`].
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn shared(&self, id: NodeId) -> Option<&Arc<Node>> {
        self.nodes.get(id.0)
    }

    /// A new graph holding these nodes followed by `staged`.
    pub(crate) fn extend(&self, staged: Vec<Node>) -> Graph {
        let mut nodes = Vec::with_capacity(self.nodes.len() + staged.len());
        nodes.extend(self.nodes.iter().cloned());
        nodes.extend(staged.into_iter().map(Arc::new));
        Graph { nodes }
    }
}
