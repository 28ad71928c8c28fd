//! # Compiled Schema Handle
//!
//! A [`Schema`] is a snapshot of the compiler's graph plus the id of its
//! root node. It is cheap to clone, `Send + Sync`, and independent of the
//! compiler that produced it: validation never touches the compiler.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ValidateError;
use crate::node::{Graph, Node, NodeId};
use crate::validator::Engine;

/// A compiled schema, ready to validate instances.
#[derive(Clone)]
pub struct Schema {
    graph: Arc<Graph>,
    root: NodeId,
    max_same_instance_depth: usize,
}

impl Schema {
    pub(crate) fn new(graph: Arc<Graph>, root: NodeId, max_same_instance_depth: usize) -> Self {
        Self {
            graph,
            root,
            max_same_instance_depth,
        }
    }

    /// Validate `instance`.
    ///
    /// # Errors
    ///
    /// `ValidateError::Invalid` with the full error tree when the instance
    /// does not conform; `ValidateError::InfiniteLoop` when validation
    /// re-entered a same-instance reference cycle.
    pub fn validate(&self, instance: &Value) -> Result<(), ValidateError> {
        Engine::new(&self.graph, self.max_same_instance_depth).run(self.root, instance)
    }

    /// Whether `instance` conforms. An infinite loop counts as invalid.
    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validate(instance).is_ok()
    }

    /// Id of the root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The root node.
    pub fn root_node(&self) -> &Node {
        self.graph.node(self.root)
    }

    /// Any node reachable from this schema.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.graph.get(id)
    }

    /// Absolute location of the root node.
    pub fn location(&self) -> &str {
        self.root_node().location()
    }

    /// Whether both handles have the very same root node.
    pub fn same_node(&self, other: &Schema) -> bool {
        match (self.graph.shared(self.root), other.graph.shared(other.root)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("location", &self.location())
            .field("root", &self.root)
            .field("nodes", &self.graph.len())
            .finish()
    }
}
