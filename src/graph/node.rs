//! Node implementation
//!
//! Nodes are stored behind `Arc` inside a [`Graph`] so a new graph value can
//! share every untouched node with its predecessor.

use super::attr::Attr;
use super::edge::{Direction, EdgeRef};
use super::schema::Type;
use super::snapshot::Graph;
use super::types::{NodeId, TypeId};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

/// A node in the graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Caller-assigned unique identifier
    pub id: NodeId,

    /// Type definition this node claims to satisfy
    #[serde(default)]
    pub type_id: Option<TypeId>,

    /// Ordered attributes
    #[serde(default)]
    pub attrs: Vec<Attr>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>) -> Self {
        Node {
            id: id.into(),
            type_id: None,
            attrs: Vec::new(),
        }
    }

    pub fn with_type(mut self, type_id: impl Into<TypeId>) -> Self {
        self.type_id = Some(type_id.into());
        self
    }

    pub fn with_attr(mut self, attr: Attr) -> Self {
        self.attrs.push(attr);
        self
    }

    /// Value of the named attribute
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.get_attr(name).map(|a| a.value.as_str())
    }

    pub fn get_attr(&self, name: &str) -> Option<&Attr> {
        self.attrs.iter().find(|a| a.name == name)
    }

    pub fn is_type(&self, type_id: &TypeId) -> bool {
        self.type_id.as_ref() == Some(type_id)
    }
}

/// Arguments to [`Graph::set`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: NodeId,
    #[serde(default)]
    pub type_id: Option<TypeId>,
    #[serde(default)]
    pub attrs: Vec<Attr>,
    /// Carry over attrs of a prior node that the new attr list omits
    #[serde(default)]
    pub merge: bool,
}

impl NodeConfig {
    pub fn new(id: impl Into<NodeId>) -> Self {
        NodeConfig {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, type_id: impl Into<TypeId>) -> Self {
        self.type_id = Some(type_id.into());
        self
    }

    pub fn with_attr(mut self, attr: Attr) -> Self {
        self.attrs.push(attr);
        self
    }

    pub fn merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }
}

/// A node resolved against the graph it was read from
///
/// Edge traversal and type lookup go through the owning graph, so a `NodeRef`
/// always reflects exactly one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'g> {
    graph: &'g Graph,
    node: &'g Arc<Node>,
}

impl<'g> NodeRef<'g> {
    pub(crate) fn new(graph: &'g Graph, node: &'g Arc<Node>) -> Self {
        NodeRef { graph, node }
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    /// Shared handle to the underlying node
    pub fn shared(&self) -> Arc<Node> {
        Arc::clone(self.node)
    }

    pub fn type_def(&self) -> Option<&'g Type> {
        self.node
            .type_id
            .as_ref()
            .and_then(|id| self.graph.type_by_id(id))
    }

    /// Edges touching this node, optionally restricted to some edge names
    pub fn edges(&self, names: &[&str], direction: Direction) -> Vec<EdgeRef<'g>> {
        self.graph.node_edges(self.node.id.as_str(), names, direction)
    }

    pub fn out(&self, names: &[&str]) -> Vec<EdgeRef<'g>> {
        self.edges(names, Direction::Out)
    }

    pub fn inbound(&self, names: &[&str]) -> Vec<EdgeRef<'g>> {
        self.edges(names, Direction::In)
    }
}

impl Deref for NodeRef<'_> {
    type Target = Node;

    fn deref(&self) -> &Node {
        self.node
    }
}
