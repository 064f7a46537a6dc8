//! Edge implementation
//!
//! Edges are directed and named. Endpoints are held by id and resolved against
//! the owning graph at traversal time, never by reference.

use super::node::NodeRef;
use super::snapshot::{Graph, GraphError, GraphResult};
use super::types::{EdgeName, NodeId};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

/// What happens when an edge is removed from the graph
///
/// Hooks are plain data so edges stay comparable, serializable and `Send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OnDelete {
    #[default]
    None,
    /// Remove the edge's target node as well (parent owns child)
    Cascade,
}

impl OnDelete {
    /// Run the hook for `edge` against the graph it was just removed from
    pub fn run(self, edge: &Edge, graph: Graph) -> Graph {
        match self {
            OnDelete::None => graph,
            // The target may already be gone if another cascade reached it first.
            OnDelete::Cascade => graph.remove(edge.to.as_str()),
        }
    }
}

/// Traversal direction relative to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(alias = "out")]
    Out,
    #[serde(alias = "in")]
    In,
    #[serde(alias = "both")]
    Both,
}

/// A directed, named edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub name: EdgeName,
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub on_delete: OnDelete,
}

impl Edge {
    pub fn new(name: impl Into<EdgeName>, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Edge {
            name: name.into(),
            from: from.into(),
            to: to.into(),
            on_delete: OnDelete::None,
        }
    }

    /// Same (name, from, to) triple
    pub fn same_triple(&self, other: &EdgeConfig) -> bool {
        self.name == other.name && self.from == other.from && self.to == other.to
    }

    /// Whether this edge touches `node` in the given direction
    pub fn touches(&self, node: &str, direction: Direction) -> bool {
        match direction {
            Direction::Out => self.from == *node,
            Direction::In => self.to == *node,
            Direction::Both => self.from == *node || self.to == *node,
        }
    }
}

/// Arguments to [`Graph::connect`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConfig {
    pub name: EdgeName,
    pub from: NodeId,
    pub to: NodeId,
    /// Has-one: drop every other `(name, from)` edge first
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default)]
    pub on_delete: OnDelete,
}

impl EdgeConfig {
    pub fn new(name: impl Into<EdgeName>, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        EdgeConfig {
            name: name.into(),
            from: from.into(),
            to: to.into(),
            exclusive: false,
            on_delete: OnDelete::None,
        }
    }

    pub fn exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn on_delete(mut self, on_delete: OnDelete) -> Self {
        self.on_delete = on_delete;
        self
    }

    pub fn validate(&self) -> GraphResult<()> {
        if self.name.is_empty() {
            return Err(GraphError::MissingEdgeField("name"));
        }
        if self.from.is_empty() {
            return Err(GraphError::MissingEdgeField("from"));
        }
        if self.to.is_empty() {
            return Err(GraphError::MissingEdgeField("to"));
        }
        Ok(())
    }

    pub(crate) fn into_edge(self) -> Edge {
        Edge {
            name: self.name,
            from: self.from,
            to: self.to,
            on_delete: self.on_delete,
        }
    }
}

/// Edge filter; every `None` is a wildcard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeMatch {
    #[serde(default)]
    pub name: Option<EdgeName>,
    #[serde(default)]
    pub from: Option<NodeId>,
    #[serde(default)]
    pub to: Option<NodeId>,
}

impl EdgeMatch {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<EdgeName>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn from(mut self, from: impl Into<NodeId>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn to(mut self, to: impl Into<NodeId>) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Empty strings are treated the same as absent filters.
    pub fn matches(&self, edge: &Edge) -> bool {
        fn field_ok<T: PartialEq + AsRef<str>>(want: &Option<T>, have: &T) -> bool {
            match want {
                Some(w) if !w.as_ref().is_empty() => w == have,
                _ => true,
            }
        }
        field_ok(&self.name, &edge.name) && field_ok(&self.from, &edge.from) && field_ok(&self.to, &edge.to)
    }
}

/// An edge resolved against the graph it was read from
#[derive(Debug, Clone, Copy)]
pub struct EdgeRef<'g> {
    graph: &'g Graph,
    edge: &'g Arc<Edge>,
    inbound: bool,
}

impl<'g> EdgeRef<'g> {
    pub(crate) fn new(graph: &'g Graph, edge: &'g Arc<Edge>, inbound: bool) -> Self {
        EdgeRef { graph, edge, inbound }
    }

    pub fn from_node(&self) -> Option<NodeRef<'g>> {
        self.graph.get(self.edge.from.as_str())
    }

    pub fn to_node(&self) -> Option<NodeRef<'g>> {
        self.graph.get(self.edge.to.as_str())
    }

    /// The node at the far end relative to how this edge was reached
    pub fn node(&self) -> Option<NodeRef<'g>> {
        if self.inbound {
            self.from_node()
        } else {
            self.to_node()
        }
    }

    pub fn shared(&self) -> Arc<Edge> {
        Arc::clone(self.edge)
    }
}

impl Deref for EdgeRef<'_> {
    type Target = Edge;

    fn deref(&self) -> &Edge {
        self.edge
    }
}
