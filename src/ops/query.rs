//! Read-only query descriptors

use crate::graph::{Direction, Edge, EdgeMatch, EdgeName, Node, NodeId, Type};
use crate::persistence::MutationRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A read-only operation against a graph snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "query", content = "params", rename_all = "snake_case")]
pub enum Query {
    Node {
        id: NodeId,
    },
    /// Nodes of the named types (all nodes when empty)
    Nodes {
        #[serde(default)]
        types: Vec<String>,
    },
    Edges(EdgeMatch),
    NodeEdges {
        id: NodeId,
        #[serde(default)]
        names: Vec<EdgeName>,
        #[serde(default)]
        direction: Direction,
    },
    Type {
        name: String,
    },
    Types,
    /// Committed history, newest first
    Mutations {
        #[serde(default)]
        after: Option<DateTime<Utc>>,
        #[serde(default)]
        before: Option<DateTime<Utc>>,
        #[serde(default)]
        first: Option<usize>,
    },
}

impl Query {
    pub fn node(id: impl Into<NodeId>) -> Self {
        Query::Node { id: id.into() }
    }

    pub fn out_edges(id: impl Into<NodeId>, names: &[&str]) -> Self {
        Query::NodeEdges {
            id: id.into(),
            names: names.iter().map(|n| EdgeName::new(*n)).collect(),
            direction: Direction::Out,
        }
    }
}

/// Owned result of a [`Query`]
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Node(Option<Node>),
    Nodes(Vec<Node>),
    Edges(Vec<Edge>),
    Type(Option<Type>),
    Types(Vec<Type>),
    Mutations(Vec<MutationRecord>),
}

impl QueryResult {
    pub fn into_node(self) -> Option<Node> {
        match self {
            QueryResult::Node(n) => n,
            _ => None,
        }
    }

    pub fn into_nodes(self) -> Vec<Node> {
        match self {
            QueryResult::Nodes(ns) => ns,
            QueryResult::Node(n) => n.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    pub fn into_edges(self) -> Vec<Edge> {
        match self {
            QueryResult::Edges(es) => es,
            _ => Vec::new(),
        }
    }

    pub fn into_mutations(self) -> Vec<MutationRecord> {
        match self {
            QueryResult::Mutations(ms) => ms,
            _ => Vec::new(),
        }
    }
}
