//! Mutation descriptors
//!
//! A [`Mutation`] is the fully bound form of a state-changing operation. It is
//! what connections queue, what the store re-executes on commit and what the
//! durable log persists.

use super::executor::{OpError, OpResult};
use crate::graph::{Attr, Edge, EdgeConfig, EdgeMatch, Node, NodeId, Type, TypeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters of `set_node`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetNode {
    pub id: NodeId,
    /// Type resolved by name (takes precedence over `type_id`)
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub type_id: Option<TypeId>,
    #[serde(default)]
    pub attrs: Vec<Attr>,
    #[serde(default)]
    pub merge: bool,
}

impl SetNode {
    pub fn new(id: impl Into<NodeId>, type_name: impl Into<String>) -> Self {
        SetNode {
            id: id.into(),
            type_name: Some(type_name.into()),
            ..Default::default()
        }
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

/// Parameters of `remove_node`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveNode {
    pub id: NodeId,
}

/// A state-changing operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "params", rename_all = "snake_case")]
pub enum Mutation {
    DefineType(Type),
    SetNode(SetNode),
    RemoveNode(RemoveNode),
    Connect(EdgeConfig),
    Disconnect(EdgeMatch),
}

/// Borrowed view of a mutation's parameters, serialized without the tag
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MutationParams<'a> {
    DefineType(&'a Type),
    SetNode(&'a SetNode),
    RemoveNode(&'a RemoveNode),
    Connect(&'a EdgeConfig),
    Disconnect(&'a EdgeMatch),
}

impl Mutation {
    /// Build a mutation from an operation name and its JSON parameters.
    pub fn bind(op: &str, params: Value) -> OpResult<Mutation> {
        let tagged = serde_json::json!({ "op": op, "params": params });
        serde_json::from_value(tagged).map_err(|e| OpError::InvalidParams {
            op: op.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn remove_node(id: impl Into<NodeId>) -> Self {
        Mutation::RemoveNode(RemoveNode { id: id.into() })
    }

    /// Operation name as it appears in the log
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::DefineType(_) => "define_type",
            Mutation::SetNode(_) => "set_node",
            Mutation::RemoveNode(_) => "remove_node",
            Mutation::Connect(_) => "connect",
            Mutation::Disconnect(_) => "disconnect",
        }
    }

    pub fn params(&self) -> MutationParams<'_> {
        match self {
            Mutation::DefineType(t) => MutationParams::DefineType(t),
            Mutation::SetNode(p) => MutationParams::SetNode(p),
            Mutation::RemoveNode(p) => MutationParams::RemoveNode(p),
            Mutation::Connect(p) => MutationParams::Connect(p),
            Mutation::Disconnect(p) => MutationParams::Disconnect(p),
        }
    }
}

impl From<Type> for Mutation {
    fn from(t: Type) -> Self {
        Mutation::DefineType(t)
    }
}

impl From<SetNode> for Mutation {
    fn from(p: SetNode) -> Self {
        Mutation::SetNode(p)
    }
}

impl From<EdgeConfig> for Mutation {
    fn from(p: EdgeConfig) -> Self {
        Mutation::Connect(p)
    }
}

impl From<EdgeMatch> for Mutation {
    fn from(p: EdgeMatch) -> Self {
        Mutation::Disconnect(p)
    }
}

/// What a successful mutation produced
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    TypeDefined(Type),
    NodeSet(Node),
    NodeRemoved(Node),
    Connected(Edge),
    Disconnected(Vec<Edge>),
}
