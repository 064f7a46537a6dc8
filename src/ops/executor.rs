//! Validating executor for mutations and queries
//!
//! Applies a descriptor to a graph snapshot and returns the resulting snapshot.
//! All schema-level rules (identifier syntax, known types and fields, value
//! shapes, has-one inference from type definitions) are enforced here; the
//! graph itself only checks structural preconditions.

use super::mutation::{Mutation, MutationOutcome, RemoveNode, SetNode};
use super::query::{Query, QueryResult};
use super::validate::{is_ident, is_reserved};
use crate::graph::{
    Attr, Cardinality, Direction, Edge, EdgeConfig, EdgeMatch, Encoding, Field, Graph, GraphError,
    Node, NodeConfig, NodeId, Type, TypeId, ValueKind,
};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Validation errors raised while executing an operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("'{ident}' is not a valid {what}")]
    InvalidIdent { ident: String, what: &'static str },

    #[error("'{0}' is a reserved word and cannot be used as a field name")]
    Reserved(String),

    #[error("type '{type_name}' defines field '{field}' more than once")]
    DuplicateField { type_name: String, field: String },

    #[error("type name '{name}' is already used by type '{existing}'")]
    TypeNameTaken { name: String, existing: TypeId },

    #[error("field '{0}': only Edge fields may (and must) declare HasOne or HasMany")]
    CardinalityMismatch(String),

    #[error("edge field '{0}' requires an edge name")]
    MissingEdgeName(String),

    #[error("edge field '{0}' must point In or Out")]
    InvalidDirection(String),

    #[error("type '{0}' is not defined")]
    UnknownType(String),

    #[error("type or type_id is required")]
    MissingType,

    #[error("cannot merge node '{0}': no existing typed node and no type given")]
    MergeWithoutType(NodeId),

    #[error("cannot set field: type '{type_name}' does not define a field called '{field}'")]
    UnknownField { type_name: String, field: String },

    #[error("cannot set field '{0}': edge fields are set with connect")]
    EdgeFieldAsAttr(String),

    #[error("field '{field}' expects {kind}, got '{value}'")]
    InvalidValue { field: String, kind: ValueKind, value: String },

    #[error("field '{field}' is required by type '{type_name}'")]
    MissingRequired { type_name: String, field: String },

    #[error("node '{0}' already removed")]
    AlreadyRemoved(NodeId),

    #[error("edge '{edge}' requires a target of type '{expected}', but '{node}' is not")]
    TargetTypeMismatch { edge: String, node: NodeId, expected: TypeId },

    #[error("invalid params for '{op}': {reason}")]
    InvalidParams { op: String, reason: String },

    #[error("'{0}' cannot be answered from a graph snapshot")]
    Unsupported(&'static str),
}

pub type OpResult<T> = Result<T, OpError>;

/// Executes operation descriptors against one graph snapshot
pub struct Executor<'g> {
    graph: &'g Graph,
}

impl<'g> Executor<'g> {
    pub fn new(graph: &'g Graph) -> Self {
        Self { graph }
    }

    /// Apply a mutation, returning the new graph and what was produced.
    ///
    /// The input graph is never modified; on error nothing changes.
    pub fn apply(&self, mutation: &Mutation) -> OpResult<(Graph, MutationOutcome)> {
        debug!("Applying mutation: {}", mutation.name());
        match mutation {
            Mutation::DefineType(t) => self.define_type(t),
            Mutation::SetNode(p) => self.set_node(p),
            Mutation::RemoveNode(p) => self.remove_node(p),
            Mutation::Connect(cfg) => self.connect(cfg),
            Mutation::Disconnect(m) => self.disconnect(m),
        }
    }

    /// Answer a read-only query
    pub fn query(&self, query: &Query) -> OpResult<QueryResult> {
        let g = self.graph;
        let result = match query {
            Query::Node { id } => QueryResult::Node(g.get(id.as_str()).map(|n| Node::clone(&n))),
            Query::Nodes { types } => {
                let ids = types
                    .iter()
                    .map(|name| {
                        g.type_by_name(name)
                            .map(|t| t.id.clone())
                            .ok_or_else(|| OpError::UnknownType(name.clone()))
                    })
                    .collect::<OpResult<Vec<_>>>()?;
                QueryResult::Nodes(g.nodes_of_type(&ids).iter().map(|n| Node::clone(n)).collect())
            }
            Query::Edges(m) => QueryResult::Edges(g.edges(m).iter().map(|e| Edge::clone(e)).collect()),
            Query::NodeEdges { id, names, direction } => {
                let names: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
                QueryResult::Edges(
                    g.node_edges(id.as_str(), &names, *direction)
                        .iter()
                        .map(|e| Edge::clone(e))
                        .collect(),
                )
            }
            Query::Type { name } => QueryResult::Type(g.type_by_name(name).cloned()),
            Query::Types => QueryResult::Types(g.types().iter().map(|t| Type::clone(t)).collect()),
            Query::Mutations { .. } => return Err(OpError::Unsupported("mutations")),
        };
        Ok(result)
    }

    fn define_type(&self, t: &Type) -> OpResult<(Graph, MutationOutcome)> {
        if !is_ident(&t.name) {
            return Err(OpError::InvalidIdent {
                ident: t.name.clone(),
                what: "type name",
            });
        }
        if let Some(existing) = self.graph.type_by_name(&t.name) {
            if existing.id != t.id {
                return Err(OpError::TypeNameTaken {
                    name: t.name.clone(),
                    existing: existing.id.clone(),
                });
            }
        }

        let mut seen = HashSet::new();
        for field in &t.fields {
            self.check_field(t, field)?;
            if !seen.insert(field.name.as_str()) {
                return Err(OpError::DuplicateField {
                    type_name: t.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        let g = self.graph.define_type(t.clone())?;
        Ok((g, MutationOutcome::TypeDefined(t.clone())))
    }

    fn check_field(&self, owner: &Type, field: &Field) -> OpResult<()> {
        if !is_ident(&field.name) {
            return Err(OpError::InvalidIdent {
                ident: field.name.clone(),
                what: "field name",
            });
        }
        if is_reserved(&field.name) {
            return Err(OpError::Reserved(field.name.clone()));
        }
        let edge_kind = field.kind == ValueKind::Edge;
        if edge_kind == (field.cardinality == Cardinality::None) {
            return Err(OpError::CardinalityMismatch(field.name.clone()));
        }
        if !edge_kind {
            return Ok(());
        }
        match &field.edge {
            Some(name) if !name.is_empty() => {}
            _ => return Err(OpError::MissingEdgeName(field.name.clone())),
        }
        if field.direction == Some(Direction::Both) {
            return Err(OpError::InvalidDirection(field.name.clone()));
        }
        if let Some(to) = &field.to_type {
            // Self-referencing edges are allowed before the type exists.
            if to != &owner.id && self.graph.type_by_id(to).is_none() {
                return Err(OpError::UnknownType(to.to_string()));
            }
        }
        Ok(())
    }

    fn resolve_type(&self, p: &SetNode) -> OpResult<&'g Type> {
        if let Some(name) = &p.type_name {
            return self
                .graph
                .type_by_name(name)
                .ok_or_else(|| OpError::UnknownType(name.clone()));
        }
        if let Some(id) = &p.type_id {
            return self
                .graph
                .type_by_id(id)
                .ok_or_else(|| OpError::UnknownType(id.to_string()));
        }
        if p.merge {
            return self
                .graph
                .get(p.id.as_str())
                .and_then(|old| old.type_def())
                .ok_or_else(|| OpError::MergeWithoutType(p.id.clone()));
        }
        Err(OpError::MissingType)
    }

    fn set_node(&self, p: &SetNode) -> OpResult<(Graph, MutationOutcome)> {
        if p.id.is_empty() {
            return Err(GraphError::EmptyNodeId.into());
        }
        let t = self.resolve_type(p)?;
        for attr in &p.attrs {
            if !is_ident(&attr.name) {
                return Err(OpError::InvalidIdent {
                    ident: attr.name.clone(),
                    what: "attr name",
                });
            }
            let field = t.field(&attr.name).ok_or_else(|| OpError::UnknownField {
                type_name: t.name.clone(),
                field: attr.name.clone(),
            })?;
            if field.is_edge() {
                return Err(OpError::EdgeFieldAsAttr(attr.name.clone()));
            }
            check_value(field, attr)?;
        }

        let g = self.graph.set(NodeConfig {
            id: p.id.clone(),
            type_id: Some(t.id.clone()),
            attrs: p.attrs.clone(),
            merge: p.merge,
        })?;
        let node = match g.get(p.id.as_str()) {
            Some(n) => Node::clone(&n),
            None => return Err(GraphError::NodeNotFound(p.id.clone()).into()),
        };

        if let Some(missing) = t
            .fields
            .iter()
            .find(|f| f.required && !f.is_edge() && node.get_attr(&f.name).is_none())
        {
            return Err(OpError::MissingRequired {
                type_name: t.name.clone(),
                field: missing.name.clone(),
            });
        }

        Ok((g, MutationOutcome::NodeSet(node)))
    }

    fn remove_node(&self, p: &RemoveNode) -> OpResult<(Graph, MutationOutcome)> {
        let removed = match self.graph.get(p.id.as_str()) {
            Some(n) => Node::clone(&n),
            None => return Err(OpError::AlreadyRemoved(p.id.clone())),
        };
        let g = self.graph.remove(p.id.as_str());
        Ok((g, MutationOutcome::NodeRemoved(removed)))
    }

    fn connect(&self, cfg: &EdgeConfig) -> OpResult<(Graph, MutationOutcome)> {
        cfg.validate()?;
        let from = self
            .graph
            .get(cfg.from.as_str())
            .ok_or_else(|| GraphError::NodeNotFound(cfg.from.clone()))?;
        let to = self
            .graph
            .get(cfg.to.as_str())
            .ok_or_else(|| GraphError::NodeNotFound(cfg.to.clone()))?;

        let mut cfg = cfg.clone();
        let declared = from
            .type_def()
            .and_then(|t| t.edge_field(cfg.name.as_str(), Direction::Out));
        if let Some(field) = declared {
            if field.cardinality == Cardinality::HasOne {
                cfg.exclusive = true;
            }
            if let Some(expected) = &field.to_type {
                if !to.is_type(expected) {
                    return Err(OpError::TargetTypeMismatch {
                        edge: cfg.name.to_string(),
                        node: to.id.clone(),
                        expected: expected.clone(),
                    });
                }
            }
        }

        let g = self.graph.connect(cfg.clone())?;
        Ok((g, MutationOutcome::Connected(cfg.into_edge())))
    }

    fn disconnect(&self, m: &EdgeMatch) -> OpResult<(Graph, MutationOutcome)> {
        let removed: Vec<Edge> = self.graph.edges(m).iter().map(|e| Edge::clone(e)).collect();
        let g = self.graph.disconnect(m);
        Ok((g, MutationOutcome::Disconnected(removed)))
    }
}

/// Plain-text payloads of numeric and boolean fields must parse.
fn check_value(field: &Field, attr: &Attr) -> OpResult<()> {
    if attr.enc != Encoding::Utf8 || attr.value.is_empty() {
        return Ok(());
    }
    let ok = match field.kind {
        ValueKind::Int => attr.value.parse::<i64>().is_ok(),
        ValueKind::Float => attr.value.parse::<f64>().is_ok(),
        ValueKind::Boolean => matches!(attr.value.as_str(), "true" | "false"),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(OpError::InvalidValue {
            field: field.name.clone(),
            kind: field.kind,
            value: attr.value.clone(),
        })
    }
}
