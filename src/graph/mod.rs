//! Persistent graph data model
//!
//! This module implements the immutable graph value with:
//! - Nodes with caller-assigned ids, a type reference and ordered attributes
//! - Named directed edges with has-one / has-many connect semantics
//! - Delete hooks carried as data (cascade removes an edge's target)
//! - A type registry describing node shapes

pub mod attr;
pub mod edge;
pub mod node;
pub mod schema;
pub mod snapshot;
pub mod types;

// Re-export main types
pub use attr::{Attr, Encoding};
pub use edge::{Direction, Edge, EdgeConfig, EdgeMatch, EdgeRef, OnDelete};
pub use node::{Node, NodeConfig, NodeRef};
pub use schema::{Cardinality, Field, Type, ValueKind};
pub use snapshot::{Graph, GraphError, GraphResult};
pub use types::{EdgeName, NodeId, TypeId};
