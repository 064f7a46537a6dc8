//! Grapht
//!
//! An embeddable, schema-flexible graph store. State lives in an immutable
//! [`Graph`] value that every write replaces; sessions ([`Connection`]s) work
//! against private snapshots and submit their pending mutations to the
//! [`Store`], which applies them all-or-nothing, appends them to a durable log
//! and rebases every other live session onto the result.
//!
//! # Layout
//!
//! - [`graph`]: persistent graph, node/edge model, type registry
//! - [`ops`]: typed mutation/query descriptors and the validating executor
//! - [`persistence`]: mutation records and the durable log
//! - [`store`]: store, connections, commit and rebase
//!
//! ## Example Usage
//!
//! ```rust
//! use grapht::graph::{EdgeConfig, Field, Type, ValueKind};
//! use grapht::ops::{Query, SetNode};
//! use grapht::{Claims, Store, StoreConfig};
//!
//! let store = Store::in_memory(StoreConfig::default());
//! let conn = store.new_connection(Claims::user("alice", "admin")).unwrap();
//!
//! // Define a type, add two nodes and connect them
//! let person = Type::new("person", "Person").with_field(Field::scalar("name", ValueKind::Text));
//! conn.exec(person.into()).unwrap();
//! conn.exec(SetNode::new("a", "Person").into()).unwrap();
//! conn.exec(SetNode::new("b", "Person").into()).unwrap();
//! conn.exec(EdgeConfig::new("knows", "a", "b").into()).unwrap();
//!
//! // Nothing is visible to the store until commit
//! assert_eq!(store.graph().node_count(), 0);
//! conn.commit().unwrap();
//! assert_eq!(store.graph().node_count(), 2);
//!
//! let knows = conn.query(&Query::out_edges("a", &["knows"])).unwrap().into_edges();
//! assert_eq!(knows.len(), 1);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod graph;
pub mod ops;
pub mod persistence;
pub mod store;

// Re-export main types for convenience
pub use config::StoreConfig;

pub use graph::{
    Attr, Direction, Edge, EdgeConfig, EdgeMatch, Graph, GraphError, GraphResult, Node,
    NodeConfig, NodeId, OnDelete, Type, TypeId,
};

pub use ops::{Executor, Mutation, MutationOutcome, OpError, OpResult, Query, QueryResult};

pub use persistence::{Claims, MutationRecord, Wal, WalError, WalResult};

pub use store::{Conflict, Connection, Store, StoreError, StoreResult};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
