//! Operation descriptors and their executor
//!
//! Front ends hand the store typed descriptors instead of query text:
//! [`Mutation`] for writes and [`Query`] for reads. The [`Executor`] validates
//! them against the type registry of a graph snapshot and applies them.

pub mod executor;
pub mod mutation;
pub mod query;
pub mod validate;

pub use executor::{Executor, OpError, OpResult};
pub use mutation::{Mutation, MutationOutcome, MutationParams, RemoveNode, SetNode};
pub use query::{Query, QueryResult};
pub use validate::{is_ident, is_reserved};
