//! Scratch graph that mutations are executed against
//!
//! Commit, rebase and replay all build one of these, run mutations through the
//! executor in order and adopt the graph it ends with.

use crate::graph::Graph;
use crate::ops::{Executor, Mutation, MutationOutcome, OpResult};

pub(crate) struct Workspace {
    graph: Graph,
}

impl Workspace {
    pub(crate) fn new(graph: Graph) -> Self {
        Self { graph }
    }

    /// Run one mutation. Returns the outcome and whether the graph changed.
    ///
    /// On error the workspace keeps its previous graph.
    pub(crate) fn exec(&mut self, mutation: &Mutation) -> OpResult<(MutationOutcome, bool)> {
        let (next, outcome) = Executor::new(&self.graph).apply(mutation)?;
        let changed = !next.is_same(&self.graph);
        self.graph = next;
        Ok((outcome, changed))
    }

    pub(crate) fn into_graph(self) -> Graph {
        self.graph
    }
}
