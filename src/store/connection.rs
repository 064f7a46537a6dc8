//! Connection: a private working graph plus a log of pending mutations

use super::workspace::Workspace;
use super::{Store, StoreResult};
use crate::graph::Graph;
use crate::ops::{Executor, Mutation, MutationOutcome, OpError, OpResult, Query, QueryResult};
use crate::persistence::{Claims, MutationRecord};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Fired with the connection's new working graph after a commit reaches it
pub type ChangeCallback = Arc<dyn Fn(&Graph) + Send + Sync>;

/// Fired once per pending mutation dropped during a rebase
pub type ConflictCallback = Arc<dyn Fn(&Conflict) + Send + Sync>;

/// A pending mutation that no longer applies after a rebase
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub mutation: MutationRecord,
    pub error: OpError,
}

struct Pending {
    /// Local order, used to tell submitted entries from ones queued later
    seq: u64,
    record: MutationRecord,
}

struct ConnState {
    graph: Graph,
    pending: Vec<Pending>,
    next_seq: u64,
}

/// The part of a connection the store keeps in its live set
pub(crate) struct ConnectionShared {
    id: Uuid,
    claims: Claims,
    state: Mutex<ConnState>,
    on_change: RwLock<Option<ChangeCallback>>,
    on_conflict: RwLock<Option<ConflictCallback>>,
}

impl ConnectionShared {
    pub(crate) fn new(claims: Claims, graph: Graph) -> Self {
        Self {
            id: Uuid::new_v4(),
            claims,
            state: Mutex::new(ConnState {
                graph,
                pending: Vec::new(),
                next_seq: 0,
            }),
            on_change: RwLock::new(None),
            on_conflict: RwLock::new(None),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    /// Move onto `graph` and replay what is still pending, one entry at a time.
    ///
    /// Entries up to `submitted` are already part of `graph` and are forgotten.
    /// Later entries that fail are dropped and returned as conflicts; the rest
    /// stay queued with their effect folded into the new working graph.
    pub(crate) fn rebase(&self, graph: &Graph, submitted: u64) -> (Graph, Vec<Conflict>) {
        let mut state = self.state.lock();
        self.replay_pending(&mut state, graph, submitted)
    }

    fn replay_pending(
        &self,
        state: &mut ConnState,
        graph: &Graph,
        submitted: u64,
    ) -> (Graph, Vec<Conflict>) {
        let mut ws = Workspace::new(graph.clone());
        let mut conflicts = Vec::new();
        let mut kept = Vec::with_capacity(state.pending.len());

        for entry in state.pending.drain(..).filter(|p| p.seq > submitted) {
            match ws.exec(&entry.record.mutation) {
                Ok(_) => kept.push(entry),
                Err(error) => {
                    warn!(
                        "Connection {}: dropping pending {} on rebase: {}",
                        self.id,
                        entry.record.mutation.name(),
                        error
                    );
                    conflicts.push(Conflict {
                        mutation: entry.record,
                        error,
                    });
                }
            }
        }

        state.pending = kept;
        state.graph = ws.into_graph();
        (state.graph.clone(), conflicts)
    }

    pub(crate) fn fire_change(&self, graph: &Graph) {
        let callback = self.on_change.read().clone();
        if let Some(f) = callback {
            f(graph);
        }
    }

    pub(crate) fn fire_conflict(&self, conflict: &Conflict) {
        let callback = self.on_conflict.read().clone();
        if let Some(f) = callback {
            f(conflict);
        }
    }
}

/// A session against a [`Store`]
///
/// Reads and writes go to a private working graph; [`commit`](Self::commit)
/// submits the pending mutations to the store. Dropping the connection removes
/// it from the store's live set.
pub struct Connection {
    store: Store,
    shared: Arc<ConnectionShared>,
}

impl Connection {
    pub(crate) fn new(store: Store, shared: Arc<ConnectionShared>) -> Self {
        Self { store, shared }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn claims(&self) -> &Claims {
        &self.shared.claims
    }

    /// Current working graph
    pub fn snapshot(&self) -> Graph {
        self.shared.state.lock().graph.clone()
    }

    /// Mutations executed but not yet committed, in execution order
    pub fn pending(&self) -> Vec<MutationRecord> {
        self.shared
            .state
            .lock()
            .pending
            .iter()
            .map(|p| p.record.clone())
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.shared.state.lock().pending.is_empty()
    }

    /// Run a read-only query against the working graph
    pub fn query(&self, query: &Query) -> OpResult<QueryResult> {
        if let Query::Mutations { after, before, first } = query {
            let first = first.unwrap_or(self.store.config().history_page_size);
            let mut records = self.store.history(*after, *before);
            records.reverse();
            records.truncate(first);
            return Ok(QueryResult::Mutations(records));
        }
        let graph = self.snapshot();
        Executor::new(&graph).query(query)
    }

    /// Execute a mutation against the working graph.
    ///
    /// On success the mutation is queued for the next commit, unless it left
    /// the graph unchanged. On error nothing changes.
    pub fn exec(&self, mutation: Mutation) -> OpResult<MutationOutcome> {
        let mut state = self.shared.state.lock();
        let mut ws = Workspace::new(state.graph.clone());
        let (outcome, changed) = ws.exec(&mutation)?;
        debug!("Connection {}: exec {} (changed: {})", self.shared.id, mutation.name(), changed);
        if changed {
            state.graph = ws.into_graph();
            let seq = state.next_seq + 1;
            state.next_seq = seq;
            state.pending.push(Pending {
                seq,
                record: MutationRecord::new(self.shared.claims.clone(), mutation),
            });
        }
        Ok(outcome)
    }

    /// Bind `op` and `params` and execute the result
    pub fn exec_op(&self, op: &str, params: Value) -> OpResult<MutationOutcome> {
        self.exec(Mutation::bind(op, params)?)
    }

    /// Submit every pending mutation to the store as one batch.
    ///
    /// On failure the pending log is kept for retry or inspection.
    pub fn commit(&self) -> StoreResult<()> {
        let _order = self.store.notify_guard();

        let (batch, submitted) = {
            let state = self.shared.state.lock();
            let Some(last) = state.pending.last() else {
                return Ok(());
            };
            let batch: Vec<_> = state.pending.iter().map(|p| p.record.clone()).collect();
            (batch, last.seq)
        };

        self.store.commit_from(Some((self.shared.id, submitted)), &batch)?;
        debug!("Connection {}: committed {} mutations", self.shared.id, batch.len());
        Ok(())
    }

    /// Install the on-change callback, replacing any previous one
    pub fn on_change<F>(&self, f: F)
    where
        F: Fn(&Graph) + Send + Sync + 'static,
    {
        *self.shared.on_change.write() = Some(Arc::new(f));
    }

    /// Install the on-conflict callback, replacing any previous one
    pub fn on_conflict<F>(&self, f: F)
    where
        F: Fn(&Conflict) + Send + Sync + 'static,
    {
        *self.shared.on_conflict.write() = Some(Arc::new(f));
    }

    /// Deregister from the store
    pub fn close(self) {}
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.store.deregister(&self.shared.id);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("claims", &self.shared.claims)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::graph::{EdgeConfig, EdgeMatch, Field, Type, ValueKind};
    use crate::ops::SetNode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store_with_users() -> Store {
        let store = Store::in_memory(StoreConfig::default());
        let admin = store.new_connection(Claims::user("root", "admin")).unwrap();
        admin
            .exec(
                Type::new("user", "User")
                    .with_field(Field::scalar("name", ValueKind::Text))
                    .into(),
            )
            .unwrap();
        for id in ["alice", "bob", "jeff"] {
            admin.exec(SetNode::new(id, "User").into()).unwrap();
        }
        admin.commit().unwrap();
        store
    }

    #[test]
    fn test_exec_is_private_until_commit() {
        let store = store_with_users();
        let x = store.new_connection(Claims::user("x", "user")).unwrap();
        let y = store.new_connection(Claims::user("y", "user")).unwrap();

        x.exec(EdgeConfig::new("friend", "alice", "bob").into()).unwrap();
        assert_eq!(x.snapshot().edge_count(), 1);
        assert_eq!(y.snapshot().edge_count(), 0);
        assert_eq!(store.graph().edge_count(), 0);

        x.commit().unwrap();
        assert!(!x.has_pending());
        assert_eq!(store.graph().edge_count(), 1);
        assert_eq!(y.snapshot().edge_count(), 1);
    }

    #[test]
    fn test_failed_exec_changes_nothing() {
        let store = store_with_users();
        let x = store.new_connection(Claims::new()).unwrap();
        let before = x.snapshot();
        assert!(x.exec(EdgeConfig::new("friend", "alice", "ghost").into()).is_err());
        assert!(x.snapshot().is_same(&before));
        assert!(x.pending().is_empty());
    }

    #[test]
    fn test_no_op_exec_is_not_queued() {
        let store = store_with_users();
        let x = store.new_connection(Claims::new()).unwrap();
        x.exec(EdgeMatch::any().name("friend").into()).unwrap();
        assert!(x.pending().is_empty());
    }

    #[test]
    fn test_empty_commit_is_noop() {
        let store = store_with_users();
        let x = store.new_connection(Claims::new()).unwrap();
        let changes = Arc::new(AtomicUsize::new(0));
        let c = changes.clone();
        x.on_change(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        x.commit().unwrap();
        assert_eq!(changes.load(Ordering::SeqCst), 0);
        assert_eq!(store.history(None, None).len(), 4);
    }

    #[test]
    fn test_rebase_keeps_applicable_pending() {
        let store = store_with_users();
        let x = store.new_connection(Claims::user("x", "user")).unwrap();
        let y = store.new_connection(Claims::user("y", "user")).unwrap();

        x.exec(EdgeConfig::new("friend", "alice", "bob").into()).unwrap();
        y.exec(SetNode::new("carol", "User").into()).unwrap();
        y.commit().unwrap();

        // x now sees carol and still has its own edge queued
        let g = x.snapshot();
        assert!(g.contains("carol"));
        assert_eq!(g.edge_count(), 1);
        assert_eq!(x.pending().len(), 1);
    }

    #[test]
    fn test_commit_failure_keeps_pending() {
        let store = store_with_users();
        let x = store.new_connection(Claims::new()).unwrap();
        x.exec(EdgeConfig::new("friend", "alice", "jeff").into()).unwrap();
        store.close().unwrap();
        assert!(x.commit().is_err());
        assert_eq!(x.pending().len(), 1);
    }

    #[test]
    fn test_exec_op_binds_params() {
        let store = store_with_users();
        let x = store.new_connection(Claims::new()).unwrap();
        x.exec_op("connect", json!({"name": "friend", "from": "bob", "to": "jeff"}))
            .unwrap();
        assert!(matches!(
            x.exec_op("explode", json!({})),
            Err(OpError::InvalidParams { .. })
        ));
        assert_eq!(x.pending().len(), 1);
    }

    #[test]
    fn test_mutations_query_newest_first() {
        let store = store_with_users();
        let x = store.new_connection(Claims::new()).unwrap();
        let records = x
            .query(&Query::Mutations { after: None, before: None, first: Some(2) })
            .unwrap()
            .into_mutations();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].mutation, Mutation::from(SetNode::new("jeff", "User")));
        assert_eq!(records[1].mutation, Mutation::from(SetNode::new("bob", "User")));

        let all = x
            .query(&Query::Mutations { after: None, before: None, first: None })
            .unwrap()
            .into_mutations();
        assert_eq!(all.len(), 4);
    }
}
