//! Authoritative store
//!
//! A [`Store`] owns the authoritative graph, the durable mutation log and the
//! set of live [`Connection`]s. Commits are serialized by a single read/write
//! lock; after a successful commit every live connection is rebased onto the
//! new graph and its callbacks are fired once the lock is released.

pub mod connection;
mod workspace;

pub use connection::{ChangeCallback, Conflict, ConflictCallback, Connection};

use crate::config::StoreConfig;
use crate::graph::Graph;
use crate::ops::OpError;
use crate::persistence::{Claims, MutationRecord, Wal, WalError};
use chrono::{DateTime, Utc};
use connection::ConnectionShared;
use indexmap::IndexMap;
use parking_lot::{ReentrantMutex, RwLock};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;
use workspace::Workspace;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// A mutation of the batch failed against the authoritative graph
    #[error("commit rejected at mutation {index}: {source}")]
    CommitRejected {
        index: usize,
        #[source]
        source: OpError,
    },

    /// Durable log error
    #[error("Log error: {0}")]
    Log(#[from] WalError),

    /// A logged mutation no longer applies on replay
    #[error("replay failed at sequence {sequence}: {source}")]
    Replay {
        sequence: u64,
        #[source]
        source: OpError,
    },

    #[error("store is closed")]
    Closed,
}

pub type StoreResult<T> = Result<T, StoreError>;

pub(crate) struct StoreInner {
    config: StoreConfig,
    state: RwLock<StoreState>,
    /// Held for the whole of a commit and its notifications so that callbacks
    /// observe commits in log order. Re-entrant: a callback may commit.
    notify: ReentrantMutex<()>,
}

struct StoreState {
    graph: Graph,
    /// Also the in-memory history: every committed record, in log order
    wal: Wal,
    connections: IndexMap<Uuid, Arc<ConnectionShared>>,
    closed: bool,
}

/// Shared handle to an open store
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Open a store backed by the log at `path`, replaying every record in it
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        let mut wal = Wal::open(path)?;
        wal.set_sync_mode(config.sync_on_commit);
        Self::from_wal(wal, config)
    }

    /// A store whose log lives only in memory
    pub fn in_memory(config: StoreConfig) -> Self {
        let inner = StoreInner {
            config,
            state: RwLock::new(StoreState {
                graph: Graph::new(),
                wal: Wal::in_memory(),
                connections: IndexMap::new(),
                closed: false,
            }),
            notify: ReentrantMutex::new(()),
        };
        Self { inner: Arc::new(inner) }
    }

    fn from_wal(wal: Wal, config: StoreConfig) -> StoreResult<Self> {
        let mut graph = Graph::new();
        let last = wal.replay(|sequence, record| {
            let mut ws = Workspace::new(graph.clone());
            ws.exec(&record.mutation)
                .map_err(|source| StoreError::Replay { sequence, source })?;
            graph = ws.into_graph();
            Ok::<_, StoreError>(())
        })?;

        info!(
            "Store opened: {} records replayed, {} nodes, {} edges",
            last,
            graph.node_count(),
            graph.edge_count()
        );

        let inner = StoreInner {
            config,
            state: RwLock::new(StoreState {
                graph,
                wal,
                connections: IndexMap::new(),
                closed: false,
            }),
            notify: ReentrantMutex::new(()),
        };
        Ok(Self { inner: Arc::new(inner) })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Current authoritative graph
    pub fn graph(&self) -> Graph {
        self.inner.state.read().graph.clone()
    }

    /// Register a new connection seeded with the current authoritative graph
    pub fn new_connection(&self, claims: Claims) -> StoreResult<Connection> {
        let mut state = self.inner.state.write();
        if state.closed {
            return Err(StoreError::Closed);
        }
        let shared = Arc::new(ConnectionShared::new(claims, state.graph.clone()));
        state.connections.insert(shared.id(), shared.clone());
        debug!("Connection {} registered ({} live)", shared.id(), state.connections.len());
        Ok(Connection::new(self.clone(), shared))
    }

    pub fn connection_count(&self) -> usize {
        self.inner.state.read().connections.len()
    }

    /// Apply a batch of records to the authoritative graph, all or nothing.
    ///
    /// Every live connection is rebased onto the resulting graph.
    pub fn commit(&self, batch: &[MutationRecord]) -> StoreResult<Graph> {
        self.commit_from(None, batch)
    }

    /// Committed records in log order with `after < timestamp < before`
    pub fn history(
        &self,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Vec<MutationRecord> {
        self.inner
            .state
            .read()
            .wal
            .records()
            .iter()
            .filter(|r| r.within(after, before))
            .cloned()
            .collect()
    }

    /// The newest `first` committed records, newest first
    pub fn recent_history(&self, first: usize) -> Vec<MutationRecord> {
        self.inner.state.read().wal.records().iter().rev().take(first).cloned().collect()
    }

    /// Flush the log and drop every live connection from the store.
    ///
    /// Further commits and new connections fail with [`StoreError::Closed`].
    pub fn close(&self) -> StoreResult<()> {
        let mut state = self.inner.state.write();
        if state.closed {
            return Ok(());
        }
        state.closed = true;
        state.wal.flush()?;
        state.connections.clear();
        info!("Store closed at sequence {}", state.wal.sequence());
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.read().closed
    }

    pub(crate) fn notify_guard(&self) -> parking_lot::ReentrantMutexGuard<'_, ()> {
        self.inner.notify.lock()
    }

    pub(crate) fn deregister(&self, id: &Uuid) {
        let mut state = self.inner.state.write();
        if state.connections.shift_remove(id).is_some() {
            debug!("Connection {} closed ({} live)", id, state.connections.len());
        }
    }

    /// Commit on behalf of `origin`, given as its id and the last pending
    /// sequence it submitted.
    ///
    /// The origin forgets the submitted entries under the store lock, so a
    /// callback that commits again never sees them as still pending.
    pub(crate) fn commit_from(
        &self,
        origin: Option<(Uuid, u64)>,
        batch: &[MutationRecord],
    ) -> StoreResult<Graph> {
        let _order = self.inner.notify.lock();
        let notify_self = self.inner.config.notify_self_on_commit;

        let (graph, fanout) = {
            let mut state = self.inner.state.write();
            if state.closed {
                return Err(StoreError::Closed);
            }
            if batch.is_empty() {
                return Ok(state.graph.clone());
            }

            let mut ws = Workspace::new(state.graph.clone());
            for (index, record) in batch.iter().enumerate() {
                ws.exec(&record.mutation)
                    .map_err(|source| StoreError::CommitRejected { index, source })?;
            }

            let sequence = state.wal.append_batch(batch)?;
            let graph = ws.into_graph();
            state.graph = graph.clone();
            debug!("Committed {} mutations, log sequence {}", batch.len(), sequence);

            let fanout: Vec<_> = state
                .connections
                .values()
                .map(|c| match origin {
                    Some((id, submitted)) if id == c.id() => {
                        let (working, conflicts) = c.rebase(&graph, submitted);
                        (c.clone(), working, conflicts, notify_self)
                    }
                    _ => {
                        let (working, conflicts) = c.rebase(&graph, 0);
                        (c.clone(), working, conflicts, true)
                    }
                })
                .collect();
            (graph, fanout)
        };

        for (conn, working, conflicts, notify) in fanout {
            for conflict in &conflicts {
                conn.fire_conflict(conflict);
            }
            if notify {
                conn.fire_change(&working);
            }
        }

        Ok(graph)
    }
}
