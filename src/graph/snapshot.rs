//! Persistent graph value
//!
//! A [`Graph`] is immutable. Every mutating operation returns a new graph that
//! shares, by `Arc`, every collection it did not touch: setting a node rebuilds
//! the node index but reuses the edge and type lists, connecting rebuilds only
//! the edge list, and so on. Individual nodes, edges and types are themselves
//! `Arc`-shared, so rebuilding a collection copies pointers, never payloads.

use super::attr::merge_attrs;
use super::edge::{Direction, Edge, EdgeConfig, EdgeMatch, EdgeRef};
use super::node::{Node, NodeConfig, NodeRef};
use super::schema::Type;
use super::types::{NodeId, TypeId};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by graph operations whose preconditions do not hold
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node id is required")]
    EmptyNodeId,

    #[error("node '{0}' does not exist")]
    NodeNotFound(NodeId),

    #[error("invalid edge config: {0} field is required")]
    MissingEdgeField(&'static str),

    #[error("type id is required")]
    EmptyTypeId,

    #[error("type '{0}' has a field with a blank name")]
    BlankFieldName(TypeId),
}

pub type GraphResult<T> = Result<T, GraphError>;

type NodeIndex = IndexMap<NodeId, Arc<Node>, FxBuildHasher>;

/// Immutable snapshot of nodes, edges and type definitions
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Insertion-ordered node index (a replaced node moves to the end)
    nodes: Arc<NodeIndex>,

    /// Edges in creation order
    edges: Arc<Vec<Arc<Edge>>>,

    /// Type registry in definition order
    types: Arc<Vec<Arc<Type>>>,
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// True when both values are the very same snapshot (no copy was made).
    pub fn is_same(&self, other: &Graph) -> bool {
        Arc::ptr_eq(&self.nodes, &other.nodes)
            && Arc::ptr_eq(&self.edges, &other.edges)
            && Arc::ptr_eq(&self.types, &other.types)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Look a node up by id
    pub fn get(&self, id: &str) -> Option<NodeRef<'_>> {
        self.nodes.get(id).map(|n| NodeRef::new(self, n))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes in insertion order
    pub fn nodes(&self) -> Vec<NodeRef<'_>> {
        self.nodes.values().map(|n| NodeRef::new(self, n)).collect()
    }

    /// Nodes whose type id is one of `type_ids`; an empty filter returns all nodes
    pub fn nodes_of_type(&self, type_ids: &[TypeId]) -> Vec<NodeRef<'_>> {
        if type_ids.is_empty() {
            return self.nodes();
        }
        self.nodes
            .values()
            .filter(|n| n.type_id.as_ref().map(|t| type_ids.contains(t)).unwrap_or(false))
            .map(|n| NodeRef::new(self, n))
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges satisfying the filter, in creation order
    pub fn edges(&self, matcher: &EdgeMatch) -> Vec<EdgeRef<'_>> {
        self.edges
            .iter()
            .filter(|e| matcher.matches(e))
            .map(|e| EdgeRef::new(self, e, false))
            .collect()
    }

    /// Edges touching node `id` in `direction`, optionally limited to `names`
    pub fn node_edges(&self, id: &str, names: &[&str], direction: Direction) -> Vec<EdgeRef<'_>> {
        self.edges
            .iter()
            .filter(|e| e.touches(id, direction))
            .filter(|e| names.is_empty() || names.contains(&e.name.as_str()))
            .map(|e| {
                let inbound = e.to == *id && (direction == Direction::In || e.from != *id);
                EdgeRef::new(self, e, inbound)
            })
            .collect()
    }

    pub fn types(&self) -> &[Arc<Type>] {
        &self.types
    }

    pub fn type_by_id(&self, id: &TypeId) -> Option<&Type> {
        self.types.iter().find(|t| &t.id == id).map(|t| t.as_ref())
    }

    pub fn type_by_name(&self, name: &str) -> Option<&Type> {
        self.types.iter().find(|t| t.name == name).map(|t| t.as_ref())
    }

    // ------------------------------------------------------------------
    // Pure mutations
    // ------------------------------------------------------------------

    /// Insert or replace the node `cfg.id`.
    ///
    /// The replaced node moves to the end of the node order. With
    /// `cfg.merge`, attrs of the prior node that `cfg.attrs` does not name are
    /// carried over. Edges are never touched.
    pub fn set(&self, cfg: NodeConfig) -> GraphResult<Graph> {
        if cfg.id.is_empty() {
            return Err(GraphError::EmptyNodeId);
        }
        let mut nodes = NodeIndex::clone(&self.nodes);
        let old = nodes.shift_remove(cfg.id.as_str());
        let attrs = match (&old, cfg.merge) {
            (Some(old), true) => merge_attrs(&cfg.attrs, &old.attrs),
            _ => cfg.attrs,
        };
        let node = Node {
            id: cfg.id.clone(),
            type_id: cfg.type_id,
            attrs,
        };
        nodes.insert(cfg.id, Arc::new(node));
        Ok(Graph {
            nodes: Arc::new(nodes),
            edges: Arc::clone(&self.edges),
            types: Arc::clone(&self.types),
        })
    }

    /// Remove a node and every edge touching it, running delete hooks.
    ///
    /// Removing an absent node yields the same snapshot back.
    pub fn remove(&self, id: &str) -> Graph {
        if id.is_empty() {
            return self.clone();
        }
        let mut g = self.clone();
        if self.nodes.contains_key(id) {
            let mut nodes = NodeIndex::clone(&self.nodes);
            nodes.shift_remove(id);
            g.nodes = Arc::new(nodes);
        }
        let g = g.disconnect(&EdgeMatch::any().from(id));
        g.disconnect(&EdgeMatch::any().to(id))
    }

    /// Remove every edge matching `matcher`, then fold each removed edge's
    /// delete hook over the result in removal order.
    pub fn disconnect(&self, matcher: &EdgeMatch) -> Graph {
        let (removed, kept): (Vec<_>, Vec<_>) =
            self.edges.iter().cloned().partition(|e| matcher.matches(e));
        if removed.is_empty() {
            return self.clone();
        }
        let mut g = Graph {
            nodes: Arc::clone(&self.nodes),
            edges: Arc::new(kept),
            types: Arc::clone(&self.types),
        };
        for edge in removed {
            g = edge.on_delete.run(&edge, g);
        }
        g
    }

    /// Add a directed edge between two existing nodes.
    ///
    /// An edge with the identical `(name, from, to)` triple is replaced in
    /// place. With `cfg.exclusive`, every other `(name, from)` edge is dropped
    /// first and the new edge is appended.
    pub fn connect(&self, cfg: EdgeConfig) -> GraphResult<Graph> {
        cfg.validate()?;
        if !self.contains(cfg.from.as_str()) {
            return Err(GraphError::NodeNotFound(cfg.from));
        }
        if !self.contains(cfg.to.as_str()) {
            return Err(GraphError::NodeNotFound(cfg.to));
        }

        let mut edges: Vec<Arc<Edge>> = if cfg.exclusive {
            self.edges
                .iter()
                .filter(|e| !(e.name == cfg.name && e.from == cfg.from))
                .cloned()
                .collect()
        } else {
            self.edges.as_ref().clone()
        };

        match edges.iter().position(|e| e.same_triple(&cfg)) {
            Some(i) => edges[i] = Arc::new(cfg.into_edge()),
            None => edges.push(Arc::new(cfg.into_edge())),
        }

        Ok(Graph {
            nodes: Arc::clone(&self.nodes),
            edges: Arc::new(edges),
            types: Arc::clone(&self.types),
        })
    }

    /// Insert or replace the type sharing `t.id`
    pub fn define_type(&self, t: Type) -> GraphResult<Graph> {
        if t.id.is_empty() {
            return Err(GraphError::EmptyTypeId);
        }
        if t.fields.iter().any(|f| f.name.is_empty()) {
            return Err(GraphError::BlankFieldName(t.id));
        }
        let mut types: Vec<Arc<Type>> = self
            .types
            .iter()
            .filter(|existing| existing.id != t.id)
            .cloned()
            .collect();
        types.push(Arc::new(t));
        Ok(Graph {
            nodes: Arc::clone(&self.nodes),
            edges: Arc::clone(&self.edges),
            types: Arc::new(types),
        })
    }
}

/// Graphs compare by content: same nodes, edges and types in the same order.
impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        if self.is_same(other) {
            return true;
        }
        self.nodes.len() == other.nodes.len()
            && self
                .nodes
                .iter()
                .zip(other.nodes.iter())
                .all(|((ka, va), (kb, vb))| ka == kb && va == vb)
            && self.edges == other.edges
            && self.types == other.types
    }
}

impl Eq for Graph {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::attr::Attr;
    use crate::graph::edge::OnDelete;
    use crate::graph::schema::{Field, ValueKind};

    fn with_nodes(ids: &[&str]) -> Graph {
        ids.iter().fold(Graph::new(), |g, id| g.set(NodeConfig::new(*id)).unwrap())
    }

    fn out_ids(g: &Graph, id: &str) -> Vec<String> {
        g.get(id)
            .unwrap()
            .out(&[])
            .iter()
            .filter_map(|e| e.node().map(|n| n.id.to_string()))
            .collect()
    }

    #[test]
    fn test_add_node() {
        let g = Graph::new().set(NodeConfig::new("alice")).unwrap();
        assert!(g.get("alice").is_some());
    }

    #[test]
    fn test_add_node_doesnt_modify_old() {
        let g = Graph::new();
        let _ = g.set(NodeConfig::new("alice")).unwrap();
        assert!(g.get("alice").is_none());
    }

    #[test]
    fn test_set_rejects_empty_id() {
        assert_eq!(Graph::new().set(NodeConfig::new("")).unwrap_err(), GraphError::EmptyNodeId);
    }

    #[test]
    fn test_set_node_attr_does_not_modify_old() {
        let g = Graph::new()
            .set(NodeConfig::new("1").with_attr(Attr::text("name", "alice")))
            .unwrap();
        let g2 = g
            .set(NodeConfig::new("1").with_attr(Attr::text("name", "bob")))
            .unwrap();
        assert_eq!(g.get("1").unwrap().attr("name"), Some("alice"));
        assert_eq!(g2.get("1").unwrap().attr("name"), Some("bob"));
        assert_eq!(g2.node_count(), 1);
    }

    #[test]
    fn test_set_replace_drops_attrs_without_merge() {
        let g = Graph::new()
            .set(
                NodeConfig::new("1")
                    .with_attr(Attr::text("name", "alice"))
                    .with_attr(Attr::text("city", "Paris")),
            )
            .unwrap()
            .set(NodeConfig::new("1").with_attr(Attr::text("name", "alicia")))
            .unwrap();
        assert_eq!(g.get("1").unwrap().attr("city"), None);
    }

    #[test]
    fn test_set_merge_carries_missing_attrs() {
        let g = Graph::new()
            .set(
                NodeConfig::new("1")
                    .with_attr(Attr::text("name", "alice"))
                    .with_attr(Attr::text("city", "Paris")),
            )
            .unwrap()
            .set(NodeConfig::new("1").with_attr(Attr::text("name", "alicia")).merge(true))
            .unwrap();
        let n = g.get("1").unwrap();
        assert_eq!(n.attr("name"), Some("alicia"));
        assert_eq!(n.attr("city"), Some("Paris"));
    }

    #[test]
    fn test_set_keeps_edges() {
        let g = with_nodes(&["a", "b"])
            .connect(EdgeConfig::new("friend", "a", "b"))
            .unwrap();
        let g2 = g.set(NodeConfig::new("a").with_attr(Attr::text("x", "1"))).unwrap();
        assert_eq!(out_ids(&g2, "a"), vec!["b"]);
    }

    #[test]
    fn test_has_many_connection() {
        let g = with_nodes(&["alice", "bob", "jeff"])
            .connect(EdgeConfig::new("friend", "alice", "bob"))
            .unwrap()
            .connect(EdgeConfig::new("friend", "alice", "jeff"))
            .unwrap();
        assert_eq!(out_ids(&g, "alice"), vec!["bob", "jeff"]);
        let bob_in = g.get("bob").unwrap().inbound(&[]);
        assert_eq!(bob_in[0].node().unwrap().id.as_str(), "alice");
    }

    #[test]
    fn test_duplicate_connection_is_deduplicated() {
        let cfg = EdgeConfig::new("friend", "1", "2");
        let g = with_nodes(&["1", "2"])
            .connect(cfg.clone())
            .unwrap()
            .connect(cfg)
            .unwrap();
        assert_eq!(g.get("1").unwrap().out(&["friend"]).len(), 1);
    }

    #[test]
    fn test_duplicate_connection_replaced_in_place() {
        let g = with_nodes(&["1", "2", "3"])
            .connect(EdgeConfig::new("link", "1", "2"))
            .unwrap()
            .connect(EdgeConfig::new("link", "1", "3"))
            .unwrap()
            .connect(EdgeConfig::new("link", "1", "2").on_delete(OnDelete::Cascade))
            .unwrap();
        let edges = g.edges(&EdgeMatch::any());
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].to.as_str(), "2");
        assert_eq!(edges[0].on_delete, OnDelete::Cascade);
    }

    #[test]
    fn test_duplicate_has_one_connection_is_ignored() {
        let cfg = EdgeConfig::new("link", "1", "2").exclusive(true);
        let g = with_nodes(&["1", "2"])
            .connect(cfg.clone())
            .unwrap()
            .connect(cfg)
            .unwrap();
        assert_eq!(g.get("1").unwrap().out(&[]).len(), 1);
    }

    #[test]
    fn test_has_one_connection() {
        let g = with_nodes(&["alice", "bob"])
            .connect(EdgeConfig::new("friend", "alice", "bob").exclusive(true))
            .unwrap();
        assert_eq!(out_ids(&g, "alice"), vec!["bob"]);

        let g = g
            .set(NodeConfig::new("jeff"))
            .unwrap()
            .connect(EdgeConfig::new("friend", "alice", "jeff").exclusive(true))
            .unwrap();
        assert_eq!(out_ids(&g, "alice"), vec!["jeff"]);
    }

    #[test]
    fn test_has_one_only_affects_same_name() {
        let g = with_nodes(&["a", "b", "c"])
            .connect(EdgeConfig::new("like", "a", "b"))
            .unwrap()
            .connect(EdgeConfig::new("friend", "a", "c").exclusive(true))
            .unwrap();
        assert_eq!(g.get("a").unwrap().out(&[]).len(), 2);
    }

    #[test]
    fn test_has_one_connection_does_not_modify_old() {
        let g = with_nodes(&["alice", "bob", "jeff"])
            .connect(EdgeConfig::new("friend", "alice", "bob").exclusive(true))
            .unwrap();
        let _ = g
            .connect(EdgeConfig::new("friend", "alice", "jeff").exclusive(true))
            .unwrap();
        assert_eq!(out_ids(&g, "alice"), vec!["bob"]);
    }

    #[test]
    fn test_connect_requires_endpoints() {
        let g = with_nodes(&["a"]);
        assert_eq!(
            g.connect(EdgeConfig::new("friend", "a", "ghost")).unwrap_err(),
            GraphError::NodeNotFound(NodeId::new("ghost"))
        );
        assert_eq!(
            g.connect(EdgeConfig::new("friend", "ghost", "a")).unwrap_err(),
            GraphError::NodeNotFound(NodeId::new("ghost"))
        );
        assert_eq!(
            g.connect(EdgeConfig::new("", "a", "a")).unwrap_err(),
            GraphError::MissingEdgeField("name")
        );
    }

    #[test]
    fn test_disconnect_on_source_removed() {
        let g = with_nodes(&["1", "2"])
            .connect(EdgeConfig::new("link", "1", "2"))
            .unwrap();
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.remove("1").edge_count(), 0);
    }

    #[test]
    fn test_disconnect_on_target_removed() {
        let g = with_nodes(&["1", "2"])
            .connect(EdgeConfig::new("link", "1", "2"))
            .unwrap();
        let g = g.remove("2");
        assert_eq!(g.edge_count(), 0);
        assert!(g.edges(&EdgeMatch::any().to("2")).is_empty());
    }

    #[test]
    fn test_disconnect_source() {
        let g = with_nodes(&["1", "2", "3"])
            .connect(EdgeConfig::new("linkA", "1", "2").exclusive(true))
            .unwrap()
            .connect(EdgeConfig::new("linkB", "1", "3").exclusive(true))
            .unwrap()
            .connect(EdgeConfig::new("linkC", "2", "3").exclusive(true))
            .unwrap()
            .disconnect(&EdgeMatch::any().from("1"));
        assert!(g.get("1").unwrap().out(&[]).is_empty());
        assert_eq!(out_ids(&g, "2"), vec!["3"]);
    }

    #[test]
    fn test_disconnect_by_name_and_source() {
        let g = with_nodes(&["1", "2"])
            .connect(EdgeConfig::new("linkA", "1", "2"))
            .unwrap()
            .connect(EdgeConfig::new("linkB", "1", "2"))
            .unwrap();
        let same = g.disconnect(&EdgeMatch::any().from("1").name("NON-EXISTANT-NAME"));
        assert!(same.is_same(&g));
        assert_eq!(same.get("1").unwrap().out(&[]).len(), 2);

        let g = g.disconnect(&EdgeMatch::any().from("1").name("linkA"));
        assert_eq!(g.get("1").unwrap().out(&[]).len(), 1);
    }

    #[test]
    fn test_cascading_delete() {
        let g = with_nodes(&["jeff", "category", "product1", "product2", "other"])
            .connect(EdgeConfig::new("author", "category", "jeff").exclusive(true))
            .unwrap()
            .connect(EdgeConfig::new("product", "category", "product1").on_delete(OnDelete::Cascade))
            .unwrap()
            .connect(EdgeConfig::new("product", "category", "product2").on_delete(OnDelete::Cascade))
            .unwrap();
        let g = g.remove("category");
        assert!(g.get("category").is_none());
        assert!(g.get("product1").is_none());
        assert!(g.get("product2").is_none());
        assert!(g.get("jeff").is_some());
        assert!(g.get("other").is_some());
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_cascade_chains_and_tolerates_shared_children() {
        // a -> b -> c cascades, and a -> c cascades directly as well
        let g = with_nodes(&["a", "b", "c"])
            .connect(EdgeConfig::new("child", "a", "b").on_delete(OnDelete::Cascade))
            .unwrap()
            .connect(EdgeConfig::new("child", "b", "c").on_delete(OnDelete::Cascade))
            .unwrap()
            .connect(EdgeConfig::new("child", "a", "c").on_delete(OnDelete::Cascade))
            .unwrap();
        let g = g.remove("a");
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_remove_absent_node_is_same_snapshot() {
        let g = with_nodes(&["a"]);
        assert!(g.remove("ghost").is_same(&g));
        assert!(g.remove("").is_same(&g));
    }

    #[test]
    fn test_structural_sharing() {
        let g = with_nodes(&["a", "b"]);
        let g2 = g.connect(EdgeConfig::new("friend", "a", "b")).unwrap();
        assert!(Arc::ptr_eq(&g.nodes, &g2.nodes));
        assert!(Arc::ptr_eq(&g.types, &g2.types));
        assert!(!Arc::ptr_eq(&g.edges, &g2.edges));

        let g3 = g2.set(NodeConfig::new("c")).unwrap();
        assert!(Arc::ptr_eq(&g2.edges, &g3.edges));
        assert!(Arc::ptr_eq(g2.nodes.get("a").unwrap(), g3.nodes.get("a").unwrap()));
    }

    #[test]
    fn test_node_edges_direction() {
        let g = with_nodes(&["a", "b", "c"])
            .connect(EdgeConfig::new("friend", "a", "b"))
            .unwrap()
            .connect(EdgeConfig::new("friend", "c", "a"))
            .unwrap()
            .connect(EdgeConfig::new("like", "a", "c"))
            .unwrap();
        assert_eq!(g.node_edges("a", &["friend"], Direction::Out).len(), 1);
        assert_eq!(g.node_edges("a", &["friend"], Direction::In).len(), 1);
        let both = g.node_edges("a", &[], Direction::Both);
        assert_eq!(both.len(), 3);
        let far: Vec<_> = both.iter().filter_map(|e| e.node()).map(|n| n.id.to_string()).collect();
        assert_eq!(far, vec!["b", "c", "c"]);
    }

    #[test]
    fn test_define_type() {
        let g = Graph::new();
        assert!(g.types().is_empty());
        let g = g
            .define_type(Type::new("user", "User").with_field(Field::scalar("name", ValueKind::Text)))
            .unwrap();
        assert_eq!(g.types().len(), 1);
        assert_eq!(g.type_by_name("User").unwrap().field("name").unwrap().kind, ValueKind::Text);

        let g = g.set(NodeConfig::new("alice").with_type("user")).unwrap();
        assert_eq!(g.get("alice").unwrap().type_def().unwrap().name, "User");
        assert_eq!(g.nodes_of_type(&[TypeId::new("user")]).len(), 1);
        assert!(g.nodes_of_type(&[TypeId::new("post")]).is_empty());
    }

    #[test]
    fn test_define_type_upserts_by_id() {
        let g = Graph::new()
            .define_type(Type::new("user", "User"))
            .unwrap()
            .define_type(Type::new("user", "Person"))
            .unwrap();
        assert_eq!(g.types().len(), 1);
        assert!(g.type_by_name("User").is_none());
        assert!(g.type_by_name("Person").is_some());
    }

    #[test]
    fn test_define_type_validation() {
        assert_eq!(
            Graph::new().define_type(Type::new("", "User")).unwrap_err(),
            GraphError::EmptyTypeId
        );
        let bad = Type::new("user", "User").with_field(Field::scalar("", ValueKind::Text));
        assert_eq!(
            Graph::new().define_type(bad).unwrap_err(),
            GraphError::BlankFieldName(TypeId::new("user"))
        );
    }

    #[test]
    fn test_content_equality() {
        let a = with_nodes(&["x", "y"]);
        let b = with_nodes(&["x", "y"]);
        assert!(!a.is_same(&b));
        assert_eq!(a, b);
        assert_ne!(a, with_nodes(&["y", "x"]));
    }
}
