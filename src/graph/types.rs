//! Core identifier types for the graph

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Caller-assigned node identifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        NodeId(id)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        NodeId(id.to_string())
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Type definition identifier (stable across renames)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct TypeId(String);

impl TypeId {
    pub fn new(id: impl Into<String>) -> Self {
        TypeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TypeId {
    fn from(id: String) -> Self {
        TypeId(id)
    }
}

impl From<&str> for TypeId {
    fn from(id: &str) -> Self {
        TypeId(id.to_string())
    }
}

/// Edge name (relationship name, e.g. "friend", "product")
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct EdgeName(String);

impl EdgeName {
    pub fn new(name: impl Into<String>) -> Self {
        EdgeName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for EdgeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EdgeName {
    fn from(name: String) -> Self {
        EdgeName(name)
    }
}

impl From<&str> for EdgeName {
    fn from(name: &str) -> Self {
        EdgeName(name.to_string())
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for EdgeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for NodeId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<str> for EdgeName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_node_id() {
        let id = NodeId::new("alice");
        assert_eq!(id.as_str(), "alice");
        assert_eq!(format!("{}", id), "alice");

        let id2: NodeId = "bob".into();
        assert_eq!(id2.as_str(), "bob");
        assert!(!id2.is_empty());
        assert!(NodeId::new("").is_empty());
    }

    #[test]
    fn test_node_id_borrow_lookup() {
        let mut map = HashMap::new();
        map.insert(NodeId::new("alice"), 1);
        assert_eq!(map.get("alice"), Some(&1));
    }

    #[test]
    fn test_transparent_serde() {
        let json = serde_json::to_string(&EdgeName::new("friend")).unwrap();
        assert_eq!(json, "\"friend\"");
        let back: TypeId = serde_json::from_str("\"User\"").unwrap();
        assert_eq!(back, TypeId::new("User"));
    }

    #[test]
    fn test_id_ordering() {
        assert!(NodeId::new("a") < NodeId::new("b"));
    }
}
