//! Type registry entries
//!
//! A [`Type`] describes the shape nodes of that type are expected to have. The
//! graph itself only stores and upserts these definitions; field-level rules are
//! checked by the operation executor when nodes are written.

use super::edge::Direction;
use super::types::{EdgeName, TypeId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of value a field holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Text,
    RichText,
    Int,
    Float,
    Boolean,
    Image,
    File,
    /// Object-valued field projected from graph edges
    Edge,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueKind::Text => "Text",
            ValueKind::RichText => "RichText",
            ValueKind::Int => "Int",
            ValueKind::Float => "Float",
            ValueKind::Boolean => "Boolean",
            ValueKind::Image => "Image",
            ValueKind::File => "File",
            ValueKind::Edge => "Edge",
        };
        f.write_str(s)
    }
}

/// How many live targets an edge field allows per source node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cardinality {
    #[default]
    None,
    HasOne,
    HasMany,
}

/// A field of a type definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub cardinality: Cardinality,
    /// Edge name projected by this field (edge fields only)
    #[serde(default)]
    pub edge: Option<EdgeName>,
    /// Which end of the edge this field's owner sits on
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Expected type of the node at the other end of the edge
    #[serde(default)]
    pub to_type: Option<TypeId>,
}

impl Field {
    /// Scalar field of the given kind
    pub fn scalar(name: impl Into<String>, kind: ValueKind) -> Self {
        Field {
            name: name.into(),
            kind,
            description: String::new(),
            required: false,
            cardinality: Cardinality::None,
            edge: None,
            direction: None,
            to_type: None,
        }
    }

    /// Outbound edge field
    pub fn edge(
        name: impl Into<String>,
        edge: impl Into<EdgeName>,
        cardinality: Cardinality,
        to_type: Option<TypeId>,
    ) -> Self {
        Field {
            name: name.into(),
            kind: ValueKind::Edge,
            description: String::new(),
            required: false,
            cardinality,
            edge: Some(edge.into()),
            direction: Some(Direction::Out),
            to_type,
        }
    }

    pub fn is_edge(&self) -> bool {
        self.cardinality != Cardinality::None || self.kind == ValueKind::Edge
    }

    /// Effective direction; edge fields default to outbound
    pub fn edge_direction(&self) -> Direction {
        self.direction.unwrap_or(Direction::Out)
    }
}

/// A named schema definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    pub id: TypeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl Type {
    pub fn new(id: impl Into<TypeId>, name: impl Into<String>) -> Self {
        Type {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The edge field (if any) that projects `edge` in `direction`
    pub fn edge_field(&self, edge: &str, direction: Direction) -> Option<&Field> {
        self.fields.iter().find(|f| {
            f.is_edge()
                && f.edge.as_ref().map(|e| e.as_str() == edge).unwrap_or(false)
                && f.edge_direction() == direction
        })
    }
}
