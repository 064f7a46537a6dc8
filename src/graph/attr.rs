//! Node attributes
//!
//! An attribute is a named string payload plus an encoding tag telling readers
//! how to interpret the payload (plain text, a `data:` URI carrying binary
//! content, or a JSON document).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Payload encoding of an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    #[serde(rename = "UTF8")]
    Utf8,
    #[serde(rename = "DataURI")]
    DataUri,
    #[serde(rename = "JSON")]
    Json,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF8",
            Encoding::DataUri => "DataURI",
            Encoding::Json => "JSON",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UTF8" => Ok(Encoding::Utf8),
            "DataURI" => Ok(Encoding::DataUri),
            "JSON" => Ok(Encoding::Json),
            other => Err(format!("'{}' is not a valid attr encoding", other)),
        }
    }
}

/// A single named attribute on a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub enc: Encoding,
}

impl Attr {
    pub fn new(name: impl Into<String>, value: impl Into<String>, enc: Encoding) -> Self {
        Attr {
            name: name.into(),
            value: value.into(),
            enc,
        }
    }

    /// Plain UTF-8 text attribute
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, value, Encoding::Utf8)
    }

    /// Decode a JSON-encoded payload
    pub fn json_value(&self) -> Option<serde_json::Value> {
        match self.enc {
            Encoding::Json => serde_json::from_str(&self.value).ok(),
            _ => None,
        }
    }
}

/// Field-level union of two attribute lists: every attr in `new` is kept and
/// attrs of `old` whose name does not appear in `new` are appended after them.
pub fn merge_attrs(new: &[Attr], old: &[Attr]) -> Vec<Attr> {
    let mut merged = new.to_vec();
    for attr in old {
        if !new.iter().any(|a| a.name == attr.name) {
            merged.push(attr.clone());
        }
    }
    merged
}
