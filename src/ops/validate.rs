//! Identifier rules shared by type, field and attr names

use regex::Regex;
use std::sync::LazyLock;

static IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[_a-zA-Z][_a-zA-Z0-9]*$").expect("identifier pattern compiles"));

/// Names that collide with the built-in node projection and cannot be fields
pub const RESERVED_WORDS: &[&str] = &[
    "node", "nodes", "attr", "attrs", "in", "out", "inbound", "outbound", "edge", "edges", "null",
    "nullnode", "hasone", "id",
];

pub fn is_ident(s: &str) -> bool {
    IDENT.is_match(s)
}

pub fn is_reserved(s: &str) -> bool {
    RESERVED_WORDS.contains(&s.to_ascii_lowercase().as_str())
}
