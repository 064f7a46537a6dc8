//! Committed mutation records
//!
//! One record per committed mutation, carrying everything needed to re-execute
//! it deterministically: who made it, when, and the bound operation.

use crate::ops::{Mutation, OpError};
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Caller identity metadata attached to each mutation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(BTreeMap<String, Value>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims for a user id and role
    pub fn user(uid: impl Into<String>, role: impl Into<String>) -> Self {
        Self::new().with("uid", uid.into()).with("role", role.into())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// `uid` claim as text, `"-"` when absent
    pub fn uid(&self) -> String {
        self.text("uid")
    }

    /// `role` claim as text, `"-"` when absent
    pub fn role(&self) -> String {
        self.text("role")
    }

    fn text(&self, key: &str) -> String {
        match self.0.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "-".to_string(),
            Some(other) => other.to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A mutation as it was accepted by a connection, and later by the store
///
/// Serialized as `{timestamp, claims, op, params}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RecordRepr")]
pub struct MutationRecord {
    pub timestamp: DateTime<Utc>,
    pub claims: Claims,
    pub mutation: Mutation,
}

#[derive(Deserialize)]
struct RecordRepr {
    timestamp: DateTime<Utc>,
    #[serde(default)]
    claims: Claims,
    op: String,
    #[serde(default)]
    params: Value,
}

impl TryFrom<RecordRepr> for MutationRecord {
    type Error = OpError;

    fn try_from(repr: RecordRepr) -> Result<Self, Self::Error> {
        Ok(MutationRecord {
            timestamp: repr.timestamp,
            claims: repr.claims,
            mutation: Mutation::bind(&repr.op, repr.params)?,
        })
    }
}

impl Serialize for MutationRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("MutationRecord", 4)?;
        st.serialize_field("timestamp", &self.timestamp)?;
        st.serialize_field("claims", &self.claims)?;
        st.serialize_field("op", self.mutation.name())?;
        st.serialize_field("params", &self.mutation.params())?;
        st.end()
    }
}

impl MutationRecord {
    pub fn new(claims: Claims, mutation: Mutation) -> Self {
        Self {
            timestamp: Utc::now(),
            claims,
            mutation,
        }
    }

    /// `after < timestamp < before`, each bound optional
    pub fn within(&self, after: Option<DateTime<Utc>>, before: Option<DateTime<Utc>>) -> bool {
        after.map_or(true, |a| self.timestamp > a) && before.map_or(true, |b| self.timestamp < b)
    }
}
