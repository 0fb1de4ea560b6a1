use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Closed value union for task payload fields. Payloads arrive as JSON
/// objects; anything outside these shapes is rejected at deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// A task submission: field name to submitted value.
pub type TaskPayload = HashMap<String, FieldValue>;

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            FieldValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            FieldValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Only the empty string counts as an absent value; `false` and `0` are
    /// legitimate submissions.
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }
}
