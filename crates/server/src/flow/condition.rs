use serde::{Deserialize, Serialize};

use super::FieldValue;

/// Pass/fail predicate attached to a task. Conditions form a small closed
/// set of kinds so custom flow definitions can name them and a flow can be
/// rebuilt from its serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    /// Passes when the value parses as an integer strictly above `threshold`.
    ScoreAbove { threshold: i64 },
    /// Passes when the value is exactly the expected string.
    Equals { expected: String },
}

impl Condition {
    pub fn kind(&self) -> &'static str {
        match self {
            Condition::ScoreAbove { .. } => "score_above",
            Condition::Equals { .. } => "equals",
        }
    }

    /// Evaluate against the value named by the payload's `condition_var`.
    /// A missing or mistyped value fails the condition rather than erroring:
    /// the business rule was not met.
    pub fn evaluate(&self, value: Option<&FieldValue>) -> bool {
        match self {
            Condition::ScoreAbove { threshold } => value
                .and_then(FieldValue::as_int)
                .map(|score| score > *threshold)
                .unwrap_or(false),
            Condition::Equals { expected } => value
                .and_then(FieldValue::as_text)
                .map(|v| v == expected)
                .unwrap_or(false),
        }
    }
}
