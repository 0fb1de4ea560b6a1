use serde::{Deserialize, Serialize};

use super::{Condition, FieldValue, Status, TaskPayload};
use crate::validation::validate_field;
use crate::{Error, Result};

/// Payload key naming the field a task's condition is evaluated against.
pub const CONDITION_VAR: &str = "condition_var";

/// Smallest unit of work in a flow. Completion requires every declared
/// field to be present and valid; a task carrying a condition additionally
/// requires the condition to pass. A task without a condition can never be
/// rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub status: Status,
    pub required_fields: Vec<String>,
    pub condition: Option<Condition>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: Status::NotCompleted,
            required_fields: Vec::new(),
            condition: None,
        }
    }

    pub fn with_required_fields(mut self, fields: &[&str]) -> Self {
        self.required_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Check the payload against the task's required fields. Every absent
    /// field is reported in one message; field-level validation stops at the
    /// first failure. Fields are checked in declaration order so errors are
    /// deterministic.
    pub fn validate_payload(&self, payload: &TaskPayload) -> Result<()> {
        let missing: Vec<&str> = self
            .required_fields
            .iter()
            .filter(|field| !payload.contains_key(*field))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(Error::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        for field in &self.required_fields {
            if let Some(message) = validate_field(field, &payload[field]) {
                return Err(Error::Validation(message));
            }
        }
        Ok(())
    }

    /// Resolve the task's status from an already-validated payload. With a
    /// condition attached, the payload must name the field to judge via
    /// `condition_var`; a failing condition marks the task rejected. Without
    /// one the task completes unconditionally.
    pub fn complete(&mut self, payload: &TaskPayload) -> Result<()> {
        let Some(condition) = &self.condition else {
            self.status = Status::Completed;
            return Ok(());
        };

        let var = payload
            .get(CONDITION_VAR)
            .and_then(FieldValue::as_text)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Validation(format!(
                    "Task '{}' has condition but '{CONDITION_VAR}' wasn't provided",
                    self.name
                ))
            })?;

        self.status = if condition.evaluate(payload.get(var)) {
            Status::Completed
        } else {
            Status::Rejected
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(entries: &[(&str, FieldValue)]) -> TaskPayload {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn text(v: &str) -> FieldValue {
        FieldValue::Text(v.to_string())
    }

    #[test]
    fn all_missing_fields_reported_together() {
        let task = Task::new("Payment").with_required_fields(&["payment_id", "timestamp"]);
        let err = task.validate_payload(&TaskPayload::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required fields: payment_id, timestamp"
        );
    }

    #[test]
    fn first_invalid_field_wins() {
        let task = Task::new("Payment").with_required_fields(&["payment_id", "timestamp"]);
        let err = task
            .validate_payload(&payload(&[
                ("payment_id", text("")),
                ("timestamp", text("not a timestamp")),
            ]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing value for field - payment_id");
    }

    #[test]
    fn task_without_condition_completes() {
        let mut task = Task::new("sign contract").with_required_fields(&["timestamp"]);
        task.complete(&payload(&[("timestamp", text("2024-01-01 12:00:00"))]))
            .unwrap();
        assert_eq!(task.status, Status::Completed);
    }

    #[test]
    fn condition_requires_condition_var() {
        let mut task = Task::new("IQ Test").with_condition(Condition::ScoreAbove { threshold: 75 });
        let err = task
            .complete(&payload(&[("score", FieldValue::Int(90))]))
            .unwrap_err();
        assert!(err.to_string().contains("condition_var"));
        assert_eq!(task.status, Status::NotCompleted);
    }

    #[test]
    fn failing_condition_rejects_the_task() {
        let mut task = Task::new("IQ Test").with_condition(Condition::ScoreAbove { threshold: 75 });
        task.complete(&payload(&[
            ("condition_var", text("score")),
            ("score", FieldValue::Int(70)),
        ]))
        .unwrap();
        assert_eq!(task.status, Status::Rejected);
    }

    #[test]
    fn passing_condition_completes_the_task() {
        let mut task = Task::new("IQ Test").with_condition(Condition::ScoreAbove { threshold: 75 });
        task.complete(&payload(&[
            ("condition_var", text("score")),
            ("score", FieldValue::Int(90)),
        ]))
        .unwrap();
        assert_eq!(task.status, Status::Completed);
    }
}
