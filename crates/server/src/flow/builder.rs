use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{Condition, Step, Task};
use crate::{Error, Result};

/// Wire shape of a custom step: a name plus its task definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(default)]
    pub step_name: String,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

/// Wire shape of a task inside a custom step or mutation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub condition: Option<Condition>,
}

impl TaskDefinition {
    fn build(&self) -> Task {
        let mut task = Task::new(self.task_name.clone());
        task.required_fields = self.required_fields.clone();
        task.condition = self.condition.clone();
        task
    }
}

/// Build the task list for one step, failing on the first task without a
/// name.
pub fn build_tasks(definitions: &[TaskDefinition]) -> Result<Vec<Task>> {
    let mut tasks = Vec::with_capacity(definitions.len());
    for definition in definitions {
        if definition.task_name.is_empty() {
            return Err(Error::Validation(
                "Each task must have a 'task_name'".to_string(),
            ));
        }
        tasks.push(definition.build());
    }
    Ok(tasks)
}

/// Boundary checks applied before a step mutation: task names must be
/// non-empty and unique within the step.
pub fn check_task_definitions(definitions: &[TaskDefinition]) -> Result<()> {
    if definitions.iter().any(|d| d.task_name.is_empty()) {
        return Err(Error::Validation("Task name cannot be empty.".to_string()));
    }
    let mut seen = HashSet::new();
    if !definitions.iter().all(|d| seen.insert(&d.task_name)) {
        return Err(Error::Validation(
            "Duplicate task names are not allowed.".to_string(),
        ));
    }
    Ok(())
}

/// Build a user's flow: custom definitions when given, the fixed default
/// admissions flow otherwise. Any per-task construction failure aborts the
/// whole build.
pub fn build_flow(custom: Option<Vec<StepDefinition>>) -> Result<Vec<Step>> {
    match custom {
        Some(definitions) => definitions
            .into_iter()
            .map(|definition| {
                let tasks = build_tasks(&definition.tasks)?;
                Ok(Step::new(definition.step_name, tasks))
            })
            .collect(),
        None => Ok(default_flow()),
    }
}

/// The default six-step admissions flow.
pub fn default_flow() -> Vec<Step> {
    vec![
        Step::new(
            "Personal Details Form",
            vec![Task::new("Personal Details Form").with_required_fields(&[
                "first_name",
                "last_name",
                "email",
                "timestamp",
            ])],
        ),
        Step::new(
            "IQ Test",
            vec![Task::new("IQ Test")
                .with_required_fields(&["test_id", "score", "timestamp", "condition_var"])
                .with_condition(Condition::ScoreAbove { threshold: 75 })],
        ),
        Step::new(
            "Interview",
            vec![
                Task::new("schedule interview").with_required_fields(&["interview_date"]),
                Task::new("perform interview")
                    .with_required_fields(&[
                        "interview_date",
                        "interviewer_id",
                        "decision",
                        "condition_var",
                    ])
                    .with_condition(Condition::Equals {
                        expected: "passed_interview".to_string(),
                    }),
            ],
        ),
        Step::new(
            "Sign Contract",
            vec![
                Task::new("upload identification document")
                    .with_required_fields(&["passport_number", "timestamp"]),
                Task::new("sign contract").with_required_fields(&["timestamp"]),
            ],
        ),
        Step::new(
            "Payment",
            vec![Task::new("Payment").with_required_fields(&["payment_id", "timestamp"])],
        ),
        Step::new(
            "Join Slack",
            vec![Task::new("Join Slack").with_required_fields(&["email", "timestamp"])],
        ),
    ]
}
