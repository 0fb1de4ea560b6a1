use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    builder, progression, Status, Step, StepDefinition, StepSelector, TaskDefinition, TaskPayload,
    User,
};
use crate::store::Registry;
use crate::validation::validate_email;
use crate::{metrics, Error, Result};

/// Outcome of a completion call. Re-submitting an already-completed task or
/// step is a no-op rather than a re-evaluation of its condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    Completed,
    AlreadyCompleted,
}

/// One row of a user's flow overview.
#[derive(Debug, Clone, Serialize)]
pub struct FlowEntry {
    pub step_name: String,
    pub index: usize,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentStep {
    pub name: String,
    pub level: usize,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentTask {
    pub name: String,
    pub status: Status,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentPosition {
    pub current_step: CurrentStep,
    pub current_task: CurrentTask,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub user_id: String,
    pub email: String,
}

/// The engine behind the request boundary: owns the registry and exposes
/// every flow operation. Business rules the data model leaves to its caller
/// (name uniqueness, the in-progress-step guard, terminal-status refusal)
/// are enforced here, before any mutation.
pub struct FlowEngine {
    registry: Arc<Registry>,
}

impl FlowEngine {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    /// Register a user with a validated, unclaimed email and a freshly
    /// built flow (custom definitions or the default).
    pub async fn create_user(
        &self,
        email: &str,
        custom_steps: Option<Vec<StepDefinition>>,
    ) -> Result<String> {
        if email.is_empty() {
            return Err(Error::Validation("Email is required.".to_string()));
        }
        if let Some(message) = validate_email(email) {
            warn!(%email, "rejected registration with invalid email");
            return Err(Error::Validation(message));
        }

        // An empty custom definition list falls back to the default flow.
        let custom_steps = custom_steps.filter(|definitions| !definitions.is_empty());
        let steps = builder::build_flow(custom_steps)?;
        let user_id = Uuid::new_v4().to_string();
        let mut user = User::new(user_id.clone(), email);
        for step in steps {
            user.add_step(step, None)?;
        }
        self.registry.register(user).await?;
        metrics::USERS_CREATED_TOTAL.inc();
        info!(%user_id, %email, "user created");
        Ok(user_id)
    }

    pub async fn get_flow(&self, user_id: &str) -> Result<Vec<FlowEntry>> {
        self.registry
            .read_user(user_id, |user| {
                Ok(user
                    .steps
                    .iter()
                    .enumerate()
                    .map(|(index, step)| FlowEntry {
                        step_name: step.name.clone(),
                        index,
                        status: step.status,
                    })
                    .collect())
            })
            .await
    }

    pub async fn get_current(&self, user_id: &str) -> Result<CurrentPosition> {
        self.registry
            .read_user(user_id, |user| {
                let (step, task) = progression::current_position(user);
                Ok(CurrentPosition {
                    current_step: CurrentStep {
                        name: step.name.clone(),
                        level: user.current_step_index,
                        status: step.status,
                    },
                    current_task: CurrentTask {
                        name: task.name.clone(),
                        status: task.status,
                    },
                })
            })
            .await
    }

    pub async fn get_status(&self, user_id: &str) -> Result<Status> {
        self.registry.read_user(user_id, |user| Ok(user.status)).await
    }

    /// Validate and complete the current task, then advance the flow.
    pub async fn complete_task(
        &self,
        user_id: &str,
        step_name: &str,
        task_name: &str,
        payload: &TaskPayload,
    ) -> Result<CompletionOutcome> {
        let result = self
            .registry
            .with_user(user_id, |user| {
                Self::complete_current_task(user, step_name, task_name, payload)
            })
            .await;
        self.record_completion(user_id, task_name, &result);
        if let Ok(CompletionOutcome::Completed) = &result {
            self.note_terminal(user_id).await;
        }
        result
    }

    /// Complete every remaining task of the current step in order, pulling
    /// each task's payload out of the per-task payload map. Short-circuits
    /// on the first failure; already-completed tasks are skipped.
    pub async fn complete_step(
        &self,
        user_id: &str,
        step_name: &str,
        step_payload: &HashMap<String, TaskPayload>,
    ) -> Result<CompletionOutcome> {
        let result = self
            .registry
            .with_user(user_id, |user| {
                if !user.has_step(step_name) {
                    return Err(Error::NotFound("This step does not exist".to_string()));
                }
                if user.current_step().name != step_name {
                    return Err(Error::Validation(format!(
                        "Step '{step_name}' is not the current step"
                    )));
                }
                if user.current_step().status == Status::Completed {
                    return Ok(CompletionOutcome::AlreadyCompleted);
                }
                if user.status.is_terminal() {
                    return Err(Error::Validation(format!(
                        "The flow is already {}",
                        user.status
                    )));
                }

                let step_index = user.current_step_index;
                let task_count = user.steps[step_index].tasks.len();
                for task_index in 0..task_count {
                    if user.steps[step_index].tasks[task_index].status == Status::Completed {
                        continue;
                    }
                    let task_name = user.steps[step_index].tasks[task_index].name.clone();
                    let payload = step_payload
                        .get(&task_name)
                        .filter(|payload| !payload.is_empty())
                        .ok_or_else(|| {
                            Error::Validation(format!("Missing payload for task '{task_name}'"))
                        })?;

                    let task = &mut user.steps[step_index].tasks[task_index];
                    task.validate_payload(payload)?;
                    task.complete(payload)?;
                    if !progression::progress(user) {
                        return Err(Error::ConditionFailed("Condition failed".to_string()));
                    }
                    metrics::TASKS_COMPLETED_TOTAL.inc();
                }
                Ok(CompletionOutcome::Completed)
            })
            .await;

        match &result {
            Ok(CompletionOutcome::Completed) => {
                info!(user_id, step_name, "step completed");
                self.note_terminal(user_id).await;
            }
            Ok(CompletionOutcome::AlreadyCompleted) => {
                info!(user_id, step_name, "step already completed");
            }
            Err(Error::ConditionFailed(_)) => {
                warn!(user_id, step_name, "condition failed, flow rejected");
                metrics::USERS_REJECTED_TOTAL.inc();
            }
            Err(error) => warn!(user_id, step_name, %error, "step completion failed"),
        }
        result
    }

    /// Add a step by optional index, enforcing the boundary rules first:
    /// non-empty unique step name, non-empty unique task names.
    pub async fn add_step(
        &self,
        user_id: &str,
        step_name: &str,
        tasks: &[TaskDefinition],
        index: Option<usize>,
    ) -> Result<()> {
        self.registry
            .with_user(user_id, |user| {
                if step_name.is_empty() {
                    return Err(Error::Validation("Step name cannot be empty".to_string()));
                }
                if user.has_step(step_name) {
                    return Err(Error::Validation(format!(
                        "Step with name '{step_name}' already exists"
                    )));
                }
                builder::check_task_definitions(tasks)?;
                let task_list = builder::build_tasks(tasks)?;
                user.add_step(Step::new(step_name, task_list), index)
            })
            .await?;
        info!(user_id, step_name, ?index, "step added");
        Ok(())
    }

    /// Remove a step by index or exact name. The step the cursor points at
    /// cannot be removed.
    pub async fn remove_step(
        &self,
        user_id: &str,
        step_name: Option<&str>,
        index: Option<usize>,
    ) -> Result<()> {
        self.registry
            .with_user(user_id, |user| {
                if let Some(name) = step_name {
                    if !user.has_step(name) {
                        return Err(Error::Validation("This step does not exist".to_string()));
                    }
                }
                let selector = Self::selector_from(step_name, index)?;
                Self::guard_current_step(user, step_name, index, "remove")?;
                user.remove_step(&selector).map(|_| ())
            })
            .await?;
        info!(user_id, ?step_name, ?index, "step removed");
        Ok(())
    }

    /// Replace a step (new name, new task list) by index or exact name. The
    /// current step cannot be renamed away.
    pub async fn modify_step(
        &self,
        user_id: &str,
        new_step_name: &str,
        step_name: Option<&str>,
        index: Option<usize>,
        tasks: &[TaskDefinition],
    ) -> Result<()> {
        self.registry
            .with_user(user_id, |user| {
                if new_step_name.is_empty() {
                    return Err(Error::Validation(
                        "New step's name cannot be empty".to_string(),
                    ));
                }
                if user.has_step(new_step_name) {
                    return Err(Error::Validation(format!(
                        "Step with name '{new_step_name}' already exists"
                    )));
                }
                if let Some(name) = step_name {
                    if !user.has_step(name) {
                        return Err(Error::Validation("This step does not exist".to_string()));
                    }
                }
                builder::check_task_definitions(tasks)?;
                let task_list = builder::build_tasks(tasks)?;
                let selector = Self::selector_from(step_name, index)?;
                Self::guard_current_step(user, step_name, index, "modify")?;
                user.replace_step(Step::new(new_step_name, task_list), &selector)
                    .map(|_| ())
            })
            .await?;
        info!(user_id, ?step_name, ?index, new_step_name, "step modified");
        Ok(())
    }

    pub async fn update_email(&self, user_id: &str, new_email: &str) -> Result<()> {
        if new_email.is_empty() {
            return Err(Error::Validation("Email is required".to_string()));
        }
        if let Some(message) = validate_email(new_email) {
            return Err(Error::Validation(message));
        }
        self.registry
            .update_email(user_id, new_email.to_string())
            .await?;
        info!(user_id, new_email, "email updated");
        Ok(())
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        let user = self.registry.delete(user_id).await?;
        info!(user_id, email = %user.email, "user deleted");
        Ok(())
    }

    pub async fn list_users(&self) -> Vec<UserSummary> {
        self.registry
            .list()
            .await
            .into_iter()
            .map(|(user_id, email)| UserSummary { user_id, email })
            .collect()
    }

    fn complete_current_task(
        user: &mut User,
        step_name: &str,
        task_name: &str,
        payload: &TaskPayload,
    ) -> Result<CompletionOutcome> {
        if !user.has_step(step_name) {
            return Err(Error::NotFound("This step does not exist".to_string()));
        }
        if user.current_step().name != step_name {
            return Err(Error::Validation(format!(
                "Step '{step_name}' is not the current step"
            )));
        }
        let step = user.current_step();
        if !step.has_task(task_name) {
            return Err(Error::NotFound("Task not found.".to_string()));
        }
        if step.current_task().name != task_name {
            return Err(Error::Validation(format!(
                "Task '{task_name}' is not the current task"
            )));
        }
        if step.current_task().status == Status::Completed {
            return Ok(CompletionOutcome::AlreadyCompleted);
        }
        if user.status.is_terminal() {
            return Err(Error::Validation(format!(
                "The flow is already {}",
                user.status
            )));
        }

        let task = user.current_step_mut().current_task_mut();
        task.validate_payload(payload)?;
        task.complete(payload)?;
        if !progression::progress(user) {
            return Err(Error::ConditionFailed("Condition failed".to_string()));
        }
        Ok(CompletionOutcome::Completed)
    }

    fn selector_from(step_name: Option<&str>, index: Option<usize>) -> Result<StepSelector> {
        match (index, step_name) {
            (Some(i), _) => Ok(StepSelector::Index(i)),
            (None, Some(name)) => Ok(StepSelector::Name(name.to_string())),
            (None, None) => Err(Error::Validation(
                "Either step_name or index must be provided".to_string(),
            )),
        }
    }

    /// A mutation may not target the step the cursor points at, whether it
    /// is addressed by index or by name.
    fn guard_current_step(
        user: &User,
        step_name: Option<&str>,
        index: Option<usize>,
        action: &str,
    ) -> Result<()> {
        let hits_current = index == Some(user.current_step_index)
            || step_name.is_some_and(|name| user.current_step().name == name);
        if hits_current {
            Err(Error::Validation(format!(
                "Cannot {action} an in-progress step"
            )))
        } else {
            Ok(())
        }
    }

    fn record_completion(
        &self,
        user_id: &str,
        task_name: &str,
        result: &Result<CompletionOutcome>,
    ) {
        match result {
            Ok(CompletionOutcome::Completed) => {
                metrics::TASKS_COMPLETED_TOTAL.inc();
                info!(user_id, task_name, "task completed");
            }
            Ok(CompletionOutcome::AlreadyCompleted) => {
                info!(user_id, task_name, "task already completed");
            }
            Err(Error::ConditionFailed(_)) => {
                metrics::USERS_REJECTED_TOTAL.inc();
                warn!(user_id, task_name, "condition failed, flow rejected");
            }
            Err(error) => warn!(user_id, task_name, %error, "task completion failed"),
        }
    }

    /// Bump the acceptance counter when a completion drove the user into
    /// the accepted state.
    async fn note_terminal(&self, user_id: &str) {
        if let Ok(Status::Accepted) = self.get_status(user_id).await {
            metrics::USERS_ACCEPTED_TOTAL.inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FieldValue;

    fn engine() -> FlowEngine {
        FlowEngine::new(Arc::new(Registry::new()))
    }

    fn text(v: &str) -> FieldValue {
        FieldValue::Text(v.to_string())
    }

    fn payload(entries: &[(&str, FieldValue)]) -> TaskPayload {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn personal_details() -> TaskPayload {
        payload(&[
            ("first_name", text("Bob")),
            ("last_name", text("Adams")),
            ("email", text("bob@example.com")),
            ("timestamp", text("2024-01-01 12:00:00")),
        ])
    }

    fn iq_test(score: i64) -> TaskPayload {
        payload(&[
            ("test_id", text("123")),
            ("score", FieldValue::Int(score)),
            ("timestamp", text("2024-01-01 12:00:00")),
            ("condition_var", text("score")),
        ])
    }

    async fn assert_mirrors_in_sync(engine: &FlowEngine, user_id: &str) {
        engine
            .registry
            .read_user(user_id, |user| {
                let step_names: std::collections::HashSet<String> =
                    user.steps.iter().map(|s| s.name.clone()).collect();
                assert_eq!(user.step_names, step_names);
                for step in &user.steps {
                    let task_names: std::collections::HashSet<String> =
                        step.tasks.iter().map(|t| t.name.clone()).collect();
                    assert_eq!(step.task_names, task_names);
                }
                Ok(())
            })
            .await
            .unwrap();
    }

    async fn drive_to_acceptance(engine: &FlowEngine, user_id: &str) {
        let steps: Vec<(&str, Vec<(&str, TaskPayload)>)> = vec![
            ("Personal Details Form", vec![("Personal Details Form", personal_details())]),
            ("IQ Test", vec![("IQ Test", iq_test(90))]),
            (
                "Interview",
                vec![
                    (
                        "schedule interview",
                        payload(&[("interview_date", text("2024-08-01"))]),
                    ),
                    (
                        "perform interview",
                        payload(&[
                            ("interview_date", text("2024-08-01")),
                            ("interviewer_id", text("123456789")),
                            ("decision", text("passed_interview")),
                            ("condition_var", text("decision")),
                        ]),
                    ),
                ],
            ),
            (
                "Sign Contract",
                vec![
                    (
                        "upload identification document",
                        payload(&[
                            ("passport_number", text("12345678")),
                            ("timestamp", text("2024-01-01 12:00:00")),
                        ]),
                    ),
                    (
                        "sign contract",
                        payload(&[("timestamp", text("2024-01-01 12:00:00"))]),
                    ),
                ],
            ),
            (
                "Payment",
                vec![(
                    "Payment",
                    payload(&[
                        ("payment_id", text("pay1")),
                        ("timestamp", text("2024-01-01 12:00:00")),
                    ]),
                )],
            ),
            (
                "Join Slack",
                vec![(
                    "Join Slack",
                    payload(&[
                        ("email", text("bob@example.com")),
                        ("timestamp", text("2024-01-01 12:00:00")),
                    ]),
                )],
            ),
        ];

        for (step_name, tasks) in steps {
            for (task_name, task_payload) in tasks {
                let outcome = engine
                    .complete_task(user_id, step_name, task_name, &task_payload)
                    .await
                    .unwrap();
                assert_eq!(outcome, CompletionOutcome::Completed);
                assert_mirrors_in_sync(engine, user_id).await;
            }
        }
    }

    #[tokio::test]
    async fn default_flow_walk_ends_accepted() {
        let engine = engine();
        let user_id = engine.create_user("a@b.com", None).await.unwrap();

        let flow = engine.get_flow(&user_id).await.unwrap();
        assert_eq!(flow.len(), 6);
        assert!(flow.iter().all(|entry| entry.status == Status::NotCompleted));
        assert_eq!(engine.get_status(&user_id).await.unwrap(), Status::InProgress);

        drive_to_acceptance(&engine, &user_id).await;
        assert_eq!(engine.get_status(&user_id).await.unwrap(), Status::Accepted);
    }

    #[tokio::test]
    async fn failed_iq_condition_rejects_task_step_and_user() {
        let engine = engine();
        let user_id = engine.create_user("a@b.com", None).await.unwrap();
        engine
            .complete_task(
                &user_id,
                "Personal Details Form",
                "Personal Details Form",
                &personal_details(),
            )
            .await
            .unwrap();

        let err = engine
            .complete_task(&user_id, "IQ Test", "IQ Test", &iq_test(70))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConditionFailed(_)));
        assert_eq!(engine.get_status(&user_id).await.unwrap(), Status::Rejected);

        let flow = engine.get_flow(&user_id).await.unwrap();
        assert_eq!(flow[1].status, Status::Rejected);
        let position = engine.get_current(&user_id).await.unwrap();
        assert_eq!(position.current_task.status, Status::Rejected);
    }

    #[tokio::test]
    async fn passing_iq_condition_advances_to_interview() {
        let engine = engine();
        let user_id = engine.create_user("a@b.com", None).await.unwrap();
        engine
            .complete_task(
                &user_id,
                "Personal Details Form",
                "Personal Details Form",
                &personal_details(),
            )
            .await
            .unwrap();
        engine
            .complete_task(&user_id, "IQ Test", "IQ Test", &iq_test(90))
            .await
            .unwrap();

        let position = engine.get_current(&user_id).await.unwrap();
        assert_eq!(position.current_step.name, "Interview");
        let flow = engine.get_flow(&user_id).await.unwrap();
        assert_eq!(flow[1].status, Status::Completed);
    }

    #[tokio::test]
    async fn rejected_flow_refuses_further_completion() {
        let engine = engine();
        let user_id = engine.create_user("a@b.com", None).await.unwrap();
        engine
            .complete_task(
                &user_id,
                "Personal Details Form",
                "Personal Details Form",
                &personal_details(),
            )
            .await
            .unwrap();
        let _ = engine
            .complete_task(&user_id, "IQ Test", "IQ Test", &iq_test(70))
            .await;

        let err = engine
            .complete_task(&user_id, "IQ Test", "IQ Test", &iq_test(90))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(engine.get_status(&user_id).await.unwrap(), Status::Rejected);
    }

    #[tokio::test]
    async fn completing_an_accepted_flow_again_is_a_noop() {
        let engine = engine();
        let user_id = engine.create_user("a@b.com", None).await.unwrap();
        drive_to_acceptance(&engine, &user_id).await;

        let outcome = engine
            .complete_task(
                &user_id,
                "Join Slack",
                "Join Slack",
                &payload(&[
                    ("email", text("bob@example.com")),
                    ("timestamp", text("2024-01-01 12:00:00")),
                ]),
            )
            .await
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::AlreadyCompleted);
        assert_eq!(engine.get_status(&user_id).await.unwrap(), Status::Accepted);
    }

    #[tokio::test]
    async fn complete_step_runs_tasks_in_order() {
        let engine = engine();
        let user_id = engine.create_user("a@b.com", None).await.unwrap();
        engine
            .complete_step(
                &user_id,
                "Personal Details Form",
                &[("Personal Details Form".to_string(), personal_details())]
                    .into_iter()
                    .collect(),
            )
            .await
            .unwrap();
        engine
            .complete_step(
                &user_id,
                "IQ Test",
                &[("IQ Test".to_string(), iq_test(90))].into_iter().collect(),
            )
            .await
            .unwrap();

        let interview_payloads: HashMap<String, TaskPayload> = [
            (
                "schedule interview".to_string(),
                payload(&[("interview_date", text("2024-08-01"))]),
            ),
            (
                "perform interview".to_string(),
                payload(&[
                    ("interview_date", text("2024-08-01")),
                    ("interviewer_id", text("123456789")),
                    ("decision", text("passed_interview")),
                    ("condition_var", text("decision")),
                ]),
            ),
        ]
        .into_iter()
        .collect();
        engine
            .complete_step(&user_id, "Interview", &interview_payloads)
            .await
            .unwrap();

        let flow = engine.get_flow(&user_id).await.unwrap();
        assert_eq!(flow[2].status, Status::Completed);
        let position = engine.get_current(&user_id).await.unwrap();
        assert_eq!(position.current_step.name, "Sign Contract");
    }

    #[tokio::test]
    async fn complete_step_requires_every_task_payload() {
        let engine = engine();
        let user_id = engine.create_user("a@b.com", None).await.unwrap();
        let err = engine
            .complete_step(&user_id, "Personal Details Form", &HashMap::new())
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("Missing payload for task 'Personal Details Form'"));
    }

    #[tokio::test]
    async fn insert_step_in_the_middle_shifts_the_rest() {
        let engine = engine();
        let user_id = engine.create_user("a@b.com", None).await.unwrap();
        engine
            .add_step(&user_id, "Custom Step", &[], Some(1))
            .await
            .unwrap();

        let flow = engine.get_flow(&user_id).await.unwrap();
        assert_eq!(flow.len(), 7);
        assert_eq!(flow[1].step_name, "Custom Step");
        assert_eq!(flow[2].step_name, "IQ Test");
        assert_mirrors_in_sync(&engine, &user_id).await;
    }

    #[tokio::test]
    async fn cannot_remove_the_current_step() {
        let engine = engine();
        let user_id = engine.create_user("a@b.com", None).await.unwrap();
        let err = engine
            .remove_step(&user_id, None, Some(0))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Cannot remove an in-progress step"));
        assert_eq!(engine.get_flow(&user_id).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn duplicate_email_leaves_first_user_untouched() {
        let engine = engine();
        let user_id = engine.create_user("a@b.com", None).await.unwrap();
        let err = engine.create_user("a@b.com", None).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert_eq!(engine.get_flow(&user_id).await.unwrap().len(), 6);
        assert_eq!(engine.list_users().await.len(), 1);
    }

    #[tokio::test]
    async fn modify_step_renames_and_replaces_tasks() {
        let engine = engine();
        let user_id = engine.create_user("a@b.com", None).await.unwrap();
        engine
            .modify_step(&user_id, "Security Check", Some("Payment"), None, &[])
            .await
            .unwrap();

        let flow = engine.get_flow(&user_id).await.unwrap();
        let names: Vec<&str> = flow.iter().map(|e| e.step_name.as_str()).collect();
        assert!(names.contains(&"Security Check"));
        assert!(!names.contains(&"Payment"));
        assert_mirrors_in_sync(&engine, &user_id).await;
    }
}
