use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use crate::flow::{CompletionOutcome, FlowEngine, StepDefinition, TaskDefinition, TaskPayload};
use crate::{metrics, Error, Result};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub steps: Option<Vec<StepDefinition>>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteTaskRequest {
    #[serde(default)]
    pub task_payload: Option<TaskPayload>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteStepRequest {
    #[serde(default)]
    pub step_payload: Option<HashMap<String, TaskPayload>>,
}

#[derive(Debug, Deserialize)]
pub struct AddStepRequest {
    #[serde(default)]
    pub step_name: String,
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveStepRequest {
    #[serde(default)]
    pub step_name: Option<String>,
    #[serde(default)]
    pub index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ModifyStepRequest {
    #[serde(default)]
    pub new_step_name: String,
    #[serde(default)]
    pub step_name: Option<String>,
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub tasks: Vec<TaskDefinition>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEmailRequest {
    #[serde(default)]
    pub email: String,
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn metrics() -> String {
    metrics::gather_metrics()
}

pub async fn create_user(
    State(engine): State<Arc<FlowEngine>>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Response> {
    let user_id = engine.create_user(&request.email, request.steps).await?;
    Ok((StatusCode::CREATED, Json(json!({ "user_id": user_id }))).into_response())
}

pub async fn list_users(State(engine): State<Arc<FlowEngine>>) -> Response {
    let users = engine.list_users().await;
    Json(json!({ "users": users })).into_response()
}

pub async fn get_flow(
    State(engine): State<Arc<FlowEngine>>,
    Path(user_id): Path<String>,
) -> Result<Response> {
    let flow = engine.get_flow(&user_id).await?;
    Ok(Json(json!({ "flow": flow })).into_response())
}

pub async fn get_current_step(
    State(engine): State<Arc<FlowEngine>>,
    Path(user_id): Path<String>,
) -> Result<Response> {
    let position = engine.get_current(&user_id).await?;
    Ok(Json(position).into_response())
}

pub async fn get_status(
    State(engine): State<Arc<FlowEngine>>,
    Path(user_id): Path<String>,
) -> Result<Response> {
    let status = engine.get_status(&user_id).await?;
    Ok(Json(json!({ "status": status })).into_response())
}

pub async fn complete_task(
    State(engine): State<Arc<FlowEngine>>,
    Path((user_id, step_name, task_name)): Path<(String, String, String)>,
    Json(request): Json<CompleteTaskRequest>,
) -> Result<Response> {
    let payload = request
        .task_payload
        .filter(|payload| !payload.is_empty())
        .ok_or_else(|| Error::Validation("Task payload is required".to_string()))?;

    match engine
        .complete_task(&user_id, &step_name, &task_name, &payload)
        .await?
    {
        CompletionOutcome::Completed => Ok(Json(json!({
            "status": "Task marked as completed"
        }))
        .into_response()),
        CompletionOutcome::AlreadyCompleted => Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "Task already completed" })),
        )
            .into_response()),
    }
}

pub async fn complete_step(
    State(engine): State<Arc<FlowEngine>>,
    Path((user_id, step_name)): Path<(String, String)>,
    Json(request): Json<CompleteStepRequest>,
) -> Result<Response> {
    let step_payload = request.step_payload.unwrap_or_default();

    match engine
        .complete_step(&user_id, &step_name, &step_payload)
        .await?
    {
        CompletionOutcome::Completed => Ok(Json(json!({
            "status": "Step marked as completed"
        }))
        .into_response()),
        CompletionOutcome::AlreadyCompleted => Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": "Step already completed" })),
        )
            .into_response()),
    }
}

pub async fn add_step(
    State(engine): State<Arc<FlowEngine>>,
    Path(user_id): Path<String>,
    Json(request): Json<AddStepRequest>,
) -> Result<Response> {
    engine
        .add_step(&user_id, &request.step_name, &request.tasks, request.index)
        .await?;
    let status = match request.index {
        Some(index) => format!("Step '{}' added at index {index}", request.step_name),
        None => format!("Step '{}' added", request.step_name),
    };
    Ok(Json(json!({ "status": status })).into_response())
}

pub async fn remove_step(
    State(engine): State<Arc<FlowEngine>>,
    Path(user_id): Path<String>,
    Json(request): Json<RemoveStepRequest>,
) -> Result<Response> {
    engine
        .remove_step(&user_id, request.step_name.as_deref(), request.index)
        .await?;
    Ok(Json(json!({ "status": "Step removed successfully" })).into_response())
}

pub async fn modify_step(
    State(engine): State<Arc<FlowEngine>>,
    Path(user_id): Path<String>,
    Json(request): Json<ModifyStepRequest>,
) -> Result<Response> {
    engine
        .modify_step(
            &user_id,
            &request.new_step_name,
            request.step_name.as_deref(),
            request.index,
            &request.tasks,
        )
        .await?;
    Ok(Json(json!({
        "status": format!("Step modified to '{}'", request.new_step_name)
    }))
    .into_response())
}

pub async fn update_email(
    State(engine): State<Arc<FlowEngine>>,
    Path(user_id): Path<String>,
    Json(request): Json<UpdateEmailRequest>,
) -> Result<Response> {
    engine.update_email(&user_id, &request.email).await?;
    Ok(Json(json!({ "status": "Email updated successfully" })).into_response())
}

pub async fn delete_user(
    State(engine): State<Arc<FlowEngine>>,
    Path(user_id): Path<String>,
) -> Result<Response> {
    engine.delete_user(&user_id).await?;
    Ok(Json(json!({ "status": "User deleted" })).into_response())
}
