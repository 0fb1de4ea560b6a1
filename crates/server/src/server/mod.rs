mod error;
mod routes;

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::flow::FlowEngine;
use crate::{metrics, Result};

pub struct Server {
    engine: Arc<FlowEngine>,
}

impl Server {
    pub fn new(engine: Arc<FlowEngine>) -> Self {
        Self { engine }
    }

    pub fn build_router(self) -> Router {
        metrics::register_metrics();

        Router::new()
            .route("/health", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .route("/users", post(routes::create_user).get(routes::list_users))
            .route("/users/{user_id}", delete(routes::delete_user))
            .route("/users/{user_id}/flow", get(routes::get_flow))
            .route("/users/{user_id}/current_step", get(routes::get_current_step))
            .route("/users/{user_id}/status", get(routes::get_status))
            .route(
                "/users/{user_id}/steps/{step_name}/tasks/{task_name}",
                put(routes::complete_task),
            )
            .route(
                "/users/{user_id}/complete_step/{step_name}",
                put(routes::complete_step),
            )
            .route("/users/{user_id}/add_step", post(routes::add_step))
            .route("/users/{user_id}/remove_step", delete(routes::remove_step))
            .route("/users/{user_id}/modify_step", put(routes::modify_step))
            .route("/users/{user_id}/update_email", patch(routes::update_email))
            .layer(TraceLayer::new_for_http())
            .with_state(self.engine)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}
