//! HTTP handlers for the agent directory

use axum::{extract::State, http::StatusCode, Json};

use crate::error::AppResult;
use crate::models::{Agent, RegisterAgentInput};
use crate::services::AgentService;
use crate::AppState;

/// List all agents
pub async fn list_agents(State(state): State<AppState>) -> AppResult<Json<Vec<Agent>>> {
    let service = AgentService::new(state.store);
    let agents = service.list().await?;
    Ok(Json(agents))
}

/// Register an agent
pub async fn register_agent(
    State(state): State<AppState>,
    Json(input): Json<RegisterAgentInput>,
) -> AppResult<(StatusCode, Json<Agent>)> {
    let service = AgentService::new(state.store);
    let agent = service.register(input).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}
