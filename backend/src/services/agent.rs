//! Agent directory service

use std::sync::Arc;

use shared::validate_email;

use crate::error::{AppError, AppResult};
use crate::models::{Agent, RegisterAgentInput};
use crate::store::StockStore;

/// Minimal directory of sales agents
#[derive(Clone)]
pub struct AgentService {
    store: Arc<dyn StockStore>,
}

impl AgentService {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    pub async fn register(&self, input: RegisterAgentInput) -> AppResult<Agent> {
        if input.name.trim().is_empty() {
            return Err(AppError::invalid(
                "name",
                "Name is required",
                "O nome é obrigatório",
            ));
        }
        validate_email(&input.email)
            .map_err(|msg| AppError::invalid("email", msg, "Formato de e-mail inválido"))?;

        let input = RegisterAgentInput {
            name: input.name.trim().to_string(),
            email: input.email.trim().to_lowercase(),
            is_admin: input.is_admin,
        };
        let agent = self.store.insert_agent(&input).await?;

        tracing::info!(agent_id = agent.id, "Agent registered");
        Ok(agent)
    }

    pub async fn list(&self) -> AppResult<Vec<Agent>> {
        self.store.list_agents().await
    }
}
